//! JSON table adapter.
//!
//! A pluggable boundary for feeding JSON tables into the clustering core and
//! reading centroids back out. Schema inference happens on the first table: a
//! per-field min/max is observed, and every numeric field is linearly
//! normalized into `[0, 1]` (denormalized on output).
//!
//! This module is deliberately outside the core; the clusterer only ever sees
//! `Vec<f64>` rows.

use std::collections::HashMap;

use serde_json::{Map, Number, Value};

use crate::error::{RPHashError, Result};

/// Observed numeric range of one field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSchema {
    min: f64,
    max: f64,
}

impl FieldSchema {
    /// Schema observing a single value so far.
    pub fn new(value: f64) -> Self {
        Self { min: value, max: value }
    }

    /// Widen the range to cover `value`.
    pub fn observe(&mut self, value: f64) {
        if value < self.min {
            self.min = value;
        } else if value > self.max {
            self.max = value;
        }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Map `value` into `[0, 1]` by the observed range. Constant fields map
    /// to 0.
    pub fn normalize(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span == 0.0 { 0.0 } else { (value - self.min) / span }
    }

    /// Inverse of [`normalize`](FieldSchema::normalize).
    pub fn denormalize(&self, normalized: f64) -> f64 {
        normalized * (self.max - self.min) + self.min
    }
}

/// Schema-inferring adapter between JSON tables and dense rows.
///
/// Field order is fixed by first appearance in the schema-creating table, so
/// row layout is stable across conversions in both directions.
#[derive(Debug, Clone, Default)]
pub struct JsonAdapter {
    keys: Vec<String>,
    schema: HashMap<String, FieldSchema>,
    label: String,
}

impl JsonAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Field names in row order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn field(&self, key: &str) -> Option<&FieldSchema> {
        self.schema.get(key)
    }

    /// Convert the table stored under `label` into normalized rows, inferring
    /// the schema from the rows themselves.
    ///
    /// The expected shape is `{"label": [{"field": value, ...}, ...]}` with
    /// numeric field values.
    pub fn table_to_matrix(&mut self, label: &str, table: &Value) -> Result<Vec<Vec<f64>>> {
        let rows = table
            .get(label)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                RPHashError::InvalidParameter(format!("no array under label {label:?}"))
            })?;

        self.label = label.to_string();
        self.build_schema(rows)?;

        rows.iter()
            .map(|row| {
                let object = as_object(row)?;
                self.keys
                    .iter()
                    .map(|key| {
                        let value = object
                            .get(key)
                            .map(numeric)
                            .transpose()?
                            .unwrap_or_default();
                        Ok(self.schema[key].normalize(value))
                    })
                    .collect()
            })
            .collect()
    }

    /// Convert dense normalized rows (e.g. output centroids) back into a JSON
    /// table under the adapter's label, denormalizing each field.
    pub fn matrix_to_table(&self, rows: &[Vec<f64>]) -> Result<Value> {
        if self.keys.is_empty() {
            return Err(RPHashError::InvalidParameter(
                "adapter has no schema; convert a table first".to_string(),
            ));
        }

        let data: Vec<Value> = rows
            .iter()
            .map(|row| {
                let mut object = Map::with_capacity(self.keys.len());
                for (key, &value) in self.keys.iter().zip(row) {
                    let denorm = self.schema[key].denormalize(value);
                    let number = Number::from_f64(denorm).ok_or_else(|| {
                        RPHashError::Other(format!("non-finite value for field {key:?}"))
                    })?;
                    object.insert(key.clone(), Value::Number(number));
                }
                Ok(Value::Object(object))
            })
            .collect::<Result<_>>()?;

        let mut table = Map::with_capacity(1);
        table.insert(self.label.clone(), Value::Array(data));
        Ok(Value::Object(table))
    }

    fn build_schema(&mut self, rows: &[Value]) -> Result<()> {
        self.keys.clear();
        self.schema.clear();
        for row in rows {
            let object = as_object(row)?;
            for (key, value) in object {
                let value = numeric(value)?;
                match self.schema.get_mut(key) {
                    Some(field) => field.observe(value),
                    None => {
                        self.schema.insert(key.clone(), FieldSchema::new(value));
                        self.keys.push(key.clone());
                    }
                }
            }
        }
        Ok(())
    }
}

fn as_object(row: &Value) -> Result<&Map<String, Value>> {
    row.as_object().ok_or_else(|| {
        RPHashError::InvalidParameter("table rows must be JSON objects".to_string())
    })
}

fn numeric(value: &Value) -> Result<f64> {
    value.as_f64().ok_or_else(|| {
        RPHashError::InvalidParameter(format!("cannot convert {value} to f64"))
    })
}
