//! Property-based tests for the rphash core.
//!
//! These verify invariants that should hold regardless of input:
//! - Count-Min estimates never underestimate true counts
//! - Sketch mass equals the number of unit additions
//! - The top-K set never exceeds its k' capacity
//! - Projection preserves inner products in expectation
//! - Projection is deterministic given a seed
//! - Field normalization round-trips

use proptest::prelude::*;

mod sketch_props {
    use super::*;
    use rphash::sketch::{KhhSketch, SketchShape, k_prime};
    use std::collections::HashMap;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn estimate_never_underestimates(
            stream in prop::collection::vec(0i64..50, 1..400),
            k in 2usize..10,
            seed in any::<u64>(),
        ) {
            let shape = SketchShape { depth: 3, width: 64 };
            let mut sketch = KhhSketch::with_shape(k, shape, seed).unwrap();
            let mut truth: HashMap<i64, i64> = HashMap::new();

            for &item in &stream {
                sketch.add(item).unwrap();
                *truth.entry(item).or_insert(0) += 1;
            }

            for (&item, &count) in &truth {
                prop_assert!(
                    sketch.estimate(item) >= count,
                    "estimate {} below true count {} for {}",
                    sketch.estimate(item), count, item
                );
            }
        }

        #[test]
        fn size_equals_number_of_additions(
            stream in prop::collection::vec(any::<i64>(), 0..300),
            seed in any::<u64>(),
        ) {
            let mut sketch = KhhSketch::new(5, seed).unwrap();
            for &item in &stream {
                sketch.add_long(item, 1).unwrap();
            }
            prop_assert_eq!(sketch.size(), stream.len() as i64);
        }

        #[test]
        fn top_k_bounded_by_k_prime(
            stream in prop::collection::vec(-20i64..20, 1..500),
            k in 1usize..12,
            seed in any::<u64>(),
        ) {
            let shape = SketchShape { depth: 2, width: 64 };
            let mut sketch = KhhSketch::with_shape(k, shape, seed).unwrap();
            let cap = k_prime(k);

            for &item in &stream {
                sketch.add(item).unwrap();
                prop_assert!(sketch.top_len() <= cap);
            }

            let top = sketch.get_top().unwrap();
            prop_assert!(top.len() <= cap);
        }
    }
}

mod projection_props {
    use super::*;
    use rphash::projection::RandomProjection;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn deterministic_given_seed(
            seed in any::<u64>(),
            v in prop::collection::vec(-100.0f64..100.0, 24),
        ) {
            let p1 = RandomProjection::new(24, 6, seed).unwrap();
            let p2 = RandomProjection::new(24, 6, seed).unwrap();
            let r1 = p1.project(&v).unwrap();
            let r2 = p2.project(&v).unwrap();
            // Bit-identical, not merely approximately equal.
            for (a, b) in r1.iter().zip(&r2) {
                prop_assert_eq!(a.to_bits(), b.to_bits());
            }
        }

        #[test]
        fn projection_is_linear(
            seed in any::<u64>(),
            v in prop::collection::vec(-10.0f64..10.0, 16),
            c in -4.0f64..4.0,
        ) {
            let p = RandomProjection::new(16, 4, seed).unwrap();
            let scaled: Vec<f64> = v.iter().map(|x| c * x).collect();
            let r = p.project(&v).unwrap();
            let rs = p.project(&scaled).unwrap();
            for (a, b) in r.iter().zip(&rs) {
                prop_assert!((c * a - b).abs() < 1e-9 * (1.0 + a.abs()));
            }
        }
    }
}

mod projection_monte_carlo {
    use rphash::projection::RandomProjection;

    fn dot(a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    /// E[<Px, Py>] = <x, y>; checked against a 3-sigma Monte Carlo bound over
    /// independent projections.
    #[test]
    fn preserves_inner_products_in_expectation() {
        const D: usize = 24;
        const OUT: usize = 8;
        const SAMPLES: usize = 3000;

        let x: Vec<f64> = (0..D).map(|i| ((i * 7 + 3) as f64 * 0.37).sin()).collect();
        let y: Vec<f64> = (0..D).map(|i| ((i * 5 + 1) as f64 * 0.53).cos()).collect();
        let truth = dot(&x, &y);

        let samples: Vec<f64> = (0..SAMPLES)
            .map(|seed| {
                let p = RandomProjection::new(D, OUT, seed as u64).unwrap();
                dot(&p.project(&x).unwrap(), &p.project(&y).unwrap())
            })
            .collect();

        let mean = samples.iter().sum::<f64>() / SAMPLES as f64;
        let var = samples.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>()
            / (SAMPLES - 1) as f64;
        let bound = 3.0 * (var / SAMPLES as f64).sqrt();

        assert!(
            (mean - truth).abs() <= bound,
            "mean {mean} deviates from {truth} beyond {bound}"
        );
    }

    /// The estimator's variance shrinks as the projected dimension grows
    /// (theoretically as 1/d).
    #[test]
    fn variance_decreases_with_dimension() {
        const D: usize = 24;
        const SAMPLES: usize = 1500;

        let x: Vec<f64> = (0..D).map(|i| ((i * 3 + 2) as f64 * 0.41).sin()).collect();
        let y: Vec<f64> = (0..D).map(|i| ((i * 11 + 5) as f64 * 0.29).cos()).collect();

        let variance_at = |out: usize| -> f64 {
            let samples: Vec<f64> = (0..SAMPLES)
                .map(|seed| {
                    let p = RandomProjection::new(D, out, seed as u64).unwrap();
                    dot(&p.project(&x).unwrap(), &p.project(&y).unwrap())
                })
                .collect();
            let mean = samples.iter().sum::<f64>() / SAMPLES as f64;
            samples.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>()
                / (SAMPLES - 1) as f64
        };

        // Expected ratio is 4; anything above 2 rules out sampling noise.
        assert!(variance_at(4) > 2.0 * variance_at(16));
    }
}

#[cfg(feature = "json")]
mod adapter_props {
    use super::*;
    use rphash::adapter::FieldSchema;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn normalize_denormalize_round_trips(
            lo in -1.0e6f64..1.0e6,
            span in 1.0e-3f64..1.0e6,
            t in 0.0f64..1.0,
        ) {
            let hi = lo + span;
            let mut field = FieldSchema::new(lo);
            field.observe(hi);

            // A value inside the observed range.
            let x = lo + t * span;
            let back = field.denormalize(field.normalize(x));
            let tolerance = 1e-12 * span.max(x.abs()).max(1.0);
            prop_assert!(
                (back - x).abs() <= tolerance,
                "round trip {x} -> {back}"
            );
        }
    }
}
