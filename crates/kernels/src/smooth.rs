//! Three-point mean filter.
//!
//! Interior samples become the mean of themselves and both neighbours; each
//! endpoint becomes the mean of itself and its single neighbour.

use crate::config::{KernelOutput, OutputKind, Strategy};
use crate::error::KernelError;
use crate::fixtures::{FixtureCase, FixtureMode, FixtureProvider};
use crate::params::{ParamKind, Params};
use crate::registry::{KernelRegistry, KernelSpec};
use crate::utils::validate_smooth_input;
use anyhow::Result;
use ndarray::{array, s, Array1, ArrayView1};

pub const SMOOTH: &str = "smooth";

const SIGNATURE: [(&str, ParamKind); 1] = [("x", ParamKind::FloatArray)];

pub fn smooth_reference(x: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
    validate_smooth_input(&x)?;

    let k = x.len();
    let mut output = Array1::zeros(k);
    for i in 1..k - 1 {
        output[i] = (x[i - 1] + x[i] + x[i + 1]) / 3.0;
    }
    output[0] = (x[0] + x[1]) / 2.0;
    output[k - 1] = (x[k - 2] + x[k - 1]) / 2.0;
    Ok(output)
}

/// Whole-array form: the interior is the sum of three shifted views.
pub fn smooth_vectorized(x: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
    validate_smooth_input(&x)?;

    let k = x.len();
    let mut output = Array1::zeros(k);
    if k > 2 {
        let interior =
            (&x.slice(s![..k - 2]) + &x.slice(s![1..k - 1]) + &x.slice(s![2..])) / 3.0;
        output.slice_mut(s![1..k - 1]).assign(&interior);
    }
    output[0] = (x[0] + x[1]) / 2.0;
    output[k - 1] = (x[k - 2] + x[k - 1]) / 2.0;
    Ok(output)
}

/// Sliding-window loop over a contiguous buffer.
pub fn smooth_compiled(x: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
    validate_smooth_input(&x)?;

    let mut output = vec![0.0; x.len()];
    match x.as_slice() {
        Some(samples) => smooth_into(samples, &mut output),
        None => smooth_into(&x.to_vec(), &mut output),
    }
    Ok(Array1::from(output))
}

fn smooth_into(samples: &[f64], output: &mut [f64]) {
    let k = samples.len();
    for (out, window) in output[1..k - 1].iter_mut().zip(samples.windows(3)) {
        *out = (window[0] + window[1] + window[2]) / 3.0;
    }
    output[0] = (samples[0] + samples[1]) / 2.0;
    output[k - 1] = (samples[k - 2] + samples[k - 1]) / 2.0;
}

pub fn register_smooth(registry: &mut KernelRegistry) -> Result<(), KernelError> {
    let variants: [(Strategy, fn(ArrayView1<'_, f64>) -> Result<Array1<f64>>); 3] = [
        (Strategy::Reference, smooth_reference),
        (Strategy::Vectorized, smooth_vectorized),
        (Strategy::Compiled, smooth_compiled),
    ];
    for (strategy, kernel) in variants {
        let spec = KernelSpec::new(SMOOTH, strategy, OutputKind::SequenceFloat, move |params: &Params| {
            let x = params.array("x")?;
            Ok(KernelOutput::Sequence(kernel(x)?))
        })
        .with_signature(&SIGNATURE);
        registry.register_spec(spec)?;
    }
    Ok(())
}

/// Fixtures for [`SMOOTH`].
pub struct SmoothFixtures;

impl FixtureProvider for SmoothFixtures {
    fn kernel_name(&self) -> &str {
        SMOOTH
    }

    fn cases(&self, mode: FixtureMode) -> Vec<FixtureCase> {
        match mode {
            FixtureMode::Correctness => vec![
                FixtureCase::fixed("two samples", || Params::new().with("x", array![1.0, 3.0])),
                FixtureCase::fixed("three samples", || {
                    Params::new().with("x", array![-1.0, 0.5, 4.0])
                }),
                FixtureCase::fixed("ramp [1, 2, 3, 4]", || {
                    Params::new().with("x", array![1.0, 2.0, 3.0, 4.0])
                }),
                FixtureCase::fixed("single sample (invalid)", || {
                    Params::new().with("x", array![1.0])
                }),
                FixtureCase::seeded("random 64", |rng| {
                    Params::new().with("x", Array1::from_shape_fn(64, |_| rng.f64()))
                }),
            ],
            FixtureMode::Benchmark => [1_000usize, 10_000, 100_000]
                .into_iter()
                .map(|len| {
                    FixtureCase::seeded(format!("len={len}"), move |rng| {
                        Params::new().with("x", Array1::from_shape_fn(len, |_| rng.f64()))
                    })
                    .with_size(len)
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn ramp_matches_hand_computed_output() {
        let x = array![1.0, 2.0, 3.0, 4.0];
        let expected = array![1.5, 2.0, 3.0, 3.5];
        for kernel in [smooth_reference, smooth_vectorized, smooth_compiled] {
            let output = kernel(x.view()).unwrap();
            for (got, want) in output.iter().zip(expected.iter()) {
                assert_abs_diff_eq!(*got, *want, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn two_samples_use_endpoint_rule_only() {
        let x = array![1.0, 3.0];
        for kernel in [smooth_reference, smooth_vectorized, smooth_compiled] {
            let output = kernel(x.view()).unwrap();
            assert_eq!(output, array![2.0, 2.0]);
        }
    }

    #[test]
    fn strided_views_are_accepted() {
        let backing = array![1.0, 100.0, 2.0, 100.0, 3.0, 100.0, 4.0];
        let strided = backing.slice(s![..;2]);
        assert_eq!(
            smooth_compiled(strided).unwrap(),
            smooth_reference(strided).unwrap()
        );
    }

    #[test]
    fn single_sample_is_rejected() {
        assert!(smooth_reference(array![1.0].view()).is_err());
        assert!(smooth_vectorized(array![1.0].view()).is_err());
        assert!(smooth_compiled(array![1.0].view()).is_err());
    }

    proptest! {
        #[test]
        fn prop_length_preserved_and_variants_agree(
            samples in proptest::collection::vec(-1.0e3f64..1.0e3, 2..200),
        ) {
            let x = Array1::from(samples);
            let reference = smooth_reference(x.view()).unwrap();
            let vectorized = smooth_vectorized(x.view()).unwrap();
            let compiled = smooth_compiled(x.view()).unwrap();
            prop_assert_eq!(reference.len(), x.len());
            prop_assert_eq!(vectorized.len(), x.len());
            prop_assert_eq!(compiled.len(), x.len());
            for i in 0..x.len() {
                let allowed = 1e-9 + 1e-6 * reference[i].abs();
                prop_assert!((reference[i] - vectorized[i]).abs() <= allowed);
                prop_assert!((reference[i] - compiled[i]).abs() <= allowed);
            }
        }
    }
}
