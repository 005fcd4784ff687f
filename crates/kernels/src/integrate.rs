//! Trapezoid-rule integration of `f(x) = x^4 - 3x` over `[a, b]`.

use crate::config::{KernelOutput, OutputKind, Strategy};
use crate::error::KernelError;
use crate::fixtures::{FixtureCase, FixtureMode, FixtureProvider};
use crate::params::{ParamKind, Params};
use crate::registry::{KernelRegistry, KernelSpec};
use crate::utils::{count_param, validate_integration};
use anyhow::Result;
use ndarray::Array1;

pub const INTEGRATE: &str = "integrate";

const SIGNATURE: [(&str, ParamKind); 3] = [
    ("a", ParamKind::Float),
    ("b", ParamKind::Float),
    ("n", ParamKind::Int),
];

#[inline]
pub fn integrand(x: f64) -> f64 {
    x.powi(4) - 3.0 * x
}

pub fn integrate_reference(a: f64, b: f64, bins: usize) -> Result<f64> {
    validate_integration(a, b, bins)?;

    let dx = (b - a) / bins as f64;
    let mut total = integrand(a) * dx / 2.0;
    for i in 1..bins {
        total += integrand(a + i as f64 * dx) * dx;
    }
    total += integrand(b) * dx / 2.0;
    Ok(total)
}

/// Evaluates every interior node at once, then scales the sum by the step.
pub fn integrate_vectorized(a: f64, b: f64, bins: usize) -> Result<f64> {
    validate_integration(a, b, bins)?;

    let dx = (b - a) / bins as f64;
    let nodes = Array1::from_shape_fn(bins - 1, |i| a + (i + 1) as f64 * dx);
    let interior = nodes.mapv(integrand).sum();
    Ok((interior + (integrand(a) + integrand(b)) / 2.0) * dx)
}

/// Horner form of the integrand with fused multiply-adds.
pub fn integrate_compiled(a: f64, b: f64, bins: usize) -> Result<f64> {
    validate_integration(a, b, bins)?;

    let dx = (b - a) / bins as f64;
    let f = |x: f64| {
        let x2 = x * x;
        x2.mul_add(x2, -3.0 * x)
    };
    let mut interior = 0.0;
    for i in 1..bins {
        interior += f((i as f64).mul_add(dx, a));
    }
    Ok((interior + 0.5 * (f(a) + f(b))) * dx)
}

pub fn register_integrate(registry: &mut KernelRegistry) -> Result<(), KernelError> {
    let variants: [(Strategy, fn(f64, f64, usize) -> Result<f64>); 3] = [
        (Strategy::Reference, integrate_reference),
        (Strategy::Vectorized, integrate_vectorized),
        (Strategy::Compiled, integrate_compiled),
    ];
    for (strategy, kernel) in variants {
        let spec = KernelSpec::new(INTEGRATE, strategy, OutputKind::ScalarFloat, move |params: &Params| {
            let a = params.float("a")?;
            let b = params.float("b")?;
            let bins = count_param(params, "n")?;
            Ok(KernelOutput::Float(kernel(a, b, bins)?))
        })
        .with_signature(&SIGNATURE);
        registry.register_spec(spec)?;
    }
    Ok(())
}

fn interval(a: f64, b: f64, bins: i64) -> Params {
    Params::new().with("a", a).with("b", b).with("n", bins)
}

/// Fixtures for [`INTEGRATE`].
pub struct IntegrateFixtures;

impl FixtureProvider for IntegrateFixtures {
    fn kernel_name(&self) -> &str {
        INTEGRATE
    }

    fn cases(&self, mode: FixtureMode) -> Vec<FixtureCase> {
        match mode {
            FixtureMode::Correctness => vec![
                FixtureCase::fixed("empty interval", || interval(2.0, 2.0, 10)),
                FixtureCase::fixed("single bin", || interval(0.0, 1.0, 1)),
                FixtureCase::fixed("[-100, 100] with 1000 bins", || interval(-100.0, 100.0, 1_000)),
                FixtureCase::fixed("zero bins (invalid)", || interval(0.0, 1.0, 0)),
                FixtureCase::seeded("random interval", |rng| {
                    let a = rng.f64() * 20.0 - 10.0;
                    let b = a + rng.f64() * 10.0 + 1e-3;
                    interval(a, b, rng.i64(1..2_000))
                }),
            ],
            FixtureMode::Benchmark => [1_000usize, 10_000, 100_000]
                .into_iter()
                .map(|bins| {
                    FixtureCase::fixed(format!("bins={bins}"), move || {
                        interval(-100.0, 100.0, bins as i64)
                    })
                    .with_size(bins)
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    const VARIANTS: [fn(f64, f64, usize) -> Result<f64>; 3] =
        [integrate_reference, integrate_vectorized, integrate_compiled];

    #[test]
    fn empty_interval_integrates_to_zero() {
        for kernel in VARIANTS {
            assert_eq!(kernel(2.0, 2.0, 10).unwrap(), 0.0);
        }
    }

    #[test]
    fn single_bin_is_one_trapezoid() {
        // (f(0) + f(1)) / 2 = (0 + (1 - 3)) / 2
        for kernel in VARIANTS {
            assert_relative_eq!(kernel(0.0, 1.0, 1).unwrap(), -1.0);
        }
    }

    #[test]
    fn converges_to_closed_form() {
        // 2 * 100^5 / 5, the odd term cancels on a symmetric interval.
        let exact = 2.0 * 100f64.powi(5) / 5.0;
        for kernel in VARIANTS {
            assert_relative_eq!(kernel(-100.0, 100.0, 100_000).unwrap(), exact, max_relative = 1e-7);
        }
    }

    #[test]
    fn zero_bins_and_infinite_bounds_are_rejected() {
        for kernel in VARIANTS {
            assert!(kernel(0.0, 1.0, 0).is_err());
            assert!(kernel(0.0, f64::INFINITY, 4).is_err());
        }
    }

    proptest! {
        #[test]
        fn prop_variants_agree(a in -10.0f64..10.0, width in 0.0f64..10.0, bins in 1usize..2_000) {
            let b = a + width;
            let reference = integrate_reference(a, b, bins).unwrap();
            let allowed = 1e-6 + 1e-6 * reference.abs();
            prop_assert!((integrate_vectorized(a, b, bins).unwrap() - reference).abs() <= allowed);
            prop_assert!((integrate_compiled(a, b, bins).unwrap() - reference).abs() <= allowed);
        }
    }
}
