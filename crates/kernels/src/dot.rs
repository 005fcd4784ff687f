//! Dot product of two equal-length float vectors.

use crate::config::{KernelOutput, OutputKind, Strategy};
use crate::error::KernelError;
use crate::fixtures::{FixtureCase, FixtureMode, FixtureProvider};
use crate::params::{ParamKind, Params};
use crate::registry::{KernelRegistry, KernelSpec};
use crate::utils::validate_dot_inputs;
use anyhow::Result;
use ndarray::{array, Array1, ArrayView1};

pub const DOT: &str = "dot";

const SIGNATURE: [(&str, ParamKind); 2] = [("x", ParamKind::FloatArray), ("y", ParamKind::FloatArray)];

pub fn dot_reference(x: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) -> Result<f64> {
    validate_dot_inputs(&x, &y)?;

    let mut total = 0.0;
    for i in 0..x.len() {
        total += x[i] * y[i];
    }
    Ok(total)
}

pub fn dot_vectorized(x: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) -> Result<f64> {
    validate_dot_inputs(&x, &y)?;
    Ok(x.dot(&y))
}

/// Four independent accumulators so the adds can pipeline.
pub fn dot_compiled(x: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) -> Result<f64> {
    validate_dot_inputs(&x, &y)?;

    match (x.as_slice(), y.as_slice()) {
        (Some(xs), Some(ys)) => Ok(dot_unrolled(xs, ys)),
        _ => Ok(dot_unrolled(&x.to_vec(), &y.to_vec())),
    }
}

fn dot_unrolled(xs: &[f64], ys: &[f64]) -> f64 {
    let mut acc = [0.0f64; 4];
    let x_chunks = xs.chunks_exact(4);
    let y_chunks = ys.chunks_exact(4);
    let tail: f64 = x_chunks
        .remainder()
        .iter()
        .zip(y_chunks.remainder())
        .map(|(a, b)| a * b)
        .sum();

    for (a, b) in x_chunks.zip(y_chunks) {
        acc[0] += a[0] * b[0];
        acc[1] += a[1] * b[1];
        acc[2] += a[2] * b[2];
        acc[3] += a[3] * b[3];
    }
    (acc[0] + acc[1]) + (acc[2] + acc[3]) + tail
}

pub fn register_dot(registry: &mut KernelRegistry) -> Result<(), KernelError> {
    type DotFn = fn(ArrayView1<'_, f64>, ArrayView1<'_, f64>) -> Result<f64>;
    let variants: [(Strategy, DotFn); 3] = [
        (Strategy::Reference, dot_reference),
        (Strategy::Vectorized, dot_vectorized),
        (Strategy::Compiled, dot_compiled),
    ];
    for (strategy, kernel) in variants {
        let spec = KernelSpec::new(DOT, strategy, OutputKind::ScalarFloat, move |params: &Params| {
            let x = params.array("x")?;
            let y = params.array("y")?;
            Ok(KernelOutput::Float(kernel(x, y)?))
        })
        .with_signature(&SIGNATURE);
        registry.register_spec(spec)?;
    }
    Ok(())
}

fn random_pair(rng: &mut fastrand::Rng, len: usize) -> Params {
    let x = Array1::from_shape_fn(len, |_| rng.f64() * 2.0 - 1.0);
    let y = Array1::from_shape_fn(len, |_| rng.f64() * 2.0 - 1.0);
    Params::new().with("x", x).with("y", y)
}

/// Fixtures for [`DOT`].
pub struct DotFixtures;

impl FixtureProvider for DotFixtures {
    fn kernel_name(&self) -> &str {
        DOT
    }

    fn cases(&self, mode: FixtureMode) -> Vec<FixtureCase> {
        match mode {
            FixtureMode::Correctness => vec![
                FixtureCase::fixed("single element", || {
                    Params::new().with("x", array![3.0]).with("y", array![-2.5])
                }),
                FixtureCase::fixed("zero vector", || {
                    Params::new()
                        .with("x", Array1::<f64>::zeros(16))
                        .with("y", Array1::from_shape_fn(16, |i| i as f64))
                }),
                FixtureCase::fixed("length mismatch (invalid)", || {
                    Params::new()
                        .with("x", array![1.0, 2.0, 3.0])
                        .with("y", array![1.0, 2.0])
                }),
                FixtureCase::seeded("random 257", |rng| random_pair(rng, 257)),
            ],
            FixtureMode::Benchmark => [1_000usize, 10_000, 100_000]
                .into_iter()
                .map(|len| {
                    FixtureCase::seeded(format!("len={len}"), move |rng| random_pair(rng, len))
                        .with_size(len)
                })
                .collect(),
        }
    }
}
