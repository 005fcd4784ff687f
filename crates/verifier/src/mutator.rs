//! Mutation testing for the checker.
//!
//! Each mutant is a deliberately broken variant of a built-in kernel. The
//! checker is sound only if it flags every mutant with the expected category.

use crate::checker::EquivalenceChecker;
use anyhow::Result;
use kernelcheck_kernels::config::{KernelOutput, OutputKind, Strategy};
use kernelcheck_kernels::error::{FailureCategory, KernelError};
use kernelcheck_kernels::fixtures::{FixtureGenerator, FixtureMode};
use kernelcheck_kernels::params::Params;
use kernelcheck_kernels::registry::{KernelRegistry, KernelSpec};
use kernelcheck_kernels::utils::count_param;
use kernelcheck_kernels::{
    dot_reference, integrate_reference, nth_prime_compiled, smooth_reference, validate_dot_inputs,
    validate_integration, DOT, INTEGRATE, NTH_PRIME, SMOOTH,
};
use ndarray::s;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// A deliberately broken kernel variant.
#[derive(Debug, Clone)]
pub struct Mutant {
    /// Description of what was mutated.
    pub description: String,
    pub kernel: String,
    /// Category the checker must report for this mutant.
    pub expected_failure: FailureCategory,
    pub spec: KernelSpec,
}

impl Mutant {
    fn new<F>(description: &str, kernel: &str, output_kind: OutputKind, expected_failure: FailureCategory, callable: F) -> Self
    where
        F: Fn(&Params) -> Result<KernelOutput> + Send + Sync + 'static,
    {
        Self {
            description: description.to_string(),
            kernel: kernel.to_string(),
            expected_failure,
            spec: KernelSpec::new(kernel, Strategy::Compiled, output_kind, callable),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutantOutcome {
    pub description: String,
    pub kernel: String,
    pub expected_failure: FailureCategory,
    pub observed: Vec<FailureCategory>,
    pub killed: bool,
}

/// Generates broken variants of the built-in kernels.
#[derive(Debug, Default)]
pub struct Mutator;

impl Mutator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate_mutants(&self) -> Vec<Mutant> {
        let mut mutants = Vec::new();

        mutants.push(Mutant::new(
            "nth_prime returns the (n+1)-th prime",
            NTH_PRIME,
            OutputKind::ScalarInt,
            FailureCategory::ToleranceExceeded,
            |params| {
                let n = count_param(params, "n")?;
                let prime = nth_prime_compiled(n.max(1) + 1)?;
                Ok(KernelOutput::Int(i64::try_from(prime)?))
            },
        ));

        mutants.push(Mutant::new(
            "nth_prime accepts n = 0",
            NTH_PRIME,
            OutputKind::ScalarInt,
            FailureCategory::DivergentBehavior,
            |params| {
                let n = count_param(params, "n")?;
                let prime = nth_prime_compiled(n.max(1))?;
                Ok(KernelOutput::Int(i64::try_from(prime)?))
            },
        ));

        mutants.push(Mutant::new(
            "smooth copies the first sample instead of averaging it",
            SMOOTH,
            OutputKind::SequenceFloat,
            FailureCategory::ToleranceExceeded,
            |params| {
                let x = params.array("x")?;
                let mut output = smooth_reference(x)?;
                output[0] = x[0];
                Ok(KernelOutput::Sequence(output))
            },
        ));

        mutants.push(Mutant::new(
            "smooth drops the last element",
            SMOOTH,
            OutputKind::SequenceFloat,
            FailureCategory::ShapeMismatch,
            |params| {
                let output = smooth_reference(params.array("x")?)?;
                let k = output.len();
                Ok(KernelOutput::Sequence(output.slice(s![..k - 1]).to_owned()))
            },
        ));

        mutants.push(Mutant::new(
            "dot ignores the last element",
            DOT,
            OutputKind::ScalarFloat,
            FailureCategory::ToleranceExceeded,
            |params| {
                let x = params.array("x")?;
                let y = params.array("y")?;
                validate_dot_inputs(&x, &y)?;
                let k = x.len();
                Ok(KernelOutput::Float(x.slice(s![..k - 1]).dot(&y.slice(s![..k - 1]))))
            },
        ));

        mutants.push(Mutant::new(
            "dot panics on long inputs",
            DOT,
            OutputKind::ScalarFloat,
            FailureCategory::Execution,
            |params| {
                let x = params.array("x")?;
                let y = params.array("y")?;
                validate_dot_inputs(&x, &y)?;
                let mut scratch = [0.0f64; 128];
                for (i, (a, b)) in x.iter().zip(y.iter()).enumerate() {
                    scratch[i] = a * b;
                }
                Ok(KernelOutput::Float(scratch.iter().sum()))
            },
        ));

        let calls = AtomicU64::new(0);
        mutants.push(Mutant::new(
            "dot drifts between calls",
            DOT,
            OutputKind::ScalarFloat,
            FailureCategory::NonDeterministic,
            move |params| {
                let total = dot_reference(params.array("x")?, params.array("y")?)?;
                let drift = calls.fetch_add(1, Ordering::Relaxed) as f64 * 1e-12;
                Ok(KernelOutput::Float(total + drift))
            },
        ));

        mutants.push(Mutant::new(
            "integrate uses x^4 + 3x",
            INTEGRATE,
            OutputKind::ScalarFloat,
            FailureCategory::ToleranceExceeded,
            |params| {
                let a = params.float("a")?;
                let b = params.float("b")?;
                let bins = count_param(params, "n")?;
                validate_integration(a, b, bins)?;
                let g = |x: f64| x.powi(4) + 3.0 * x;
                let dx = (b - a) / bins as f64;
                let interior: f64 = (1..bins).map(|i| g(a + i as f64 * dx)).sum();
                Ok(KernelOutput::Float((interior + (g(a) + g(b)) / 2.0) * dx))
            },
        ));

        mutants.push(Mutant::new(
            "integrate halves the step",
            INTEGRATE,
            OutputKind::ScalarFloat,
            FailureCategory::ToleranceExceeded,
            |params| {
                let a = params.float("a")?;
                let b = params.float("b")?;
                let bins = count_param(params, "n")?;
                Ok(KernelOutput::Float(integrate_reference(a, b, bins)? / 2.0))
            },
        ));

        mutants
    }
}

/// Register the baseline of `mutant.kernel` next to the mutant and check them.
pub fn evaluate_mutant(
    base: &KernelRegistry,
    mutant: &Mutant,
    checker: &EquivalenceChecker,
    generator: &FixtureGenerator,
) -> Result<MutantOutcome, KernelError> {
    let baseline = checker.baseline(base, &mutant.kernel)?;
    let mut registry = KernelRegistry::new();
    registry.register_spec(baseline.clone())?;
    registry.register_spec(mutant.spec.clone())?;

    let fixtures = generator.fixtures_for(&mutant.kernel, FixtureMode::Correctness)?;
    let report = checker.check_kernel(&registry, &mutant.kernel, fixtures)?;
    let observed = report.failure_categories();
    let killed = observed.contains(&mutant.expected_failure);
    debug!(mutant = %mutant.description, ?observed, killed, "mutant evaluated");

    Ok(MutantOutcome {
        description: mutant.description.clone(),
        kernel: mutant.kernel.clone(),
        expected_failure: mutant.expected_failure,
        observed,
        killed,
    })
}

/// Evaluate every mutant; the checker is sound if all are killed.
pub fn run_mutation_suite(
    base: &KernelRegistry,
    checker: &EquivalenceChecker,
    generator: &FixtureGenerator,
) -> Result<Vec<MutantOutcome>, KernelError> {
    let mutants = Mutator::new().generate_mutants();
    let outcomes = mutants
        .iter()
        .map(|mutant| evaluate_mutant(base, mutant, checker, generator))
        .collect::<Result<Vec<_>, _>>()?;
    let killed = outcomes.iter().filter(|o| o.killed).count();
    info!(killed, total = outcomes.len(), "mutation suite finished");
    Ok(outcomes)
}
