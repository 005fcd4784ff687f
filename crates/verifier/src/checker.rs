//! Equivalence checker: every variant against the baseline, fixture by fixture.

use crate::report::{ComparisonResult, KernelCheckReport, VariantFailure};
use crate::tolerance::{Tolerance, TolerancePolicy};
use kernelcheck_kernels::config::{KernelOutput, Strategy};
use kernelcheck_kernels::error::KernelError;
use kernelcheck_kernels::fixtures::{Fixtures, InputFixture};
use kernelcheck_kernels::params::Params;
use kernelcheck_kernels::registry::{KernelRegistry, KernelSpec};
use tracing::{debug, info, warn};

/// Relative differences are only measured against values larger than this.
const RELATIVE_FLOOR: f64 = 1e-12;

/// Largest deviations observed between two outputs.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Deviation {
    pub max_absolute_diff: f64,
    pub max_relative_diff: f64,
}

impl Deviation {
    fn record(&mut self, expected: f64, actual: f64) {
        if expected == actual || (expected.is_nan() && actual.is_nan()) {
            return;
        }
        if expected.is_nan() || actual.is_nan() {
            self.max_absolute_diff = f64::INFINITY;
            self.max_relative_diff = f64::INFINITY;
            return;
        }
        let abs = (expected - actual).abs();
        self.max_absolute_diff = self.max_absolute_diff.max(abs);
        if expected.abs() > RELATIVE_FLOOR {
            self.max_relative_diff = self.max_relative_diff.max(abs / expected.abs());
        }
    }
}

/// Result of comparing a candidate output with the baseline output.
#[derive(Debug)]
pub struct OutputComparison {
    pub deviation: Option<Deviation>,
    pub failure: Option<KernelError>,
}

/// Compare two outputs according to their kind.
///
/// Integers must match exactly. Floats use `tolerance`. Sequences must have
/// the same length and are compared elementwise; the failure names the first
/// violating index while the deviation covers every element.
pub fn compare_outputs(
    kernel: &str,
    reference: Strategy,
    candidate: Strategy,
    expected: &KernelOutput,
    actual: &KernelOutput,
    tolerance: Tolerance,
) -> OutputComparison {
    let exceeded = |index: Option<usize>, e: f64, a: f64, allowed: f64| KernelError::ToleranceExceeded {
        kernel: kernel.to_string(),
        reference,
        candidate,
        index,
        expected: e,
        actual: a,
        allowed,
    };

    match (expected, actual) {
        (KernelOutput::Int(e), KernelOutput::Int(a)) => {
            let mut deviation = Deviation::default();
            deviation.record(*e as f64, *a as f64);
            OutputComparison {
                deviation: Some(deviation),
                failure: (e != a).then(|| exceeded(None, *e as f64, *a as f64, 0.0)),
            }
        }
        (KernelOutput::Float(e), KernelOutput::Float(a)) => {
            let mut deviation = Deviation::default();
            deviation.record(*e, *a);
            OutputComparison {
                deviation: Some(deviation),
                failure: (!tolerance.accepts(*e, *a))
                    .then(|| exceeded(None, *e, *a, tolerance.allowed(*e))),
            }
        }
        (KernelOutput::Sequence(e), KernelOutput::Sequence(a)) => {
            if e.len() != a.len() {
                return OutputComparison {
                    deviation: None,
                    failure: Some(KernelError::ShapeMismatch {
                        kernel: kernel.to_string(),
                        reference,
                        candidate,
                        expected: e.len(),
                        actual: a.len(),
                    }),
                };
            }
            let mut deviation = Deviation::default();
            let mut failure = None;
            for (index, (&ev, &av)) in e.iter().zip(a.iter()).enumerate() {
                deviation.record(ev, av);
                if failure.is_none() && !tolerance.accepts(ev, av) {
                    failure = Some(exceeded(Some(index), ev, av, tolerance.allowed(ev)));
                }
            }
            OutputComparison {
                deviation: Some(deviation),
                failure,
            }
        }
        _ => OutputComparison {
            deviation: None,
            failure: Some(KernelError::DivergentBehavior {
                kernel: kernel.to_string(),
                reference,
                candidate,
                reference_outcome: format!("returned {}", expected.kind()),
                candidate_outcome: format!("returned {}", actual.kind()),
            }),
        },
    }
}

/// Fail with [`KernelError::InputMutated`] if `params` no longer matches `saved`.
pub fn ensure_unmutated(
    kernel: &str,
    strategy: Strategy,
    saved: &Params,
    params: &Params,
) -> Result<(), KernelError> {
    if params.bitwise_eq(saved) {
        Ok(())
    } else {
        Err(KernelError::InputMutated {
            kernel: kernel.to_string(),
            strategy,
        })
    }
}

/// Runs all variants of a kernel over shared fixtures and compares them with
/// the baseline.
#[derive(Debug, Clone)]
pub struct EquivalenceChecker {
    policy: TolerancePolicy,
    check_idempotence: bool,
}

impl Default for EquivalenceChecker {
    fn default() -> Self {
        Self::new(TolerancePolicy::default())
    }
}

impl EquivalenceChecker {
    pub fn new(policy: TolerancePolicy) -> Self {
        Self {
            policy,
            check_idempotence: true,
        }
    }

    /// Invoke each variant twice per fixture and require bit-identical outputs.
    pub fn with_idempotence_check(mut self, enabled: bool) -> Self {
        self.check_idempotence = enabled;
        self
    }

    pub fn policy(&self) -> &TolerancePolicy {
        &self.policy
    }

    /// The reference variant, or the first registered one if there is none.
    pub fn baseline<'r>(&self, registry: &'r KernelRegistry, kernel: &str) -> Result<&'r KernelSpec, KernelError> {
        let variants = registry.variants_for(kernel)?;
        if let Some(reference) = variants.iter().find(|v| v.strategy() == Strategy::Reference) {
            return Ok(reference);
        }
        let first = variants
            .first()
            .ok_or_else(|| KernelError::UnknownKernel(kernel.to_string()))?;
        warn!(kernel, baseline = %first.strategy(), "no reference variant, using first registered");
        Ok(first)
    }

    /// Check every registered variant of `kernel` over `fixtures`.
    ///
    /// Failures are attached to the report; only lookup errors are returned.
    pub fn check_kernel(
        &self,
        registry: &KernelRegistry,
        kernel: &str,
        fixtures: Fixtures,
    ) -> Result<KernelCheckReport, KernelError> {
        let variants = registry.variants_for(kernel)?;
        let baseline = self.baseline(registry, kernel)?.strategy();
        let tolerance = self.policy.for_kernel(kernel);
        info!(kernel, %baseline, variants = variants.len(), "checking equivalence");

        let mut report = KernelCheckReport {
            kernel_name: kernel.to_string(),
            baseline,
            fixtures_checked: 0,
            comparisons: Vec::new(),
            errors: Vec::new(),
        };

        for fixture in fixtures {
            debug!(kernel, fixture = %fixture.label, params = %fixture.params, "fixture");
            report.fixtures_checked += 1;

            let expected = self.observe(registry, kernel, baseline, &fixture);
            if let Err(err) = &expected {
                if !err.is_invalid_input() {
                    self.record_failure(&mut report, baseline, &fixture, err);
                }
            }

            for candidate in variants.iter().map(KernelSpec::strategy) {
                if candidate == baseline {
                    continue;
                }
                let actual = self.observe(registry, kernel, candidate, &fixture);
                if let Err(err) = &actual {
                    if !err.is_invalid_input() {
                        self.record_failure(&mut report, candidate, &fixture, err);
                    }
                }
                let comparison = self.compare(kernel, baseline, candidate, &fixture, &expected, &actual, tolerance);
                if !comparison.passed {
                    if let Some(failure) = &comparison.failure {
                        warn!(kernel, fixture = %fixture.label, %candidate, "{}", failure.message);
                    }
                }
                report.comparisons.push(comparison);
            }
        }

        info!(
            kernel,
            passed = report.passed(),
            comparisons = report.comparisons.len(),
            errors = report.errors.len(),
            "equivalence check finished"
        );
        Ok(report)
    }

    /// Invoke one variant on a fixture, enforcing the read-only input contract
    /// and, when enabled, repeatability.
    fn observe(
        &self,
        registry: &KernelRegistry,
        kernel: &str,
        strategy: Strategy,
        fixture: &InputFixture,
    ) -> Result<KernelOutput, KernelError> {
        let saved = fixture.params.clone();
        let first = registry.invoke(kernel, strategy, &fixture.params);
        ensure_unmutated(kernel, strategy, &saved, &fixture.params)?;
        let first = first?;

        if self.check_idempotence {
            let second = registry.invoke(kernel, strategy, &fixture.params);
            ensure_unmutated(kernel, strategy, &saved, &fixture.params)?;
            match second {
                Ok(output) if output.bit_identical(&first) => {}
                _ => {
                    return Err(KernelError::NonDeterministic {
                        kernel: kernel.to_string(),
                        strategy,
                    })
                }
            }
        }
        Ok(first)
    }

    fn record_failure(
        &self,
        report: &mut KernelCheckReport,
        variant: Strategy,
        fixture: &InputFixture,
        err: &KernelError,
    ) {
        warn!(kernel = %report.kernel_name, %variant, fixture = %fixture.label, error = %err, "variant failed");
        report.errors.push(VariantFailure {
            variant,
            fixture: fixture.label.clone(),
            failure: err.to_record(),
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn compare(
        &self,
        kernel: &str,
        baseline: Strategy,
        candidate: Strategy,
        fixture: &InputFixture,
        expected: &Result<KernelOutput, KernelError>,
        actual: &Result<KernelOutput, KernelError>,
        tolerance: Tolerance,
    ) -> ComparisonResult {
        let mut result = ComparisonResult {
            kernel_name: kernel.to_string(),
            fixture: fixture.label.clone(),
            variant_a: baseline,
            variant_b: candidate,
            max_absolute_diff: None,
            max_relative_diff: None,
            passed: false,
            failure: None,
        };

        match (expected, actual) {
            (Ok(e), Ok(a)) => {
                let outcome = compare_outputs(kernel, baseline, candidate, e, a, tolerance);
                if let Some(deviation) = outcome.deviation {
                    result.max_absolute_diff = Some(deviation.max_absolute_diff);
                    result.max_relative_diff = Some(deviation.max_relative_diff);
                }
                result.passed = outcome.failure.is_none();
                result.failure = outcome.failure.as_ref().map(KernelError::to_record);
            }
            (Err(e), Err(a)) if e.is_invalid_input() && a.is_invalid_input() => {
                // Both rejected the fixture: the expected outcome for boundary inputs.
                result.passed = true;
                result.failure = Some(a.to_record());
            }
            (Err(e), _) if !e.is_invalid_input() => {
                result.failure = Some(e.to_record());
            }
            (_, Err(a)) if !a.is_invalid_input() => {
                result.failure = Some(a.to_record());
            }
            _ => {
                let divergent = KernelError::DivergentBehavior {
                    kernel: kernel.to_string(),
                    reference: baseline,
                    candidate,
                    reference_outcome: describe_outcome(expected),
                    candidate_outcome: describe_outcome(actual),
                };
                result.failure = Some(divergent.to_record());
            }
        }
        result
    }
}

fn describe_outcome(outcome: &Result<KernelOutput, KernelError>) -> String {
    match outcome {
        Ok(output) => format!("returned {output}"),
        Err(err) if err.is_invalid_input() => "rejected the input".to_string(),
        Err(err) => format!("failed ({})", err.category().as_str()),
    }
}
