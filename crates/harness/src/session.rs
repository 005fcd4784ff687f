//! Harness session: registry, fixtures, checker and runner for one run.

use crate::config::HarnessConfig;
use crate::report::RunReport;
use anyhow::Result;
use kernelcheck_bench::{BenchmarkRunner, KernelBenchReport};
use kernelcheck_kernels::error::KernelError;
use kernelcheck_kernels::fixtures::{FixtureGenerator, FixtureMode};
use kernelcheck_kernels::registry::KernelRegistry;
use kernelcheck_verifier::{run_mutation_suite, EquivalenceChecker, KernelCheckReport, MutantOutcome};
use tracing::info;

pub struct Harness {
    config: HarnessConfig,
    registry: KernelRegistry,
    generator: FixtureGenerator,
    checker: EquivalenceChecker,
}

impl Harness {
    /// Session over the built-in kernels and fixtures.
    pub fn new(config: HarnessConfig) -> Result<Self> {
        let registry = KernelRegistry::with_builtin_kernels()?;
        let generator = FixtureGenerator::with_builtin_providers(config.random_seed);
        Self::with_parts(config, registry, generator)
    }

    pub fn with_parts(
        config: HarnessConfig,
        registry: KernelRegistry,
        generator: FixtureGenerator,
    ) -> Result<Self> {
        config.validate()?;
        let checker = EquivalenceChecker::new(config.tolerance_policy())
            .with_idempotence_check(config.check_idempotence);
        info!(
            seed = config.random_seed,
            atol = config.tolerance_atol,
            rtol = config.tolerance_rtol,
            kernels = registry.kernel_names().count(),
            "harness ready"
        );
        Ok(Self {
            config,
            registry,
            generator,
            checker,
        })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn registry(&self) -> &KernelRegistry {
        &self.registry
    }

    /// For registering extra variants before a run.
    pub fn registry_mut(&mut self) -> &mut KernelRegistry {
        &mut self.registry
    }

    pub fn generator_mut(&mut self) -> &mut FixtureGenerator {
        &mut self.generator
    }

    /// Every kernel when `requested` is empty; otherwise the requested ones,
    /// which must all be registered.
    pub fn resolve_kernels(&self, requested: &[String]) -> Result<Vec<String>, KernelError> {
        if requested.is_empty() {
            return Ok(self.registry.kernel_names().map(str::to_string).collect());
        }
        requested
            .iter()
            .map(|name| {
                if self.registry.contains(name) {
                    Ok(name.clone())
                } else {
                    Err(KernelError::UnknownKernel(name.clone()))
                }
            })
            .collect()
    }

    pub fn verify(&self, kernels: &[String]) -> Result<Vec<KernelCheckReport>> {
        let mut reports = Vec::new();
        for kernel in self.resolve_kernels(kernels)? {
            let fixtures = self.generator.fixtures_for(&kernel, FixtureMode::Correctness)?;
            reports.push(self.checker.check_kernel(&self.registry, &kernel, fixtures)?);
        }
        Ok(reports)
    }

    pub fn benchmark(&self, kernels: &[String]) -> Result<Vec<KernelBenchReport>> {
        let runner = BenchmarkRunner::new(self.config.bench_config())?;
        let mut reports = Vec::new();
        for kernel in self.resolve_kernels(kernels)? {
            let fixtures = self.generator.fixtures_for(&kernel, FixtureMode::Benchmark)?;
            reports.push(runner.run_kernel(&self.registry, &kernel, fixtures)?);
        }
        Ok(reports)
    }

    /// Verify, then benchmark, the selected kernels.
    pub fn run(&self, kernels: &[String]) -> Result<RunReport> {
        let mut report = RunReport::new(self.config.clone());
        report.checks = self.verify(kernels)?;
        report.benchmarks = self.benchmark(kernels)?;
        info!(passed = report.passed(), "run finished");
        Ok(report)
    }

    /// Check that the checker flags every built-in mutant.
    pub fn selftest(&self) -> Result<Vec<MutantOutcome>> {
        Ok(run_mutation_suite(&self.registry, &self.checker, &self.generator)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernelcheck_kernels::config::{KernelOutput, OutputKind, Strategy};
    use kernelcheck_kernels::params::Params;

    fn quick_config() -> HarnessConfig {
        HarnessConfig {
            warmup_iterations: 1,
            min_measure_seconds: 1e-4,
            max_repetitions: Some(20),
            ..HarnessConfig::default()
        }
    }

    #[test]
    fn invalid_config_halts_setup() {
        let config = HarnessConfig {
            warmup_iterations: 0,
            ..HarnessConfig::default()
        };
        let err = Harness::new(config).err().unwrap();
        assert!(matches!(err.downcast_ref::<KernelError>(), Some(KernelError::Config(_))));
    }

    #[test]
    fn unknown_kernel_is_rejected() {
        let harness = Harness::new(quick_config()).unwrap();
        let err = harness.verify(&["fft".to_string()]).unwrap_err();
        assert!(err.to_string().contains("unknown kernel: fft"));
    }

    #[test]
    fn verify_all_builtins() {
        let harness = Harness::new(quick_config()).unwrap();
        let reports = harness.verify(&[]).unwrap();
        let names: Vec<&str> = reports.iter().map(|r| r.kernel_name.as_str()).collect();
        assert_eq!(names, vec!["nth_prime", "smooth", "dot", "integrate"]);
        assert!(reports.iter().all(KernelCheckReport::passed));
    }

    #[test]
    fn duplicate_builtin_variant_is_rejected() {
        let mut harness = Harness::new(quick_config()).unwrap();
        let err = harness
            .registry_mut()
            .register("dot", Strategy::Reference, |_: &Params| Ok(KernelOutput::Float(0.0)), OutputKind::ScalarFloat)
            .unwrap_err();
        assert!(matches!(err, KernelError::Registration { .. }));
    }

    #[test]
    fn custom_kernel_needs_fixture_provider() {
        let mut registry = KernelRegistry::new();
        registry
            .register("twice", Strategy::Reference, |p: &Params| Ok(KernelOutput::Int(p.int("n")? * 2)), OutputKind::ScalarInt)
            .unwrap();
        let harness = Harness::with_parts(quick_config(), registry, FixtureGenerator::new(1)).unwrap();
        assert!(harness.verify(&["twice".to_string()]).is_err());
    }

    #[test]
    fn run_covers_selected_kernel() {
        let harness = Harness::new(quick_config()).unwrap();
        let report = harness.run(&["smooth".to_string()]).unwrap();
        assert_eq!(report.checks.len(), 1);
        assert_eq!(report.benchmarks.len(), 1);
        assert!(report.passed());
        let bench = &report.benchmarks[0];
        assert_eq!(bench.samples.len(), 9);
        assert!(bench.failures.is_empty());
    }
}
