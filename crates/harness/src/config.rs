//! Run configuration.

use anyhow::{Context, Result};
use kernelcheck_bench::BenchConfig;
use kernelcheck_kernels::error::KernelError;
use kernelcheck_kernels::fixtures::DEFAULT_SEED;
use kernelcheck_kernels::INTEGRATE;
use kernelcheck_verifier::{Tolerance, TolerancePolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub tolerance_atol: f64,
    pub tolerance_rtol: f64,
    pub warmup_iterations: usize,
    pub min_measure_seconds: f64,
    pub random_seed: u64,
    pub min_repetitions: usize,
    pub max_repetitions: Option<usize>,
    pub variant_time_budget_seconds: Option<f64>,
    pub check_idempotence: bool,
    /// Per-kernel tolerances replacing the global pair.
    pub tolerance_overrides: BTreeMap<String, Tolerance>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        let bench = BenchConfig::default();
        let tolerance = Tolerance::default();
        Self {
            tolerance_atol: tolerance.atol,
            tolerance_rtol: tolerance.rtol,
            warmup_iterations: bench.warmup_iterations,
            min_measure_seconds: bench.min_measure_seconds,
            random_seed: DEFAULT_SEED,
            min_repetitions: bench.min_repetitions,
            max_repetitions: bench.max_repetitions,
            variant_time_budget_seconds: bench.variant_time_budget_seconds,
            check_idempotence: true,
            tolerance_overrides: BTreeMap::from([(INTEGRATE.to_string(), Tolerance::new(1e-6, 1e-6))]),
        }
    }
}

impl HarnessConfig {
    /// Read a JSON config; missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = serde_json::from_str(&json)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), KernelError> {
        self.tolerance_policy().validate()?;
        self.bench_config().validate()
    }

    pub fn tolerance_policy(&self) -> TolerancePolicy {
        let mut policy = TolerancePolicy::new(Tolerance::new(self.tolerance_atol, self.tolerance_rtol));
        for (kernel, tolerance) in &self.tolerance_overrides {
            policy = policy.with_override(kernel.clone(), *tolerance);
        }
        policy
    }

    pub fn bench_config(&self) -> BenchConfig {
        BenchConfig {
            warmup_iterations: self.warmup_iterations,
            min_measure_seconds: self.min_measure_seconds,
            min_repetitions: self.min_repetitions,
            max_repetitions: self.max_repetitions,
            variant_time_budget_seconds: self.variant_time_budget_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn defaults_are_valid() {
        let config = HarnessConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.random_seed, 42);
        assert_eq!(config.warmup_iterations, 2);
        assert_abs_diff_eq!(config.min_measure_seconds, 0.2);
        assert_eq!(config.tolerance_policy(), TolerancePolicy::default());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: HarnessConfig =
            serde_json::from_str(r#"{ "random_seed": 7, "tolerance_rtol": 1e-3 }"#).unwrap();
        assert_eq!(config.random_seed, 7);
        assert_abs_diff_eq!(config.tolerance_rtol, 1e-3);
        assert_abs_diff_eq!(config.tolerance_atol, 1e-9);
        assert!(config.check_idempotence);
    }

    #[test]
    fn invalid_settings_are_config_errors() {
        let zero_warmup = HarnessConfig {
            warmup_iterations: 0,
            ..HarnessConfig::default()
        };
        assert!(matches!(zero_warmup.validate(), Err(KernelError::Config(_))));

        let negative = HarnessConfig {
            tolerance_atol: -1e-9,
            ..HarnessConfig::default()
        };
        assert!(matches!(negative.validate(), Err(KernelError::Config(_))));
    }

    #[test]
    fn save_then_load_from_disk() {
        let path = std::env::temp_dir().join(format!("kernelcheck-config-{}.json", std::process::id()));
        let config = HarnessConfig {
            variant_time_budget_seconds: Some(2.5),
            ..HarnessConfig::default()
        };
        config.save(&path).unwrap();
        let loaded = HarnessConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_mentions_path() {
        let err = HarnessConfig::load("/nonexistent/kernelcheck.json").unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/kernelcheck.json"));
    }
}
