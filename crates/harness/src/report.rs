//! Whole-run report, persisted as JSON and diffed against a saved baseline.

use crate::config::HarnessConfig;
use anyhow::{Context, Result};
use kernelcheck_bench::{KernelBenchReport, TimingSample};
use kernelcheck_kernels::config::Strategy;
use kernelcheck_verifier::{KernelCheckReport, MutantOutcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at_unix_ms: u128,
    pub config: HarnessConfig,
    #[serde(default)]
    pub checks: Vec<KernelCheckReport>,
    #[serde(default)]
    pub benchmarks: Vec<KernelBenchReport>,
    #[serde(default)]
    pub mutants: Vec<MutantOutcome>,
}

/// Key of one timing measurement across runs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SampleKey<'a> {
    pub kernel: &'a str,
    pub variant: Strategy,
    pub size: usize,
}

#[derive(Debug)]
pub struct TimingDelta<'a> {
    pub current: &'a TimingSample,
    pub baseline: &'a TimingSample,
    pub median_delta_seconds: f64,
    /// Current median over baseline median.
    pub median_ratio: Option<f64>,
}

impl RunReport {
    pub fn new(config: HarnessConfig) -> Self {
        let generated_at_unix_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_secs(0))
            .as_millis();
        Self {
            generated_at_unix_ms,
            config,
            checks: Vec::new(),
            benchmarks: Vec::new(),
            mutants: Vec::new(),
        }
    }

    /// True if every check passed and every mutant was killed.
    ///
    /// Benchmark failures are reported but do not fail the run.
    pub fn passed(&self) -> bool {
        self.checks.iter().all(KernelCheckReport::passed) && self.mutants.iter().all(|m| m.killed)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("reading report {}", path.display()))?;
        let report = serde_json::from_str(&json)
            .with_context(|| format!("parsing report {}", path.display()))?;
        Ok(report)
    }

    pub fn samples(&self) -> impl Iterator<Item = &TimingSample> {
        self.benchmarks.iter().flat_map(|b| b.samples.iter())
    }

    pub fn as_map(&self) -> BTreeMap<SampleKey<'_>, &TimingSample> {
        self.samples()
            .map(|sample| {
                let key = SampleKey {
                    kernel: sample.kernel_name.as_str(),
                    variant: sample.variant,
                    size: sample.size,
                };
                (key, sample)
            })
            .collect()
    }

    /// Median deltas for every measurement present in both reports.
    pub fn diff<'a>(&'a self, baseline: &'a RunReport) -> BTreeMap<SampleKey<'a>, TimingDelta<'a>> {
        let previous = baseline.as_map();
        self.as_map()
            .into_iter()
            .filter_map(|(key, current)| {
                let &baseline_sample = previous.get(&key)?;
                let median_ratio = (baseline_sample.stats.median > 0.0)
                    .then(|| current.stats.median / baseline_sample.stats.median);
                Some((
                    key,
                    TimingDelta {
                        current,
                        baseline: baseline_sample,
                        median_delta_seconds: current.stats.median - baseline_sample.stats.median,
                        median_ratio,
                    },
                ))
            })
            .collect()
    }
}
