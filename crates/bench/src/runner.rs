//! Benchmark runner: warm-up and measurement per (kernel, variant, fixture).

use crate::stats::TimingStats;
use kernelcheck_kernels::config::Strategy;
use kernelcheck_kernels::error::{FailureRecord, KernelError};
use kernelcheck_kernels::fixtures::{Fixtures, InputFixture};
use kernelcheck_kernels::registry::{KernelRegistry, KernelSpec};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::hint::black_box;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Each measured repetition aims to take this share of the measurement floor.
const REPETITIONS_PER_FLOOR: f64 = 100.0;
const MAX_CALLS_PER_REPETITION: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Discarded runs before measurement; at least one.
    pub warmup_iterations: usize,
    /// Keep measuring until this much time has been accumulated.
    pub min_measure_seconds: f64,
    pub min_repetitions: usize,
    /// Hard cap on measured repetitions. Ends measurement even if the floor
    /// has not been reached; unbounded by default.
    pub max_repetitions: Option<usize>,
    /// Abort a (kernel, variant) once this much wall time has been spent on
    /// it across all fixtures, checked between repetitions.
    pub variant_time_budget_seconds: Option<f64>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            warmup_iterations: 2,
            min_measure_seconds: 0.2,
            min_repetitions: 3,
            max_repetitions: None,
            variant_time_budget_seconds: None,
        }
    }
}

impl BenchConfig {
    pub fn validate(&self) -> Result<(), KernelError> {
        if self.warmup_iterations == 0 {
            return Err(KernelError::Config(
                "warmup_iterations must be at least 1".into(),
            ));
        }
        if !self.min_measure_seconds.is_finite() || self.min_measure_seconds <= 0.0 {
            return Err(KernelError::Config(format!(
                "min_measure_seconds must be positive, got {}",
                self.min_measure_seconds
            )));
        }
        if self.min_repetitions == 0 {
            return Err(KernelError::Config(
                "min_repetitions must be at least 1".into(),
            ));
        }
        if let Some(max) = self.max_repetitions {
            if max < self.min_repetitions {
                return Err(KernelError::Config(format!(
                    "max_repetitions ({max}) is below min_repetitions ({})",
                    self.min_repetitions
                )));
            }
        }
        if let Some(budget) = self.variant_time_budget_seconds {
            if budget.is_nan() || budget <= 0.0 {
                return Err(KernelError::Config(format!(
                    "variant_time_budget_seconds must be positive, got {budget}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchPhase {
    Pending,
    WarmingUp,
    Measuring,
    Completed,
    Failed,
}

/// Measurements of one variant on one fixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingSample {
    pub kernel_name: String,
    pub variant: Strategy,
    pub fixture: String,
    pub size: usize,
    /// Discarded warm-up timings, kept for inspection only.
    pub warmup_seconds: Vec<f64>,
    /// Per-call time of each measured repetition, in execution order.
    pub elapsed_seconds: Vec<f64>,
    /// Calls timed together in one measured repetition.
    pub calls_per_repetition: usize,
    /// Total invocations, warm-up included.
    pub call_count: usize,
    pub stats: TimingStats,
    pub timer_overhead_seconds: f64,
}

impl TimingSample {
    /// Median with the empty-timer cost removed.
    pub fn adjusted_median(&self) -> f64 {
        let overhead = self.timer_overhead_seconds / self.calls_per_repetition.max(1) as f64;
        (self.stats.median - overhead).max(0.0)
    }
}

/// State machine timing one variant on one fixture.
pub struct BenchmarkJob<'a> {
    kernel: &'a str,
    variant: &'a KernelSpec,
    fixture: &'a InputFixture,
    config: &'a BenchConfig,
    timer_overhead: f64,
    /// Wall time left for this (kernel, variant).
    budget_remaining: Option<f64>,
    phase: BenchPhase,
    started: Option<Instant>,
    warmups: Vec<f64>,
    samples: Vec<f64>,
    calls_per_repetition: usize,
    call_count: usize,
    measured_total: f64,
    error: Option<KernelError>,
}

impl<'a> BenchmarkJob<'a> {
    pub fn new(
        kernel: &'a str,
        variant: &'a KernelSpec,
        fixture: &'a InputFixture,
        config: &'a BenchConfig,
        timer_overhead: f64,
    ) -> Self {
        Self {
            kernel,
            variant,
            fixture,
            config,
            timer_overhead,
            budget_remaining: config.variant_time_budget_seconds,
            phase: BenchPhase::Pending,
            started: None,
            warmups: Vec::with_capacity(config.warmup_iterations),
            samples: Vec::new(),
            calls_per_repetition: 1,
            call_count: 0,
            measured_total: 0.0,
            error: None,
        }
    }

    /// Limit this job to what is left of the variant's budget after earlier
    /// fixtures.
    pub fn with_budget_remaining(mut self, remaining: Option<f64>) -> Self {
        self.budget_remaining = remaining;
        self
    }

    pub fn phase(&self) -> BenchPhase {
        self.phase
    }

    /// Wall time since the job left `Pending`.
    pub fn elapsed(&self) -> f64 {
        self.started
            .map(|started| started.elapsed().as_secs_f64())
            .unwrap_or_default()
    }

    /// Advance by one transition or one repetition.
    pub fn step(&mut self) -> BenchPhase {
        match self.phase {
            BenchPhase::Pending => {
                self.started = Some(Instant::now());
                self.transition(BenchPhase::WarmingUp);
            }
            BenchPhase::WarmingUp => {
                if self.over_budget() {
                    self.fail_timeout();
                } else if let Some(elapsed) = self.timed_calls(1) {
                    self.warmups.push(elapsed);
                    if self.warmups.len() >= self.config.warmup_iterations {
                        self.calls_per_repetition = self.batch_size(elapsed);
                        self.transition(BenchPhase::Measuring);
                    }
                }
            }
            BenchPhase::Measuring => {
                if self.over_budget() {
                    self.fail_timeout();
                } else if let Some(elapsed) = self.timed_calls(self.calls_per_repetition) {
                    self.samples.push(elapsed / self.calls_per_repetition as f64);
                    self.measured_total += elapsed;
                    let enough = self.measured_total >= self.config.min_measure_seconds
                        && self.samples.len() >= self.config.min_repetitions;
                    let capped = self
                        .config
                        .max_repetitions
                        .is_some_and(|max| self.samples.len() >= max);
                    if enough || capped {
                        self.transition(BenchPhase::Completed);
                    }
                }
            }
            BenchPhase::Completed | BenchPhase::Failed => {}
        }
        self.phase
    }

    pub fn run_to_completion(mut self) -> Result<TimingSample, KernelError> {
        while !matches!(self.phase, BenchPhase::Completed | BenchPhase::Failed) {
            self.step();
        }
        self.finish()
    }

    /// The sample of a completed job, or the error that stopped it.
    pub fn finish(self) -> Result<TimingSample, KernelError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let stats = match (self.phase, TimingStats::from_samples(&self.samples)) {
            (BenchPhase::Completed, Some(stats)) => stats,
            (phase, _) => {
                return Err(KernelError::Config(format!(
                    "benchmark of {}/{} finished in phase {phase:?}",
                    self.kernel,
                    self.variant.strategy()
                )))
            }
        };
        Ok(TimingSample {
            kernel_name: self.kernel.to_string(),
            variant: self.variant.strategy(),
            fixture: self.fixture.label.clone(),
            size: self.fixture.size,
            call_count: self.call_count,
            warmup_seconds: self.warmups,
            elapsed_seconds: self.samples,
            calls_per_repetition: self.calls_per_repetition,
            stats,
            timer_overhead_seconds: self.timer_overhead,
        })
    }

    /// Wall time of `calls` back-to-back invocations; `None` once a call fails.
    fn timed_calls(&mut self, calls: usize) -> Option<f64> {
        let params = &self.fixture.params;
        let start = Instant::now();
        for _ in 0..calls {
            let outcome = black_box(self.variant.call(black_box(params)));
            self.call_count += 1;
            if let Err(err) = outcome {
                self.fail(err);
                return None;
            }
        }
        Some(start.elapsed().as_secs_f64())
    }

    /// Calls per repetition so one repetition spans a fraction of the floor.
    fn batch_size(&self, per_call: f64) -> usize {
        let target = self.config.min_measure_seconds / REPETITIONS_PER_FLOOR;
        if per_call >= target {
            return 1;
        }
        let calls = (target / per_call.max(1e-9)).ceil() as usize;
        calls.clamp(1, MAX_CALLS_PER_REPETITION)
    }

    fn over_budget(&self) -> bool {
        self.budget_remaining
            .is_some_and(|remaining| self.elapsed() >= remaining)
    }

    fn fail_timeout(&mut self) {
        self.fail(KernelError::Timeout {
            kernel: self.kernel.to_string(),
            strategy: self.variant.strategy(),
            budget_seconds: self.config.variant_time_budget_seconds.unwrap_or_default(),
            repetitions: self.samples.len(),
        });
    }

    fn transition(&mut self, next: BenchPhase) {
        debug!(
            kernel = self.kernel,
            variant = %self.variant.strategy(),
            fixture = %self.fixture.label,
            from = ?self.phase,
            to = ?next,
            "benchmark phase"
        );
        self.phase = next;
    }

    fn fail(&mut self, err: KernelError) {
        self.error = Some(err);
        self.transition(BenchPhase::Failed);
    }
}

/// Cost of an empty timed region: median over `rounds` measurements.
pub fn calibrate_timer_overhead(rounds: usize) -> f64 {
    let samples: Vec<f64> = (0..rounds.max(1))
        .map(|_| {
            let start = Instant::now();
            black_box(());
            start.elapsed().as_secs_f64()
        })
        .collect();
    TimingStats::from_samples(&samples)
        .map(|stats| stats.median)
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchFailure {
    pub variant: Strategy,
    pub fixture: String,
    pub size: usize,
    pub failure: FailureRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankEntry {
    pub rank: usize,
    pub variant: Strategy,
    pub median_seconds: f64,
    /// Reference median divided by this variant's median.
    pub speedup_vs_reference: Option<f64>,
}

/// Completed variants of one fixture, fastest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    pub fixture: String,
    pub size: usize,
    pub entries: Vec<RankEntry>,
}

impl Ranking {
    pub fn from_samples<'s>(fixture: &InputFixture, samples: impl IntoIterator<Item = &'s TimingSample>) -> Self {
        let mut timed: Vec<(Strategy, f64)> = samples
            .into_iter()
            .map(|s| (s.variant, s.adjusted_median()))
            .collect();
        timed.sort_by(|a, b| a.1.total_cmp(&b.1));

        let reference = timed
            .iter()
            .find(|(variant, _)| *variant == Strategy::Reference)
            .map(|(_, median)| *median);
        let entries = timed
            .into_iter()
            .enumerate()
            .map(|(idx, (variant, median))| RankEntry {
                rank: idx + 1,
                variant,
                median_seconds: median,
                speedup_vs_reference: reference
                    .filter(|_| median > 0.0)
                    .map(|reference| reference / median),
            })
            .collect();

        Self {
            fixture: fixture.label.clone(),
            size: fixture.size,
            entries,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelBenchReport {
    pub kernel_name: String,
    pub timer_overhead_seconds: f64,
    pub samples: Vec<TimingSample>,
    pub failures: Vec<BenchFailure>,
    pub rankings: Vec<Ranking>,
}

impl KernelBenchReport {
    pub fn sample(&self, variant: Strategy, size: usize) -> Option<&TimingSample> {
        self.samples
            .iter()
            .find(|s| s.variant == variant && s.size == size)
    }

    /// (size, median) pairs of one variant in fixture order.
    pub fn median_trend(&self, variant: Strategy) -> Vec<(usize, f64)> {
        self.samples
            .iter()
            .filter(|s| s.variant == variant)
            .map(|s| (s.size, s.stats.median))
            .collect()
    }
}

/// Times every variant of a kernel, one fixture at a time.
#[derive(Debug, Clone)]
pub struct BenchmarkRunner {
    config: BenchConfig,
    timer_overhead: f64,
}

impl BenchmarkRunner {
    pub fn new(config: BenchConfig) -> Result<Self, KernelError> {
        config.validate()?;
        let timer_overhead = calibrate_timer_overhead(1_000);
        debug!(timer_overhead, "calibrated timer overhead");
        Ok(Self {
            config,
            timer_overhead,
        })
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn timer_overhead(&self) -> f64 {
        self.timer_overhead
    }

    /// Benchmark all variants against each fixture before moving to the next.
    ///
    /// A variant that fails is reported and skipped for the remaining fixtures;
    /// the other variants keep running.
    pub fn run_kernel(
        &self,
        registry: &KernelRegistry,
        kernel: &str,
        fixtures: Fixtures,
    ) -> Result<KernelBenchReport, KernelError> {
        let variants = registry.variants_for(kernel)?;
        info!(kernel, variants = variants.len(), fixtures = fixtures.len(), "benchmarking");

        let mut report = KernelBenchReport {
            kernel_name: kernel.to_string(),
            timer_overhead_seconds: self.timer_overhead,
            samples: Vec::new(),
            failures: Vec::new(),
            rankings: Vec::new(),
        };
        let mut aborted: BTreeSet<Strategy> = BTreeSet::new();
        let mut spent: BTreeMap<Strategy, f64> = BTreeMap::new();

        for fixture in fixtures {
            let first_sample = report.samples.len();
            for variant in variants {
                if aborted.contains(&variant.strategy()) {
                    continue;
                }
                let strategy = variant.strategy();
                if let Err(err) = registry.check_signature(kernel, strategy, &fixture.params) {
                    warn!(kernel, variant = %strategy, fixture = %fixture.label, error = %err, "fixture rejected");
                    aborted.insert(strategy);
                    report.failures.push(BenchFailure {
                        variant: strategy,
                        fixture: fixture.label.clone(),
                        size: fixture.size,
                        failure: err.to_record(),
                    });
                    continue;
                }

                let used = spent.get(&strategy).copied().unwrap_or_default();
                let remaining = self.config.variant_time_budget_seconds.map(|budget| budget - used);
                let mut job = BenchmarkJob::new(kernel, variant, &fixture, &self.config, self.timer_overhead)
                    .with_budget_remaining(remaining);
                while !matches!(job.step(), BenchPhase::Completed | BenchPhase::Failed) {}
                *spent.entry(strategy).or_default() += job.elapsed();
                match job.finish() {
                    Ok(sample) => {
                        debug!(
                            kernel,
                            variant = %sample.variant,
                            size = sample.size,
                            median = sample.stats.median,
                            repetitions = sample.elapsed_seconds.len(),
                            "benchmark completed"
                        );
                        report.samples.push(sample);
                    }
                    Err(err) => {
                        warn!(kernel, variant = %variant.strategy(), fixture = %fixture.label, error = %err, "benchmark aborted");
                        aborted.insert(variant.strategy());
                        report.failures.push(BenchFailure {
                            variant: variant.strategy(),
                            fixture: fixture.label.clone(),
                            size: fixture.size,
                            failure: err.to_record(),
                        });
                    }
                }
            }
            let ranking = Ranking::from_samples(&fixture, &report.samples[first_sample..]);
            report.rankings.push(ranking);
        }

        Ok(report)
    }
}
