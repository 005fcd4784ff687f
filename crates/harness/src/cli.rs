//! CLI wiring for kernelcheck.

use crate::config::HarnessConfig;
use crate::emit::{JsonEmitter, ReportEmitter, TextEmitter};
use crate::report::RunReport;
use crate::session::Harness;
use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "kernelcheck", about = "Verify and benchmark numeric kernel variants")]
pub struct Cli {
    /// JSON config file; flags below override its fields.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, global = true)]
    pub seed: Option<u64>,
    #[arg(long, global = true)]
    pub atol: Option<f64>,
    #[arg(long, global = true)]
    pub rtol: Option<f64>,
    #[arg(long, global = true)]
    pub warmup: Option<usize>,
    #[arg(long, global = true)]
    pub min_measure_seconds: Option<f64>,
    /// Wall-clock budget per variant during benchmarking, in seconds.
    #[arg(long, global = true)]
    pub budget: Option<f64>,
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub format: FormatArg,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatArg {
    Text,
    Json,
}

impl FormatArg {
    fn emitter(self) -> Box<dyn ReportEmitter> {
        match self {
            FormatArg::Text => Box::new(TextEmitter),
            FormatArg::Json => Box::new(JsonEmitter),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List registered kernels and their variants.
    List,
    /// Check every variant against the baseline.
    Verify {
        #[arg(long = "kernel")]
        kernels: Vec<String>,
    },
    /// Time every variant over the benchmark fixtures.
    Bench {
        #[arg(long = "kernel")]
        kernels: Vec<String>,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        baseline: Option<PathBuf>,
    },
    /// Verify, then benchmark.
    Run {
        #[arg(long = "kernel")]
        kernels: Vec<String>,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        baseline: Option<PathBuf>,
    },
    /// Check that the checker catches deliberately broken variants.
    Selftest,
}

impl Cli {
    /// File config (or defaults) with the command-line overrides applied.
    pub fn harness_config(&self) -> Result<HarnessConfig> {
        let mut config = match &self.config {
            Some(path) => HarnessConfig::load(path)?,
            None => HarnessConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.random_seed = seed;
        }
        if let Some(atol) = self.atol {
            config.tolerance_atol = atol;
        }
        if let Some(rtol) = self.rtol {
            config.tolerance_rtol = rtol;
        }
        if let Some(warmup) = self.warmup {
            config.warmup_iterations = warmup;
        }
        if let Some(seconds) = self.min_measure_seconds {
            config.min_measure_seconds = seconds;
        }
        if let Some(budget) = self.budget {
            config.variant_time_budget_seconds = Some(budget);
        }
        Ok(config)
    }
}

pub fn run_cli(cli: Cli) -> Result<()> {
    tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute(cli, &mut out)
}

/// Run one command, writing its report to `out`.
///
/// Fails when a check fails or a mutant survives, after the report is written.
pub fn execute(cli: Cli, out: &mut dyn Write) -> Result<()> {
    let config = cli.harness_config()?;
    let harness = Harness::new(config.clone())?;
    let emitter = cli.format.emitter();

    let report = match cli.command {
        Command::List => {
            let registry = harness.registry();
            for name in registry.kernel_names() {
                let variants = registry
                    .variants_for(name)?
                    .iter()
                    .map(|spec| spec.strategy().as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                let output = registry
                    .output_kind(name)
                    .map(|kind| kind.as_str())
                    .unwrap_or("-");
                let params = registry
                    .signature(name)
                    .map(|signature| {
                        signature
                            .iter()
                            .map(|(param, kind)| format!("{param}: {kind}"))
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .unwrap_or_default();
                writeln!(out, "{name}({params}) -> {output} [{variants}]")?;
            }
            return Ok(());
        }
        Command::Verify { kernels } => {
            let mut report = RunReport::new(config);
            report.checks = harness.verify(&kernels)?;
            emitter.emit(&report, out)?;
            report
        }
        Command::Bench {
            kernels,
            output,
            baseline,
        } => {
            let mut report = RunReport::new(config);
            report.benchmarks = harness.benchmark(&kernels)?;
            finish_timed(&report, emitter.as_ref(), out, output, baseline)?;
            report
        }
        Command::Run {
            kernels,
            output,
            baseline,
        } => {
            let report = harness.run(&kernels)?;
            finish_timed(&report, emitter.as_ref(), out, output, baseline)?;
            report
        }
        Command::Selftest => {
            let mut report = RunReport::new(config);
            report.mutants = harness.selftest()?;
            emitter.emit(&report, out)?;
            report
        }
    };

    if !report.passed() {
        let failed_kernels = report.checks.iter().filter(|c| !c.passed()).count();
        let survivors = report.mutants.iter().filter(|m| !m.killed).count();
        bail!("{failed_kernels} kernel(s) failed verification, {survivors} mutant(s) survived");
    }
    Ok(())
}

fn finish_timed(
    report: &RunReport,
    emitter: &dyn ReportEmitter,
    out: &mut dyn Write,
    output: Option<PathBuf>,
    baseline: Option<PathBuf>,
) -> Result<()> {
    emitter.emit(report, out)?;

    if let Some(path) = baseline {
        if path.exists() {
            let baseline_report = RunReport::load(&path)?;
            for (key, delta) in report.diff(&baseline_report) {
                let ratio = delta
                    .median_ratio
                    .map(|r| format!("{r:.3}x"))
                    .unwrap_or_else(|| "-".to_string());
                writeln!(
                    out,
                    "Δ {}/{} size={}: median_us={:+.3} ratio={ratio}",
                    key.kernel,
                    key.variant,
                    key.size,
                    delta.median_delta_seconds * 1e6
                )?;
            }
        } else {
            info!(path = %path.display(), "baseline report not found; skipping diff");
        }
    }

    if let Some(path) = output {
        report.save(&path)?;
        info!(path = %path.display(), "report written");
    }
    Ok(())
}
