//! Report emitters: human-readable text and JSON.

use crate::report::RunReport;
use anyhow::Result;
use std::io::Write;

pub trait ReportEmitter {
    fn emit(&self, report: &RunReport, out: &mut dyn Write) -> Result<()>;
}

/// Pass/fail summary per kernel, every disagreement and failure, and ranked
/// timing tables.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextEmitter;

impl ReportEmitter for TextEmitter {
    fn emit(&self, report: &RunReport, out: &mut dyn Write) -> Result<()> {
        for check in &report.checks {
            let verdict = if check.passed() { "PASS" } else { "FAIL" };
            writeln!(
                out,
                "{verdict} {}: {}/{} comparisons agree with {} over {} fixtures",
                check.kernel_name,
                check.passed_count(),
                check.comparisons.len(),
                check.baseline,
                check.fixtures_checked
            )?;
            for comparison in check.disagreements() {
                let message = comparison
                    .failure
                    .as_ref()
                    .map(|f| f.message.as_str())
                    .unwrap_or("outputs differ");
                writeln!(
                    out,
                    "  disagreement [{}] {} vs {}: {message}",
                    comparison.fixture, comparison.variant_a, comparison.variant_b
                )?;
            }
            for error in &check.errors {
                writeln!(
                    out,
                    "  error [{}] {} ({}): {}",
                    error.fixture,
                    error.variant,
                    error.failure.category.as_str(),
                    error.failure.message
                )?;
            }
        }

        for bench in &report.benchmarks {
            writeln!(
                out,
                "\ntiming {} (timer overhead {:.1} ns)",
                bench.kernel_name,
                bench.timer_overhead_seconds * 1e9
            )?;
            writeln!(
                out,
                "  {:<10} {:>4} {:<11} {:>12} {:>12} {:>12} {:>8}",
                "size", "rank", "variant", "median (us)", "mean (us)", "min (us)", "speedup"
            )?;
            for ranking in &bench.rankings {
                for entry in &ranking.entries {
                    let Some(sample) = bench.sample(entry.variant, ranking.size) else {
                        continue;
                    };
                    let speedup = entry
                        .speedup_vs_reference
                        .map(|s| format!("{s:.2}x"))
                        .unwrap_or_else(|| "-".to_string());
                    writeln!(
                        out,
                        "  {:<10} {:>4} {:<11} {:>12.3} {:>12.3} {:>12.3} {:>8}",
                        ranking.size,
                        entry.rank,
                        entry.variant.as_str(),
                        entry.median_seconds * 1e6,
                        sample.stats.mean * 1e6,
                        sample.stats.min * 1e6,
                        speedup
                    )?;
                }
            }
            for failure in &bench.failures {
                writeln!(
                    out,
                    "  aborted {} at size {}: {}",
                    failure.variant, failure.size, failure.failure.message
                )?;
            }
        }

        if !report.mutants.is_empty() {
            writeln!(out, "\nmutation self-test")?;
            for mutant in &report.mutants {
                let verdict = if mutant.killed { "killed" } else { "SURVIVED" };
                writeln!(
                    out,
                    "  {verdict} {}: {} (expected {})",
                    mutant.kernel,
                    mutant.description,
                    mutant.expected_failure.as_str()
                )?;
            }
        }

        let overall = if report.passed() { "PASS" } else { "FAIL" };
        writeln!(out, "\noverall: {overall}")?;
        Ok(())
    }
}

/// The whole report as pretty-printed JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonEmitter;

impl ReportEmitter for JsonEmitter {
    fn emit(&self, report: &RunReport, out: &mut dyn Write) -> Result<()> {
        serde_json::to_writer_pretty(&mut *out, report)?;
        writeln!(out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarnessConfig;
    use kernelcheck_kernels::config::Strategy;
    use kernelcheck_kernels::error::{FailureCategory, FailureRecord};
    use kernelcheck_verifier::{ComparisonResult, KernelCheckReport, MutantOutcome};

    fn failing_report() -> RunReport {
        let mut report = RunReport::new(HarnessConfig::default());
        report.checks.push(KernelCheckReport {
            kernel_name: "smooth".into(),
            baseline: Strategy::Reference,
            fixtures_checked: 1,
            comparisons: vec![ComparisonResult {
                kernel_name: "smooth".into(),
                fixture: "ramp [1, 2, 3, 4]".into(),
                variant_a: Strategy::Reference,
                variant_b: Strategy::Compiled,
                max_absolute_diff: Some(0.5),
                max_relative_diff: Some(1.0 / 3.0),
                passed: false,
                failure: Some(FailureRecord {
                    category: FailureCategory::ToleranceExceeded,
                    message: "smooth: compiled disagrees with reference at index 0".into(),
                }),
            }],
            errors: Vec::new(),
        });
        report.mutants.push(MutantOutcome {
            description: "smooth drops the last element".into(),
            kernel: "smooth".into(),
            expected_failure: FailureCategory::ShapeMismatch,
            observed: vec![FailureCategory::ShapeMismatch],
            killed: true,
        });
        report
    }

    #[test]
    fn text_lists_every_disagreement() {
        let mut out = Vec::new();
        TextEmitter.emit(&failing_report(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("FAIL smooth: 0/1 comparisons"));
        assert!(text.contains("disagreement [ramp [1, 2, 3, 4]] reference vs compiled"));
        assert!(text.contains("killed smooth: smooth drops the last element"));
        assert!(text.trim_end().ends_with("overall: FAIL"));
    }

    #[test]
    fn json_is_parseable() {
        let mut out = Vec::new();
        JsonEmitter.emit(&failing_report(), &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["checks"][0]["comparisons"][0]["failure"]["category"], "tolerance_exceeded");
        assert_eq!(value["config"]["random_seed"], 42);
    }
}
