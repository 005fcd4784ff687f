//! Comparison results and per-kernel verification reports.

use kernelcheck_kernels::config::Strategy;
use kernelcheck_kernels::error::{FailureCategory, FailureRecord};
use serde::{Deserialize, Serialize};

/// Outcome of comparing one candidate against the baseline on one fixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub kernel_name: String,
    /// Label of the fixture the pair was evaluated on.
    pub fixture: String,
    /// Baseline variant.
    pub variant_a: Strategy,
    /// Candidate variant.
    pub variant_b: Strategy,
    /// `None` when no numeric comparison took place (shape mismatch, failures,
    /// or both variants rejecting the input).
    pub max_absolute_diff: Option<f64>,
    pub max_relative_diff: Option<f64>,
    pub passed: bool,
    /// Why the comparison failed, or the expected rejection both variants raised.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureRecord>,
}

/// Everything the checker learned about one kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelCheckReport {
    pub kernel_name: String,
    pub baseline: Strategy,
    pub fixtures_checked: usize,
    pub comparisons: Vec<ComparisonResult>,
    /// Failures of a single variant, listed once per (variant, fixture).
    pub errors: Vec<VariantFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantFailure {
    pub variant: Strategy,
    pub fixture: String,
    pub failure: FailureRecord,
}

impl KernelCheckReport {
    pub fn passed(&self) -> bool {
        self.errors.is_empty() && self.comparisons.iter().all(|c| c.passed)
    }

    pub fn disagreements(&self) -> impl Iterator<Item = &ComparisonResult> {
        self.comparisons.iter().filter(|c| !c.passed)
    }

    /// Categories of every recorded failure, deduplicated, in first-seen order.
    pub fn failure_categories(&self) -> Vec<FailureCategory> {
        let mut categories = Vec::new();
        let failed = self
            .disagreements()
            .filter_map(|c| c.failure.as_ref())
            .chain(self.errors.iter().map(|e| &e.failure));
        for record in failed {
            if !categories.contains(&record.category) {
                categories.push(record.category);
            }
        }
        categories
    }

    pub fn passed_count(&self) -> usize {
        self.comparisons.iter().filter(|c| c.passed).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comparison(passed: bool, failure: Option<FailureCategory>) -> ComparisonResult {
        ComparisonResult {
            kernel_name: "dot".into(),
            fixture: "random 257".into(),
            variant_a: Strategy::Reference,
            variant_b: Strategy::Compiled,
            max_absolute_diff: Some(0.0),
            max_relative_diff: Some(0.0),
            passed,
            failure: failure.map(|category| FailureRecord {
                category,
                message: category.as_str().to_string(),
            }),
        }
    }

    #[test]
    fn categories_ignore_expected_rejections() {
        let report = KernelCheckReport {
            kernel_name: "dot".into(),
            baseline: Strategy::Reference,
            fixtures_checked: 3,
            comparisons: vec![
                comparison(true, Some(FailureCategory::InvalidInput)),
                comparison(false, Some(FailureCategory::ToleranceExceeded)),
                comparison(false, Some(FailureCategory::ToleranceExceeded)),
            ],
            errors: vec![VariantFailure {
                variant: Strategy::Vectorized,
                fixture: "zero vector".into(),
                failure: FailureRecord {
                    category: FailureCategory::Execution,
                    message: "boom".into(),
                },
            }],
        };
        assert!(!report.passed());
        assert_eq!(report.passed_count(), 1);
        assert_eq!(
            report.failure_categories(),
            vec![FailureCategory::ToleranceExceeded, FailureCategory::Execution]
        );
    }

    #[test]
    fn passing_comparison_omits_failure_field() {
        let json = serde_json::to_value(comparison(true, None)).unwrap();
        assert!(json.get("failure").is_none());
        assert_eq!(json["variant_b"], "compiled");
    }
}
