//! Equivalence checking of kernel variants.
//!
//! # Key Components
//!
//! - [`tolerance::TolerancePolicy`]: absolute/relative bounds, per kernel
//! - [`checker::EquivalenceChecker`]: runs every variant against the baseline
//! - [`report::KernelCheckReport`]: comparisons plus per-variant failures
//! - [`mutator::Mutator`]: broken variants used to test the checker itself

pub mod checker;
pub mod mutator;
pub mod report;
pub mod tolerance;

pub use checker::{compare_outputs, EquivalenceChecker};
pub use mutator::{run_mutation_suite, Mutant, MutantOutcome, Mutator};
pub use report::{ComparisonResult, KernelCheckReport, VariantFailure};
pub use tolerance::{Tolerance, TolerancePolicy};
