//! Error taxonomy shared by the registry, checker and benchmark runner.

use crate::config::Strategy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejection raised by a kernel's own input validation.
///
/// Kernels return it through `anyhow::Error`; the registry recognises it and
/// reports [`KernelError::InvalidInput`] instead of an execution failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct InvalidInput {
    pub reason: String,
}

impl InvalidInput {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Return early with an [`InvalidInput`] error if the condition does not hold.
#[macro_export]
macro_rules! ensure_input {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err(::anyhow::Error::new($crate::error::InvalidInput::new(format!($($arg)+))));
        }
    };
}

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("cannot register {kernel}/{strategy}: {reason}")]
    Registration {
        kernel: String,
        strategy: Strategy,
        reason: String,
    },

    #[error("unknown kernel: {0}")]
    UnknownKernel(String),

    #[error("kernel {kernel} has no {strategy} variant")]
    UnknownVariant { kernel: String, strategy: Strategy },

    #[error("{kernel}/{strategy} rejected its input: {reason}")]
    InvalidInput {
        kernel: String,
        strategy: Strategy,
        reason: String,
    },

    #[error("{kernel}: {reference} returned {expected} elements but {candidate} returned {actual}")]
    ShapeMismatch {
        kernel: String,
        reference: Strategy,
        candidate: Strategy,
        expected: usize,
        actual: usize,
    },

    #[error(
        "{kernel}: {candidate} disagrees with {reference}{}: expected {expected}, got {actual} (allowed deviation {allowed:e})",
        index_suffix(.index)
    )]
    ToleranceExceeded {
        kernel: String,
        reference: Strategy,
        candidate: Strategy,
        index: Option<usize>,
        expected: f64,
        actual: f64,
        allowed: f64,
    },

    #[error("{kernel}/{strategy} failed: {source:#}")]
    Execution {
        kernel: String,
        strategy: Strategy,
        #[source]
        source: anyhow::Error,
    },

    #[error("{kernel}: {reference} {reference_outcome} but {candidate} {candidate_outcome}")]
    DivergentBehavior {
        kernel: String,
        reference: Strategy,
        candidate: Strategy,
        reference_outcome: String,
        candidate_outcome: String,
    },

    #[error("{kernel}/{strategy} mutated its input parameters")]
    InputMutated { kernel: String, strategy: Strategy },

    #[error("{kernel}/{strategy} returned different outputs for identical inputs")]
    NonDeterministic { kernel: String, strategy: Strategy },

    #[error("{kernel}/{strategy} exceeded its time budget of {budget_seconds}s after {repetitions} repetitions")]
    Timeout {
        kernel: String,
        strategy: Strategy,
        budget_seconds: f64,
        repetitions: usize,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

fn index_suffix(index: &Option<usize>) -> String {
    index.map(|i| format!(" at index {i}")).unwrap_or_default()
}

impl KernelError {
    pub fn category(&self) -> FailureCategory {
        match self {
            KernelError::Registration { .. } => FailureCategory::Registration,
            KernelError::UnknownKernel(_) | KernelError::UnknownVariant { .. } => {
                FailureCategory::Lookup
            }
            KernelError::InvalidInput { .. } => FailureCategory::InvalidInput,
            KernelError::ShapeMismatch { .. } => FailureCategory::ShapeMismatch,
            KernelError::ToleranceExceeded { .. } => FailureCategory::ToleranceExceeded,
            KernelError::Execution { .. } => FailureCategory::Execution,
            KernelError::DivergentBehavior { .. } => FailureCategory::DivergentBehavior,
            KernelError::InputMutated { .. } => FailureCategory::InputMutated,
            KernelError::NonDeterministic { .. } => FailureCategory::NonDeterministic,
            KernelError::Timeout { .. } => FailureCategory::Timeout,
            KernelError::Config(_) => FailureCategory::Config,
        }
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, KernelError::InvalidInput { .. })
    }

    pub fn to_record(&self) -> FailureRecord {
        FailureRecord {
            category: self.category(),
            message: self.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    Registration,
    Lookup,
    InvalidInput,
    ShapeMismatch,
    ToleranceExceeded,
    Execution,
    DivergentBehavior,
    InputMutated,
    NonDeterministic,
    Timeout,
    Config,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::Registration => "registration",
            FailureCategory::Lookup => "lookup",
            FailureCategory::InvalidInput => "invalid_input",
            FailureCategory::ShapeMismatch => "shape_mismatch",
            FailureCategory::ToleranceExceeded => "tolerance_exceeded",
            FailureCategory::Execution => "execution",
            FailureCategory::DivergentBehavior => "divergent_behavior",
            FailureCategory::InputMutated => "input_mutated",
            FailureCategory::NonDeterministic => "non_deterministic",
            FailureCategory::Timeout => "timeout",
            FailureCategory::Config => "config",
        }
    }
}

/// Serializable snapshot of a [`KernelError`] attached to the result stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub category: FailureCategory,
    pub message: String,
}

impl From<&KernelError> for FailureRecord {
    fn from(err: &KernelError) -> Self {
        err.to_record()
    }
}
