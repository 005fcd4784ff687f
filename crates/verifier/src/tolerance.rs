//! Numeric tolerance policy for comparing variant outputs.

use kernelcheck_kernels::error::KernelError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pass if `|expected - actual| <= atol + rtol * |expected|`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub atol: f64,
    pub rtol: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            atol: 1e-9,
            rtol: 1e-6,
        }
    }
}

impl Tolerance {
    pub fn new(atol: f64, rtol: f64) -> Self {
        Self { atol, rtol }
    }

    /// Bitwise agreement only.
    pub fn exact() -> Self {
        Self { atol: 0.0, rtol: 0.0 }
    }

    pub fn allowed(&self, expected: f64) -> f64 {
        self.atol + self.rtol * expected.abs()
    }

    /// NaN agrees only with NaN; equal infinities agree.
    pub fn accepts(&self, expected: f64, actual: f64) -> bool {
        if expected.is_nan() || actual.is_nan() {
            return expected.is_nan() && actual.is_nan();
        }
        if expected == actual {
            return true;
        }
        (expected - actual).abs() <= self.allowed(expected)
    }

    pub fn validate(&self) -> Result<(), KernelError> {
        if !(self.atol >= 0.0 && self.atol.is_finite()) {
            return Err(KernelError::Config(format!(
                "absolute tolerance must be a finite non-negative number, got {}",
                self.atol
            )));
        }
        if !(self.rtol >= 0.0 && self.rtol.is_finite()) {
            return Err(KernelError::Config(format!(
                "relative tolerance must be a finite non-negative number, got {}",
                self.rtol
            )));
        }
        Ok(())
    }
}

/// Global tolerance plus per-kernel overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TolerancePolicy {
    pub default: Tolerance,
    #[serde(default)]
    pub overrides: BTreeMap<String, Tolerance>,
}

impl Default for TolerancePolicy {
    fn default() -> Self {
        Self::new(Tolerance::default())
            .with_override(kernelcheck_kernels::INTEGRATE, Tolerance::new(1e-6, 1e-6))
    }
}

impl TolerancePolicy {
    pub fn new(default: Tolerance) -> Self {
        Self {
            default,
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_override(mut self, kernel: impl Into<String>, tolerance: Tolerance) -> Self {
        self.overrides.insert(kernel.into(), tolerance);
        self
    }

    pub fn for_kernel(&self, kernel: &str) -> Tolerance {
        self.overrides.get(kernel).copied().unwrap_or(self.default)
    }

    pub fn validate(&self) -> Result<(), KernelError> {
        self.default.validate()?;
        for (kernel, tolerance) in &self.overrides {
            tolerance
                .validate()
                .map_err(|err| KernelError::Config(format!("override for {kernel}: {err}")))?;
        }
        Ok(())
    }
}
