//! Shared helpers for kernel implementations.

use crate::ensure_input;
use crate::params::Params;
use anyhow::Result;
use ndarray::ArrayView1;

pub fn validate_smooth_input(x: &ArrayView1<'_, f64>) -> Result<()> {
    ensure_input!(
        x.len() >= 2,
        "smoothing needs at least 2 samples, got {}",
        x.len()
    );
    Ok(())
}

pub fn validate_dot_inputs(x: &ArrayView1<'_, f64>, y: &ArrayView1<'_, f64>) -> Result<()> {
    ensure_input!(
        x.len() == y.len(),
        "dot length mismatch: x has {} elements, y has {}",
        x.len(),
        y.len()
    );
    ensure_input!(!x.is_empty(), "dot needs at least one element");
    Ok(())
}

pub fn validate_integration(a: f64, b: f64, bins: usize) -> Result<()> {
    ensure_input!(
        a.is_finite() && b.is_finite(),
        "integration bounds must be finite, got [{a}, {b}]"
    );
    ensure_input!(bins >= 1, "integration needs at least one bin");
    Ok(())
}

/// Read a non-negative integer parameter as a count.
pub fn count_param(params: &Params, name: &str) -> Result<usize> {
    let value = params.int(name)?;
    ensure_input!(value >= 0, "`{name}` must be non-negative, got {value}");
    Ok(usize::try_from(value)?)
}
