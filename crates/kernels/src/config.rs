//! Variant tags and kernel output types.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Implementation strategy of a kernel variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Reference,
    Vectorized,
    Compiled,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Reference, Strategy::Vectorized, Strategy::Compiled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Reference => "reference",
            Strategy::Vectorized => "vectorized",
            Strategy::Compiled => "compiled",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reference" | "ref" => Ok(Strategy::Reference),
            "vectorized" | "vector" => Ok(Strategy::Vectorized),
            "compiled" | "native" => Ok(Strategy::Compiled),
            other => Err(format!("unknown strategy: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    ScalarInt,
    ScalarFloat,
    SequenceFloat,
}

impl OutputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputKind::ScalarInt => "scalar_int",
            OutputKind::ScalarFloat => "scalar_float",
            OutputKind::SequenceFloat => "sequence_float",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value produced by one kernel invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum KernelOutput {
    Int(i64),
    Float(f64),
    Sequence(Array1<f64>),
}

impl KernelOutput {
    pub fn kind(&self) -> OutputKind {
        match self {
            KernelOutput::Int(_) => OutputKind::ScalarInt,
            KernelOutput::Float(_) => OutputKind::ScalarFloat,
            KernelOutput::Sequence(_) => OutputKind::SequenceFloat,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            KernelOutput::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            KernelOutput::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&Array1<f64>> {
        match self {
            KernelOutput::Sequence(values) => Some(values),
            _ => None,
        }
    }

    /// Bitwise equality; NaN payloads compare equal to themselves.
    pub fn bit_identical(&self, other: &KernelOutput) -> bool {
        match (self, other) {
            (KernelOutput::Int(a), KernelOutput::Int(b)) => a == b,
            (KernelOutput::Float(a), KernelOutput::Float(b)) => a.to_bits() == b.to_bits(),
            (KernelOutput::Sequence(a), KernelOutput::Sequence(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            _ => false,
        }
    }
}

impl fmt::Display for KernelOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelOutput::Int(value) => write!(f, "{value}"),
            KernelOutput::Float(value) => write!(f, "{value}"),
            KernelOutput::Sequence(values) => write!(f, "sequence of length {}", values.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn strategy_parses_aliases() {
        assert_eq!("ref".parse::<Strategy>(), Ok(Strategy::Reference));
        assert_eq!("Vectorized".parse::<Strategy>(), Ok(Strategy::Vectorized));
        assert_eq!("native".parse::<Strategy>(), Ok(Strategy::Compiled));
        assert!("gpu".parse::<Strategy>().is_err());
    }

    #[test]
    fn bit_identical_treats_nan_as_equal() {
        let a = KernelOutput::Sequence(array![1.0, f64::NAN]);
        let b = KernelOutput::Sequence(array![1.0, f64::NAN]);
        assert!(a.bit_identical(&b));
        assert_ne!(a, b);
        assert!(!KernelOutput::Int(1).bit_identical(&KernelOutput::Float(1.0)));
    }
}
