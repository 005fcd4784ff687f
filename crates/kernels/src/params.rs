//! Named kernel parameters.

use crate::error::InvalidInput;
use anyhow::Result;
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Int,
    Float,
    FloatArray,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::Int => "int",
            ParamKind::Float => "float",
            ParamKind::FloatArray => "float array",
        };
        f.write_str(name)
    }
}

/// Parameter names and kinds a kernel accepts.
pub type Signature = BTreeMap<String, ParamKind>;

pub fn signature_of(entries: &[(&str, ParamKind)]) -> Signature {
    entries
        .iter()
        .map(|(name, kind)| ((*name).to_string(), *kind))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Array(Array1<f64>),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Int(_) => ParamKind::Int,
            ParamValue::Float(_) => ParamKind::Float,
            ParamValue::Array(_) => ParamKind::FloatArray,
        }
    }

    fn bitwise_eq(&self, other: &ParamValue) -> bool {
        match (self, other) {
            (ParamValue::Int(a), ParamValue::Int(b)) => a == b,
            (ParamValue::Float(a), ParamValue::Float(b)) => a.to_bits() == b.to_bits(),
            (ParamValue::Array(a), ParamValue::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            _ => false,
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<Array1<f64>> for ParamValue {
    fn from(value: Array1<f64>) -> Self {
        ParamValue::Array(value)
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(value: Vec<f64>) -> Self {
        ParamValue::Array(Array1::from(value))
    }
}

/// Mapping of parameter name to value handed to every variant of a kernel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: BTreeMap<String, ParamValue>,
}

impl Params {
    pub fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn signature(&self) -> Signature {
        self.values
            .iter()
            .map(|(name, value)| (name.clone(), value.kind()))
            .collect()
    }

    /// Equality on the bit patterns of every value, so NaN inputs compare equal.
    pub fn bitwise_eq(&self, other: &Params) -> bool {
        self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(other.values.iter())
                .all(|((name_a, a), (name_b, b))| name_a == name_b && a.bitwise_eq(b))
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        match self.require(name)? {
            ParamValue::Int(value) => Ok(*value),
            other => Err(kind_mismatch(name, ParamKind::Int, other.kind())),
        }
    }

    pub fn float(&self, name: &str) -> Result<f64> {
        match self.require(name)? {
            ParamValue::Float(value) => Ok(*value),
            other => Err(kind_mismatch(name, ParamKind::Float, other.kind())),
        }
    }

    pub fn array(&self, name: &str) -> Result<ArrayView1<'_, f64>> {
        match self.require(name)? {
            ParamValue::Array(values) => Ok(values.view()),
            other => Err(kind_mismatch(name, ParamKind::FloatArray, other.kind())),
        }
    }

    fn require(&self, name: &str) -> Result<&ParamValue> {
        self.values
            .get(name)
            .ok_or_else(|| InvalidInput::new(format!("missing parameter `{name}`")).into())
    }

    /// Largest array length among the parameters, used as the size of a fixture.
    pub fn extent(&self) -> usize {
        self.values
            .values()
            .map(|value| match value {
                ParamValue::Array(values) => values.len(),
                _ => 1,
            })
            .max()
            .unwrap_or(0)
    }
}

fn kind_mismatch(name: &str, expected: ParamKind, actual: ParamKind) -> anyhow::Error {
    InvalidInput::new(format!("parameter `{name}` must be {expected}, got {actual}")).into()
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in &self.values {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            match value {
                ParamValue::Int(v) => write!(f, "{name}={v}")?,
                ParamValue::Float(v) => write!(f, "{name}={v}")?,
                ParamValue::Array(v) if v.len() <= 6 => write!(f, "{name}={v}")?,
                ParamValue::Array(v) => write!(f, "{name}=[{} values]", v.len())?,
            }
        }
        Ok(())
    }
}
