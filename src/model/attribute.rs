use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use crate::error::{LogicTreeError, Result};

/// Scalar or fixed-length tuple value of a branch attribute.
///
/// Floats compare and hash by bit pattern so every value can live in a
/// `HashSet`. JSON lists become tuples.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Tuple(Vec<AttributeValue>),
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AttributeValue::Bool(a), AttributeValue::Bool(b)) => a == b,
            (AttributeValue::Int(a), AttributeValue::Int(b)) => a == b,
            (AttributeValue::Float(a), AttributeValue::Float(b)) => a.to_bits() == b.to_bits(),
            (AttributeValue::Str(a), AttributeValue::Str(b)) => a == b,
            (AttributeValue::Tuple(a), AttributeValue::Tuple(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for AttributeValue {}

impl Hash for AttributeValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            AttributeValue::Bool(v) => v.hash(state),
            AttributeValue::Int(v) => v.hash(state),
            AttributeValue::Float(v) => v.to_bits().hash(state),
            AttributeValue::Str(v) => v.hash(state),
            AttributeValue::Tuple(v) => v.hash(state),
        }
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AttributeValue::Bool(v) => write!(f, "{}", v),
            AttributeValue::Int(v) => write!(f, "{}", v),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::Str(v) => write!(f, "{}", v),
            AttributeValue::Tuple(items) => {
                write!(f, "(")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl AttributeValue {
    /// JSON view used by branch filters.
    pub fn to_json(&self) -> Value {
        match self {
            AttributeValue::Bool(v) => Value::Bool(*v),
            AttributeValue::Int(v) => Value::from(*v),
            AttributeValue::Float(v) => Value::from(*v),
            AttributeValue::Str(v) => Value::String(v.clone()),
            AttributeValue::Tuple(items) => {
                Value::Array(items.iter().map(|i| i.to_json()).collect())
            }
        }
    }
}

impl TryFrom<Value> for AttributeValue {
    type Error = LogicTreeError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(AttributeValue::Bool(b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(AttributeValue::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(AttributeValue::Float(f))
                } else {
                    Err(LogicTreeError::format(n, "number out of range"))
                }
            }
            Value::String(s) => Ok(AttributeValue::Str(s)),
            Value::Array(items) => items
                .into_iter()
                .map(AttributeValue::try_from)
                .collect::<Result<Vec<_>>>()
                .map(AttributeValue::Tuple),
            other => Err(LogicTreeError::format(
                other,
                "attribute values must be scalars or lists",
            )),
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Str(v.to_string())
    }
}

/// Describes one axis of variation and the values it may take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchAttributeSpec {
    pub name: String,
    pub long_name: String,
    pub value_options: Vec<AttributeValue>,
}

impl BranchAttributeSpec {
    /// Derive one spec per attribute name from a collection of values.
    /// Names keep the order they first appear in, as do their options.
    pub fn derive_from<'a, I>(values: I) -> Vec<BranchAttributeSpec>
    where
        I: IntoIterator<Item = &'a BranchAttributeValue>,
    {
        let mut seen: HashSet<&BranchAttributeValue> = HashSet::new();
        let mut specs: Vec<BranchAttributeSpec> = Vec::new();

        for value in values {
            if !seen.insert(value) {
                continue;
            }
            match specs.iter_mut().find(|s| s.name == value.name) {
                Some(spec) => spec.value_options.push(value.value.clone()),
                None => specs.push(BranchAttributeSpec {
                    name: value.name.clone(),
                    long_name: value.long_name.clone(),
                    value_options: vec![value.value.clone()],
                }),
            }
        }

        specs
    }
}

/// An immutable `name = value` pair, e.g. `b = 0.95`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BranchAttributeValue {
    pub name: String,
    pub long_name: String,
    pub value: AttributeValue,
}

impl BranchAttributeValue {
    pub fn new(
        name: impl Into<String>,
        long_name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        Self {
            name: name.into(),
            long_name: long_name.into(),
            value: value.into(),
        }
    }

    pub fn from_branch_attribute(spec: &BranchAttributeSpec, value: AttributeValue) -> Self {
        Self {
            name: spec.name.clone(),
            long_name: spec.long_name.clone(),
            value,
        }
    }

    /// One value per option of `spec`, in option order.
    pub fn all_from_branch_attribute(
        spec: &BranchAttributeSpec,
    ) -> impl Iterator<Item = BranchAttributeValue> + '_ {
        spec.value_options
            .iter()
            .map(move |option| Self::from_branch_attribute(spec, option.clone()))
    }
}

impl std::fmt::Display for BranchAttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}{}", self.name, self.value)
    }
}
