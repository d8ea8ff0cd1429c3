//! String ⇄ typed value conversion and constraint checks.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::{Constraints, Field, FieldType};
use crate::Error;

/// A stored string after conversion to its field's declared type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypedValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl TypedValue {
    pub fn kind(&self) -> FieldType {
        match self {
            TypedValue::String(_) => FieldType::String,
            TypedValue::Int(_) => FieldType::Int,
            TypedValue::Float(_) => FieldType::Float,
            TypedValue::Bool(_) => FieldType::Bool,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            TypedValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            TypedValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TypedValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::String(s) => f.write_str(s),
            TypedValue::Int(i) => write!(f, "{i}"),
            TypedValue::Float(x) => write!(f, "{x}"),
            TypedValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<TypedValue> for serde_json::Value {
    fn from(value: TypedValue) -> Self {
        match value {
            TypedValue::String(s) => serde_json::Value::String(s),
            TypedValue::Int(i) => serde_json::Value::from(i),
            TypedValue::Float(x) => serde_json::Number::from_f64(x)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            TypedValue::Bool(b) => serde_json::Value::Bool(b),
        }
    }
}

/// Which constraint a value failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
    #[error("{actual} is below the minimum {min}")]
    BelowMin { min: f64, actual: f64 },

    #[error("{actual} is above the maximum {max}")]
    AboveMax { max: f64, actual: f64 },

    #[error("not one of {allowed:?}")]
    NotAllowed { allowed: Vec<String> },
}

/// Converts `raw` to `kind`.
///
/// `bool` accepts `1 t T TRUE true True` and `0 f F FALSE false False`.
/// `float` accepts finite numbers only; `inf` and `NaN` are conversion errors.
pub fn coerce(raw: &str, kind: FieldType) -> Result<TypedValue, Error> {
    let converted = match kind {
        FieldType::String => Some(TypedValue::String(raw.to_string())),
        FieldType::Int => raw.parse::<i64>().ok().map(TypedValue::Int),
        FieldType::Float => raw
            .parse::<f64>()
            .ok()
            .filter(|x| x.is_finite())
            .map(TypedValue::Float),
        FieldType::Bool => parse_bool(raw).map(TypedValue::Bool),
    };
    converted.ok_or_else(|| Error::TypeConversion {
        value: raw.to_string(),
        expected: kind,
    })
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Coerces `raw` for `field` and applies its constraints.
///
/// Coercion failure short-circuits: a value that does not parse is reported
/// as [`Error::TypeConversion`] without looking at the constraints.
pub fn check(raw: &str, field: &Field) -> Result<TypedValue, Error> {
    let value = coerce(raw, field.kind)?;
    if let Some(constraints) = &field.constraints {
        apply(constraints, &value).map_err(|violation| Error::ConstraintViolation {
            field: field.name.clone(),
            value: raw.to_string(),
            violation,
        })?;
    }
    Ok(value)
}

/// Whether `raw` would be accepted for `field`. Never errors.
pub fn validate(raw: &str, field: &Field) -> bool {
    check(raw, field).is_ok()
}

fn apply(constraints: &Constraints, value: &TypedValue) -> Result<(), Violation> {
    let magnitude = match value {
        TypedValue::Int(i) => Some(*i as f64),
        TypedValue::Float(x) => Some(*x),
        TypedValue::String(s) => Some(s.chars().count() as f64),
        TypedValue::Bool(_) => None,
    };

    if let Some(actual) = magnitude {
        if let Some(min) = constraints.min {
            if actual < min {
                return Err(Violation::BelowMin { min, actual });
            }
        }
        if let Some(max) = constraints.max {
            if actual > max {
                return Err(Violation::AboveMax { max, actual });
            }
        }
    }

    if let (TypedValue::String(s), Some(allowed)) = (value, &constraints.allowed) {
        if !allowed.iter().any(|a| a == s) {
            return Err(Violation::NotAllowed {
                allowed: allowed.clone(),
            });
        }
    }

    Ok(())
}
