//! String to scalar coercion for frontmatter values.

use serde::{Deserialize, Serialize};
use serde_yaml::{Number, Value};
use std::fmt;

/// Scalar type a field is expected to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    Number,
    Boolean,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarKind::Number => write!(f, "number"),
            ScalarKind::Boolean => write!(f, "boolean"),
        }
    }
}

impl ScalarKind {
    /// Whether `value` already has this type.
    pub fn matches(self, value: &Value) -> bool {
        match self {
            ScalarKind::Number => value.is_number(),
            ScalarKind::Boolean => value.is_bool(),
        }
    }

    /// Coerce text to this type, or `None` if it doesn't parse.
    pub fn coerce(self, text: &str) -> Option<Value> {
        match self {
            ScalarKind::Number => coerce_number(text).map(Value::Number),
            ScalarKind::Boolean => coerce_boolean(text).map(Value::Bool),
        }
    }
}

pub fn coerce_boolean(text: &str) -> Option<bool> {
    match text.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

pub fn coerce_number(text: &str) -> Option<Number> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(n) = text.parse::<i64>() {
        return Some(Number::from(n));
    }
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() => Some(Number::from(f)),
        _ => None,
    }
}
