use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::TypeError;

/// Primary-key value of a resource item.
///
/// Servers hand out keys as either JSON strings or JSON numbers, and callers
/// mix both forms freely (`5` and `"5"` name the same item). A `ResourceId`
/// stores the canonical text form so both spellings hash and compare equal.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Build an id from a JSON value. Only strings and numbers are keys.
    pub fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::String(s) => Ok(Self(s.clone())),
            Value::Number(n) => Ok(Self(number_key(n))),
            other => Err(TypeError::InvalidId {
                actual: value_kind(other),
            }),
        }
    }

    /// The canonical text form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if `value` is a key equal to this id.
    pub fn matches(&self, value: &Value) -> bool {
        match value {
            Value::String(s) => *s == self.0,
            Value::Number(n) => number_key(n) == self.0,
            _ => false,
        }
    }
}

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId({})", self.0)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<i64> for ResourceId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

impl From<u64> for ResourceId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl From<i32> for ResourceId {
    fn from(n: i32) -> Self {
        Self(n.to_string())
    }
}

/// Text form of a numeric key. Whole floats collapse onto the integer
/// spelling so `5.0` and `5` name the same item.
fn number_key(n: &Number) -> String {
    if n.is_f64() {
        if let Some(f) = n.as_f64().filter(|f| f.is_finite() && f.fract() == 0.0) {
            if f >= i64::MIN as f64 && f < i64::MAX as f64 {
                return (f as i64).to_string();
            }
            if f >= 0.0 && f < u64::MAX as f64 {
                return (f as u64).to_string();
            }
        }
    }
    n.to_string()
}

/// Human-readable name of a JSON value's kind, used in argument errors.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
