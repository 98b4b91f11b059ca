use std::collections::HashMap;
use std::fmt;

/// Largest integer the runtime can represent without losing precision.
pub const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

/// Values that can be bound as filter parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    /// JavaScript `null`.
    Null,
    /// A boolean value.
    Bool(bool),
    /// A 64-bit signed integer. Only values within [`MAX_SAFE_INTEGER`] can be bound.
    Int(i64),
    /// A 64-bit floating-point number.
    Float(f64),
    /// A UTF-8 string.
    String(String),
    /// An array of values.
    List(Vec<Value>),
    /// An object with string keys.
    Map(HashMap<String, Value>),
}

impl Value {
    /// Returns `true` if the value can be handed to the runtime without loss.
    ///
    /// Integers outside the safe range, at any depth, are the only values rejected.
    #[must_use]
    pub fn is_representable(&self) -> bool {
        match self {
            Value::Int(v) => (-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(v),
            Value::List(items) => items.iter().all(Value::is_representable),
            Value::Map(entries) => entries.values().all(Value::is_representable),
            Value::Null | Value::Bool(_) | Value::Float(_) | Value::String(_) => true,
        }
    }

    /// Short type name used in diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "\"{v}\""),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                // Sorted so the rendering is stable across runs.
                let mut keys: Vec<&String> = entries.keys().collect();
                keys.sort();
                write!(f, "{{")?;
                for (i, key) in keys.into_iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{key}\": {}", entries[key])?;
                }
                write!(f, "}}")
            }
        }
    }
}
