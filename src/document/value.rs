//! Typed leaf values

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schema::LeafKind;

/// Scalar value held by a document leaf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Number(f64),
    String(String),
    StringArray(Vec<String>),
}

impl Value {
    pub fn string_array<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::StringArray(items.into_iter().map(Into::into).collect())
    }

    pub fn kind(&self) -> LeafKind {
        match self {
            Value::Boolean(_) => LeafKind::Boolean,
            Value::Number(_) => LeafKind::Number,
            Value::String(_) => LeafKind::String,
            Value::StringArray(_) => LeafKind::StringArray,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert to JSON. Integral numbers are written without a fraction.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::StringArray(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|s| serde_json::Value::String(s.clone()))
                    .collect(),
            ),
        }
    }

    /// Read a JSON value as `kind`; `None` if the JSON has another shape.
    pub fn from_json(kind: LeafKind, json: &serde_json::Value) -> Option<Self> {
        match (kind, json) {
            (LeafKind::Boolean, serde_json::Value::Bool(b)) => Some(Value::Boolean(*b)),
            (LeafKind::Number, serde_json::Value::Number(n)) => n.as_f64().map(Value::Number),
            (LeafKind::String, serde_json::Value::String(s)) => Some(Value::String(s.clone())),
            (LeafKind::StringArray, serde_json::Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(Value::StringArray),
            _ => None,
        }
    }

    /// Parse user-entered text as `kind`.
    ///
    /// String arrays accept a JSON array or comma-separated items.
    pub fn from_text(kind: LeafKind, text: &str) -> Option<Self> {
        match kind {
            LeafKind::String => Some(Value::String(text.to_string())),
            LeafKind::Number => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(Value::Number),
            LeafKind::Boolean => match text.trim() {
                "true" => Some(Value::Boolean(true)),
                "false" => Some(Value::Boolean(false)),
                _ => None,
            },
            LeafKind::StringArray => {
                let trimmed = text.trim();
                if trimmed.starts_with('[') {
                    serde_json::from_str::<Vec<String>>(trimmed)
                        .ok()
                        .map(Value::StringArray)
                } else if trimmed.is_empty() {
                    Some(Value::StringArray(Vec::new()))
                } else {
                    Some(Value::string_array(trimmed.split(',').map(str::trim)))
                }
            }
        }
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        serde_json::Value::Number((n as i64).into())
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
                write!(f, "{}", *n as i64)
            }
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => f.write_str(s),
            Value::StringArray(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u16> for Value {
    fn from(n: u16) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::StringArray(items)
    }
}

impl From<Vec<&str>> for Value {
    fn from(items: Vec<&str>) -> Self {
        Value::string_array(items)
    }
}
