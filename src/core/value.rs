//! Attribute values - open-ended key/value bags
//!
//! Entities and relationships carry `attributes`: arbitrary domain metadata
//! without a fixed schema. Keys are kept in a `BTreeMap` so serialized
//! documents have a stable key order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FieldError;

/// Ordered attribute map
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A single attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<AttributeValue>),
    Map(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view (ints widen to f64)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(i) => Some(*i as f64),
            AttributeValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// False when a float anywhere in the value is NaN or infinite
    ///
    /// JSON has no encoding for those, so they would be written as `null`
    /// and the document could not be read back.
    pub fn is_finite(&self) -> bool {
        match self {
            AttributeValue::Float(x) => x.is_finite(),
            AttributeValue::List(items) => items.iter().all(AttributeValue::is_finite),
            AttributeValue::Map(map) => map.values().all(AttributeValue::is_finite),
            _ => true,
        }
    }

    /// Loose equality used by attribute filters: numbers compare by value
    pub fn matches(&self, other: &AttributeValue) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }
}

/// Reject non-finite numbers, reporting `attributes.<key>`
pub fn check_attributes(attrs: &Attributes, errors: &mut Vec<FieldError>) {
    for (key, value) in attrs {
        if !value.is_finite() {
            errors.push(FieldError::new(
                format!("attributes.{}", key),
                "numbers must be finite",
            ));
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::Float(x) => write!(f, "{}", x),
            AttributeValue::String(s) => write!(f, "{}", s),
            other => match serde_json::to_string(other) {
                Ok(json) => write!(f, "{}", json),
                Err(_) => write!(f, "<unprintable>"),
            },
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(s)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Bool(b)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        AttributeValue::Int(i)
    }
}

impl From<f64> for AttributeValue {
    fn from(x: f64) -> Self {
        AttributeValue::Float(x)
    }
}

impl<T: Into<AttributeValue>> From<Vec<T>> for AttributeValue {
    fn from(items: Vec<T>) -> Self {
        AttributeValue::List(items.into_iter().map(Into::into).collect())
    }
}
