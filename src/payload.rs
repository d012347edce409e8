//! ==============================================================================
//! payload.rs - one reporting cycle's merged sensor data
//! ==============================================================================
//!
//! purpose:
//!     a PayloadTree is an ordered nested map of string keys to numbers, strings
//!     or further trees. it is built fresh every base tick by the assembler and
//!     then handed (behind an Arc) to every sink that fires on that tick.
//!
//!     leaves are always in the sensor's native unit. conversion is the
//!     projector's job, so the same tree can feed sinks with different units.
//!
//! wire shape (telemetry topic), e.g.:
//!
//!     {
//!       "temperature": { "measurement": 18.2, "units": "C" },
//!       "humidity":    { "measurement": 61.0, "units": "%" },
//!       "pressure":    { "measurement": 1013.2, "units": "hPa" },
//!       "wind":        { "direction": "WSW", "average": 9.4, "gust": 14.1, "units": "km/h" },
//!       "rain_hr":     { "measurement": 0.0, "units": "in" },
//!       "rain_day":    { "measurement": 0.22, "units": "in" }
//!     }
//!
//! relationships:
//!     - built by: assembler.rs
//!     - read by: projector.rs, sinks/telemetry.rs (serialized as-is)
//!
//! ==============================================================================

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// a leaf value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
}

impl Scalar {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(v) => Some(*v),
            Scalar::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            Scalar::Number(_) => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(v) => write!(f, "{}", v),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

/// a node in the tree: either a leaf or a nested tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadValue {
    Number(f64),
    Text(String),
    Tree(PayloadTree),
}

impl PayloadValue {
    pub fn as_tree(&self) -> Option<&PayloadTree> {
        match self {
            PayloadValue::Tree(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            PayloadValue::Number(v) => Some(Scalar::Number(*v)),
            PayloadValue::Text(s) => Some(Scalar::Text(s.clone())),
            PayloadValue::Tree(_) => None,
        }
    }
}

impl From<f64> for PayloadValue {
    fn from(v: f64) -> Self {
        PayloadValue::Number(v)
    }
}

impl From<&str> for PayloadValue {
    fn from(s: &str) -> Self {
        PayloadValue::Text(s.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(s: String) -> Self {
        PayloadValue::Text(s)
    }
}

impl From<PayloadTree> for PayloadValue {
    fn from(t: PayloadTree) -> Self {
        PayloadValue::Tree(t)
    }
}

/// ordered nested record, keys keep insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayloadTree {
    entries: IndexMap<String, PayloadValue>,
}

impl PayloadTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// `{ "measurement": value, "units": units }`, the shape every scalar
    /// sensor section uses
    pub fn measurement(value: f64, units: &str) -> Self {
        Self::new().with("measurement", value).with("units", units)
    }

    /// builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PayloadValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PayloadValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&PayloadValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// shallow union: top-level keys of `other` are added (or replace) here
    pub fn merge(&mut self, other: PayloadTree) {
        self.entries.extend(other.entries);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
