//! Core types for Synheart Sync
//!
//! This module defines the values that flow from the provider payloads into
//! the persisted table: scalar field values, flat records and activity
//! summaries.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

/// Upsert key column shared by every record in a table
pub const DATE_COLUMN: &str = "Date";

/// Value written for a metric that could not be fetched or extracted
pub const NOT_AVAILABLE: &str = "N/A";

/// A single scalar cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
}

impl FieldValue {
    /// The "not available" sentinel
    pub fn not_available() -> Self {
        FieldValue::Text(NOT_AVAILABLE.to_string())
    }

    /// Build a number, storing integral values without a fractional part
    pub fn from_f64(value: f64) -> Option<Self> {
        if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            return Some(FieldValue::Number(Number::from(value as i64)));
        }
        Number::from_f64(value).map(FieldValue::Number)
    }

    /// Convert a JSON scalar; returns `None` for arrays and objects
    pub fn from_scalar(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(FieldValue::Null),
            Value::Bool(b) => Some(FieldValue::Bool(*b)),
            Value::Number(n) => Some(FieldValue::Number(n.clone())),
            Value::String(s) => Some(FieldValue::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Parse a CSV cell back into a typed value
    pub fn parse_cell(cell: &str) -> Self {
        match cell {
            "" => FieldValue::Null,
            "true" => FieldValue::Bool(true),
            "false" => FieldValue::Bool(false),
            _ => match serde_json::from_str::<Number>(cell) {
                Ok(n) => FieldValue::Number(n),
                Err(_) => FieldValue::Text(cell.to_string()),
            },
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Number(Number::from(v))
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Number(Number::from(v))
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

/// Single-level mapping from dotted keys to scalar values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlatRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl FlatRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The `Date` value, when present as text
    pub fn date(&self) -> Option<&str> {
        self.get(DATE_COLUMN).and_then(FieldValue::as_str)
    }
}

impl FromIterator<(String, FieldValue)> for FlatRecord {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for FlatRecord {
    type Item = (String, FieldValue);
    type IntoIter = btree_map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// One activity that started on the reported date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySummary {
    /// Local start timestamp as reported by the provider
    pub start_time_local: String,
    /// Activity type key (e.g., "running")
    pub type_key: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Duration (minutes)
    pub duration_minutes: Option<f64>,
    /// Calories burned
    pub calories: Option<f64>,
}
