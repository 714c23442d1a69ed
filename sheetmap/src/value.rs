//! Typed cell values.
//!
//! - [`Value`] - A converted cell (or a resolved related entity)
//! - [`ColumnType`] - The target type tag of a column
//! - [`Values`] - Value-name to value map collected for one row
//! - [`Context`] - External constants supplied once per pipeline instance

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ConversionError;

/// Value-name to value map of one row.
pub type Values = BTreeMap<String, Value>;

// =============================================================================
// Column Type
// =============================================================================

/// Target type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    #[serde(alias = "string")]
    Str,
    #[serde(alias = "integer")]
    Int,
    Float,
    #[serde(alias = "boolean")]
    Bool,
    Date,
    DateTime,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Str => "string",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Date => "date",
            Self::DateTime => "datetime",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Value
// =============================================================================

/// A typed value extracted from a cell or a record.
///
/// `Null` is the "no value" sentinel: an empty numeric cell, or a lenient
/// conversion failure. It is distinct from zero and from the empty string.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    /// A nested entity, e.g. what a part resolver returned.
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// JSON form used to construct records with serde.
    ///
    /// Dates and datetimes use the ISO forms chrono's serde impls accept.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Str(s) => serde_json::Value::String(s.clone()),
            Self::Int(i) => serde_json::Value::Number((*i).into()),
            Self::Float(f) => Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            Self::DateTime(dt) => serde_json::Value::String(dt.to_rfc3339()),
            Self::Json(v) => v.clone(),
        }
    }

    /// Typed value of a serialized record attribute, read as `target`.
    pub fn from_json(json: &serde_json::Value, target: ColumnType) -> Result<Self, ConversionError> {
        use serde_json::Value as J;

        let mismatch = |expected: &str| {
            ConversionError::new(json.to_string(), target, format!("expected {}", expected))
        };

        match (target, json) {
            (_, J::Null) => Ok(Self::Null),

            (ColumnType::Str, J::String(s)) => Ok(Self::Str(s.clone())),
            (ColumnType::Str, J::Number(n)) => Ok(Self::Str(n.to_string())),
            (ColumnType::Str, J::Bool(b)) => Ok(Self::Str(b.to_string())),
            (ColumnType::Str, other) => Ok(Self::Json(other.clone())),

            (ColumnType::Int, J::Number(n)) => n.as_i64().map(Self::Int).ok_or_else(|| mismatch("an integer")),
            (ColumnType::Int, J::String(s)) => s.trim().parse().map(Self::Int).map_err(|_| mismatch("an integer")),

            (ColumnType::Float, J::Number(n)) => n.as_f64().map(Self::Float).ok_or_else(|| mismatch("a number")),
            (ColumnType::Float, J::String(s)) => s.trim().parse().map(Self::Float).map_err(|_| mismatch("a number")),

            (ColumnType::Bool, J::Bool(b)) => Ok(Self::Bool(*b)),

            (ColumnType::Date | ColumnType::DateTime, J::String(s)) => {
                parse_iso(s).ok_or_else(|| mismatch("an ISO date or datetime"))
            }

            (ColumnType::Int, _) => Err(mismatch("an integer")),
            (ColumnType::Float, _) => Err(mismatch("a number")),
            (ColumnType::Bool, _) => Err(mismatch("a boolean")),
            (ColumnType::Date | ColumnType::DateTime, _) => Err(mismatch("an ISO date or datetime")),
        }
    }
}

/// Parse the ISO forms chrono serializes: RFC 3339, naive datetime, date.
fn parse_iso(s: &str) -> Option<Value> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(Value::DateTime(dt));
    }
    if let Ok(naive) = s.parse::<NaiveDateTime>() {
        return Some(Value::DateTime(naive.and_utc().fixed_offset()));
    }
    s.parse::<NaiveDate>().ok().map(Value::Date)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Str(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::DateTime(dt) => f.write_str(&dt.to_rfc3339()),
            Self::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Self::DateTime(dt)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// JSON object built from a value map, ready for `serde_json::from_value`.
pub fn values_to_json(values: &Values) -> serde_json::Value {
    serde_json::Value::Object(
        values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

// =============================================================================
// Context
// =============================================================================

/// External constants threaded read-only through every hook call.
///
/// Supplied once per reader/writer; never global.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    constants: Values,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.constants.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.constants.get(key)
    }

    pub fn constants(&self) -> &Values {
        &self.constants
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_json_dates_use_iso_forms() {
        let d = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(Value::Date(d).to_json(), json!("2024-02-29"));

        let dt = DateTime::parse_from_rfc3339("2024-02-29T10:30:00+09:00").unwrap();
        assert_eq!(Value::DateTime(dt).to_json(), json!("2024-02-29T10:30:00+09:00"));
    }

    #[test]
    fn test_from_json_by_target() {
        assert_eq!(Value::from_json(&json!(42), ColumnType::Int).unwrap(), Value::Int(42));
        assert_eq!(Value::from_json(&json!(42), ColumnType::Str).unwrap(), Value::from("42"));
        assert_eq!(Value::from_json(&json!(1.5), ColumnType::Float).unwrap(), Value::Float(1.5));
        assert_eq!(Value::from_json(&json!(null), ColumnType::Bool).unwrap(), Value::Null);
        assert_eq!(
            Value::from_json(&json!("2024-01-02"), ColumnType::Date).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
        );
    }

    #[test]
    fn test_from_json_mismatch() {
        let err = Value::from_json(&json!("abc"), ColumnType::Int).unwrap_err();
        assert_eq!(err.target, ColumnType::Int);
        assert!(Value::from_json(&json!("yes"), ColumnType::Bool).is_err());
        assert!(Value::from_json(&json!("not a date"), ColumnType::Date).is_err());
    }

    #[test]
    fn test_naive_datetime_is_read_as_utc() {
        let v = Value::from_json(&json!("2024-01-02T03:04:05"), ColumnType::DateTime).unwrap();
        assert_eq!(v.to_json(), json!("2024-01-02T03:04:05+00:00"));
    }

    #[test]
    fn test_column_type_aliases() {
        let ty: ColumnType = serde_json::from_value(json!("integer")).unwrap();
        assert_eq!(ty, ColumnType::Int);
        let ty: ColumnType = serde_json::from_value(json!("datetime")).unwrap();
        assert_eq!(ty, ColumnType::DateTime);
    }

    #[test]
    fn test_context_constants() {
        let ctx = Context::new().with("user", "alice").with("limit", 10i64);
        assert_eq!(ctx.get("user"), Some(&Value::from("alice")));
        assert_eq!(ctx.get("limit"), Some(&Value::Int(10)));
        assert!(ctx.get("missing").is_none());
    }
}
