//! Conversion rules between raw cell strings and typed values.
//!
//! Both directions are driven by [`Options`]:
//!
//! ```text
//!  "yes" ──string_to_typed(Bool)──▶ Bool(true) ──typed_to_string(Bool)──▶ "yes"
//!  ""    ──string_to_typed(Int)───▶ Null       ──typed_to_string(Int)───▶ default_if_none
//! ```

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use std::fmt::{Display, Write};

use crate::error::ConversionError;
use crate::options::Options;
use crate::value::{ColumnType, Value};

impl Options {
    /// Convert a raw value read from a cell into `target`.
    ///
    /// Non-string values (static constants) pass through untouched, as does
    /// everything when `auto_convert` is off. Empty numeric cells and numeric
    /// cells equal to `default_if_none` become [`Value::Null`]; blank bool and
    /// date cells go through the conversion failure policy.
    pub fn string_to_typed(&self, raw: &Value, target: ColumnType) -> Result<Value, ConversionError> {
        let s = match raw {
            Value::Str(s) if self.auto_convert && target != ColumnType::Str => s,
            other => return Ok(other.clone()),
        };

        let numeric = matches!(target, ColumnType::Int | ColumnType::Float);
        if numeric && (s.is_empty() || *s == self.default_if_none) {
            return Ok(Value::Null);
        }

        let converted = match target {
            ColumnType::Str => return Ok(raw.clone()),
            ColumnType::Int => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| ConversionError::new(s.as_str(), target, e.to_string())),
            ColumnType::Float => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| ConversionError::new(s.as_str(), target, e.to_string())),
            ColumnType::Bool => self.parse_bool(s),
            ColumnType::Date | ColumnType::DateTime => self.parse_temporal(s, target),
        };

        match converted {
            Err(_) if self.return_none_if_convert_fail => Ok(Value::Null),
            other => other,
        }
    }

    /// Render a typed value for a column of type `target`.
    pub fn typed_to_string(&self, value: &Value, target: ColumnType) -> Result<String, ConversionError> {
        if value.is_null() {
            return Ok(self.default_if_none.clone());
        }
        if !self.auto_convert || target == ColumnType::Str {
            return Ok(value.to_string());
        }

        match (target, value) {
            (_, Value::Str(s)) => Ok(s.clone()),

            (ColumnType::Bool, Value::Bool(b)) => Ok(if *b {
                self.show_true.clone()
            } else {
                self.show_false.clone()
            }),
            (ColumnType::Bool, other) => Err(ConversionError::new(other.to_string(), target, "not a boolean")),

            (ColumnType::DateTime, Value::DateTime(dt)) => {
                let dt = dt.with_timezone(&self.time_zone.unwrap_or_else(|| Utc.fix()));
                render(dt.format(&self.datetime_format), value, target)
            }
            (ColumnType::DateTime, other) => Err(ConversionError::new(other.to_string(), target, "not a datetime")),

            (ColumnType::Date, Value::Date(d)) => render(d.format(&self.date_format), value, target),
            (ColumnType::Date, Value::DateTime(dt)) => render(dt.format(&self.date_format), value, target),
            (ColumnType::Date, other) => Err(ConversionError::new(other.to_string(), target, "not a date")),

            (_, other) => Ok(other.to_string()),
        }
    }

    fn parse_bool(&self, s: &str) -> Result<Value, ConversionError> {
        if self.as_true.iter().any(|t| t == s) {
            Ok(Value::Bool(true))
        } else if self.as_false.iter().any(|f| f == s) {
            Ok(Value::Bool(false))
        } else {
            Err(ConversionError::new(
                s,
                ColumnType::Bool,
                "not in `as_true` nor in `as_false`",
            ))
        }
    }

    /// Datetime format first, then date-only format.
    fn parse_temporal(&self, s: &str, target: ColumnType) -> Result<Value, ConversionError> {
        if let Some(dt) = self.parse_datetime(s) {
            return Ok(Value::DateTime(dt));
        }

        NaiveDate::parse_from_str(s, &self.date_format)
            .map(Value::Date)
            .map_err(|_| {
                ConversionError::new(
                    s,
                    target,
                    format!(
                        "matches neither `{}` nor `{}`",
                        self.datetime_format, self.date_format
                    ),
                )
            })
    }

    fn parse_datetime(&self, s: &str) -> Option<DateTime<FixedOffset>> {
        // Formats carrying an offset (`%z`) parse as aware datetimes.
        if let Ok(aware) = DateTime::parse_from_str(s, &self.datetime_format) {
            return Some(match self.time_zone {
                Some(tz) => aware.with_timezone(&tz),
                None => aware,
            });
        }

        let naive = NaiveDateTime::parse_from_str(s, &self.datetime_format).ok()?;
        let tz = self.time_zone.unwrap_or_else(|| Utc.fix());
        tz.from_local_datetime(&naive).single()
    }
}

/// Format without panicking on a malformed format string.
fn render(formatted: impl Display, value: &Value, target: ColumnType) -> Result<String, ConversionError> {
    let mut out = String::new();
    write!(out, "{}", formatted)
        .map_err(|_| ConversionError::new(value.to_string(), target, "invalid format string"))?;
    Ok(out)
}
