//! Schema options.
//!
//! Options are plain serde data so they can be declared in code or loaded
//! from JSON. Unknown keys are rejected with [`SchemaError::UnknownOption`].

use chrono::FixedOffset;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{SchemaError, SchemaResult};

/// How rendering treats positions with no contributing column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlankFill {
    /// Insert an empty string at each gap.
    #[default]
    Empty,
    /// Leave gaps out, shrinking the row.
    Omit,
}

/// Configuration of one schema: modes, conversion rules and layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Allow building a reader.
    pub read_mode: bool,

    /// Allow building a writer.
    pub write_mode: bool,

    /// chrono format tried first for date and datetime cells.
    pub datetime_format: String,

    /// chrono format tried when the datetime format does not match.
    pub date_format: String,

    /// Zone datetimes are normalized into, as a fixed UTC offset (`+09:00`).
    #[serde(
        serialize_with = "serialize_offset",
        deserialize_with = "deserialize_offset"
    )]
    pub time_zone: Option<FixedOffset>,

    /// Label written for `true`.
    pub show_true: String,

    /// Label written for `false`.
    pub show_false: String,

    /// Cells read as `true`.
    pub as_true: Vec<String>,

    /// Cells read as `false`.
    pub as_false: Vec<String>,

    /// Convert between strings and column types at all.
    pub auto_convert: bool,

    /// Substitute the "no value" sentinel instead of failing a conversion.
    pub return_none_if_convert_fail: bool,

    /// Assign free positions to columns declared without one.
    pub auto_assign: bool,

    /// Gap policy when rendering rows and headers.
    pub blank_fill: BlankFill,

    /// String written for "no value", and read back as "no value".
    pub default_if_none: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            read_mode: true,
            write_mode: true,
            datetime_format: "%Y-%m-%d %H:%M:%S".to_string(),
            date_format: "%Y-%m-%d".to_string(),
            time_zone: None,
            show_true: "yes".to_string(),
            show_false: "no".to_string(),
            as_true: vec!["yes".to_string(), "Yes".to_string()],
            as_false: vec!["no".to_string(), "No".to_string()],
            auto_convert: true,
            return_none_if_convert_fail: false,
            auto_assign: false,
            blank_fill: BlankFill::Empty,
            default_if_none: String::new(),
        }
    }
}

impl Options {
    /// Parse options from a JSON string.
    pub fn from_json(json: &str) -> SchemaResult<Self> {
        serde_json::from_str(json).map_err(schema_error_from_json)
    }

    /// Parse options from a JSON value.
    pub fn from_value(value: serde_json::Value) -> SchemaResult<Self> {
        serde_json::from_value(value).map_err(schema_error_from_json)
    }

    pub fn read_mode(mut self, enabled: bool) -> Self {
        self.read_mode = enabled;
        self
    }

    pub fn write_mode(mut self, enabled: bool) -> Self {
        self.write_mode = enabled;
        self
    }

    pub fn datetime_format(mut self, format: impl Into<String>) -> Self {
        self.datetime_format = format.into();
        self
    }

    pub fn date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = format.into();
        self
    }

    pub fn time_zone(mut self, offset: FixedOffset) -> Self {
        self.time_zone = Some(offset);
        self
    }

    pub fn show_bool(mut self, show_true: impl Into<String>, show_false: impl Into<String>) -> Self {
        self.show_true = show_true.into();
        self.show_false = show_false.into();
        self
    }

    pub fn as_true<I, S>(mut self, literals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.as_true = literals.into_iter().map(Into::into).collect();
        self
    }

    pub fn as_false<I, S>(mut self, literals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.as_false = literals.into_iter().map(Into::into).collect();
        self
    }

    pub fn auto_convert(mut self, enabled: bool) -> Self {
        self.auto_convert = enabled;
        self
    }

    pub fn return_none_if_convert_fail(mut self, enabled: bool) -> Self {
        self.return_none_if_convert_fail = enabled;
        self
    }

    pub fn auto_assign(mut self, enabled: bool) -> Self {
        self.auto_assign = enabled;
        self
    }

    pub fn blank_fill(mut self, policy: BlankFill) -> Self {
        self.blank_fill = policy;
        self
    }

    pub fn default_if_none(mut self, value: impl Into<String>) -> Self {
        self.default_if_none = value.into();
        self
    }
}

/// Map a serde error to the schema error taxonomy.
pub(crate) fn schema_error_from_json(err: serde_json::Error) -> SchemaError {
    let message = err.to_string();
    if let Some(rest) = message.strip_prefix("unknown field `") {
        if let Some(end) = rest.find('`') {
            return SchemaError::UnknownOption(rest[..end].to_string());
        }
    }
    SchemaError::InvalidOption(message)
}

/// Parse `Z`, `UTC`, `+09:00`, `-0530` or `+09`.
pub fn parse_utc_offset(s: &str) -> Option<FixedOffset> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn serialize_offset<S: Serializer>(offset: &Option<FixedOffset>, serializer: S) -> Result<S::Ok, S::Error> {
    match offset {
        Some(o) => serializer.serialize_some(&o.to_string()),
        None => serializer.serialize_none(),
    }
}

fn deserialize_offset<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<FixedOffset>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) => parse_utc_offset(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("`{}` is not a UTC offset", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = Options::default();
        assert!(opts.read_mode && opts.write_mode);
        assert_eq!(opts.datetime_format, "%Y-%m-%d %H:%M:%S");
        assert_eq!(opts.as_true, vec!["yes", "Yes"]);
        assert_eq!(opts.blank_fill, BlankFill::Empty);
        assert!(!opts.auto_assign);
    }

    #[test]
    fn test_from_json_partial() {
        let opts = Options::from_json(r#"{"auto_assign": true, "blank_fill": "omit", "time_zone": "+09:00"}"#).unwrap();
        assert!(opts.auto_assign);
        assert_eq!(opts.blank_fill, BlankFill::Omit);
        assert_eq!(opts.time_zone, FixedOffset::east_opt(9 * 3600));
        assert_eq!(opts.show_true, "yes");
    }

    #[test]
    fn test_unknown_option_is_schema_error() {
        let err = Options::from_json(r#"{"auto_asign": true}"#).unwrap_err();
        assert_eq!(err, SchemaError::UnknownOption("auto_asign".into()));
    }

    #[test]
    fn test_literal_set_must_be_a_list() {
        let err = Options::from_json(r#"{"as_true": "yes"}"#).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidOption(_)));
    }

    #[test]
    fn test_parse_utc_offset() {
        assert_eq!(parse_utc_offset("Z"), FixedOffset::east_opt(0));
        assert_eq!(parse_utc_offset("-05:30"), FixedOffset::east_opt(-(5 * 3600 + 30 * 60)));
        assert_eq!(parse_utc_offset("+0900"), FixedOffset::east_opt(9 * 3600));
        assert_eq!(parse_utc_offset("+09"), FixedOffset::east_opt(9 * 3600));
        assert!(parse_utc_offset("Tokyo").is_none());
        assert!(parse_utc_offset("+09:75").is_none());
    }

    #[test]
    fn test_offset_roundtrips_through_json() {
        let opts = Options::default().time_zone(FixedOffset::east_opt(-3600).unwrap());
        let json = serde_json::to_string(&opts).unwrap();
        assert_eq!(Options::from_json(&json).unwrap(), opts);
    }
}
