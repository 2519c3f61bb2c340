//! Tagged cell values and the conversions between them.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::config::{DATE_FORMATS, TIMESTAMP_FORMATS};
use crate::db::schema::SqlType;

/// Tokens read as missing values in delimited sources
const MISSING_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Returns true if a raw delimited field represents a missing value
pub fn is_missing(raw: &str) -> bool {
    MISSING_TOKENS.contains(&raw.trim())
}

/// A single cell value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
    Bool(bool),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The column type this value binds as when no column type is known
    ///
    /// NULL has no type of its own and binds as TEXT unless the caller knows
    /// the parameter type.
    pub fn natural_type(&self) -> SqlType {
        match self {
            Value::Null | Value::Text(_) => SqlType::Text,
            Value::Int(_) => SqlType::BigInt,
            Value::Float(_) => SqlType::DoublePrecision,
            Value::Timestamp(_) => SqlType::Timestamp,
            Value::Bool(_) => SqlType::Boolean,
        }
    }

    /// Short rendering used in error messages
    pub fn describe(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Int(v) => format!("integer {}", v),
            Value::Float(v) => format!("float {}", v),
            Value::Text(s) => {
                if s.chars().count() > 40 {
                    let head: String = s.chars().take(40).collect();
                    format!("text '{}...'", head)
                } else {
                    format!("text '{}'", s)
                }
            }
            Value::Timestamp(ts) => format!("timestamp {}", ts),
            Value::Bool(b) => format!("boolean {}", b),
        }
    }

    /// Whether this value can be written into a column of `sql_type` as-is
    pub fn fits(&self, sql_type: SqlType) -> bool {
        matches!(
            (self, sql_type),
            (Value::Null, _)
                | (Value::Int(_), SqlType::BigInt | SqlType::DoublePrecision)
                | (Value::Float(_), SqlType::DoublePrecision)
                | (Value::Text(_), SqlType::Text)
                | (Value::Timestamp(_), SqlType::Timestamp)
                | (Value::Bool(_), SqlType::Boolean)
        )
    }

    /// Parse a raw delimited field as a value of `sql_type`
    ///
    /// Missing tokens become `Null`. Returns `None` if the text does not parse.
    pub fn parse_as(raw: &str, sql_type: SqlType) -> Option<Value> {
        if is_missing(raw) {
            return Some(Value::Null);
        }
        let trimmed = raw.trim();
        match sql_type {
            SqlType::BigInt => trimmed.parse().ok().map(Value::Int),
            SqlType::DoublePrecision => trimmed.parse().ok().map(Value::Float),
            SqlType::Boolean => parse_bool(trimmed).map(Value::Bool),
            SqlType::Timestamp => parse_timestamp(trimmed).map(Value::Timestamp),
            SqlType::Text => Some(Value::Text(raw.to_string())),
        }
    }

    /// Convert this value to `target`, following dataframe cast semantics
    ///
    /// Returns `None` when the conversion would lose information (a fractional
    /// float cast to an integer) or the source cannot be interpreted.
    pub fn coerce(self, target: SqlType) -> Option<Value> {
        match (self, target) {
            (Value::Null, _) => Some(Value::Null),

            (Value::Int(v), SqlType::BigInt) => Some(Value::Int(v)),
            (Value::Float(v), SqlType::BigInt) => float_to_int(v),
            (Value::Bool(b), SqlType::BigInt) => Some(Value::Int(b as i64)),
            (Value::Text(s), SqlType::BigInt) => s.trim().parse().ok().map(Value::Int),

            (Value::Int(v), SqlType::DoublePrecision) => Some(Value::Float(v as f64)),
            (Value::Float(v), SqlType::DoublePrecision) => Some(Value::Float(v)),
            (Value::Bool(b), SqlType::DoublePrecision) => {
                Some(Value::Float(if b { 1.0 } else { 0.0 }))
            }
            (Value::Text(s), SqlType::DoublePrecision) => s.trim().parse().ok().map(Value::Float),

            (Value::Text(s), SqlType::Text) => Some(Value::Text(s)),
            (Value::Int(v), SqlType::Text) => Some(Value::Text(v.to_string())),
            (Value::Float(v), SqlType::Text) => Some(Value::Text(format_float(v))),
            (Value::Bool(b), SqlType::Text) => {
                Some(Value::Text(if b { "True" } else { "False" }.to_string()))
            }
            (Value::Timestamp(ts), SqlType::Text) => {
                Some(Value::Text(ts.format("%Y-%m-%d %H:%M:%S").to_string()))
            }

            (Value::Timestamp(ts), SqlType::Timestamp) => Some(Value::Timestamp(ts)),
            (Value::Text(s), SqlType::Timestamp) => parse_timestamp(s.trim()).map(Value::Timestamp),
            (Value::Int(v), SqlType::Timestamp) => {
                Some(Value::Timestamp(DateTime::from_timestamp_nanos(v).naive_utc()))
            }
            (Value::Float(v), SqlType::Timestamp) => {
                if v.is_nan() {
                    Some(Value::Null)
                } else {
                    float_to_int(v).and_then(|i| i.coerce(SqlType::Timestamp))
                }
            }

            (Value::Bool(b), SqlType::Boolean) => Some(Value::Bool(b)),
            (Value::Int(v), SqlType::Boolean) => Some(Value::Bool(v != 0)),
            (Value::Text(s), SqlType::Boolean) => parse_bool(s.trim()).map(Value::Bool),

            _ => None,
        }
    }
}

fn float_to_int(v: f64) -> Option<Value> {
    if v.is_nan() {
        return Some(Value::Null);
    }
    if v.fract() != 0.0 || v < i64::MIN as f64 || v >= i64::MAX as f64 {
        return None;
    }
    Some(Value::Int(v as i64))
}

/// Render a float the way the source dataframe library does (`1.0`, not `1`)
fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 {
        format!("{:.1}", v)
    } else {
        v.to_string()
    }
}

/// Parse boolean value
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "True" | "TRUE" | "true" | "t" | "1" => Some(true),
        "False" | "FALSE" | "false" | "f" | "0" => Some(false),
        _ => None,
    }
}

/// Parse a timestamp using the supported layouts
///
/// Values carrying an offset (RFC 3339) are normalised to UTC.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Some(ts);
        }
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.naive_utc());
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_float_to_integer_requires_integral_values() {
        assert_eq!(Value::Float(2.0).coerce(SqlType::BigInt), Some(Value::Int(2)));
        assert_eq!(Value::Float(f64::NAN).coerce(SqlType::BigInt), Some(Value::Null));
        assert_eq!(Value::Float(2.5).coerce(SqlType::BigInt), None);
        assert_eq!(Value::Float(1e300).coerce(SqlType::BigInt), None);
    }

    #[test]
    fn test_text_coercions() {
        assert_eq!(
            Value::Text(" 42 ".into()).coerce(SqlType::BigInt),
            Some(Value::Int(42))
        );
        assert_eq!(Value::Text("abc".into()).coerce(SqlType::DoublePrecision), None);
        assert_eq!(
            Value::Float(3.0).coerce(SqlType::Text),
            Some(Value::Text("3.0".into()))
        );
        assert_eq!(
            Value::Float(3.25).coerce(SqlType::Text),
            Some(Value::Text("3.25".into()))
        );
        assert_eq!(
            Value::Bool(true).coerce(SqlType::Text),
            Some(Value::Text("True".into()))
        );
    }

    #[test]
    fn test_timestamp_coercions() {
        assert_eq!(
            Value::Text("2025-11-01 08:15:00".into()).coerce(SqlType::Timestamp),
            Some(Value::Timestamp(ts("2025-11-01 08:15:00")))
        );
        assert_eq!(
            Value::Text("2025-11-01T08:15:00+01:00".into()).coerce(SqlType::Timestamp),
            Some(Value::Timestamp(ts("2025-11-01 07:15:00")))
        );
        assert_eq!(
            Value::Text("2025-11-01".into()).coerce(SqlType::Timestamp),
            Some(Value::Timestamp(ts("2025-11-01 00:00:00")))
        );
        // Integers are nanoseconds since the epoch
        assert_eq!(
            Value::Int(1_000_000_000).coerce(SqlType::Timestamp),
            Some(Value::Timestamp(ts("1970-01-01 00:00:01")))
        );
        assert_eq!(Value::Text("yesterday".into()).coerce(SqlType::Timestamp), None);
        assert_eq!(Value::Bool(true).coerce(SqlType::Timestamp), None);
    }

    #[test]
    fn test_null_survives_every_target() {
        for target in [
            SqlType::BigInt,
            SqlType::DoublePrecision,
            SqlType::Text,
            SqlType::Timestamp,
            SqlType::Boolean,
        ] {
            assert_eq!(Value::Null.coerce(target), Some(Value::Null));
        }
    }

    #[test]
    fn test_parse_as() {
        assert_eq!(Value::parse_as("7", SqlType::BigInt), Some(Value::Int(7)));
        assert_eq!(Value::parse_as("N/A", SqlType::Text), Some(Value::Null));
        assert_eq!(Value::parse_as("", SqlType::BigInt), Some(Value::Null));
        assert_eq!(Value::parse_as("x7", SqlType::BigInt), None);
        assert_eq!(
            Value::parse_as("Boro Zone", SqlType::Text),
            Some(Value::Text("Boro Zone".into()))
        );
    }

    #[test]
    fn test_fits() {
        assert!(Value::Int(1).fits(SqlType::DoublePrecision));
        assert!(Value::Null.fits(SqlType::Timestamp));
        assert!(!Value::Text("1".into()).fits(SqlType::BigInt));
        assert!(!Value::Float(1.0).fits(SqlType::BigInt));
    }
}
