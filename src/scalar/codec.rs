use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;
use crate::core::{ColumnType, DbError, Result, Value, parse_date, parse_time, parse_timestamp};

/// String and wire conversions for one scalar type.
///
/// `parse` reads filter parameters and form-style updates, `decode` reads
/// request bodies, `encode` renders values for responses.
#[derive(Clone, Copy)]
pub struct WireCodec {
    pub parse: fn(&str) -> Result<Value>,
    pub decode: fn(&JsonValue) -> Result<Value>,
    pub encode: fn(&Value) -> JsonValue,
}

impl std::fmt::Debug for WireCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WireCodec")
    }
}

impl WireCodec {
    pub fn new(
        parse: fn(&str) -> Result<Value>,
        decode: fn(&JsonValue) -> Result<Value>,
        encode: fn(&Value) -> JsonValue,
    ) -> Self {
        Self {
            parse,
            decode,
            encode,
        }
    }

    /// The standard codec for values stored in a column of `column_type`.
    pub fn for_column(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Uuid => Self::new(parse_uuid, decode_uuid, encode_value),
            ColumnType::Text => Self::new(parse_text, decode_text, encode_value),
            ColumnType::Boolean => Self::new(parse_bool, decode_bool, encode_value),
            ColumnType::Integer => Self::new(parse_i32, decode_i32, encode_value),
            ColumnType::BigInt => Self::new(parse_i64, decode_i64, encode_value),
            ColumnType::Real => Self::new(parse_f32, decode_f32, encode_value),
            ColumnType::Double => Self::new(parse_f64, decode_f64, encode_value),
            ColumnType::Date => Self::new(parse_date_value, decode_date, encode_value),
            ColumnType::Time => Self::new(parse_time_value, decode_time, encode_value),
            ColumnType::Timestamp => {
                Self::new(parse_timestamp_value, decode_timestamp, encode_value)
            }
        }
    }
}

fn type_mismatch(expected: &str, got: &JsonValue) -> DbError {
    DbError::TypeMismatch(format!("Cannot convert JSON {} to {}", got, expected))
}

fn parse_error(expected: &str, raw: &str) -> DbError {
    DbError::ParseError(format!("Cannot parse '{}' as {}", raw, expected))
}

/// Renders any value in its wire form: numbers and booleans natively,
/// everything else as ISO / canonical strings.
pub fn encode_value(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Integer(i) => JsonValue::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::Boolean(b) => JsonValue::Bool(*b),
        Value::Text(s) => JsonValue::String(s.clone()),
        Value::Uuid(_) | Value::Date(_) | Value::Time(_) | Value::Timestamp(_) => {
            JsonValue::String(value.to_string())
        }
    }
}

pub fn parse_uuid(raw: &str) -> Result<Value> {
    uuid::Uuid::parse_str(raw.trim())
        .map(Value::Uuid)
        .map_err(|_| parse_error("UUID", raw))
}

fn decode_uuid(json: &JsonValue) -> Result<Value> {
    match json {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::String(s) => parse_uuid(s),
        other => Err(type_mismatch("UUID", other)),
    }
}

pub fn parse_text(raw: &str) -> Result<Value> {
    Ok(Value::Text(raw.to_string()))
}

fn decode_text(json: &JsonValue) -> Result<Value> {
    match json {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::String(s) => Ok(Value::Text(s.clone())),
        JsonValue::Number(n) => Ok(Value::Text(n.to_string())),
        JsonValue::Bool(b) => Ok(Value::Text(b.to_string())),
        other => Err(type_mismatch("TEXT", other)),
    }
}

pub fn parse_bool(raw: &str) -> Result<Value> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "1" => Ok(Value::Boolean(true)),
        "false" | "off" | "0" | "" => Ok(Value::Boolean(false)),
        _ => Err(parse_error("BOOLEAN", raw)),
    }
}

fn decode_bool(json: &JsonValue) -> Result<Value> {
    match json {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::Bool(b) => Ok(Value::Boolean(*b)),
        JsonValue::String(s) => parse_bool(s),
        other => Err(type_mismatch("BOOLEAN", other)),
    }
}

pub fn parse_i32(raw: &str) -> Result<Value> {
    raw.trim()
        .parse::<i32>()
        .map(Value::from)
        .map_err(|_| parse_error("INTEGER", raw))
}

fn decode_i32(json: &JsonValue) -> Result<Value> {
    match json {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::Number(n) => n
            .as_i64()
            .and_then(|i| i32::try_from(i).ok())
            .map(Value::from)
            .ok_or_else(|| type_mismatch("INTEGER", json)),
        JsonValue::String(s) => parse_i32(s),
        other => Err(type_mismatch("INTEGER", other)),
    }
}

pub fn parse_i64(raw: &str) -> Result<Value> {
    raw.trim()
        .parse::<i64>()
        .map(Value::Integer)
        .map_err(|_| parse_error("BIGINT", raw))
}

fn decode_i64(json: &JsonValue) -> Result<Value> {
    match json {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::Number(n) => n
            .as_i64()
            .map(Value::Integer)
            .ok_or_else(|| type_mismatch("BIGINT", json)),
        JsonValue::String(s) => parse_i64(s),
        other => Err(type_mismatch("BIGINT", other)),
    }
}

pub fn parse_f32(raw: &str) -> Result<Value> {
    raw.trim()
        .parse::<f32>()
        .map(Value::from)
        .map_err(|_| parse_error("REAL", raw))
}

fn decode_f32(json: &JsonValue) -> Result<Value> {
    match json {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::Number(n) => n
            .as_f64()
            .map(|f| Value::from(f as f32))
            .ok_or_else(|| type_mismatch("REAL", json)),
        JsonValue::String(s) => parse_f32(s),
        other => Err(type_mismatch("REAL", other)),
    }
}

pub fn parse_f64(raw: &str) -> Result<Value> {
    raw.trim()
        .parse::<f64>()
        .map(Value::Float)
        .map_err(|_| parse_error("DOUBLE", raw))
}

fn decode_f64(json: &JsonValue) -> Result<Value> {
    match json {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::Number(n) => n
            .as_f64()
            .map(Value::Float)
            .ok_or_else(|| type_mismatch("DOUBLE", json)),
        JsonValue::String(s) => parse_f64(s),
        other => Err(type_mismatch("DOUBLE", other)),
    }
}

fn from_epoch_millis(json: &JsonValue, expected: &str) -> Result<NaiveDateTime> {
    json.as_i64()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| type_mismatch(expected, json))
}

pub fn parse_date_value(raw: &str) -> Result<Value> {
    parse_date(raw).map(Value::Date)
}

fn decode_date(json: &JsonValue) -> Result<Value> {
    match json {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::String(s) => parse_date_value(s),
        JsonValue::Number(_) => from_epoch_millis(json, "DATE").map(|dt| Value::Date(dt.date())),
        other => Err(type_mismatch("DATE", other)),
    }
}

pub fn parse_time_value(raw: &str) -> Result<Value> {
    parse_time(raw).map(Value::Time)
}

fn decode_time(json: &JsonValue) -> Result<Value> {
    match json {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::String(s) => parse_time_value(s),
        JsonValue::Number(_) => from_epoch_millis(json, "TIME").map(|dt| Value::Time(dt.time())),
        other => Err(type_mismatch("TIME", other)),
    }
}

pub fn parse_timestamp_value(raw: &str) -> Result<Value> {
    parse_timestamp(raw).map(Value::Timestamp)
}

fn decode_timestamp(json: &JsonValue) -> Result<Value> {
    match json {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::String(s) => parse_timestamp_value(s),
        JsonValue::Number(_) => from_epoch_millis(json, "TIMESTAMP").map(Value::Timestamp),
        other => Err(type_mismatch("TIMESTAMP", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_json_to_value_converter() {
        let int = WireCodec::for_column(ColumnType::Integer);
        assert_eq!((int.decode)(&json!(42)).unwrap(), Value::Integer(42));
        assert!((int.decode)(&json!(10_000_000_000i64)).is_err());
        assert!((int.decode)(&json!([1])).is_err());

        let text = WireCodec::for_column(ColumnType::Text);
        assert_eq!((text.decode)(&json!("hi")).unwrap(), Value::Text("hi".into()));
        assert_eq!((text.decode)(&json!(null)).unwrap(), Value::Null);
    }

    #[test]
    fn test_dates_accept_epoch_millis() {
        let date = WireCodec::for_column(ColumnType::Date);
        assert_eq!(
            (date.decode)(&json!(86_400_000)).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(1970, 1, 2).unwrap())
        );
        assert_eq!(
            (date.decode)(&json!("2020-05-17")).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2020, 5, 17).unwrap())
        );

        let ts = WireCodec::for_column(ColumnType::Timestamp);
        assert_eq!(
            (ts.parse)("2020-05-17T12:30").unwrap(),
            Value::Timestamp(
                NaiveDate::from_ymd_opt(2020, 5, 17)
                    .unwrap()
                    .and_hms_opt(12, 30, 0)
                    .unwrap()
            )
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_i32("twelve").is_err());
        assert!(parse_uuid("123").is_err());
        assert!(parse_bool("perhaps").is_err());
        assert_eq!(parse_bool("on").unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_encode_value() {
        assert_eq!(encode_value(&Value::Integer(3)), json!(3));
        assert_eq!(encode_value(&Value::Float(f64::NAN)), JsonValue::Null);
        let d = NaiveDate::from_ymd_opt(1999, 12, 31).unwrap();
        assert_eq!(encode_value(&Value::Date(d)), json!("1999-12-31"));
    }
}
