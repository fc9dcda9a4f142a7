use std::collections::BTreeMap;
use std::fmt;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use super::{DbError, Result, Value};

/// Column name to value, the shape every DAO reads and writes.
pub type Row = BTreeMap<String, Value>;

/// Storage column types a scalar can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Uuid,
    Text,
    Boolean,
    Integer,
    BigInt,
    Real,
    Double,
    Date,
    Time,
    Timestamp,
}

impl ColumnType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Uuid => "char(36)",
            Self::Text => "varchar(255)",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::BigInt => "bigint",
            Self::Real => "real",
            Self::Double => "double precision",
            Self::Date => "date",
            Self::Time => "time",
            Self::Timestamp => "timestamp",
        }
    }

    pub fn is_compatible(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Uuid, Value::Uuid(_)) => true,
            (Self::Text, Value::Text(_)) => true,
            (Self::Boolean, Value::Boolean(_)) => true,
            (Self::Integer, Value::Integer(i)) => i32::try_from(*i).is_ok(),
            (Self::BigInt, Value::Integer(_)) => true,
            (Self::Real | Self::Double, Value::Float(_) | Value::Integer(_)) => true,
            (Self::Date, Value::Date(_)) => true,
            (Self::Time, Value::Time(_)) => true,
            (Self::Timestamp, Value::Timestamp(_)) => true,
            _ => false,
        }
    }

    /// Turns what the backend handed back (text, integer, real) into the
    /// declared type. Values already in the right shape pass through.
    pub fn coerce(&self, raw: Value) -> Result<Value> {
        if raw.is_null() || self.is_compatible(&raw) {
            return Ok(raw);
        }

        let mismatch = |raw: &Value| {
            DbError::TypeMismatch(format!(
                "Cannot read {} value '{}' as {}",
                raw.type_name(),
                raw,
                self
            ))
        };

        match (self, &raw) {
            (Self::Uuid, Value::Text(s)) => uuid::Uuid::parse_str(s.trim())
                .map(Value::Uuid)
                .map_err(|e| DbError::ParseError(format!("Invalid UUID '{}': {}", s, e))),
            (Self::Text, _) => Ok(Value::Text(raw.to_string())),
            (Self::Boolean, Value::Integer(i)) => Ok(Value::Boolean(*i != 0)),
            (Self::Boolean, Value::Text(s)) => match s.to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Ok(Value::Boolean(true)),
                "false" | "f" | "0" => Ok(Value::Boolean(false)),
                _ => Err(mismatch(&raw)),
            },
            (Self::Integer, Value::Integer(i)) => Err(DbError::TypeMismatch(format!(
                "Value {} is out of range for a 32-bit integer",
                i
            ))),
            (Self::Integer | Self::BigInt, Value::Float(f)) if f.fract() == 0.0 => {
                self.coerce(Value::Integer(*f as i64))
            }
            (Self::Integer | Self::BigInt, Value::Text(s)) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| mismatch(&raw))
                .and_then(|i| self.coerce(Value::Integer(i))),
            (Self::Real | Self::Double, Value::Text(s)) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| mismatch(&raw)),
            (Self::Date, Value::Text(s)) => parse_date(s).map(Value::Date),
            (Self::Time, Value::Text(s)) => parse_time(s).map(Value::Time),
            (Self::Timestamp, Value::Text(s)) => parse_timestamp(s).map(Value::Timestamp),
            _ => Err(mismatch(&raw)),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql_type())
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| DbError::ParseError(format!("Invalid date '{}': {}", s, e)))
}

pub fn parse_time(s: &str) -> Result<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|e| DbError::ParseError(format!("Invalid time '{}': {}", s, e)))
}

/// Accepts `T` or space separated forms, with optional seconds.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .ok_or_else(|| DbError::ParseError(format!("Invalid timestamp '{}'", s)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn validate(&self, value: &Value) -> Result<()> {
        if value.is_null() {
            if !self.nullable {
                return Err(DbError::TypeMismatch(format!(
                    "Column '{}' cannot be NULL",
                    self.name
                )));
            }
            return Ok(());
        }

        // SQLite reads a stored NaN back as NULL
        if matches!(value, Value::Float(f) if f.is_nan()) {
            return Err(DbError::TypeMismatch(format!(
                "Column '{}' cannot store NaN",
                self.name
            )));
        }

        if !self.column_type.is_compatible(value) {
            return Err(DbError::TypeMismatch(format!(
                "Column '{}' expects type {}, got {}",
                self.name,
                self.column_type,
                value.type_name()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_types() {
        assert_eq!(ColumnType::Uuid.sql_type(), "char(36)");
        assert_eq!(ColumnType::Text.sql_type(), "varchar(255)");
        assert_eq!(ColumnType::Double.sql_type(), "double precision");
    }

    #[test]
    fn test_coerce_from_backend_forms() {
        let id = uuid::Uuid::new_v4();
        assert_eq!(
            ColumnType::Uuid.coerce(Value::Text(id.to_string())).unwrap(),
            Value::Uuid(id)
        );
        assert_eq!(
            ColumnType::Boolean.coerce(Value::Integer(1)).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            ColumnType::Date.coerce(Value::Text("2023-01-31".into())).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2023, 1, 31).unwrap())
        );
        assert_eq!(
            ColumnType::Timestamp
                .coerce(Value::Text("2023-01-31 10:00:00".into()))
                .unwrap(),
            Value::Timestamp(
                NaiveDate::from_ymd_opt(2023, 1, 31)
                    .unwrap()
                    .and_hms_opt(10, 0, 0)
                    .unwrap()
            )
        );
        assert_eq!(ColumnType::Text.coerce(Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_coerce_rejects_bad_values() {
        assert!(ColumnType::Uuid.coerce(Value::Text("not-a-uuid".into())).is_err());
        assert!(ColumnType::Integer.coerce(Value::Integer(i64::MAX)).is_err());
        assert!(ColumnType::Boolean.coerce(Value::Text("maybe".into())).is_err());
    }

    #[test]
    fn test_column_validate() {
        let col = Column::new("age", ColumnType::Integer).not_null();
        assert!(col.validate(&Value::Integer(3)).is_ok());
        assert!(col.validate(&Value::Null).is_err());
        assert!(col.validate(&Value::Text("3".into())).is_err());

        let ratio = Column::new("ratio", ColumnType::Double);
        assert!(ratio.validate(&Value::Float(0.5)).is_ok());
        assert!(ratio.validate(&Value::Null).is_ok());
        assert!(matches!(
            ratio.validate(&Value::Float(f64::NAN)),
            Err(DbError::TypeMismatch(_))
        ));
    }
}
