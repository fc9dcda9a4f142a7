//! Scalar type registry.
//!
//! Maps a declared field type name to its storage column type, the wire
//! type name used in schema descriptions, and the codec that converts
//! between string, wire and native forms.

pub mod codec;

use std::collections::HashMap;
use serde_json::Value as JsonValue;
use crate::core::{ColumnType, DbError, Result, Value};

pub use codec::WireCodec;

/// Everything known about one registered scalar.
#[derive(Debug, Clone)]
pub struct ScalarType {
    pub name: String,
    pub column_type: ColumnType,
    pub wire_type: String,
    pub codec: WireCodec,
}

#[derive(Debug, Clone)]
pub struct ScalarRegistry {
    types: HashMap<String, ScalarType>,
}

/// Wire type names understood by form-building clients.
pub fn default_wire_type(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Uuid | ColumnType::Text => "text",
        ColumnType::Boolean => "checkbox",
        ColumnType::Integer | ColumnType::BigInt | ColumnType::Real | ColumnType::Double => {
            "number"
        }
        ColumnType::Date => "date",
        ColumnType::Time => "time",
        ColumnType::Timestamp => "datetime-local",
    }
}

const BUILTIN_SCALARS: &[(&str, ColumnType)] = &[
    ("Uuid", ColumnType::Uuid),
    ("String", ColumnType::Text),
    ("bool", ColumnType::Boolean),
    ("i32", ColumnType::Integer),
    ("i64", ColumnType::BigInt),
    ("f32", ColumnType::Real),
    ("f64", ColumnType::Double),
    ("NaiveDate", ColumnType::Date),
    ("NaiveTime", ColumnType::Time),
    ("NaiveDateTime", ColumnType::Timestamp),
];

impl ScalarRegistry {
    /// Registry holding the built-in scalars.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for (name, column_type) in BUILTIN_SCALARS {
            registry.register_scalar(*name, *column_type, WireCodec::for_column(*column_type));
        }
        registry
    }

    pub fn empty() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Register (or replace) a scalar, with the wire type implied by its column.
    pub fn register_scalar(
        &mut self,
        name: impl Into<String>,
        column_type: ColumnType,
        codec: WireCodec,
    ) -> &mut Self {
        let wire_type = default_wire_type(column_type);
        self.register_with_wire_type(name, column_type, wire_type, codec)
    }

    pub fn register_with_wire_type(
        &mut self,
        name: impl Into<String>,
        column_type: ColumnType,
        wire_type: impl Into<String>,
        codec: WireCodec,
    ) -> &mut Self {
        let name = name.into();
        self.types.insert(
            name.clone(),
            ScalarType {
                name,
                column_type,
                wire_type: wire_type.into(),
                codec,
            },
        );
        self
    }

    pub fn is_scalar(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ScalarType> {
        self.types.get(name)
    }

    fn lookup(&self, name: &str) -> Result<&ScalarType> {
        self.types.get(name).ok_or_else(|| {
            DbError::configuration(format!("Type '{}' is not a registered scalar", name))
        })
    }

    pub fn column_type_of(&self, name: &str) -> Result<ColumnType> {
        self.lookup(name).map(|s| s.column_type)
    }

    pub fn wire_type_of(&self, name: &str) -> Result<&str> {
        self.lookup(name).map(|s| s.wire_type.as_str())
    }

    pub fn parse(&self, name: &str, raw: &str) -> Result<Value> {
        (self.lookup(name)?.codec.parse)(raw)
    }

    pub fn decode(&self, name: &str, wire: &JsonValue) -> Result<Value> {
        (self.lookup(name)?.codec.decode)(wire)
    }

    pub fn encode(&self, name: &str, value: &Value) -> Result<JsonValue> {
        Ok((self.lookup(name)?.codec.encode)(value))
    }

    /// Coerce a raw backend value into the scalar's native form.
    pub fn coerce(&self, name: &str, raw: Value) -> Result<Value> {
        self.lookup(name)?.column_type.coerce(raw)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ScalarRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse_email(raw: &str) -> Result<Value> {
        if raw.contains('@') {
            Ok(Value::Text(raw.to_string()))
        } else {
            Err(DbError::ParseError(format!("'{}' is not an email", raw)))
        }
    }

    fn decode_email(json: &JsonValue) -> Result<Value> {
        match json.as_str() {
            Some(s) => parse_email(s),
            None => Err(DbError::TypeMismatch("email must be a string".into())),
        }
    }

    #[test]
    fn test_builtins() {
        let registry = ScalarRegistry::new();
        assert!(registry.is_scalar("Uuid"));
        assert!(registry.is_scalar("NaiveDateTime"));
        assert!(!registry.is_scalar("Person"));
        assert_eq!(registry.column_type_of("i32").unwrap(), ColumnType::Integer);
        assert_eq!(registry.wire_type_of("bool").unwrap(), "checkbox");
        assert_eq!(registry.wire_type_of("NaiveDateTime").unwrap(), "datetime-local");
        assert_eq!(registry.names().len(), 10);
    }

    #[test]
    fn test_unregistered_is_configuration_error() {
        let registry = ScalarRegistry::new();
        let err = registry.column_type_of("Email").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_register_custom_scalar() {
        let mut registry = ScalarRegistry::new();
        registry.register_scalar(
            "Email",
            ColumnType::Text,
            WireCodec::new(parse_email, decode_email, codec::encode_value),
        );

        assert_eq!(registry.column_type_of("Email").unwrap(), ColumnType::Text);
        assert!(registry.parse("Email", "nobody").is_err());
        assert_eq!(
            registry.decode("Email", &json!("a@b.c")).unwrap(),
            Value::Text("a@b.c".into())
        );
        assert_eq!(
            registry.encode("Email", &Value::Text("a@b.c".into())).unwrap(),
            json!("a@b.c")
        );
    }

    #[test]
    fn test_parse_and_coerce() {
        let registry = ScalarRegistry::new();
        assert_eq!(registry.parse("i64", "12").unwrap(), Value::Integer(12));
        assert_eq!(
            registry.coerce("bool", Value::Integer(0)).unwrap(),
            Value::Boolean(false)
        );
    }
}
