use std::collections::HashMap;
use std::fmt;
use serde::{Deserialize, Serialize};
use crate::association::Association;
use crate::auth::Authorizer;
use crate::core::{Column, ColumnType, DbError, Result};
use crate::engine::operations::CustomOperation;
use super::accessor::{FieldAccessor, Method};

/// Declared shape of a field type string.
///
/// `T` is a single value; `[T]` and `Vec<T>` are collections. `[]`, `[_]`
/// and `Vec<_>` are collections whose element type is unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Single(String),
    Collection(Option<String>),
}

impl FieldType {
    pub fn parse(raw: &str) -> Result<Self> {
        let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(DbError::configuration("Field type cannot be empty"));
        }

        let element = if let Some(inner) = compact
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
        {
            Some(inner)
        } else {
            compact
                .strip_prefix("Vec<")
                .and_then(|rest| rest.strip_suffix('>'))
        };

        Ok(match element {
            Some("") | Some("_") => Self::Collection(None),
            Some(inner) => Self::Collection(Some(inner.to_string())),
            None => Self::Single(compact),
        })
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Self::Collection(_))
    }

    /// The single type, or the collection element type when known.
    pub fn base_type(&self) -> Option<&str> {
        match self {
            Self::Single(t) => Some(t),
            Self::Collection(t) => t.as_deref(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(t) => write!(f, "{}", t),
            Self::Collection(Some(t)) => write!(f, "[{}]", t),
            Self::Collection(None) => write!(f, "[_]"),
        }
    }
}

/// A declared field, as handed over by the type loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub no_persist: bool,
    #[serde(default)]
    pub no_http: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            no_persist: false,
            no_http: false,
        }
    }

    /// Keep the field out of storage.
    pub fn no_persist(mut self) -> Self {
        self.no_persist = true;
        self
    }

    /// Keep the field out of the API surface.
    pub fn no_http(mut self) -> Self {
        self.no_http = true;
        self
    }
}

/// A declared entity type: fields in declaration order, optional accessor
/// overrides, custom operations and an authorization hook.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(skip)]
    pub methods: HashMap<String, Method>,
    #[serde(skip)]
    pub operations: Vec<CustomOperation>,
    #[serde(skip)]
    pub authorizer: Option<Authorizer>,
}

impl TypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn method(mut self, name: impl Into<String>, method: Method) -> Self {
        self.methods.insert(name.into(), method);
        self
    }

    pub fn operation(mut self, operation: CustomOperation) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn authorizer(mut self, authorizer: Authorizer) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    pub fn find_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// `get_<field>` first, then `<field>`.
    pub fn getter_for(&self, field: &str) -> Option<super::accessor::Getter> {
        [format!("get_{}", field), field.to_string()]
            .iter()
            .find_map(|name| match self.methods.get(name) {
                Some(Method::Getter(g)) => Some(*g),
                _ => None,
            })
    }

    /// `set_<field>` first, then `<field>`.
    pub fn setter_for(&self, field: &str) -> Option<super::accessor::Setter> {
        [format!("set_{}", field), field.to_string()]
            .iter()
            .find_map(|name| match self.methods.get(name) {
                Some(Method::Setter(s)) => Some(*s),
                _ => None,
            })
    }
}

/// How a field is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// One column on the type's own table.
    Scalar { scalar: String, column_type: ColumnType },
    /// Stored through the association of the same field name.
    Association { target: String, collection: bool },
    /// Not stored. `scalar` is set when the value type is a registered scalar.
    Transient { scalar: Option<String> },
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    pub kind: FieldKind,
    pub accessor: FieldAccessor,
}

impl FieldDescriptor {
    pub fn is_scalar_column(&self) -> bool {
        matches!(self.kind, FieldKind::Scalar { .. })
    }

    pub fn is_association(&self) -> bool {
        matches!(self.kind, FieldKind::Association { .. })
    }

    /// Scalar type name for persisted or transient scalars.
    pub fn scalar_name(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Scalar { scalar, .. } => Some(scalar),
            FieldKind::Transient { scalar } => scalar.as_deref(),
            FieldKind::Association { .. } => None,
        }
    }

    pub fn column(&self) -> Option<Column> {
        match &self.kind {
            FieldKind::Scalar { column_type, .. } => Some(Column::new(&self.name, *column_type)),
            _ => None,
        }
    }
}

/// Everything the engine needs to know about one entity type, built once
/// and shared.
#[derive(Debug, Clone)]
pub struct EntityTypeDescriptor {
    pub name: String,
    pub table: String,
    pub fields: Vec<FieldDescriptor>,
    pub associations: Vec<Association>,
    pub operations: Vec<CustomOperation>,
    pub authorizer: Option<Authorizer>,
}

impl EntityTypeDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn require_field(&self, name: &str) -> Result<&FieldDescriptor> {
        self.field(name).ok_or_else(|| DbError::FieldNotFound {
            entity: self.name.clone(),
            field: name.to_string(),
        })
    }

    pub fn scalar_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_scalar_column())
    }

    pub fn exposed_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.accessor.can_get())
    }

    /// Persisted scalar columns, without the identity column.
    pub fn columns(&self) -> Vec<Column> {
        self.fields.iter().filter_map(FieldDescriptor::column).collect()
    }

    pub fn association(&self, field: &str) -> Option<&Association> {
        self.associations.iter().find(|a| a.field() == field)
    }

    pub fn operation(&self, name: &str) -> Option<&CustomOperation> {
        self.operations.iter().find(|op| op.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_parse() {
        assert_eq!(FieldType::parse("String").unwrap(), FieldType::Single("String".into()));
        assert_eq!(
            FieldType::parse("[Pet]").unwrap(),
            FieldType::Collection(Some("Pet".into()))
        );
        assert_eq!(
            FieldType::parse("Vec < Pet >").unwrap(),
            FieldType::Collection(Some("Pet".into()))
        );
        assert_eq!(FieldType::parse("[]").unwrap(), FieldType::Collection(None));
        assert_eq!(FieldType::parse("Vec<_>").unwrap(), FieldType::Collection(None));
        assert!(FieldType::parse("  ").is_err());
    }

    #[test]
    fn test_type_def_deserializes_without_hooks() {
        let def: TypeDef = serde_json::from_str(
            r#"{"name":"Person","fields":[{"name":"name","type":"String"},{"name":"pw","type":"String","no_http":true}]}"#,
        )
        .unwrap();
        assert_eq!(def.fields.len(), 2);
        assert!(def.fields[1].no_http);
        assert!(!def.fields[1].no_persist);
        assert!(def.authorizer.is_none());
    }

    #[test]
    fn test_accessor_naming_convention() {
        fn g(_: &crate::model::Entity, _: &str) -> crate::model::FieldValue {
            crate::model::FieldValue::Scalar(crate::core::Value::Null)
        }
        let def = TypeDef::new("Person").method("name", Method::Getter(g));
        assert!(def.getter_for("name").is_some());
        assert!(def.setter_for("name").is_none());

        let def = TypeDef::new("Person").method("get_age", Method::Getter(g));
        assert!(def.getter_for("age").is_some());
    }
}
