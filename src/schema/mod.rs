//! Client-facing description of the registered types.

use serde::{Deserialize, Serialize};
use crate::core::{ColumnType, Result};
use crate::model::{FieldKind, Registry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescription {
    pub types: Vec<TypeSchema>,
}

impl SchemaDescription {
    pub fn find(&self, name: &str) -> Option<&TypeSchema> {
        self.types.iter().find(|t| t.name == name)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSchema {
    pub name: String,
    pub fields: Vec<FieldSchema>,
    pub methods: Vec<MethodSchema>,
}

impl TypeSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    pub name: String,
    /// Wire type for scalars, the target type name for associations.
    #[serde(rename = "type")]
    pub wire_type: String,
    pub is_association: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target: Option<String>,
    pub collection: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSchema {
    pub name: String,
    pub params: Vec<ParamSchema>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamSchema {
    pub name: String,
    pub is_association: bool,
    pub is_date: bool,
}

impl Registry {
    /// Exposed fields and request-bound operation parameters of every
    /// type, in registration order.
    pub fn schema(&self) -> Result<SchemaDescription> {
        let mut types = Vec::new();

        for name in self.type_names() {
            let descriptor = self.describe(name)?;

            let mut fields = Vec::new();
            for field in descriptor.exposed_fields() {
                let schema = match &field.kind {
                    FieldKind::Association { target, collection } => FieldSchema {
                        name: field.name.clone(),
                        wire_type: target.clone(),
                        is_association: true,
                        target: Some(target.clone()),
                        collection: *collection,
                    },
                    _ => match field.scalar_name() {
                        Some(scalar) => FieldSchema {
                            name: field.name.clone(),
                            wire_type: self.scalars().wire_type_of(scalar)?.to_string(),
                            is_association: false,
                            target: None,
                            collection: false,
                        },
                        None => continue,
                    },
                };
                fields.push(schema);
            }

            let methods = descriptor
                .operations
                .iter()
                .map(|op| MethodSchema {
                    name: op.name.clone(),
                    params: op
                        .request_params()
                        .map(|p| ParamSchema {
                            name: p.name.clone(),
                            is_association: self.is_entity(&p.param_type),
                            is_date: matches!(
                                self.scalars().column_type_of(&p.param_type),
                                Ok(ColumnType::Date | ColumnType::Timestamp)
                            ),
                        })
                        .collect(),
                })
                .collect();

            types.push(TypeSchema {
                name: name.to_string(),
                fields,
                methods,
            });
        }

        Ok(SchemaDescription { types })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::engine::operations::{CustomOperation, OperationCall};
    use crate::model::{FieldDef, TypeDef};

    fn noop(_: &mut OperationCall<'_>) -> Result<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }

    #[test]
    fn test_schema_json_shape() {
        let registry = Registry::with_types([
            TypeDef::new("Owner")
                .field(FieldDef::new("name", "String"))
                .field(FieldDef::new("secret", "String").no_http())
                .field(FieldDef::new("pets", "[Pet]"))
                .operation(
                    CustomOperation::new("adopt", noop)
                        .param("authorization", "String")
                        .param("db", "Database")
                        .param("pet", "Pet")
                        .param("on", "NaiveDate"),
                ),
            TypeDef::new("Pet").field(FieldDef::new("vaccinated", "bool")),
        ])
        .unwrap();

        let schema = registry.schema().unwrap();
        let owner = schema.find("Owner").unwrap();
        assert!(owner.field("secret").is_none());

        let json = serde_json::to_value(owner).unwrap();
        assert_eq!(
            json,
            json!({
                "name": "Owner",
                "fields": [
                    {"name": "name", "type": "text", "isAssociation": false, "collection": false},
                    {"name": "pets", "type": "Pet", "isAssociation": true, "target": "Pet", "collection": true},
                ],
                "methods": [{
                    "name": "adopt",
                    "params": [
                        {"name": "pet", "isAssociation": true, "isDate": false},
                        {"name": "on", "isAssociation": false, "isDate": true},
                    ],
                }],
            })
        );
        assert_eq!(
            schema.find("Pet").unwrap().field("vaccinated").unwrap().wire_type,
            "checkbox"
        );
    }
}
