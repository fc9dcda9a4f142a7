use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;
use crate::association::Association;
use crate::core::{DbError, Result};
use crate::scalar::ScalarRegistry;
use super::accessor::{FieldAccessor, Shape};
use super::descriptor::{EntityTypeDescriptor, FieldDef, FieldDescriptor, FieldKind, FieldType, TypeDef};

lazy_static! {
    static ref IDENTIFIER: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid");
}

pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Owns the scalar registry and every entity type definition, and builds
/// descriptors on first use.
///
/// Descriptors are memoized per type name and never change afterwards;
/// registering another type clears the memo.
#[derive(Debug, Default)]
pub struct Registry {
    scalars: ScalarRegistry,
    types: Vec<TypeDef>,
    index: HashMap<String, usize>,
    descriptors: RwLock<HashMap<String, Arc<EntityTypeDescriptor>>>,
}

/// What a declared type string resolves to.
enum Resolved {
    Scalar(String),
    Entity { target: String, collection: bool },
}

impl Registry {
    pub fn new(scalars: ScalarRegistry) -> Self {
        Self {
            scalars,
            ..Self::default()
        }
    }

    /// Registry with the built-in scalars and the given types.
    pub fn with_types(types: impl IntoIterator<Item = TypeDef>) -> Result<Self> {
        let mut registry = Self::new(ScalarRegistry::new());
        for def in types {
            registry.register(def)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, def: TypeDef) -> Result<&mut Self> {
        if !is_identifier(&def.name) {
            return Err(DbError::configuration(format!(
                "Entity type name '{}' is not a valid identifier",
                def.name
            )));
        }
        if self.index.contains_key(&def.name) {
            return Err(DbError::configuration(format!(
                "Entity type '{}' is registered twice",
                def.name
            )));
        }
        if self.scalars.is_scalar(&def.name) {
            return Err(DbError::configuration(format!(
                "Entity type '{}' shadows a scalar type",
                def.name
            )));
        }

        self.index.insert(def.name.clone(), self.types.len());
        self.types.push(def);
        self.descriptors
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(self)
    }

    pub fn scalars(&self) -> &ScalarRegistry {
        &self.scalars
    }

    pub fn scalars_mut(&mut self) -> &mut ScalarRegistry {
        self.descriptors
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        &mut self.scalars
    }

    pub fn is_entity(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn type_def(&self, name: &str) -> Result<&TypeDef> {
        self.index
            .get(name)
            .map(|idx| &self.types[*idx])
            .ok_or_else(|| DbError::UnknownEntityType(name.to_string()))
    }

    /// Registered type names, in registration order.
    pub fn type_names(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn describe(&self, name: &str) -> Result<Arc<EntityTypeDescriptor>> {
        {
            let cache = self.descriptors.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(descriptor) = cache.get(name) {
                return Ok(Arc::clone(descriptor));
            }
        }

        let descriptor = Arc::new(self.build(self.type_def(name)?)?);
        let mut cache = self.descriptors.write().unwrap_or_else(PoisonError::into_inner);
        let entry = cache
            .entry(name.to_string())
            .or_insert_with(|| Arc::clone(&descriptor));
        Ok(Arc::clone(entry))
    }

    /// Describe every registered type, surfacing the first definition error.
    pub fn validate(&self) -> Result<()> {
        for name in self.type_names() {
            self.describe(name)?;
        }
        Ok(())
    }

    fn build(&self, def: &TypeDef) -> Result<EntityTypeDescriptor> {
        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(def.fields.len());
        let mut associations = Vec::new();

        for field in &def.fields {
            if !is_identifier(&field.name) {
                return Err(DbError::configuration(format!(
                    "Field name '{}' on '{}' is not a valid identifier",
                    field.name, def.name
                )));
            }
            if field.name.eq_ignore_ascii_case("id") {
                return Err(DbError::configuration(format!(
                    "'{}' declares a field named 'id'; the identity is implicit",
                    def.name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(DbError::configuration(format!(
                    "Field '{}' is declared twice on '{}'",
                    field.name, def.name
                )));
            }

            let field_type = FieldType::parse(&field.field_type)?;
            let (kind, shape) = self.classify_field(def, field, &field_type)?;

            if let FieldKind::Association { .. } = kind {
                associations.push(Association::classify(self, def, field, &field_type)?);
            }

            let accessor = FieldAccessor::new(&def.name, &field.name, shape)
                .with_getter(def.getter_for(&field.name))
                .with_setter(def.setter_for(&field.name))
                .persist(!matches!(kind, FieldKind::Transient { .. }))
                .expose(!field.no_http);

            fields.push(FieldDescriptor {
                name: field.name.clone(),
                field_type,
                kind,
                accessor,
            });
        }

        for operation in &def.operations {
            if let Some(param) = operation
                .request_params()
                .find(|p| !self.scalars.is_scalar(&p.param_type) && !self.is_entity(&p.param_type))
            {
                return Err(DbError::configuration(format!(
                    "Parameter '{}' of operation '{}' on '{}' has unsupported type '{}'",
                    param.name, operation.name, def.name, param.param_type
                )));
            }
        }

        debug!(
            entity = %def.name,
            fields = fields.len(),
            associations = associations.len(),
            "built entity descriptor"
        );

        Ok(EntityTypeDescriptor {
            name: def.name.clone(),
            table: def.name.clone(),
            fields,
            associations,
            operations: def.operations.clone(),
            authorizer: def.authorizer,
        })
    }

    fn classify_field(
        &self,
        def: &TypeDef,
        field: &FieldDef,
        field_type: &FieldType,
    ) -> Result<(FieldKind, Shape)> {
        let resolved = self.resolve_type(def, field, field_type);

        if field.no_persist {
            return match resolved {
                Ok(Resolved::Scalar(scalar)) => {
                    Ok((FieldKind::Transient { scalar: Some(scalar) }, Shape::Scalar))
                }
                Ok(Resolved::Entity { collection, .. }) => Ok((
                    FieldKind::Transient { scalar: None },
                    if collection { Shape::Collection } else { Shape::Single },
                )),
                // Hidden transient fields are opaque to the engine.
                Err(_) if field.no_http => Ok((
                    FieldKind::Transient { scalar: None },
                    if field_type.is_collection() { Shape::Collection } else { Shape::Scalar },
                )),
                Err(err) => Err(err),
            };
        }

        match resolved? {
            Resolved::Scalar(scalar) => {
                let column_type = self.scalars.column_type_of(&scalar)?;
                Ok((FieldKind::Scalar { scalar, column_type }, Shape::Scalar))
            }
            Resolved::Entity { target, collection } => Ok((
                FieldKind::Association { target, collection },
                if collection { Shape::Collection } else { Shape::Single },
            )),
        }
    }

    fn resolve_type(&self, def: &TypeDef, field: &FieldDef, field_type: &FieldType) -> Result<Resolved> {
        match field_type {
            FieldType::Single(t) if self.scalars.is_scalar(t) => Ok(Resolved::Scalar(t.clone())),
            FieldType::Single(t) if self.is_entity(t) => Ok(Resolved::Entity {
                target: t.clone(),
                collection: false,
            }),
            FieldType::Single(t) => Err(DbError::configuration(format!(
                "Field '{}' on '{}' has type '{}', which is neither a registered scalar nor an entity type",
                field.name, def.name, t
            ))),
            FieldType::Collection(Some(t)) if self.is_entity(t) => Ok(Resolved::Entity {
                target: t.clone(),
                collection: true,
            }),
            FieldType::Collection(Some(t)) if self.scalars.is_scalar(t) => {
                Err(DbError::configuration(format!(
                    "Field '{}' on '{}' is a collection of scalar '{}'; only entity collections can be stored",
                    field.name, def.name, t
                )))
            }
            FieldType::Collection(element) => Err(DbError::UnsupportedAssociationShape {
                entity: def.name.clone(),
                field: field.name.clone(),
                reason: match element {
                    Some(t) => format!("element type '{}' is not an entity type", t),
                    None => "element type cannot be determined".to_string(),
                },
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::descriptor::FieldDef;

    fn person() -> TypeDef {
        TypeDef::new("Person")
            .field(FieldDef::new("name", "String"))
            .field(FieldDef::new("age", "i32"))
            .field(FieldDef::new("password", "String").no_http())
            .field(FieldDef::new("pets", "[Pet]"))
    }

    fn pet() -> TypeDef {
        TypeDef::new("Pet")
            .field(FieldDef::new("name", "String"))
            .field(FieldDef::new("owner", "Person"))
    }

    #[test]
    fn test_describe_is_memoized() {
        let registry = Registry::with_types([person(), pet()]).unwrap();
        let a = registry.describe("Person").unwrap();
        let b = registry.describe("Person").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.columns().len(), 3);
        assert_eq!(a.associations.len(), 1);
        assert!(!a.field("password").unwrap().accessor.can_get());
    }

    #[test]
    fn test_unknown_type_is_configuration_error() {
        let registry = Registry::with_types([
            TypeDef::new("Doc").field(FieldDef::new("mail", "Email")),
        ])
        .unwrap();
        assert!(registry.describe("Doc").unwrap_err().is_configuration());
    }

    #[test]
    fn test_rejects_bad_definitions() {
        let id_field = Registry::with_types([TypeDef::new("A").field(FieldDef::new("id", "Uuid"))])
            .unwrap();
        assert!(id_field.validate().is_err());

        let dup = Registry::with_types([TypeDef::new("A")
            .field(FieldDef::new("x", "i32"))
            .field(FieldDef::new("x", "i64"))])
        .unwrap();
        assert!(dup.validate().is_err());

        let scalar_list =
            Registry::with_types([TypeDef::new("A").field(FieldDef::new("tags", "[String]"))])
                .unwrap();
        assert!(scalar_list.validate().unwrap_err().is_configuration());

        let unknown_elem =
            Registry::with_types([TypeDef::new("A").field(FieldDef::new("stuff", "Vec<_>"))])
                .unwrap();
        assert!(matches!(
            unknown_elem.validate().unwrap_err(),
            DbError::UnsupportedAssociationShape { .. }
        ));

        assert!(Registry::with_types([TypeDef::new("bad name")]).is_err());
        assert!(Registry::with_types([TypeDef::new("A"), TypeDef::new("A")]).is_err());
    }

    #[test]
    fn test_transient_fields() {
        let registry = Registry::with_types([TypeDef::new("A")
            .field(FieldDef::new("cache", "Blob").no_persist().no_http())
            .field(FieldDef::new("label", "String").no_persist())])
        .unwrap();
        let desc = registry.describe("A").unwrap();
        assert!(desc.columns().is_empty());
        assert_eq!(desc.field("label").unwrap().scalar_name(), Some("String"));

        let exposed_unknown = Registry::with_types([
            TypeDef::new("B").field(FieldDef::new("cache", "Blob").no_persist()),
        ])
        .unwrap();
        assert!(exposed_unknown.validate().is_err());
    }

    #[test]
    fn test_type_names_keep_registration_order() {
        let registry = Registry::with_types([pet(), person()]).unwrap();
        assert_eq!(registry.type_names(), vec!["Pet", "Person"]);
        assert!(matches!(
            registry.describe("Nope"),
            Err(DbError::UnknownEntityType(_))
        ));
    }
}
