use crate::core::{DbError, Result, Value};
use super::entity::{Entity, FieldValue};

/// Custom read hook: receives the entity and the field name.
pub type Getter = fn(&Entity, &str) -> FieldValue;

/// Custom write hook: receives the entity, the field name and the new value.
pub type Setter = fn(&mut Entity, &str, FieldValue) -> Result<()>;

/// A custom accessor registered on a type definition.
#[derive(Debug, Clone, Copy)]
pub enum Method {
    Getter(Getter),
    Setter(Setter),
}

/// The value shape a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Scalar,
    Single,
    Collection,
}

impl Shape {
    pub fn empty(&self) -> FieldValue {
        match self {
            Self::Scalar => FieldValue::Scalar(Value::Null),
            Self::Single => FieldValue::One(None),
            Self::Collection => FieldValue::Many(Vec::new()),
        }
    }

    fn accepts(&self, value: &FieldValue) -> bool {
        matches!(
            (self, value),
            (Self::Scalar, FieldValue::Scalar(_))
                | (Self::Single, FieldValue::One(_))
                | (Self::Collection, FieldValue::Many(_))
        )
    }
}

/// Uniform get/set over one field.
///
/// Custom getters and setters take precedence over direct field access.
/// `expose` gates the `*_exposed` entry points used by the wire boundary.
#[derive(Debug, Clone)]
pub struct FieldAccessor {
    entity: String,
    field: String,
    shape: Shape,
    getter: Option<Getter>,
    setter: Option<Setter>,
    persist: bool,
    expose: bool,
}

impl FieldAccessor {
    pub fn new(entity: impl Into<String>, field: impl Into<String>, shape: Shape) -> Self {
        Self {
            entity: entity.into(),
            field: field.into(),
            shape,
            getter: None,
            setter: None,
            persist: true,
            expose: true,
        }
    }

    pub fn with_getter(mut self, getter: Option<Getter>) -> Self {
        self.getter = getter;
        self
    }

    pub fn with_setter(mut self, setter: Option<Setter>) -> Self {
        self.setter = setter;
        self
    }

    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn expose(mut self, expose: bool) -> Self {
        self.expose = expose;
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn is_persisted(&self) -> bool {
        self.persist
    }

    pub fn has_custom_getter(&self) -> bool {
        self.getter.is_some()
    }

    pub fn has_custom_setter(&self) -> bool {
        self.setter.is_some()
    }

    pub fn can_get(&self) -> bool {
        self.expose
    }

    pub fn can_set(&self) -> bool {
        self.expose
    }

    pub fn get(&self, entity: &Entity) -> FieldValue {
        match self.getter {
            Some(getter) => getter(entity, &self.field),
            None => entity
                .get(&self.field)
                .cloned()
                .unwrap_or_else(|| self.shape.empty()),
        }
    }

    pub fn set(&self, entity: &mut Entity, value: FieldValue) -> Result<()> {
        if !self.shape.accepts(&value) {
            return Err(DbError::TypeMismatch(format!(
                "Field '{}' on '{}' holds a {:?} value, got a {}",
                self.field,
                self.entity,
                self.shape,
                value.shape_name()
            )));
        }

        match self.setter {
            Some(setter) => setter(entity, &self.field, value),
            None => {
                entity.set(self.field.clone(), value);
                Ok(())
            }
        }
    }

    pub fn get_exposed(&self, entity: &Entity) -> Result<FieldValue> {
        if !self.can_get() {
            return Err(self.unsupported("read"));
        }
        Ok(self.get(entity))
    }

    pub fn set_exposed(&self, entity: &mut Entity, value: FieldValue) -> Result<()> {
        if !self.can_set() {
            return Err(self.unsupported("written"));
        }
        self.set(entity, value)
    }

    fn unsupported(&self, verb: &str) -> DbError {
        DbError::UnsupportedOperation(format!(
            "Field '{}' on '{}' cannot be {} through the API",
            self.field, self.entity, verb
        ))
    }
}
