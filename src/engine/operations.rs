//! Custom operations attached to an entity type.
//!
//! An operation is a named handler invoked on one stored instance. Its
//! declared parameters are bound by convention: `authorization: String`
//! receives the caller's token, a `Database` parameter receives the
//! connection, and everything else comes from the request body, decoded
//! through the scalar registry or resolved by id for entity types.

use std::fmt;
use serde_json::Value as JsonValue;
use uuid::Uuid;
use crate::core::{DbError, Result, Value};
use crate::interface::StorageHandle;
use crate::model::EntityRef;
use super::PersistenceEngine;

pub const AUTHORIZATION_PARAM: &str = "authorization";
pub const DATABASE_TYPE: &str = "Database";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDef {
    pub name: String,
    pub param_type: String,
}

impl ParamDef {
    pub fn new(name: impl Into<String>, param_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
        }
    }

    pub fn is_authorization(&self) -> bool {
        self.name == AUTHORIZATION_PARAM && self.param_type == "String"
    }

    pub fn is_database(&self) -> bool {
        self.param_type == DATABASE_TYPE
    }

    /// Whether the value comes from the request body.
    pub fn is_request_bound(&self) -> bool {
        !self.is_authorization() && !self.is_database()
    }
}

pub type OperationHandler = fn(&mut OperationCall<'_>) -> Result<JsonValue>;

#[derive(Clone)]
pub struct CustomOperation {
    pub name: String,
    pub params: Vec<ParamDef>,
    pub handler: OperationHandler,
}

impl CustomOperation {
    pub fn new(name: impl Into<String>, handler: OperationHandler) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            handler,
        }
    }

    pub fn param(mut self, name: impl Into<String>, param_type: impl Into<String>) -> Self {
        self.params.push(ParamDef::new(name, param_type));
        self
    }

    pub fn request_params(&self) -> impl Iterator<Item = &ParamDef> {
        self.params.iter().filter(|p| p.is_request_bound())
    }
}

impl fmt::Debug for CustomOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomOperation")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// A bound argument.
#[derive(Debug, Clone)]
pub enum Argument {
    Value(Value),
    Entity(EntityRef),
    AuthToken(Option<String>),
    /// Placeholder for the connection, reachable as [`OperationCall::db`].
    Database,
}

/// Everything a handler gets to work with.
pub struct OperationCall<'a> {
    pub target: EntityRef,
    pub db: &'a mut dyn StorageHandle,
    pub engine: &'a PersistenceEngine,
    pub args: Vec<(String, Argument)>,
}

impl OperationCall<'_> {
    pub fn arg(&self, name: &str) -> Option<&Argument> {
        self.args.iter().find(|(n, _)| n == name).map(|(_, a)| a)
    }

    pub fn value(&self, name: &str) -> Result<&Value> {
        match self.arg(name) {
            Some(Argument::Value(v)) => Ok(v),
            _ => Err(DbError::MissingArgument(name.to_string())),
        }
    }

    pub fn entity(&self, name: &str) -> Result<EntityRef> {
        match self.arg(name) {
            Some(Argument::Entity(e)) => Ok(e.clone()),
            _ => Err(DbError::MissingArgument(name.to_string())),
        }
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.args.iter().find_map(|(_, a)| match a {
            Argument::AuthToken(token) => token.as_deref(),
            _ => None,
        })
    }

    /// Save `entity` on the call's connection.
    pub fn save(&mut self, entity: &EntityRef) -> Result<Uuid> {
        self.engine.save(&mut *self.db, entity)
    }
}

/// Bind `op`'s parameters from a JSON request body.
pub(crate) fn bind_arguments(
    engine: &PersistenceEngine,
    db: &mut dyn StorageHandle,
    op: &CustomOperation,
    body: &JsonValue,
    auth: Option<&str>,
) -> Result<Vec<(String, Argument)>> {
    let registry = engine.registry();
    let mut args = Vec::with_capacity(op.params.len());

    for param in &op.params {
        let argument = if param.is_authorization() {
            Argument::AuthToken(auth.map(str::to_string))
        } else if param.is_database() {
            Argument::Database
        } else {
            let wire = body
                .get(&param.name)
                .ok_or_else(|| DbError::MissingArgument(param.name.clone()))?;

            if registry.is_entity(&param.param_type) {
                let raw = wire.as_str().ok_or_else(|| {
                    DbError::TypeMismatch(format!(
                        "Argument '{}' must be a {} id string",
                        param.name, param.param_type
                    ))
                })?;
                let id = Uuid::parse_str(raw.trim()).map_err(|_| {
                    DbError::ParseError(format!("Invalid id '{}' for '{}'", raw, param.name))
                })?;
                let entity = engine
                    .by_id(db, &param.param_type, id)?
                    .ok_or_else(|| DbError::not_found(&param.param_type, id))?;
                Argument::Entity(entity)
            } else {
                Argument::Value(registry.scalars().decode(&param.param_type, wire)?)
            }
        };
        args.push((param.name.clone(), argument));
    }

    Ok(args)
}
