use std::collections::BTreeMap;
use serde_json::Value as JsonValue;
use tracing::debug;
use uuid::Uuid;
use crate::core::{DbError, Result};
use crate::engine::PersistenceEngine;
use crate::interface::StorageHandle;
use crate::model::{Entity, EntityRef, FieldKind, FieldValue, Link, Registry};

fn resolve_reference(
    engine: &PersistenceEngine,
    db: &mut dyn StorageHandle,
    target: &str,
    wire: &JsonValue,
) -> Result<EntityRef> {
    let raw = wire.as_str().ok_or_else(|| {
        DbError::TypeMismatch(format!("Expected a {} id string, got {}", target, wire))
    })?;
    let id = Uuid::parse_str(raw.trim())
        .map_err(|_| DbError::ParseError(format!("Invalid {} id '{}'", target, raw)))?;
    engine
        .by_id(db, target, id)?
        .ok_or_else(|| DbError::not_found(target, id))
}

/// Build a new, unsaved entity from a request body.
///
/// Only exposed fields are read; `id` and unknown keys are ignored.
/// Referenced entities must already exist.
pub fn entity_from_json(
    engine: &PersistenceEngine,
    db: &mut dyn StorageHandle,
    type_name: &str,
    body: &JsonValue,
) -> Result<Entity> {
    let object = body.as_object().ok_or_else(|| {
        DbError::TypeMismatch(format!("Request body for {} must be an object", type_name))
    })?;
    let registry = engine.registry();
    let descriptor = registry.describe(type_name)?;
    let mut entity = Entity::new(type_name);

    for field in descriptor.fields.iter().filter(|f| f.accessor.can_set()) {
        let Some(wire) = object.get(&field.name) else {
            continue;
        };

        let value = match &field.kind {
            FieldKind::Association { target, collection: false } => FieldValue::One(match wire {
                JsonValue::Null => None,
                _ => Some(Link::from(resolve_reference(engine, db, target, wire)?)),
            }),
            FieldKind::Association { target, collection: true } => {
                let items = match wire {
                    JsonValue::Null => Vec::new(),
                    JsonValue::Array(items) => items
                        .iter()
                        .map(|item| resolve_reference(engine, db, target, item))
                        .collect::<Result<Vec<_>>>()?,
                    other => {
                        return Err(DbError::TypeMismatch(format!(
                            "Field '{}' expects an array of ids, got {}",
                            field.name, other
                        )));
                    }
                };
                FieldValue::from(items)
            }
            _ => match field.scalar_name() {
                Some(scalar) => FieldValue::Scalar(registry.scalars().decode(scalar, wire)?),
                None => continue,
            },
        };
        field.accessor.set_exposed(&mut entity, value)?;
    }

    Ok(entity)
}

/// Apply textual field updates, as sent by a form, through the scalar
/// parsers. Unknown, hidden and association fields are skipped.
pub fn apply_string_updates(
    registry: &Registry,
    entity: &mut Entity,
    updates: &BTreeMap<String, String>,
) -> Result<usize> {
    let descriptor = registry.describe(entity.type_name())?;
    let mut applied = 0;

    for (name, raw) in updates {
        let Some(field) = descriptor.field(name) else {
            debug!(entity = %descriptor.name, field = %name, "ignoring unknown field");
            continue;
        };
        let Some(scalar) = field.scalar_name().filter(|_| field.accessor.can_set()) else {
            debug!(entity = %descriptor.name, field = %name, "field is not settable from text");
            continue;
        };
        let value = registry.scalars().parse(scalar, raw)?;
        field.accessor.set_exposed(entity, FieldValue::Scalar(value))?;
        applied += 1;
    }

    Ok(applied)
}
