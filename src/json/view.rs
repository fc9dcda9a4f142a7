use serde_json::{Map, Value as JsonValue};
use crate::core::Result;
use crate::dao::ID_COLUMN;
use crate::model::{Entity, EntityRef, FieldValue, Link, Registry};
use crate::scalar::codec::encode_value;

fn reference_id(link: &Link) -> JsonValue {
    link.id()
        .map(|id| JsonValue::String(id.to_string()))
        .unwrap_or(JsonValue::Null)
}

/// Render `id` and every exposed field.
///
/// References become id strings, so cyclic graphs render without
/// recursion.
pub fn entity_to_json(registry: &Registry, entity: &Entity) -> Result<JsonValue> {
    let descriptor = registry.describe(entity.type_name())?;
    let mut object = Map::new();
    object.insert(
        ID_COLUMN.to_string(),
        entity
            .id()
            .map(|id| JsonValue::String(id.to_string()))
            .unwrap_or(JsonValue::Null),
    );

    for field in descriptor.exposed_fields() {
        let rendered = match field.accessor.get(entity) {
            FieldValue::Scalar(value) => match field.scalar_name() {
                Some(scalar) => registry.scalars().encode(scalar, &value)?,
                None => encode_value(&value),
            },
            FieldValue::One(reference) => reference.as_ref().map(reference_id).unwrap_or(JsonValue::Null),
            FieldValue::Many(references) => {
                JsonValue::Array(references.iter().map(reference_id).collect())
            }
        };
        object.insert(field.name.clone(), rendered);
    }

    Ok(JsonValue::Object(object))
}

pub fn entities_to_json(registry: &Registry, entities: &[EntityRef]) -> Result<JsonValue> {
    entities
        .iter()
        .map(|e| entity_to_json(registry, &e.borrow()))
        .collect::<Result<Vec<_>>>()
        .map(JsonValue::Array)
}
