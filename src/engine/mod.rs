//! The persistence engine: reads, writes and schema setup for registered
//! entity types.
//!
//! Every operation borrows one storage handle for its whole duration,
//! including the association loads and saves it triggers. Nothing here is
//! transactional: a save writes the primitive row and then each
//! association in declaration order, and a failure part way leaves the
//! earlier writes in place.

pub mod operations;
pub mod traversal;

use std::collections::BTreeMap;
use std::sync::Arc;
use serde_json::Value as JsonValue;
use tracing::{debug, info, trace};
use uuid::Uuid;
use crate::core::{DbError, Result, Row, Value};
use crate::dao::{ID_COLUMN, TableDao};
use crate::interface::StorageHandle;
use crate::model::{Entity, EntityRef, EntityTypeDescriptor, FieldKind, FieldValue, Link, Registry};
use crate::scalar::codec::parse_uuid;
use self::operations::{OperationCall, bind_arguments};
use self::traversal::TraversalStack;

pub struct PersistenceEngine {
    registry: Arc<Registry>,
}

impl PersistenceEngine {
    /// Builds every descriptor up front so definition errors surface here
    /// rather than on the first request.
    pub fn new(registry: Arc<Registry>) -> Result<Self> {
        registry.validate()?;
        Ok(Self { registry })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn descriptor(&self, type_name: &str) -> Result<Arc<EntityTypeDescriptor>> {
        self.registry.describe(type_name)
    }

    fn table(descriptor: &EntityTypeDescriptor) -> TableDao {
        TableDao::new(&descriptor.table, descriptor.columns())
    }

    // ------------------------------------------------------------------
    // Schema
    // ------------------------------------------------------------------

    /// Create the type's table, adding any declared column it lacks.
    pub fn sync(&self, db: &mut dyn StorageHandle, type_name: &str) -> Result<()> {
        let descriptor = self.descriptor(type_name)?;
        Self::table(&descriptor).create(db)?;
        info!(entity = type_name, backend = db.backend_name(), "synced table");
        Ok(())
    }

    /// Create the columns and join tables of the type's associations.
    /// Every table involved must already exist.
    pub fn sync_associations(&self, db: &mut dyn StorageHandle, type_name: &str) -> Result<()> {
        let descriptor = self.descriptor(type_name)?;
        for association in &descriptor.associations {
            association.init(db)?;
            debug!(
                entity = type_name,
                field = association.field(),
                kind = association.kind_name(),
                "initialized association"
            );
        }
        info!(
            entity = type_name,
            associations = descriptor.associations.len(),
            "synced associations"
        );
        Ok(())
    }

    /// Tables for every registered type first, then every association.
    pub fn sync_all(&self, db: &mut dyn StorageHandle) -> Result<()> {
        let names = self.registry.type_names();
        for name in &names {
            self.sync(db, name)?;
        }
        for name in &names {
            self.sync_associations(db, name)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Load one entity and its reachable associations.
    ///
    /// A missing row is `Ok(None)`.
    pub fn by_id(
        &self,
        db: &mut dyn StorageHandle,
        type_name: &str,
        id: Uuid,
    ) -> Result<Option<EntityRef>> {
        let mut stack = TraversalStack::new();
        Ok(self
            .resolve(db, &mut stack, type_name, id)?
            .and_then(|link| link.get()))
    }

    pub fn all(&self, db: &mut dyn StorageHandle, type_name: &str) -> Result<Vec<EntityRef>> {
        let descriptor = self.descriptor(type_name)?;
        let rows = Self::table(&descriptor).select_all(db)?;
        self.materialize_rows(db, &descriptor, rows)
    }

    /// Filter on textual values, parsed through the scalar registry.
    ///
    /// Keys may name `id`, a scalar field, or a `BelongsTo` field (matched
    /// on its foreign-key column). Other keys are ignored.
    pub fn find_where(
        &self,
        db: &mut dyn StorageHandle,
        type_name: &str,
        filter: &BTreeMap<String, String>,
    ) -> Result<Vec<EntityRef>> {
        let descriptor = self.descriptor(type_name)?;
        let mut conditions = Vec::with_capacity(filter.len());

        for (key, raw) in filter {
            if key == ID_COLUMN {
                conditions.push((ID_COLUMN.to_string(), parse_uuid(raw)?));
                continue;
            }
            match descriptor.field(key).map(|f| &f.kind) {
                Some(FieldKind::Scalar { scalar, .. }) => {
                    conditions.push((key.clone(), self.registry.scalars().parse(scalar, raw)?));
                }
                Some(FieldKind::Association { .. }) => {
                    match descriptor.association(key).and_then(|a| a.owner_column()) {
                        Some(column) => conditions.push((column.to_string(), parse_uuid(raw)?)),
                        None => debug!(entity = type_name, key = %key, "ignoring filter on a foreign-owned association"),
                    }
                }
                _ => debug!(entity = type_name, key = %key, "ignoring unknown filter key"),
            }
        }

        let rows = Self::table(&descriptor).select_where(db, &conditions)?;
        self.materialize_rows(db, &descriptor, rows)
    }

    /// Filter on typed values. Unknown keys are an error here.
    pub fn find_by_values(
        &self,
        db: &mut dyn StorageHandle,
        type_name: &str,
        filter: &[(&str, Value)],
    ) -> Result<Vec<EntityRef>> {
        let descriptor = self.descriptor(type_name)?;
        let mut conditions = Vec::with_capacity(filter.len());

        for (key, value) in filter {
            if *key == ID_COLUMN {
                conditions.push((ID_COLUMN.to_string(), value.clone()));
                continue;
            }
            let field = descriptor.require_field(key)?;
            match &field.kind {
                FieldKind::Scalar { scalar, .. } => {
                    let value = self.registry.scalars().coerce(scalar, value.clone())?;
                    conditions.push((field.name.clone(), value));
                }
                FieldKind::Association { .. } => {
                    let column = descriptor
                        .association(key)
                        .and_then(|a| a.owner_column())
                        .ok_or_else(|| {
                            DbError::UnsupportedOperation(format!(
                                "'{}' on '{}' is not stored on this type's table",
                                key, type_name
                            ))
                        })?;
                    conditions.push((column.to_string(), value.clone()));
                }
                FieldKind::Transient { .. } => {
                    return Err(DbError::UnsupportedOperation(format!(
                        "'{}' on '{}' is not persisted",
                        key, type_name
                    )));
                }
            }
        }

        let rows = Self::table(&descriptor).select_where(db, &conditions)?;
        self.materialize_rows(db, &descriptor, rows)
    }

    /// Look up `(type_name, id)` within an ongoing read.
    ///
    /// An instance already on the stack comes back as a back link to it,
    /// possibly still missing some association fields. Anything else is
    /// loaded fresh and owned by the returned link.
    pub(crate) fn resolve(
        &self,
        db: &mut dyn StorageHandle,
        stack: &mut TraversalStack,
        type_name: &str,
        id: Uuid,
    ) -> Result<Option<Link>> {
        if let Some(back) = stack.find(type_name, id) {
            trace!(entity = type_name, %id, depth = stack.depth(), "closing cycle");
            return Ok(Some(back));
        }

        let descriptor = self.descriptor(type_name)?;
        match Self::table(&descriptor).select_by_id(db, id)? {
            Some(row) => Ok(Some(self.materialize(db, stack, &descriptor, &row)?.into())),
            None => Ok(None),
        }
    }

    fn materialize_rows(
        &self,
        db: &mut dyn StorageHandle,
        descriptor: &EntityTypeDescriptor,
        rows: Vec<Row>,
    ) -> Result<Vec<EntityRef>> {
        let mut stack = TraversalStack::new();
        rows.iter()
            .map(|row| self.materialize(db, &mut stack, descriptor, row))
            .collect()
    }

    fn materialize(
        &self,
        db: &mut dyn StorageHandle,
        stack: &mut TraversalStack,
        descriptor: &EntityTypeDescriptor,
        row: &Row,
    ) -> Result<EntityRef> {
        let entity = self.unfreeze_with(descriptor, row)?;
        let id = entity
            .id()
            .ok_or_else(|| DbError::ParseError(format!("{} row has no id", descriptor.name)))?;
        let instance = entity.into_ref();

        stack.push(&descriptor.name, id, instance.clone());
        trace!(entity = %descriptor.name, %id, depth = stack.depth(), "loading associations");
        let loaded = self.load_associations(db, stack, descriptor, id, &instance);
        stack.pop();

        loaded?;
        Ok(instance)
    }

    fn load_associations(
        &self,
        db: &mut dyn StorageHandle,
        stack: &mut TraversalStack,
        descriptor: &EntityTypeDescriptor,
        id: Uuid,
        instance: &EntityRef,
    ) -> Result<()> {
        for association in &descriptor.associations {
            let value = association.load(self, db, stack, id)?;
            let field = descriptor.require_field(association.field())?;
            field.accessor.set(&mut instance.borrow_mut(), value)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Insert or update the entity's row, then write each association.
    ///
    /// An entity without an id gets a fresh one, which is kept only if the
    /// row insert succeeds. Referenced entities are not saved.
    pub fn save(&self, db: &mut dyn StorageHandle, entity: &EntityRef) -> Result<Uuid> {
        let type_name = entity.type_name();
        let descriptor = self.descriptor(&type_name)?;
        let table = Self::table(&descriptor);

        let (id, fresh) = {
            let mut e = entity.borrow_mut();
            match e.id() {
                Some(id) => (id, false),
                None => {
                    let id = Uuid::new_v4();
                    e.set_id(id);
                    (id, true)
                }
            }
        };

        let written = self.freeze_with(&descriptor, &entity.borrow()).and_then(|row| {
            if fresh || !table.update(db, id, &row)? {
                table.insert(db, id, &row)?;
            }
            Ok(())
        });
        if let Err(err) = written {
            if fresh {
                entity.borrow_mut().clear_id();
            }
            return Err(err);
        }

        for association in &descriptor.associations {
            let field = descriptor.require_field(association.field())?;
            let value = field.accessor.get(&entity.borrow());
            association.save(db, id, &value)?;
        }

        debug!(entity = %type_name, %id, created = fresh, "saved entity");
        Ok(id)
    }

    /// Delete the entity's row. Foreign keys and join rows pointing at it
    /// are left as they are.
    pub fn delete(&self, db: &mut dyn StorageHandle, entity: &EntityRef) -> Result<bool> {
        let (type_name, id) = {
            let e = entity.borrow();
            (e.type_name().to_string(), e.id())
        };
        let id = id.ok_or_else(|| {
            DbError::UnsupportedOperation(format!("Cannot delete an unsaved {}", type_name))
        })?;
        self.delete_by_id(db, &type_name, id)
    }

    pub fn delete_by_id(&self, db: &mut dyn StorageHandle, type_name: &str, id: Uuid) -> Result<bool> {
        let descriptor = self.descriptor(type_name)?;
        let deleted = Self::table(&descriptor).delete(db, id)?;
        debug!(entity = type_name, %id, deleted, "deleted entity");
        Ok(deleted)
    }

    // ------------------------------------------------------------------
    // Row conversion
    // ------------------------------------------------------------------

    /// Rebuild an entity's id and scalar fields from a stored row.
    ///
    /// Row keys that match no scalar field are ignored, so rows written by
    /// an older or newer version of a type still load.
    pub fn unfreeze(&self, type_name: &str, row: &Row) -> Result<Entity> {
        let descriptor = self.descriptor(type_name)?;
        self.unfreeze_with(&descriptor, row)
    }

    fn unfreeze_with(&self, descriptor: &EntityTypeDescriptor, row: &Row) -> Result<Entity> {
        let id = row
            .get(ID_COLUMN)
            .and_then(Value::as_uuid)
            .ok_or_else(|| {
                DbError::ParseError(format!("{} row has no valid '{}'", descriptor.name, ID_COLUMN))
            })?;

        let mut entity = Entity::new(&descriptor.name).with_id(id);
        for (key, raw) in row {
            if key == ID_COLUMN {
                continue;
            }
            let Some(field) = descriptor.field(key) else {
                continue;
            };
            if let FieldKind::Scalar { scalar, .. } = &field.kind {
                let value = self.registry.scalars().coerce(scalar, raw.clone())?;
                field.accessor.set(&mut entity, FieldValue::Scalar(value))?;
            }
        }
        Ok(entity)
    }

    /// The primitive row for an entity: one value per scalar column.
    pub fn freeze(&self, entity: &Entity) -> Result<Row> {
        let descriptor = self.descriptor(entity.type_name())?;
        self.freeze_with(&descriptor, entity)
    }

    fn freeze_with(&self, descriptor: &EntityTypeDescriptor, entity: &Entity) -> Result<Row> {
        let mut row = Row::new();
        for field in descriptor.scalar_fields() {
            let FieldKind::Scalar { scalar, .. } = &field.kind else {
                continue;
            };
            let value = match field.accessor.get(entity) {
                FieldValue::Scalar(v) => self.registry.scalars().coerce(scalar, v)?,
                other => {
                    return Err(DbError::TypeMismatch(format!(
                        "Field '{}' on '{}' is a {} field, got a {}",
                        field.name,
                        descriptor.name,
                        scalar,
                        other.shape_name()
                    )));
                }
            };
            row.insert(field.name.clone(), value);
        }
        Ok(row)
    }

    // ------------------------------------------------------------------
    // Custom operations
    // ------------------------------------------------------------------

    /// Run custom operation `name` on the stored `(type_name, id)`.
    pub fn invoke(
        &self,
        db: &mut dyn StorageHandle,
        type_name: &str,
        id: Uuid,
        name: &str,
        body: &JsonValue,
        auth: Option<&str>,
    ) -> Result<JsonValue> {
        let descriptor = self.descriptor(type_name)?;
        let operation = descriptor.operation(name).ok_or_else(|| {
            DbError::UnsupportedOperation(format!("'{}' has no operation '{}'", type_name, name))
        })?;

        let target = self
            .by_id(db, type_name, id)?
            .ok_or_else(|| DbError::not_found(type_name, id))?;
        let args = bind_arguments(self, db, operation, body, auth)?;

        debug!(entity = type_name, %id, operation = name, "invoking custom operation");
        let mut call = OperationCall {
            target,
            db,
            engine: self,
            args,
        };
        (operation.handler)(&mut call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::SqliteConnection;
    use crate::model::{FieldDef, TypeDef};

    fn engine() -> PersistenceEngine {
        let registry = Registry::with_types([TypeDef::new("Person")
            .field(FieldDef::new("name", "String"))
            .field(FieldDef::new("age", "i32"))
            .field(FieldDef::new("active", "bool"))])
        .unwrap();
        PersistenceEngine::new(Arc::new(registry)).unwrap()
    }

    #[test]
    fn test_unfreeze_ignores_unknown_columns() {
        let engine = engine();
        let id = Uuid::new_v4();
        let mut row = Row::new();
        row.insert("id".into(), Value::Text(id.to_string()));
        row.insert("name".into(), Value::Text("Ann".into()));
        row.insert("active".into(), Value::Integer(1));
        row.insert("legacy".into(), Value::Integer(7));

        let e = engine.unfreeze("Person", &row).unwrap();
        assert_eq!(e.id(), Some(id));
        assert_eq!(e.value("active"), Some(&Value::Boolean(true)));
        assert!(e.get("legacy").is_none());
    }

    #[test]
    fn test_unfreeze_requires_id() {
        let engine = engine();
        let mut row = Row::new();
        row.insert("name".into(), Value::Text("Ann".into()));
        assert!(engine.unfreeze("Person", &row).is_err());
    }

    #[test]
    fn test_freeze_rejects_wrong_shape() {
        let engine = engine();
        let mut e = Entity::new("Person");
        e.set_ref("name", None);
        assert!(matches!(engine.freeze(&e), Err(DbError::TypeMismatch(_))));
    }

    #[test]
    fn test_save_assigns_id_and_updates() {
        let engine = engine();
        let mut db = SqliteConnection::open_in_memory().unwrap();
        engine.sync_all(&mut db).unwrap();

        let person = Entity::new("Person").with_value("name", "Ann").with_value("age", 30i64).into_ref();
        let id = engine.save(&mut db, &person).unwrap();
        assert_eq!(person.id(), Some(id));

        person.borrow_mut().set_value("age", 31i64);
        assert_eq!(engine.save(&mut db, &person).unwrap(), id);
        assert_eq!(engine.all(&mut db, "Person").unwrap().len(), 1);

        let loaded = engine.by_id(&mut db, "Person", id).unwrap().unwrap();
        assert_eq!(loaded.borrow().value("age"), Some(&Value::Integer(31)));
    }

    #[test]
    fn test_failed_insert_keeps_entity_unsaved() {
        let engine = engine();
        let mut db = SqliteConnection::open_in_memory().unwrap();
        // no sync: the table does not exist
        let person = Entity::new("Person").with_value("name", "Ann").into_ref();
        assert!(engine.save(&mut db, &person).unwrap_err().is_storage());
        assert_eq!(person.id(), None);
    }

    #[test]
    fn test_find_where_parses_through_registry() {
        let engine = engine();
        let mut db = SqliteConnection::open_in_memory().unwrap();
        engine.sync_all(&mut db).unwrap();
        for (name, age) in [("Ann", 30i64), ("Bob", 40), ("Cid", 30)] {
            let p = Entity::new("Person").with_value("name", name).with_value("age", age).into_ref();
            engine.save(&mut db, &p).unwrap();
        }

        let filter = BTreeMap::from([
            ("age".to_string(), "30".to_string()),
            ("nonsense".to_string(), "x".to_string()),
        ]);
        assert_eq!(engine.find_where(&mut db, "Person", &filter).unwrap().len(), 2);

        let typed = engine
            .find_by_values(&mut db, "Person", &[("name", Value::Text("Bob".into()))])
            .unwrap();
        assert_eq!(typed.len(), 1);
        assert!(matches!(
            engine.find_by_values(&mut db, "Person", &[("nonsense", Value::Null)]),
            Err(DbError::FieldNotFound { .. })
        ));
    }

    #[test]
    fn test_delete() {
        let engine = engine();
        let mut db = SqliteConnection::open_in_memory().unwrap();
        engine.sync_all(&mut db).unwrap();

        let unsaved = Entity::new("Person").into_ref();
        assert!(matches!(
            engine.delete(&mut db, &unsaved),
            Err(DbError::UnsupportedOperation(_))
        ));

        let person = Entity::new("Person").with_value("name", "Ann").into_ref();
        let id = engine.save(&mut db, &person).unwrap();
        assert!(engine.delete(&mut db, &person).unwrap());
        assert!(engine.by_id(&mut db, "Person", id).unwrap().is_none());
        assert!(!engine.delete_by_id(&mut db, "Person", id).unwrap());
    }
}
