use uuid::Uuid;
use crate::core::Result;
use crate::dao::ForeignKeyDao;
use crate::engine::PersistenceEngine;
use crate::engine::traversal::TraversalStack;
use crate::interface::StorageHandle;
use crate::model::FieldValue;
use super::referenced_ids;

/// The owner's table carries a column holding the referenced entity's id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BelongsTo {
    pub field: String,
    pub target: String,
    pub foreign_key: ForeignKeyDao,
}

impl BelongsTo {
    pub fn new(field: impl Into<String>, target: impl Into<String>, foreign_key: ForeignKeyDao) -> Self {
        Self {
            field: field.into(),
            target: target.into(),
            foreign_key,
        }
    }

    pub fn init(&self, db: &mut dyn StorageHandle) -> Result<()> {
        self.foreign_key.init(db)
    }

    pub fn load(
        &self,
        engine: &PersistenceEngine,
        db: &mut dyn StorageHandle,
        stack: &mut TraversalStack,
        owner_id: Uuid,
    ) -> Result<FieldValue> {
        let referenced = match self.foreign_key.get(db, owner_id)? {
            Some(id) => engine.resolve(db, stack, &self.target, id)?,
            None => None,
        };
        Ok(FieldValue::One(referenced))
    }

    /// Write the referenced id, or null when the field is empty or points
    /// at an unsaved entity.
    pub fn save(&self, db: &mut dyn StorageHandle, owner_id: Uuid, value: &FieldValue) -> Result<()> {
        let target = referenced_ids(&self.field, &self.target, value)?.into_iter().next();
        self.foreign_key.set(db, owner_id, target)
    }
}
