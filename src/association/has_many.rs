use uuid::Uuid;
use crate::core::Result;
use crate::dao::ForeignKeyDao;
use crate::engine::PersistenceEngine;
use crate::engine::traversal::TraversalStack;
use crate::interface::StorageHandle;
use crate::model::FieldValue;
use super::{referenced_ids, resolve_all};

/// Many rows of the other type point back at the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HasMany {
    pub field: String,
    pub target: String,
    pub foreign_key: ForeignKeyDao,
}

impl HasMany {
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
        let ids = self.foreign_key.referencing(db, owner_id)?;
        Ok(FieldValue::Many(resolve_all(engine, db, stack, &self.target, ids)?))
    }

    /// Replace the stored set: detach every current row, then attach the
    /// ones held by the field.
    pub fn save(&self, db: &mut dyn StorageHandle, owner_id: Uuid, value: &FieldValue) -> Result<()> {
        let targets = referenced_ids(&self.field, &self.target, value)?;
        self.foreign_key.clear_references(db, owner_id)?;
        for other in targets {
            self.foreign_key.set(db, other, Some(owner_id))?;
        }
        Ok(())
    }
}
