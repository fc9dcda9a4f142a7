use uuid::Uuid;
use crate::core::Result;
use crate::dao::ForeignKeyDao;
use crate::engine::PersistenceEngine;
use crate::engine::traversal::TraversalStack;
use crate::interface::StorageHandle;
use crate::model::FieldValue;
use super::referenced_ids;

/// The other type's table carries a column pointing back at the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HasOne {
    pub field: String,
    pub target: String,
    pub foreign_key: ForeignKeyDao,
}

impl HasOne {
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

    /// The first referencing row by id wins if several point here.
    pub fn load(
        &self,
        engine: &PersistenceEngine,
        db: &mut dyn StorageHandle,
        stack: &mut TraversalStack,
        owner_id: Uuid,
    ) -> Result<FieldValue> {
        let referenced = match self.foreign_key.referencing(db, owner_id)?.into_iter().next() {
            Some(id) => engine.resolve(db, stack, &self.target, id)?,
            None => None,
        };
        Ok(FieldValue::One(referenced))
    }

    pub fn save(&self, db: &mut dyn StorageHandle, owner_id: Uuid, value: &FieldValue) -> Result<()> {
        let target = referenced_ids(&self.field, &self.target, value)?.into_iter().next();
        self.foreign_key.clear_references(db, owner_id)?;
        if let Some(other) = target {
            self.foreign_key.set(db, other, Some(owner_id))?;
        }
        Ok(())
    }
}
