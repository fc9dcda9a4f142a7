use uuid::Uuid;
use crate::core::Result;
use crate::dao::JoinTableDao;
use crate::engine::PersistenceEngine;
use crate::engine::traversal::TraversalStack;
use crate::interface::StorageHandle;
use crate::model::FieldValue;
use super::{referenced_ids, resolve_all};

/// Many-to-many through a join table shared by both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HasAndBelongsToMany {
    pub field: String,
    pub target: String,
    pub join: JoinTableDao,
}

impl HasAndBelongsToMany {
    pub fn new(field: impl Into<String>, target: impl Into<String>, join: JoinTableDao) -> Self {
        Self {
            field: field.into(),
            target: target.into(),
            join,
        }
    }

    pub fn init(&self, db: &mut dyn StorageHandle) -> Result<()> {
        self.join.init(db)
    }

    pub fn load(
        &self,
        engine: &PersistenceEngine,
        db: &mut dyn StorageHandle,
        stack: &mut TraversalStack,
        owner_id: Uuid,
    ) -> Result<FieldValue> {
        let ids = self.join.others(db, owner_id)?;
        Ok(FieldValue::Many(resolve_all(engine, db, stack, &self.target, ids)?))
    }

    pub fn save(&self, db: &mut dyn StorageHandle, owner_id: Uuid, value: &FieldValue) -> Result<()> {
        let mut targets = referenced_ids(&self.field, &self.target, value)?;
        targets.sort_unstable();
        targets.dedup();
        self.join.clear(db, owner_id)?;
        for other in targets {
            self.join.link(db, owner_id, other)?;
        }
        Ok(())
    }
}
