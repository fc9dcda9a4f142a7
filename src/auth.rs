//! Authorization hook for the layer above the engine.
//!
//! The engine itself never checks access; request handlers call
//! [`Registry::authorize`] per entity and per operation.

use crate::core::Result;
use crate::interface::StorageHandle;
use crate::model::{Entity, EntityRef, Registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessType {
    Create,
    Read,
    Update,
    Delete,
    CustomMethod,
}

/// Per-type access check: connection, caller credentials, the entity and
/// the kind of access.
pub type Authorizer = fn(&mut dyn StorageHandle, Option<&str>, &Entity, AccessType) -> bool;

impl Registry {
    /// Types without an authorizer allow everything.
    pub fn authorize(
        &self,
        db: &mut dyn StorageHandle,
        credentials: Option<&str>,
        entity: &Entity,
        access: AccessType,
    ) -> Result<bool> {
        let descriptor = self.describe(entity.type_name())?;
        Ok(match descriptor.authorizer {
            Some(check) => check(db, credentials, entity, access),
            None => true,
        })
    }
}

/// Drop the entities the caller may not see.
pub fn retain_authorized(
    registry: &Registry,
    db: &mut dyn StorageHandle,
    credentials: Option<&str>,
    entities: Vec<EntityRef>,
    access: AccessType,
) -> Result<Vec<EntityRef>> {
    let mut allowed = Vec::with_capacity(entities.len());
    for entity in entities {
        if registry.authorize(db, credentials, &entity.borrow(), access)? {
            allowed.push(entity);
        }
    }
    Ok(allowed)
}
