//! Everything an application needs to declare types and move entities in
//! and out of storage.
//!
//! ```
//! use assocdb::prelude::*;
//!
//! # fn main() -> assocdb::Result<()> {
//! let registry = Registry::with_types([entity_type!(Note { text: String })])?;
//! let engine = PersistenceEngine::new(std::sync::Arc::new(registry))?;
//! let mut db = SqliteConnection::open_in_memory()?;
//! engine.sync_all(&mut db)?;
//!
//! let note = Entity::new("Note").with_value("text", "hello").into_ref();
//! let id = engine.save(&mut db, &note)?;
//! assert!(engine.by_id(&mut db, "Note", id)?.is_some());
//! # Ok(())
//! # }
//! ```

pub use crate::entity_type;
pub use crate::{
    AccessType, ConnectionConfig, CustomOperation, DbError, Entity, EntityRef, FieldDef,
    FieldValue, OperationCall, PersistenceEngine, Registry, Result, SqliteConnection,
    StorageHandle, TypeDef, Value,
};
pub use crate::json::{entities_to_json, entity_from_json, entity_to_json};
