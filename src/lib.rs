// ============================================================================
// assocdb Library
// ============================================================================
//
// Entity types are declared as data (`TypeDef`), classified once into
// descriptors, and stored in one table per type plus the foreign-key
// columns and join tables their associations need.

pub mod core;
pub mod result;
pub mod interface;
pub mod connection;
pub mod dao;
pub mod scalar;
pub mod model;
pub mod association;
pub mod engine;
pub mod json;
pub mod schema;
pub mod auth;
pub mod prelude;

// Re-export main types for convenience
pub use core::{Column, ColumnType, DbError, Result, Row, Value};
pub use result::QueryResult;
pub use interface::StorageHandle;

// Re-export connection API
pub use connection::{
    SqliteConnection,
    config::ConnectionConfig,
    recording::RecordingHandle,
};

pub use scalar::{ScalarRegistry, WireCodec};
pub use model::{
    Entity, EntityRef, EntityTypeDescriptor, FieldDef, FieldValue, Link, Method, Registry,
    TypeDef,
};
pub use association::Association;
pub use engine::PersistenceEngine;
pub use engine::operations::{Argument, CustomOperation, OperationCall, ParamDef};
pub use engine::traversal::TraversalStack;
pub use schema::SchemaDescription;
pub use auth::{AccessType, Authorizer};
