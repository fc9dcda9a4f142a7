//! Row-level storage access: the generic table DAO plus the foreign-key
//! and join-table variants associations are built on.

pub mod foreign_key;
pub mod join_table;
pub mod sql;
pub mod table;

pub use foreign_key::ForeignKeyDao;
pub use join_table::JoinTableDao;
pub use table::{ID_COLUMN, TableDao};
