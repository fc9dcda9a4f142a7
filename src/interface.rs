use crate::core::{Column, Result, Value};
use crate::result::QueryResult;

/// A synchronous storage connection the engine drives.
///
/// One handle is threaded through a whole engine operation, including every
/// recursive association load or save it triggers. Implementations bind
/// `params` positionally to `?` placeholders.
pub trait StorageHandle {
    /// Execute a statement that does not return rows (DDL, INSERT, UPDATE,
    /// DELETE). Returns the number of affected rows.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Execute a statement that returns rows.
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Add a nullable column to an existing table unless it is already there.
    fn add_column_if_absent(&mut self, table: &str, column: &Column) -> Result<()> {
        add_column_if_not_exists(self, table, column)
    }

    fn backend_name(&self) -> &'static str;
}

/// `ALTER TABLE .. ADD COLUMN IF NOT EXISTS`, for backends that accept it.
pub fn add_column_if_not_exists<H: StorageHandle + ?Sized>(
    handle: &mut H,
    table: &str,
    column: &Column,
) -> Result<()> {
    let sql = format!(
        "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {} {}",
        crate::dao::sql::quote_ident(table),
        crate::dao::sql::quote_ident(&column.name),
        column.column_type.sql_type()
    );
    handle.execute(&sql, &[])?;
    Ok(())
}

impl<H: StorageHandle + ?Sized> StorageHandle for &mut H {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        (**self).execute(sql, params)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        (**self).query(sql, params)
    }

    fn add_column_if_absent(&mut self, table: &str, column: &Column) -> Result<()> {
        (**self).add_column_if_absent(table, column)
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }
}
