use crate::core::{Column, DbError, Result, Value};
use crate::interface::StorageHandle;
use crate::result::QueryResult;

/// Wraps another handle and records every statement passed through it.
///
/// Optionally fails statements containing a given fragment, which lets
/// tests observe what a multi-step save leaves behind when one step breaks.
pub struct RecordingHandle<H> {
    inner: H,
    statements: Vec<String>,
    fail_on: Option<String>,
}

impl<H: StorageHandle> RecordingHandle<H> {
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            statements: Vec::new(),
            fail_on: None,
        }
    }

    /// Fail any statement whose SQL contains `fragment`.
    pub fn fail_on(mut self, fragment: impl Into<String>) -> Self {
        self.fail_on = Some(fragment.into());
        self
    }

    pub fn clear_failure(&mut self) {
        self.fail_on = None;
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }

    pub fn reset(&mut self) {
        self.statements.clear();
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut H {
        &mut self.inner
    }

    pub fn into_inner(self) -> H {
        self.inner
    }

    fn record(&mut self, sql: &str) -> Result<()> {
        self.statements.push(sql.to_string());
        match &self.fail_on {
            Some(fragment) if sql.contains(fragment.as_str()) => Err(DbError::storage(
                std::io::Error::other(format!("injected failure on: {}", sql)),
            )),
            _ => Ok(()),
        }
    }
}

impl<H: StorageHandle> StorageHandle for RecordingHandle<H> {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        self.record(sql)?;
        self.inner.execute(sql, params)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.record(sql)?;
        self.inner.query(sql, params)
    }

    fn add_column_if_absent(&mut self, table: &str, column: &Column) -> Result<()> {
        // Run the inner backend's strategy through `self` so probes get recorded.
        if self.inner.backend_name() == "sqlite" {
            super::sqlite_add_column(self, table, column)
        } else {
            crate::interface::add_column_if_not_exists(self, table, column)
        }
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::SqliteConnection;

    #[test]
    fn test_records_statements() {
        let mut handle = RecordingHandle::new(SqliteConnection::open_in_memory().unwrap());
        handle.execute("CREATE TABLE t (id char(36))", &[]).unwrap();
        handle.query("SELECT id FROM t", &[]).unwrap();
        assert_eq!(handle.statement_count(), 2);
        assert!(handle.statements()[1].starts_with("SELECT"));
    }

    #[test]
    fn test_probe_goes_through_recorder() {
        let mut handle = RecordingHandle::new(SqliteConnection::open_in_memory().unwrap());
        handle.execute("CREATE TABLE t (id char(36))", &[]).unwrap();
        handle.reset();

        let column = Column::new("x", crate::core::ColumnType::Text);
        handle.add_column_if_absent("t", &column).unwrap();
        assert_eq!(handle.statement_count(), 2);
        handle.add_column_if_absent("t", &column).unwrap();
        assert_eq!(handle.statement_count(), 3);
    }

    #[test]
    fn test_injected_failure() {
        let mut handle = RecordingHandle::new(SqliteConnection::open_in_memory().unwrap())
            .fail_on("DROP");
        let err = handle.execute("DROP TABLE nothing", &[]).unwrap_err();
        assert!(err.is_storage());
        assert_eq!(handle.statement_count(), 1);
    }
}
