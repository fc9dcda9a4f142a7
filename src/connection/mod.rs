pub mod config;
pub mod recording;

use crate::core::{Column, DbError, Result, Value};
use crate::interface::StorageHandle;
use crate::result::QueryResult;
use config::ConnectionConfig;
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use tracing::{debug, info};

/// SQLite-backed storage handle.
///
/// Similar to a single `rusqlite::Connection`, plus statement logging and
/// the column probing SQLite needs for additive migrations.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
    config: ConnectionConfig,
}

impl SqliteConnection {
    /// Open a connection described by `config`.
    pub fn open(config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        let conn = match config.path() {
            Some(path) => rusqlite::Connection::open(path)?,
            None => rusqlite::Connection::open_in_memory()?,
        };
        conn.busy_timeout(config.busy_timeout)?;
        debug!(url = %config.to_url(), "opened sqlite connection");
        Ok(Self { conn, config })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(ConnectionConfig::default())
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Names of the columns currently present on `table`; empty if the
    /// table does not exist.
    pub fn table_columns(&mut self, table: &str) -> Result<Vec<String>> {
        sqlite_table_columns(self, table)
    }

    fn log_statement(&self, sql: &str, params: &[Value]) {
        if self.config.log_statements {
            info!(sql, params = ?params, "sql");
        } else {
            debug!(sql, params = ?params, "sql");
        }
    }
}

impl StorageHandle for SqliteConnection {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        self.log_statement(sql, params);
        let affected = self
            .conn
            .execute(sql, rusqlite::params_from_iter(params.iter()))?;
        Ok(affected as u64)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.log_statement(sql, params);
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for idx in 0..width {
                values.push(from_sql_ref(row.get_ref(idx)?)?);
            }
            out.push(values);
        }

        Ok(QueryResult::new(columns, out))
    }

    fn add_column_if_absent(&mut self, table: &str, column: &Column) -> Result<()> {
        sqlite_add_column(self, table, column)
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

pub(crate) fn sqlite_table_columns<H: StorageHandle + ?Sized>(
    handle: &mut H,
    table: &str,
) -> Result<Vec<String>> {
    let sql = format!("PRAGMA table_info({})", crate::dao::sql::quote_ident(table));
    let result = handle.query(&sql, &[])?;
    Ok(result
        .column_values("name")
        .into_iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect())
}

/// SQLite has no `ADD COLUMN IF NOT EXISTS`, so probe `table_info` first.
pub(crate) fn sqlite_add_column<H: StorageHandle + ?Sized>(
    handle: &mut H,
    table: &str,
    column: &Column,
) -> Result<()> {
    let existing = sqlite_table_columns(handle, table)?;
    if existing.iter().any(|c| c.eq_ignore_ascii_case(&column.name)) {
        return Ok(());
    }

    let sql = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        crate::dao::sql::quote_ident(table),
        crate::dao::sql::quote_ident(&column.name),
        column.column_type.sql_type()
    );
    handle.execute(&sql, &[])?;
    Ok(())
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as Sql;

        Ok(match self {
            Value::Null => ToSqlOutput::Owned(Sql::Null),
            Value::Integer(i) => ToSqlOutput::Owned(Sql::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(Sql::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Boolean(b) => ToSqlOutput::Owned(Sql::Integer(i64::from(*b))),
            // Canonical text forms, so ids and dates compare as strings.
            Value::Uuid(_) | Value::Date(_) | Value::Time(_) | Value::Timestamp(_) => {
                ToSqlOutput::Owned(Sql::Text(self.to_string()))
            }
        })
    }
}

fn from_sql_ref(value: ValueRef<'_>) -> Result<Value> {
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => Value::Text(
            std::str::from_utf8(bytes)
                .map_err(DbError::storage)?
                .to_string(),
        ),
        ValueRef::Blob(_) => {
            return Err(DbError::TypeMismatch(
                "BLOB columns are not supported".to_string(),
            ));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_execute_and_query_with_params() {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (id char(36), n integer, ok boolean)", &[])
            .unwrap();

        let id = Uuid::new_v4();
        let inserted = conn
            .execute(
                "INSERT INTO t (id, n, ok) VALUES (?, ?, ?)",
                &[Value::Uuid(id), Value::Integer(7), Value::Boolean(true)],
            )
            .unwrap();
        assert_eq!(inserted, 1);

        let result = conn
            .query("SELECT id, n, ok FROM t WHERE id = ?", &[Value::Uuid(id)])
            .unwrap();
        assert_eq!(result.row_count(), 1);
        assert_eq!(result.rows[0][0], Value::Text(id.to_string()));
        assert_eq!(result.rows[0][1], Value::Integer(7));
        assert_eq!(result.rows[0][2], Value::Integer(1));
    }

    #[test]
    fn test_add_column_if_absent_is_idempotent() {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (id char(36))", &[]).unwrap();

        let column = Column::new("owner", crate::core::ColumnType::Uuid);
        conn.add_column_if_absent("t", &column).unwrap();
        conn.add_column_if_absent("t", &column).unwrap();

        assert_eq!(conn.table_columns("t").unwrap(), vec!["id", "owner"]);
    }

    #[test]
    fn test_syntax_error_is_storage_error() {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        let err = conn.execute("CREATE TABLE (", &[]).unwrap_err();
        assert!(err.is_storage());
    }
}
