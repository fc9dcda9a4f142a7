use uuid::Uuid;
use crate::core::{Column, ColumnType, Result, Row, Value};
use crate::interface::StorageHandle;
use super::sql::{
    CreateTableBuilder, DeleteStatementBuilder, InsertStatementBuilder, SelectStatementBuilder,
    Statement, UpdateStatementBuilder,
};

pub const ID_COLUMN: &str = "id";

pub(crate) fn run(db: &mut dyn StorageHandle, stmt: Statement) -> Result<u64> {
    db.execute(&stmt.sql, &stmt.params)
}

pub(crate) fn fetch(db: &mut dyn StorageHandle, stmt: Statement) -> Result<Vec<Row>> {
    Ok(db.query(&stmt.sql, &stmt.params)?.row_maps())
}

/// Generic CRUD over one entity table: an `id` column plus scalar columns.
#[derive(Debug, Clone)]
pub struct TableDao {
    table: String,
    columns: Vec<Column>,
}

impl TableDao {
    pub fn new(table: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            table: table.into(),
            columns,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Create the table if absent, then add any declared column it lacks.
    pub fn create(&self, db: &mut dyn StorageHandle) -> Result<()> {
        let stmt = CreateTableBuilder::new(&self.table)
            .column(Column::new(ID_COLUMN, ColumnType::Uuid).not_null())
            .columns(self.columns.iter().cloned())
            .primary_key(ID_COLUMN)
            .build();
        run(db, stmt)?;

        for column in &self.columns {
            db.add_column_if_absent(&self.table, column)?;
        }
        Ok(())
    }

    pub fn select_by_id(&self, db: &mut dyn StorageHandle, id: Uuid) -> Result<Option<Row>> {
        let stmt = SelectStatementBuilder::new(&self.table)
            .where_eq(ID_COLUMN, Value::Uuid(id))
            .build();
        Ok(fetch(db, stmt)?.into_iter().next())
    }

    pub fn select_all(&self, db: &mut dyn StorageHandle) -> Result<Vec<Row>> {
        let stmt = SelectStatementBuilder::new(&self.table)
            .order_by(ID_COLUMN)
            .build();
        fetch(db, stmt)
    }

    /// Rows where every `(column, value)` pair matches.
    pub fn select_where(
        &self,
        db: &mut dyn StorageHandle,
        filter: &[(String, Value)],
    ) -> Result<Vec<Row>> {
        let mut builder = SelectStatementBuilder::new(&self.table);
        for (column, value) in filter {
            builder = builder.where_eq(column, value.clone());
        }
        fetch(db, builder.order_by(ID_COLUMN).build())
    }

    /// Insert a row. Only columns this DAO knows about are written.
    pub fn insert(&self, db: &mut dyn StorageHandle, id: Uuid, row: &Row) -> Result<()> {
        let stmt = InsertStatementBuilder::new(&self.table)
            .value(ID_COLUMN, Value::Uuid(id))
            .values(self.known_values(row)?)
            .build();
        run(db, stmt)?;
        Ok(())
    }

    /// Update a row by id; returns whether a row was touched.
    pub fn update(&self, db: &mut dyn StorageHandle, id: Uuid, row: &Row) -> Result<bool> {
        let values = self.known_values(row)?;
        if values.is_empty() {
            return self.exists(db, id);
        }
        let stmt = UpdateStatementBuilder::new(&self.table)
            .set_multiple(values)
            .where_eq(ID_COLUMN, Value::Uuid(id))
            .build();
        Ok(run(db, stmt)? > 0)
    }

    pub fn delete(&self, db: &mut dyn StorageHandle, id: Uuid) -> Result<bool> {
        let stmt = DeleteStatementBuilder::new(&self.table)
            .where_eq(ID_COLUMN, Value::Uuid(id))
            .build();
        Ok(run(db, stmt)? > 0)
    }

    pub fn exists(&self, db: &mut dyn StorageHandle, id: Uuid) -> Result<bool> {
        let stmt = SelectStatementBuilder::new(&self.table)
            .column(ID_COLUMN)
            .where_eq(ID_COLUMN, Value::Uuid(id))
            .build();
        Ok(!fetch(db, stmt)?.is_empty())
    }

    /// The row's values for this DAO's columns, each checked against its
    /// column before anything is bound.
    fn known_values(&self, row: &Row) -> Result<Vec<(String, Value)>> {
        let mut values = Vec::with_capacity(self.columns.len());
        for col in &self.columns {
            if let Some(value) = row.get(&col.name) {
                col.validate(value)?;
                values.push((col.name.clone(), value.clone()));
            }
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::SqliteConnection;
    use crate::connection::recording::RecordingHandle;

    fn people() -> TableDao {
        TableDao::new(
            "Person",
            vec![
                Column::new("name", ColumnType::Text),
                Column::new("age", ColumnType::Integer),
            ],
        )
    }

    #[test]
    fn test_crud_cycle() {
        let mut db = SqliteConnection::open_in_memory().unwrap();
        let dao = people();
        dao.create(&mut db).unwrap();

        let id = Uuid::new_v4();
        let mut row = Row::new();
        row.insert("name".into(), Value::Text("Ann".into()));
        row.insert("age".into(), Value::Integer(30));
        row.insert("ignored".into(), Value::Integer(1));
        dao.insert(&mut db, id, &row).unwrap();

        let stored = dao.select_by_id(&mut db, id).unwrap().unwrap();
        assert_eq!(stored.get("name"), Some(&Value::Text("Ann".into())));
        assert!(!stored.contains_key("ignored"));

        row.insert("age".into(), Value::Integer(31));
        assert!(dao.update(&mut db, id, &row).unwrap());
        let found = dao
            .select_where(&mut db, &[("age".into(), Value::Integer(31))])
            .unwrap();
        assert_eq!(found.len(), 1);

        assert!(dao.delete(&mut db, id).unwrap());
        assert!(!dao.delete(&mut db, id).unwrap());
        assert!(dao.select_by_id(&mut db, id).unwrap().is_none());
    }

    #[test]
    fn test_create_adds_new_columns_to_existing_table() {
        let mut db = SqliteConnection::open_in_memory().unwrap();
        people().create(&mut db).unwrap();

        let grown = TableDao::new(
            "Person",
            vec![
                Column::new("name", ColumnType::Text),
                Column::new("age", ColumnType::Integer),
                Column::new("email", ColumnType::Text),
            ],
        );
        grown.create(&mut db).unwrap();
        grown.create(&mut db).unwrap();

        assert_eq!(
            db.table_columns("Person").unwrap(),
            vec!["id", "name", "age", "email"]
        );
    }

    #[test]
    fn test_rejects_values_the_column_cannot_hold() {
        let mut db = RecordingHandle::new(SqliteConnection::open_in_memory().unwrap());
        let dao = people();
        dao.create(&mut db).unwrap();
        db.reset();

        let mut row = Row::new();
        row.insert("age".into(), Value::Text("thirty".into()));
        let err = dao.insert(&mut db, Uuid::new_v4(), &row).unwrap_err();
        assert!(matches!(err, crate::core::DbError::TypeMismatch(_)));
        assert_eq!(db.statement_count(), 0);
    }

    #[test]
    fn test_statements_are_parameterized() {
        let mut db = RecordingHandle::new(SqliteConnection::open_in_memory().unwrap());
        let dao = people();
        dao.create(&mut db).unwrap();
        db.reset();

        let mut row = Row::new();
        row.insert("name".into(), Value::Text("Robert'); DROP TABLE Person;--".into()));
        dao.insert(&mut db, Uuid::new_v4(), &row).unwrap();

        assert_eq!(db.statement_count(), 1);
        assert!(!db.statements()[0].contains("Robert"));
        assert_eq!(dao.select_all(&mut db).unwrap().len(), 1);
    }
}
