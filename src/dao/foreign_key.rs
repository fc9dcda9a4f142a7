use uuid::Uuid;
use crate::core::{Column, ColumnType, Result, Value};
use crate::interface::StorageHandle;
use super::sql::{SelectStatementBuilder, UpdateStatementBuilder};
use super::table::{ID_COLUMN, fetch, run};

/// One nullable foreign-key column on an existing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDao {
    table: String,
    column: String,
}

impl ForeignKeyDao {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Add the column unless the table already has it.
    pub fn init(&self, db: &mut dyn StorageHandle) -> Result<()> {
        db.add_column_if_absent(&self.table, &Column::new(&self.column, ColumnType::Uuid))
    }

    /// Point row `row_id` at `target`, or clear it.
    pub fn set(&self, db: &mut dyn StorageHandle, row_id: Uuid, target: Option<Uuid>) -> Result<()> {
        let stmt = UpdateStatementBuilder::new(&self.table)
            .set(&self.column, target.map(Value::Uuid).unwrap_or(Value::Null))
            .where_eq(ID_COLUMN, Value::Uuid(row_id))
            .build();
        run(db, stmt)?;
        Ok(())
    }

    /// The referenced id stored on row `row_id`.
    pub fn get(&self, db: &mut dyn StorageHandle, row_id: Uuid) -> Result<Option<Uuid>> {
        let stmt = SelectStatementBuilder::new(&self.table)
            .column(&self.column)
            .where_eq(ID_COLUMN, Value::Uuid(row_id))
            .build();
        Ok(fetch(db, stmt)?
            .into_iter()
            .next()
            .and_then(|row| row.get(&self.column).and_then(Value::as_uuid)))
    }

    /// Ids of every row pointing at `target`, ordered.
    pub fn referencing(&self, db: &mut dyn StorageHandle, target: Uuid) -> Result<Vec<Uuid>> {
        let stmt = SelectStatementBuilder::new(&self.table)
            .column(ID_COLUMN)
            .where_eq(&self.column, Value::Uuid(target))
            .order_by(ID_COLUMN)
            .build();
        Ok(fetch(db, stmt)?
            .iter()
            .filter_map(|row| row.get(ID_COLUMN).and_then(Value::as_uuid))
            .collect())
    }

    /// Null the column on every row pointing at `target`.
    pub fn clear_references(&self, db: &mut dyn StorageHandle, target: Uuid) -> Result<u64> {
        let stmt = UpdateStatementBuilder::new(&self.table)
            .set(&self.column, Value::Null)
            .where_eq(&self.column, Value::Uuid(target))
            .build();
        run(db, stmt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::SqliteConnection;
    use crate::core::Row;
    use crate::dao::TableDao;

    #[test]
    fn test_point_and_clear() {
        let mut db = SqliteConnection::open_in_memory().unwrap();
        let children = TableDao::new("Child", Vec::new());
        children.create(&mut db).unwrap();

        let fk = ForeignKeyDao::new("Child", "parent");
        fk.init(&mut db).unwrap();
        fk.init(&mut db).unwrap();

        let (c1, c2, parent) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        children.insert(&mut db, c1, &Row::new()).unwrap();
        children.insert(&mut db, c2, &Row::new()).unwrap();

        fk.set(&mut db, c1, Some(parent)).unwrap();
        fk.set(&mut db, c2, Some(parent)).unwrap();
        assert_eq!(fk.get(&mut db, c1).unwrap(), Some(parent));

        let mut expected = vec![c1, c2];
        expected.sort();
        assert_eq!(fk.referencing(&mut db, parent).unwrap(), expected);

        assert_eq!(fk.clear_references(&mut db, parent).unwrap(), 2);
        assert!(fk.referencing(&mut db, parent).unwrap().is_empty());
        assert_eq!(fk.get(&mut db, c2).unwrap(), None);
    }
}
