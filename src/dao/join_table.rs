use uuid::Uuid;
use crate::core::{Column, ColumnType, Result, Value};
use crate::interface::StorageHandle;
use super::sql::{
    CreateTableBuilder, DeleteStatementBuilder, InsertStatementBuilder, SelectStatementBuilder,
};
use super::table::{fetch, run};

/// A two-column join table, seen from one side.
///
/// `owner_column` holds this side's ids and `other_column` the associated
/// side's. The two sides of a shared table use swapped columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTableDao {
    table: String,
    owner_column: String,
    other_column: String,
}

impl JoinTableDao {
    pub fn new(
        table: impl Into<String>,
        owner_column: impl Into<String>,
        other_column: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            owner_column: owner_column.into(),
            other_column: other_column.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn owner_column(&self) -> &str {
        &self.owner_column
    }

    pub fn other_column(&self) -> &str {
        &self.other_column
    }

    pub fn init(&self, db: &mut dyn StorageHandle) -> Result<()> {
        let mut columns = [&self.owner_column, &self.other_column];
        columns.sort();
        let stmt = CreateTableBuilder::new(&self.table)
            .columns(columns.iter().map(|c| Column::new(*c, ColumnType::Uuid).not_null()))
            .build();
        run(db, stmt)?;
        Ok(())
    }

    /// Ids joined to `owner`, ordered.
    pub fn others(&self, db: &mut dyn StorageHandle, owner: Uuid) -> Result<Vec<Uuid>> {
        let stmt = SelectStatementBuilder::new(&self.table)
            .column(&self.other_column)
            .where_eq(&self.owner_column, Value::Uuid(owner))
            .order_by(&self.other_column)
            .build();
        Ok(fetch(db, stmt)?
            .iter()
            .filter_map(|row| row.get(&self.other_column).and_then(Value::as_uuid))
            .collect())
    }

    pub fn clear(&self, db: &mut dyn StorageHandle, owner: Uuid) -> Result<u64> {
        let stmt = DeleteStatementBuilder::new(&self.table)
            .where_eq(&self.owner_column, Value::Uuid(owner))
            .build();
        run(db, stmt)
    }

    pub fn link(&self, db: &mut dyn StorageHandle, owner: Uuid, other: Uuid) -> Result<()> {
        let stmt = InsertStatementBuilder::new(&self.table)
            .value(&self.owner_column, Value::Uuid(owner))
            .value(&self.other_column, Value::Uuid(other))
            .build();
        run(db, stmt)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::SqliteConnection;

    #[test]
    fn test_both_sides_share_rows() {
        let mut db = SqliteConnection::open_in_memory().unwrap();
        let from_a = JoinTableDao::new("A_B", "A", "B");
        let from_b = JoinTableDao::new("A_B", "B", "A");
        from_a.init(&mut db).unwrap();
        from_b.init(&mut db).unwrap();

        let (a, b1, b2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        from_a.link(&mut db, a, b1).unwrap();
        from_a.link(&mut db, a, b2).unwrap();

        assert_eq!(from_a.others(&mut db, a).unwrap().len(), 2);
        assert_eq!(from_b.others(&mut db, b1).unwrap(), vec![a]);

        assert_eq!(from_a.clear(&mut db, a).unwrap(), 2);
        assert!(from_b.others(&mut db, b2).unwrap().is_empty());
    }
}
