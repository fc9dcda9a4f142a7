//! Statement builders.
//!
//! Every builder yields SQL text with `?` placeholders plus the values to
//! bind, so no value is ever spliced into the statement itself.

use crate::core::{Column, Value};

pub fn quote_ident(ident: &str) -> String {
    let escaped = ident.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// A statement and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Builder for CREATE TABLE IF NOT EXISTS statements
pub struct CreateTableBuilder {
    table_name: String,
    columns: Vec<Column>,
    primary_key: Option<String>,
}

impl CreateTableBuilder {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            columns: Vec::new(),
            primary_key: None,
        }
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = Column>) -> Self {
        self.columns.extend(columns);
        self
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }

    pub fn build(self) -> Statement {
        let mut defs: Vec<String> = self
            .columns
            .iter()
            .map(|col| {
                let null_constraint = if col.nullable { "" } else { " NOT NULL" };
                format!(
                    "{} {}{}",
                    quote_ident(&col.name),
                    col.column_type.sql_type(),
                    null_constraint
                )
            })
            .collect();

        if let Some(pk) = &self.primary_key {
            defs.push(format!("PRIMARY KEY ({})", quote_ident(pk)));
        }

        Statement::new(
            format!(
                "CREATE TABLE IF NOT EXISTS {} ({})",
                quote_ident(&self.table_name),
                defs.join(", ")
            ),
            Vec::new(),
        )
    }
}

/// Builder for INSERT statements
pub struct InsertStatementBuilder {
    table_name: String,
    values: Vec<(String, Value)>,
}

impl InsertStatementBuilder {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            values: Vec::new(),
        }
    }

    pub fn value(mut self, column: impl Into<String>, value: Value) -> Self {
        self.values.push((column.into(), value));
        self
    }

    pub fn values(mut self, values: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.values.extend(values);
        self
    }

    pub fn build(self) -> Statement {
        let (columns, params): (Vec<String>, Vec<Value>) = self
            .values
            .into_iter()
            .map(|(col, val)| (quote_ident(&col), val))
            .unzip();
        let placeholders = vec!["?"; columns.len()].join(", ");

        Statement::new(
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(&self.table_name),
                columns.join(", "),
                placeholders
            ),
            params,
        )
    }
}

/// Builder for UPDATE statements
pub struct UpdateStatementBuilder {
    table_name: String,
    set_clause: Vec<(String, Value)>,
    filter: Filter,
}

impl UpdateStatementBuilder {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            set_clause: Vec::new(),
            filter: Filter::default(),
        }
    }

    pub fn set(mut self, column: impl Into<String>, value: Value) -> Self {
        self.set_clause.push((column.into(), value));
        self
    }

    pub fn set_multiple(mut self, updates: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.set_clause.extend(updates);
        self
    }

    pub fn where_eq(mut self, column: impl Into<String>, value: Value) -> Self {
        self.filter.push(column, value);
        self
    }

    pub fn build(self) -> Statement {
        let mut params = Vec::with_capacity(self.set_clause.len());
        let set_parts: Vec<String> = self
            .set_clause
            .into_iter()
            .map(|(col, val)| {
                params.push(val);
                format!("{} = ?", quote_ident(&col))
            })
            .collect();

        let where_part = self.filter.render(&mut params);

        Statement::new(
            format!(
                "UPDATE {} SET {}{}",
                quote_ident(&self.table_name),
                set_parts.join(", "),
                where_part
            ),
            params,
        )
    }
}

/// Builder for DELETE statements
pub struct DeleteStatementBuilder {
    table_name: String,
    filter: Filter,
}

impl DeleteStatementBuilder {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            filter: Filter::default(),
        }
    }

    pub fn where_eq(mut self, column: impl Into<String>, value: Value) -> Self {
        self.filter.push(column, value);
        self
    }

    pub fn build(self) -> Statement {
        let mut params = Vec::new();
        let where_part = self.filter.render(&mut params);
        Statement::new(
            format!("DELETE FROM {}{}", quote_ident(&self.table_name), where_part),
            params,
        )
    }
}

/// Builder for SELECT statements
pub struct SelectStatementBuilder {
    table_name: String,
    columns: Vec<String>,
    filter: Filter,
    order_by: Option<String>,
}

impl SelectStatementBuilder {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            columns: Vec::new(),
            filter: Filter::default(),
            order_by: None,
        }
    }

    /// Columns to select; `*` when none are given.
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    pub fn where_eq(mut self, column: impl Into<String>, value: Value) -> Self {
        self.filter.push(column, value);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self
    }

    pub fn build(self) -> Statement {
        let column_list = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut params = Vec::new();
        let where_part = self.filter.render(&mut params);
        let order_part = self
            .order_by
            .map(|c| format!(" ORDER BY {}", quote_ident(&c)))
            .unwrap_or_default();

        Statement::new(
            format!(
                "SELECT {} FROM {}{}{}",
                column_list,
                quote_ident(&self.table_name),
                where_part,
                order_part
            ),
            params,
        )
    }
}

/// Conjunction of `column = ?` terms. A NULL value renders `IS NULL`.
#[derive(Debug, Default)]
struct Filter {
    terms: Vec<(String, Value)>,
}

impl Filter {
    fn push(&mut self, column: impl Into<String>, value: Value) {
        self.terms.push((column.into(), value));
    }

    fn render(self, params: &mut Vec<Value>) -> String {
        if self.terms.is_empty() {
            return String::new();
        }

        let parts: Vec<String> = self
            .terms
            .into_iter()
            .map(|(col, val)| {
                if val.is_null() {
                    format!("{} IS NULL", quote_ident(&col))
                } else {
                    params.push(val);
                    format!("{} = ?", quote_ident(&col))
                }
            })
            .collect();

        format!(" WHERE {}", parts.join(" AND "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ColumnType;

    #[test]
    fn test_create_table_builder() {
        let stmt = CreateTableBuilder::new("Person")
            .column(Column::new("id", ColumnType::Uuid).not_null())
            .column(Column::new("name", ColumnType::Text))
            .primary_key("id")
            .build();

        assert_eq!(
            stmt.sql,
            "CREATE TABLE IF NOT EXISTS \"Person\" (\"id\" char(36) NOT NULL, \"name\" varchar(255), PRIMARY KEY (\"id\"))"
        );
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_insert_statement_builder() {
        let stmt = InsertStatementBuilder::new("Person")
            .value("id", Value::Text("x".into()))
            .value("age", Value::Integer(3))
            .build();

        assert_eq!(stmt.sql, "INSERT INTO \"Person\" (\"id\", \"age\") VALUES (?, ?)");
        assert_eq!(stmt.params.len(), 2);
    }

    #[test]
    fn test_update_statement_builder() {
        let stmt = UpdateStatementBuilder::new("Child")
            .set("parent", Value::Null)
            .where_eq("parent", Value::Text("p".into()))
            .build();

        assert_eq!(stmt.sql, "UPDATE \"Child\" SET \"parent\" = ? WHERE \"parent\" = ?");
        assert_eq!(stmt.params, vec![Value::Null, Value::Text("p".into())]);
    }

    #[test]
    fn test_select_with_null_filter_and_order() {
        let stmt = SelectStatementBuilder::new("Child")
            .column("id")
            .where_eq("parent", Value::Null)
            .order_by("id")
            .build();

        assert_eq!(
            stmt.sql,
            "SELECT \"id\" FROM \"Child\" WHERE \"parent\" IS NULL ORDER BY \"id\""
        );
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_delete_statement_builder() {
        let stmt = DeleteStatementBuilder::new("A_B")
            .where_eq("A", Value::Text("a".into()))
            .build();
        assert_eq!(stmt.sql, "DELETE FROM \"A_B\" WHERE \"A\" = ?");
    }

    #[test]
    fn test_identifier_quoting() {
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
