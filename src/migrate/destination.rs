use async_trait::async_trait;
use rusqlite::{Connection, ErrorCode};
use std::path::Path;
use thiserror::Error;

use crate::parser::Row;
use crate::schema::{Dialect, TableSchema};
use crate::writer::{generate_create_table, generate_indexes};

/// Why a destination refused an insert
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InsertError {
    /// The statement or a value exceeded an engine size limit
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// Duplicate key or other constraint violation
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Connection loss, schema mismatch or anything else that would fail every row
    #[error("{0}")]
    Fatal(String),
}

impl InsertError {
    /// Whether retrying the rows in smaller batches can help
    pub fn is_row_scoped(&self) -> bool {
        !matches!(self, InsertError::Fatal(_))
    }
}

/// A relational engine rows can be copied into.
///
/// `insert_batch` is atomic: either every row lands or none does.
#[async_trait]
pub trait Destination: Send {
    /// Engine name for logs and reports
    fn name(&self) -> &str;

    /// Create the table and its indexes if absent
    async fn ensure_table(&mut self, schema: &TableSchema) -> Result<(), InsertError>;

    async fn insert_batch(
        &mut self,
        schema: &TableSchema,
        columns: &[&str],
        rows: &[Row],
    ) -> Result<(), InsertError>;
}

/// SQLite file as a migration target
pub struct SqliteDestination {
    conn: Connection,
}

impl SqliteDestination {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[async_trait]
impl Destination for SqliteDestination {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn ensure_table(&mut self, schema: &TableSchema) -> Result<(), InsertError> {
        let mut statements = vec![generate_create_table(schema, Dialect::Sqlite)];
        statements.extend(generate_indexes(schema, Dialect::Sqlite));

        for sql in statements {
            self.conn
                .execute(&sql, [])
                .map_err(|e| InsertError::Fatal(e.to_string()))?;
        }
        Ok(())
    }

    async fn insert_batch(
        &mut self,
        schema: &TableSchema,
        columns: &[&str],
        rows: &[Row],
    ) -> Result<(), InsertError> {
        let quoted: Vec<String> = columns.iter().map(|c| Dialect::Sqlite.quote(c)).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            Dialect::Sqlite.quote(schema.name),
            quoted.join(", "),
            placeholders
        );

        // Dropping the transaction on error rolls the whole batch back
        let tx = self.conn.transaction().map_err(classify_sqlite)?;
        {
            let mut stmt = tx.prepare_cached(&sql).map_err(classify_sqlite)?;
            for row in rows {
                for (idx, value) in row.iter().enumerate() {
                    value.bind_to(idx + 1, &mut stmt).map_err(classify_sqlite)?;
                }
                stmt.raw_execute().map_err(classify_sqlite)?;
            }
        }
        tx.commit().map_err(classify_sqlite)
    }
}

fn classify_sqlite(e: rusqlite::Error) -> InsertError {
    match e.sqlite_error_code() {
        Some(ErrorCode::TooBig) => InsertError::PayloadTooLarge(e.to_string()),
        Some(ErrorCode::ConstraintViolation) => InsertError::Constraint(e.to_string()),
        _ => InsertError::Fatal(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SqlValue;
    use crate::schema::tables::ZIP_COORDINATES;

    fn row(zip: &str) -> Row {
        vec![
            SqlValue::Text(zip.into()),
            SqlValue::Null,
            SqlValue::Null,
            SqlValue::Real(1.0),
            SqlValue::Real(2.0),
        ]
    }

    fn count(dest: &SqliteDestination) -> i64 {
        dest.connection()
            .query_row("SELECT COUNT(*) FROM zip_coordinates", [], |r| r.get(0))
            .unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_key_rolls_back_whole_batch() {
        let mut dest = SqliteDestination::from_connection(Connection::open_in_memory().unwrap());
        dest.ensure_table(&ZIP_COORDINATES).await.unwrap();
        let columns = ZIP_COORDINATES.insert_columns();

        dest.insert_batch(&ZIP_COORDINATES, &columns, &[row("00001")])
            .await
            .unwrap();

        let err = dest
            .insert_batch(&ZIP_COORDINATES, &columns, &[row("00002"), row("00001")])
            .await
            .unwrap_err();
        assert!(matches!(err, InsertError::Constraint(_)));
        assert!(err.is_row_scoped());
        assert_eq!(count(&dest), 1);
    }

    #[tokio::test]
    async fn test_ensure_table_is_idempotent() {
        let mut dest = SqliteDestination::from_connection(Connection::open_in_memory().unwrap());
        dest.ensure_table(&ZIP_COORDINATES).await.unwrap();
        dest.ensure_table(&ZIP_COORDINATES).await.unwrap();
        assert_eq!(count(&dest), 0);
    }
}
