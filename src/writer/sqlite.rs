use anyhow::{Context, Result};
use rusqlite::{Connection, Transaction};
use std::path::Path;
use tracing::info;

use super::schema_gen::{generate_create_table, generate_indexes};
use crate::parser::{Row, SqlValue};
use crate::schema::{Dialect, TableSchema};
use crate::ui::Ui;

const BATCH_SIZE: usize = 1000;

/// Restricts an upserted table to keys that exist in another table
#[derive(Debug, Clone, Copy)]
pub struct KeepOnly<'a> {
    pub table: &'a str,
    pub column: &'a str,
}

/// Child table whose rows must keep a matching key in a replaced table
#[derive(Debug, Clone, Copy)]
pub struct Dependent<'a> {
    pub table: &'a str,
    pub column: &'a str,
}

pub struct SqliteWriter {
    conn: Connection,
}

impl SqliteWriter {
    /// Open (or create) the store for writing
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database: {:?}", db_path))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;",
        )?;

        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Replace a table with the given rows in one transaction.
    ///
    /// The previous contents survive untouched if anything fails before commit.
    pub fn replace_table<I>(
        &mut self,
        schema: &TableSchema,
        rows: I,
        total: u64,
        ui: &mut impl Ui,
    ) -> Result<u64>
    where
        I: IntoIterator<Item = Row>,
    {
        self.replace_table_with_dependents(schema, rows, total, &[], ui)
    }

    /// Like [`Self::replace_table`], also deleting rows of each existing
    /// dependent table whose key vanished from the new contents
    pub fn replace_table_with_dependents<I>(
        &mut self,
        schema: &TableSchema,
        rows: I,
        total: u64,
        dependents: &[Dependent<'_>],
        ui: &mut impl Ui,
    ) -> Result<u64>
    where
        I: IntoIterator<Item = Row>,
    {
        let tx = self.conn.transaction()?;

        tx.execute(
            &format!("DROP TABLE IF EXISTS {}", Dialect::Sqlite.quote(schema.name)),
            [],
        )?;
        create_table(&tx, schema)?;

        let sql = insert_sql(schema, "INSERT");
        let count = write_rows(&tx, schema, &sql, rows, total, ui)?;

        if let Some(key) = schema.key_column() {
            for dependent in dependents {
                if table_exists(&tx, dependent.table)? {
                    prune_orphans(&tx, dependent.table, dependent.column, schema.name, key.name)?;
                }
            }
        }

        tx.commit()
            .with_context(|| format!("Failed to commit {}", schema.name))?;
        ui.clear_progress();
        info!(table = schema.name, rows = count, "table replaced");

        Ok(count)
    }

    /// Insert or replace rows by primary key, creating the table if needed.
    ///
    /// With `keep_only`, rows whose key is absent from the referenced table are
    /// deleted in the same transaction.
    pub fn upsert_rows<I>(
        &mut self,
        schema: &TableSchema,
        rows: I,
        total: u64,
        keep_only: Option<KeepOnly<'_>>,
        ui: &mut impl Ui,
    ) -> Result<u64>
    where
        I: IntoIterator<Item = Row>,
    {
        let tx = self.conn.transaction()?;
        create_table(&tx, schema)?;

        let sql = insert_sql(schema, "INSERT OR REPLACE");
        let count = write_rows(&tx, schema, &sql, rows, total, ui)?;

        if let (Some(keep), Some(key)) = (keep_only, schema.key_column()) {
            prune_orphans(&tx, schema.name, key.name, keep.table, keep.column)?;
        }

        tx.commit()
            .with_context(|| format!("Failed to commit {}", schema.name))?;
        ui.clear_progress();

        Ok(count)
    }

    /// Create any missing indexes for existing tables
    pub fn ensure_indexes(&self, schemas: &[&TableSchema]) -> Result<usize> {
        let mut created = 0;
        for schema in schemas {
            if !table_exists(&self.conn, schema.name)? {
                continue;
            }
            for index_sql in generate_indexes(schema, Dialect::Sqlite) {
                self.conn
                    .execute(&index_sql, [])
                    .with_context(|| format!("Failed to create index for: {}", schema.name))?;
                created += 1;
            }
        }
        Ok(created)
    }

    /// Finalize the database
    pub fn finalize(self) -> Result<()> {
        self.conn.execute_batch("PRAGMA optimize;")?;
        Ok(())
    }
}

pub fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n > 0)
}

/// Delete rows of `table` whose `column` has no match in `parent.parent_column`
fn prune_orphans(
    tx: &Transaction,
    table: &str,
    column: &str,
    parent: &str,
    parent_column: &str,
) -> Result<usize> {
    let q = |s: &str| Dialect::Sqlite.quote(s);
    let pruned = tx
        .execute(
            &format!(
                "DELETE FROM {} WHERE {} NOT IN (SELECT {} FROM {})",
                q(table),
                q(column),
                q(parent_column),
                q(parent),
            ),
            [],
        )
        .with_context(|| format!("Failed to prune {}", table))?;
    if pruned > 0 {
        info!(table, pruned, "removed rows without a parent key");
    }
    Ok(pruned)
}

fn create_table(tx: &Transaction, schema: &TableSchema) -> Result<()> {
    tx.execute(&generate_create_table(schema, Dialect::Sqlite), [])
        .with_context(|| format!("Failed to create table: {}", schema.name))?;

    for index_sql in generate_indexes(schema, Dialect::Sqlite) {
        tx.execute(&index_sql, [])
            .with_context(|| format!("Failed to create index for: {}", schema.name))?;
    }
    Ok(())
}

fn insert_sql(schema: &TableSchema, verb: &str) -> String {
    let columns: Vec<String> = schema
        .insert_columns()
        .iter()
        .map(|c| Dialect::Sqlite.quote(c))
        .collect();
    let placeholders: Vec<&str> = columns.iter().map(|_| "?").collect();
    format!(
        "{} INTO {} ({}) VALUES ({})",
        verb,
        Dialect::Sqlite.quote(schema.name),
        columns.join(", "),
        placeholders.join(", ")
    )
}

fn write_rows<I>(
    tx: &Transaction,
    schema: &TableSchema,
    sql: &str,
    rows: I,
    total: u64,
    ui: &mut impl Ui,
) -> Result<u64>
where
    I: IntoIterator<Item = Row>,
{
    let width = schema.insert_columns().len();
    let mut count: u64 = 0;
    let mut batch: Vec<Row> = Vec::with_capacity(BATCH_SIZE);

    for row in rows {
        anyhow::ensure!(
            row.len() == width,
            "{} row has {} values, expected {}",
            schema.name,
            row.len(),
            width
        );
        batch.push(row);

        if batch.len() >= BATCH_SIZE {
            insert_batch(tx, sql, &batch)
                .with_context(|| format!("Failed to insert into {}", schema.name))?;
            count += batch.len() as u64;
            ui.set_progress(count, total, schema.name);
            batch.clear();
        }
    }

    // Insert remaining batch
    if !batch.is_empty() {
        insert_batch(tx, sql, &batch)
            .with_context(|| format!("Failed to insert into {}", schema.name))?;
        count += batch.len() as u64;
    }
    ui.set_progress(count, total, schema.name);

    Ok(count)
}

/// Insert a batch of rows into the database
fn insert_batch(tx: &Transaction, sql: &str, batch: &[Row]) -> rusqlite::Result<()> {
    let mut stmt = tx.prepare_cached(sql)?;

    for row in batch {
        for (idx, value) in row.iter().enumerate() {
            value.bind_to(idx + 1, &mut stmt)?;
        }
        stmt.raw_execute()?;
    }

    Ok(())
}

/// Read every row of a table as owned values, with its column names
pub fn read_table(conn: &Connection, table: &str) -> rusqlite::Result<(Vec<String>, Vec<Row>)> {
    let mut stmt = conn.prepare(&format!("SELECT * FROM {}", Dialect::Sqlite.quote(table)))?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let width = columns.len();

    let rows = stmt
        .query_map([], |row| {
            (0..width)
                .map(|i| row.get_ref(i).map(SqlValue::from))
                .collect::<rusqlite::Result<Row>>()
        })?
        .collect::<rusqlite::Result<Vec<Row>>>()?;

    Ok((columns, rows))
}
