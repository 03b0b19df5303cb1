//! Copy the store from SQLite into another engine.
//!
//! Rows go over in batches. A batch the destination rejects for a
//! row-scoped reason (payload size, constraint) is split in half until the
//! offending rows are isolated; those are skipped and recorded, everything
//! else lands. A fatal error stops the run.

pub mod destination;
pub mod mysql;

pub use destination::{Destination, InsertError, SqliteDestination};
pub use mysql::{MySqlConfig, MySqlDestination};

use anyhow::{bail, Context, Result};
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::parser::{Row, SqlValue};
use crate::schema::TableSchema;
use crate::ui::{Phase, Ui};
use crate::writer::{read_table, table_exists};

pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    /// Zero-based position in the source table
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TableStatus {
    Copied,
    /// Not present in the source
    Missing,
    Empty,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub table: String,
    pub status: TableStatus,
    pub rows_read: u64,
    pub inserted: u64,
    pub skipped: Vec<SkippedRow>,
    /// How many times a rejected batch was halved
    pub splits: u64,
}

impl TableReport {
    fn new(table: &str, status: TableStatus) -> Self {
        Self {
            table: table.to_string(),
            status,
            rows_read: 0,
            inserted: 0,
            skipped: Vec::new(),
            splits: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub tables: Vec<TableReport>,
}

impl MigrationReport {
    pub fn inserted(&self) -> u64 {
        self.tables.iter().map(|t| t.inserted).sum()
    }

    pub fn skipped(&self) -> usize {
        self.tables.iter().map(|t| t.skipped.len()).sum()
    }

    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == name)
    }
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for t in &self.tables {
            match t.status {
                TableStatus::Missing => writeln!(f, "{}: not in source, skipped", t.table)?,
                TableStatus::Empty => writeln!(f, "{}: empty, skipped", t.table)?,
                TableStatus::Copied => {
                    writeln!(
                        f,
                        "{}: {} of {} rows inserted ({} skipped, {} splits)",
                        t.table,
                        t.inserted,
                        t.rows_read,
                        t.skipped.len(),
                        t.splits
                    )?;
                    for row in &t.skipped {
                        writeln!(f, "  row {}: {}", row.index, row.reason)?;
                    }
                }
            }
        }
        write!(
            f,
            "Total: {} rows inserted, {} skipped",
            self.inserted(),
            self.skipped()
        )
    }
}

/// A source table projected onto the destination schema's columns
struct SourceTable {
    columns: Vec<&'static str>,
    rows: Vec<Row>,
}

fn read_source(path: &Path, schema: &'static TableSchema) -> Result<Option<SourceTable>> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("Failed to open source database: {:?}", path))?;

    if !table_exists(&conn, schema.name)? {
        return Ok(None);
    }

    let (names, rows) = read_table(&conn, schema.name)
        .with_context(|| format!("Failed to read {}", schema.name))?;

    let mapping: Vec<(usize, &'static str)> = schema
        .columns
        .iter()
        .filter_map(|col| {
            names
                .iter()
                .position(|n| n.eq_ignore_ascii_case(col.name))
                .map(|i| (i, col.name))
        })
        .collect();

    for name in &names {
        if schema.column(name).is_none() {
            warn!(table = schema.name, column = %name, "source column has no destination, dropping");
        }
    }

    let rows = rows
        .into_iter()
        .map(|row| {
            mapping
                .iter()
                .map(|(i, _)| row.get(*i).cloned().unwrap_or(SqlValue::Null))
                .collect()
        })
        .collect();

    Ok(Some(SourceTable {
        columns: mapping.into_iter().map(|(_, name)| name).collect(),
        rows,
    }))
}

/// Copy `tables` from the SQLite store at `source_db` into `dest`
pub async fn migrate<D>(
    source_db: &Path,
    dest: &mut D,
    tables: &[&'static TableSchema],
    batch_size: usize,
    ui: &mut impl Ui,
) -> Result<MigrationReport>
where
    D: Destination + ?Sized,
{
    if !source_db.is_file() {
        bail!("Source database not found: {:?}", source_db);
    }
    if batch_size == 0 {
        bail!("Batch size must be at least 1");
    }

    ui.set_phase(Phase::Migrating);
    let mut report = MigrationReport::default();

    for &schema in tables {
        let path: PathBuf = source_db.to_path_buf();
        let source = tokio::task::spawn_blocking(move || read_source(&path, schema))
            .await
            .context("Source reader panicked")??;

        let Some(source) = source else {
            ui.log(format!("{}: not in source, skipping", schema.name));
            report.tables.push(TableReport::new(schema.name, TableStatus::Missing));
            continue;
        };
        if source.rows.is_empty() {
            ui.log(format!("{}: no rows, skipping", schema.name));
            report.tables.push(TableReport::new(schema.name, TableStatus::Empty));
            continue;
        }

        dest.ensure_table(schema)
            .await
            .with_context(|| format!("Failed to create {} on {}", schema.name, dest.name()))?;

        let mut table = TableReport::new(schema.name, TableStatus::Copied);
        table.rows_read = source.rows.len() as u64;
        ui.set_info(format!(
            "{}: {} rows to {}",
            schema.name,
            table.rows_read,
            dest.name()
        ));

        for (n, chunk) in source.rows.chunks(batch_size).enumerate() {
            insert_bisecting(dest, schema, &source.columns, chunk, n * batch_size, &mut table)
                .await
                .with_context(|| format!("Migration of {} aborted", schema.name))?;
            ui.set_progress(
                table.inserted + table.skipped.len() as u64,
                table.rows_read,
                schema.name,
            );
        }
        ui.clear_progress();

        ui.log(format!(
            "{}: {} inserted, {} skipped",
            schema.name,
            table.inserted,
            table.skipped.len()
        ));
        report.tables.push(table);
    }

    ui.set_phase(Phase::Complete);
    Ok(report)
}

/// Insert `rows` (starting at source position `offset`), halving rejected
/// batches until single rows fail on their own
async fn insert_bisecting<D>(
    dest: &mut D,
    schema: &TableSchema,
    columns: &[&str],
    rows: &[Row],
    offset: usize,
    report: &mut TableReport,
) -> std::result::Result<(), InsertError>
where
    D: Destination + ?Sized,
{
    // Left halves are pushed last so rows land in source order
    let mut pending = vec![(offset, rows)];

    while let Some((start, batch)) = pending.pop() {
        match dest.insert_batch(schema, columns, batch).await {
            Ok(()) => report.inserted += batch.len() as u64,
            Err(e) if !e.is_row_scoped() => return Err(e),
            Err(e) if batch.len() == 1 => {
                warn!(table = schema.name, row = start, error = %e, "skipping row");
                report.skipped.push(SkippedRow {
                    index: start,
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                debug!(table = schema.name, start, len = batch.len(), error = %e, "splitting batch");
                report.splits += 1;
                let mid = batch.len() / 2;
                let (left, right) = batch.split_at(mid);
                pending.push((start + mid, right));
                pending.push((start, left));
            }
        }
    }

    Ok(())
}
