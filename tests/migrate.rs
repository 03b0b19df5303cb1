//! Store migration into a size-limited destination.
//!
//! The destination wraps a real SQLite file and rejects any batch holding a
//! row over a byte limit, standing in for a server's max packet size.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

use edu_demographics::migrate::{migrate, Destination, InsertError, SqliteDestination, TableStatus};
use edu_demographics::parser::{Row, SqlValue};
use edu_demographics::schema::tables::{COLLEGES, ZIP_COORDINATES};
use edu_demographics::schema::TableSchema;
use edu_demographics::ui::SilentUi;
use edu_demographics::writer::SqliteWriter;

/// Random seed for reproducible sampling
const RANDOM_SEED: u64 = 42;

const ROWS: usize = 250;

struct SizeLimited {
    inner: SqliteDestination,
    max_row_bytes: usize,
    max_batch_rows: usize,
    batches: usize,
}

impl SizeLimited {
    fn new(path: &Path, max_row_bytes: usize, max_batch_rows: usize) -> Self {
        Self {
            inner: SqliteDestination::open(path).unwrap(),
            max_row_bytes,
            max_batch_rows,
            batches: 0,
        }
    }
}

#[async_trait]
impl Destination for SizeLimited {
    fn name(&self) -> &str {
        "size-limited sqlite"
    }

    async fn ensure_table(&mut self, schema: &TableSchema) -> Result<(), InsertError> {
        self.inner.ensure_table(schema).await
    }

    async fn insert_batch(
        &mut self,
        schema: &TableSchema,
        columns: &[&str],
        rows: &[Row],
    ) -> Result<(), InsertError> {
        self.batches += 1;
        if rows.len() > self.max_batch_rows {
            return Err(InsertError::PayloadTooLarge(format!("{} rows", rows.len())));
        }
        for row in rows {
            let bytes: usize = row.iter().map(SqlValue::byte_len).sum();
            if bytes > self.max_row_bytes {
                return Err(InsertError::PayloadTooLarge(format!("row of {} bytes", bytes)));
            }
        }
        self.inner.insert_batch(schema, columns, rows).await
    }
}

fn coordinate(i: usize, city: String) -> Row {
    vec![
        SqlValue::Text(format!("{:05}", i)),
        SqlValue::Text(city),
        SqlValue::Text("MA".into()),
        SqlValue::Real(42.0 + i as f64 / 1000.0),
        SqlValue::Real(-71.0),
    ]
}

/// Source store with one oversized row at a seeded random position
fn source_with_oversized_row(dir: &Path) -> (PathBuf, usize) {
    let mut rng = StdRng::seed_from_u64(RANDOM_SEED);
    let oversized = rng.gen_range(0..ROWS);

    let rows: Vec<Row> = (0..ROWS)
        .map(|i| {
            let city = if i == oversized { "X".repeat(10_000) } else { format!("TOWN {}", i) };
            coordinate(i, city)
        })
        .collect();

    let db = dir.join("source.db");
    let mut writer = SqliteWriter::open(&db).unwrap();
    writer
        .replace_table(&ZIP_COORDINATES, rows, ROWS as u64, &mut SilentUi::new())
        .unwrap();
    writer.finalize().unwrap();
    (db, oversized)
}

fn zips(db: &Path) -> Vec<String> {
    let conn = Connection::open(db).unwrap();
    let mut stmt = conn
        .prepare("SELECT zip_code FROM zip_coordinates ORDER BY zip_code")
        .unwrap();
    stmt.query_map([], |r| r.get(0))
        .unwrap()
        .collect::<rusqlite::Result<_>>()
        .unwrap()
}

#[tokio::test]
async fn test_oversized_row_is_skipped_once() {
    let dir = tempfile::tempdir().unwrap();
    let (source, oversized) = source_with_oversized_row(dir.path());
    let dest_path = dir.path().join("dest.db");
    let mut dest = SizeLimited::new(&dest_path, 1_000, usize::MAX);

    let report = migrate(&source, &mut dest, &[&ZIP_COORDINATES], 100, &mut SilentUi::new())
        .await
        .unwrap();

    let table = report.table("zip_coordinates").unwrap();
    assert_eq!(table.rows_read, ROWS as u64);
    assert_eq!(table.inserted, ROWS as u64 - 1);
    assert_eq!(table.skipped.len(), 1);
    assert_eq!(table.skipped[0].index, oversized);
    assert!(table.skipped[0].reason.contains("payload too large"));

    let expected: Vec<String> = (0..ROWS)
        .filter(|i| *i != oversized)
        .map(|i| format!("{:05}", i))
        .collect();
    assert_eq!(zips(&dest_path), expected);
}

#[tokio::test]
async fn test_batch_limit_is_fully_recovered() {
    let dir = tempfile::tempdir().unwrap();
    let (source, _) = source_with_oversized_row(dir.path());
    let dest_path = dir.path().join("dest.db");
    let mut dest = SizeLimited::new(&dest_path, usize::MAX, 7);

    let report = migrate(&source, &mut dest, &[&ZIP_COORDINATES], 100, &mut SilentUi::new())
        .await
        .unwrap();

    let table = report.table("zip_coordinates").unwrap();
    assert_eq!(table.inserted, ROWS as u64);
    assert!(table.skipped.is_empty());
    assert!(table.splits > 0);
    assert_eq!(zips(&dest_path).len(), ROWS);
}

#[tokio::test]
async fn test_rerun_never_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let (source, _) = source_with_oversized_row(dir.path());
    let dest_path = dir.path().join("dest.db");

    let mut dest = SizeLimited::new(&dest_path, 1_000, usize::MAX);
    migrate(&source, &mut dest, &[&ZIP_COORDINATES], 50, &mut SilentUi::new())
        .await
        .unwrap();
    let first = zips(&dest_path);

    // Every key already exists, so every row fails its primary key on its own
    let report = migrate(&source, &mut dest, &[&ZIP_COORDINATES], 50, &mut SilentUi::new())
        .await
        .unwrap();
    let table = report.table("zip_coordinates").unwrap();
    assert_eq!(table.inserted, 0);
    assert_eq!(table.skipped.len(), ROWS);
    assert_eq!(zips(&dest_path), first);
}

#[tokio::test]
async fn test_serial_ids_are_preserved_and_missing_tables_reported() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.db");

    let rows: Vec<Row> = ["Alpha College", "Beta College", "Gamma College"]
        .iter()
        .map(|name| {
            let mut row: Row = vec![SqlValue::Null; COLLEGES.insert_columns().len()];
            row[0] = SqlValue::Text(name.to_string());
            row
        })
        .collect();
    let mut writer = SqliteWriter::open(&source).unwrap();
    writer
        .replace_table(&COLLEGES, rows, 3, &mut SilentUi::new())
        .unwrap();
    writer
        .connection()
        .execute("DELETE FROM colleges WHERE name = 'Beta College'", [])
        .unwrap();
    writer.finalize().unwrap();

    let dest_path = dir.path().join("dest.db");
    let mut dest = SqliteDestination::open(&dest_path).unwrap();
    let report = migrate(
        &source,
        &mut dest,
        &[&COLLEGES, &ZIP_COORDINATES],
        10,
        &mut SilentUi::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.table("colleges").unwrap().inserted, 2);
    assert_eq!(report.table("zip_coordinates").unwrap().status, TableStatus::Missing);

    let ids: Vec<(i64, String)> = dest
        .connection()
        .prepare("SELECT id, name FROM colleges ORDER BY id")
        .unwrap()
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
        .unwrap()
        .collect::<rusqlite::Result<_>>()
        .unwrap();
    assert_eq!(
        ids,
        vec![(1, "Alpha College".to_string()), (3, "Gamma College".to_string())]
    );
}
