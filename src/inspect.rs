//! Store diagnostics: table shapes, row counts and bucket distributions

use anyhow::{bail, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::fmt;

use crate::bucket::{IncomeBucket, PopulationBucket};
use crate::parser::SqlValue;
use crate::schema::Dialect;
use crate::writer::table_exists;

#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub decl_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub rows: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreSummary {
    pub tables: Vec<TableSummary>,
}

/// Every table in the store with its columns and row count
pub fn summarize(conn: &Connection) -> Result<StoreSummary> {
    let names: Vec<String> = conn
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )?
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;

    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        let quoted = Dialect::Sqlite.quote(&name);

        let columns = conn
            .prepare(&format!("PRAGMA table_info({})", quoted))?
            .query_map([], |row| {
                Ok(ColumnInfo {
                    name: row.get(1)?,
                    decl_type: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let rows = conn.query_row(&format!("SELECT COUNT(*) FROM {}", quoted), [], |row| {
            row.get(0)
        })?;

        tables.push(TableSummary {
            name,
            columns,
            rows,
        });
    }

    Ok(StoreSummary { tables })
}

/// ZIP counts per bucket, in semantic order
#[derive(Debug, Clone, Default, Serialize)]
pub struct BucketDistribution {
    pub income: Vec<(IncomeBucket, i64)>,
    pub population: Vec<(PopulationBucket, i64)>,
    /// Labels that match no bucket; a non-empty list means the table was edited by hand
    pub unrecognized: Vec<(String, i64)>,
}

pub fn bucket_distribution(conn: &Connection) -> Result<BucketDistribution> {
    let mut distribution = BucketDistribution::default();

    for (column, is_income) in [("income_bucket", true), ("population_bucket", false)] {
        let counts = conn
            .prepare(&format!(
                "SELECT {column}, COUNT(*) FROM zip_demographics GROUP BY {column}"
            ))?
            .query_map([], |row| {
                Ok((row.get::<_, Option<String>>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for (label, count) in counts {
            let label = label.unwrap_or_default();
            if is_income {
                match label.parse::<IncomeBucket>() {
                    Ok(bucket) => distribution.income.push((bucket, count)),
                    Err(_) => distribution.unrecognized.push((label, count)),
                }
            } else {
                match label.parse::<PopulationBucket>() {
                    Ok(bucket) => distribution.population.push((bucket, count)),
                    Err(_) => distribution.unrecognized.push((label, count)),
                }
            }
        }
    }

    distribution.income.sort();
    distribution.population.sort();
    Ok(distribution)
}

#[derive(Debug, Clone, Serialize)]
pub struct ZipCoverage {
    pub total_zips: i64,
    pub zips_with_demographics: i64,
}

/// How many centroid ZIP codes have demographics
pub fn zip_coverage(conn: &Connection) -> Result<ZipCoverage> {
    let coverage = conn.query_row(
        "SELECT COUNT(DISTINCT zc.zip_code), COUNT(DISTINCT zd.zip_code)
         FROM zip_coordinates zc
         LEFT JOIN zip_demographics zd ON zc.zip_code = zd.zip_code",
        [],
        |row| {
            Ok(ZipCoverage {
                total_zips: row.get(0)?,
                zips_with_demographics: row.get(1)?,
            })
        },
    )?;
    Ok(coverage)
}

/// First `limit` rows of a table as JSON objects
pub fn sample(
    conn: &Connection,
    table: &str,
    limit: usize,
) -> Result<Vec<serde_json::Map<String, serde_json::Value>>> {
    if !table_exists(conn, table)? {
        bail!("No such table: {}", table);
    }

    let mut stmt = conn.prepare(&format!(
        "SELECT * FROM {} LIMIT ?1",
        Dialect::Sqlite.quote(table)
    ))?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

    let rows = stmt
        .query_map([limit as i64], |row| {
            let mut object = serde_json::Map::new();
            for (i, name) in columns.iter().enumerate() {
                let value = SqlValue::from(row.get_ref(i)?);
                object.insert(name.clone(), value.into());
            }
            Ok(object)
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

impl fmt::Display for StoreSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for table in &self.tables {
            writeln!(f, "{}:", table.name)?;
            for col in &table.columns {
                writeln!(f, "  - {} ({})", col.name, col.decl_type)?;
            }
            writeln!(f, "  Total rows: {}", table.rows)?;
        }
        Ok(())
    }
}

impl fmt::Display for BucketDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Income bucket distribution:")?;
        for (bucket, count) in &self.income {
            writeln!(f, "  {:<14} {}", bucket.label(), count)?;
        }
        writeln!(f, "Population bucket distribution:")?;
        for (bucket, count) in &self.population {
            writeln!(f, "  {:<14} {}", bucket.label(), count)?;
        }
        for (label, count) in &self.unrecognized {
            writeln!(f, "  unrecognized label {:?}: {}", label, count)?;
        }
        Ok(())
    }
}
