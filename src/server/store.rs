//! Read-only queries behind the HTTP routes

use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use serde::Serialize;
use std::path::PathBuf;
use tracing::warn;

use crate::bucket::{IncomeBucket, PopulationBucket};
use crate::error::{Error, Result};

/// Handle to the SQLite store; every request opens its own connection
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Open a read-only connection; a missing file is `StoreUnavailable`
    pub fn connect(&self) -> Result<Connection> {
        if !self.path.is_file() {
            return Err(Error::StoreUnavailable {
                path: self.path.clone(),
                reason: "database file not found".into(),
            });
        }

        Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| Error::StoreUnavailable {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Run a query on a blocking thread with a fresh connection
    pub async fn run<T, F>(&self, query: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || {
            let conn = store.connect()?;
            query(&conn)
        })
        .await
        .map_err(|e| Error::Internal(format!("query task failed: {}", e)))?
    }
}

/// Bucket labels present in the store, in semantic order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketLists {
    pub income_buckets: Vec<IncomeBucket>,
    pub population_buckets: Vec<PopulationBucket>,
}

/// College joined with its ZIP centroid and buckets.
///
/// Upper-case keys are the college CSV's own columns, as the map expects them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct College {
    #[serde(rename = "NAME")]
    pub name: Option<String>,
    #[serde(rename = "ADDRESS")]
    pub address: Option<String>,
    #[serde(rename = "CITY")]
    pub city: Option<String>,
    #[serde(rename = "STATE")]
    pub state: Option<String>,
    #[serde(rename = "ZIP")]
    pub zip: String,
    #[serde(rename = "TELEPHONE")]
    pub telephone: Option<String>,
    #[serde(rename = "POPULATION")]
    pub population: Option<i64>,
    #[serde(rename = "COUNTY")]
    pub county: Option<String>,
    #[serde(rename = "COUNTYFIPS")]
    pub countyfips: Option<String>,
    #[serde(rename = "WEBSITE")]
    pub website: Option<String>,
    #[serde(rename = "LATITUDE")]
    pub college_latitude: Option<f64>,
    #[serde(rename = "LONGITUDE")]
    pub college_longitude: Option<f64>,
    /// ZIP centroid
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub median_household_income: Option<i64>,
    pub zip_population: Option<i64>,
    pub income_bucket: IncomeBucket,
    pub population_bucket: PopulationBucket,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Boundary {
    pub zip_code: String,
    /// GeoJSON text, parsed by the client
    pub geometry: String,
    pub income_bucket: IncomeBucket,
    pub population_bucket: PopulationBucket,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemographicsSummary {
    pub min_income: Option<i64>,
    pub max_income: Option<i64>,
    pub min_population: Option<i64>,
    pub max_population: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZipDetail {
    pub zip_code: String,
    pub median_household_income: Option<i64>,
    pub population: Option<i64>,
    pub income_bucket: IncomeBucket,
    pub population_bucket: PopulationBucket,
    pub city: Option<String>,
    pub state: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Numeric range filter for colleges; bounds are inclusive
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollegeFilter {
    pub min_income: Option<f64>,
    pub max_income: Option<f64>,
    pub min_population: Option<f64>,
    pub max_population: Option<f64>,
}

/// Parse the stored label, falling back to the numeric value if the label
/// was edited into something unrecognizable
fn income_of(label: Option<String>, income: Option<i64>) -> IncomeBucket {
    label
        .and_then(|l| l.parse().ok())
        .unwrap_or_else(|| IncomeBucket::from_value(income.map(|v| v as f64)))
}

fn population_of(label: Option<String>, population: Option<i64>) -> PopulationBucket {
    label
        .and_then(|l| l.parse().ok())
        .unwrap_or_else(|| PopulationBucket::from_value(population.map(|v| v as f64)))
}

pub fn bucket_lists(conn: &Connection) -> Result<BucketLists> {
    let mut income_buckets = Vec::new();
    let mut stmt =
        conn.prepare("SELECT DISTINCT income_bucket FROM zip_demographics WHERE income_bucket != ?1")?;
    for label in stmt.query_map([IncomeBucket::LOWEST.label()], |r| r.get::<_, Option<String>>(0))? {
        let label = label?.unwrap_or_default();
        match label.parse::<IncomeBucket>() {
            Ok(bucket) => income_buckets.push(bucket),
            Err(e) => warn!(error = %e, "ignoring income bucket"),
        }
    }

    let mut population_buckets = Vec::new();
    let mut stmt = conn.prepare("SELECT DISTINCT population_bucket FROM zip_demographics")?;
    for label in stmt.query_map([], |r| r.get::<_, Option<String>>(0))? {
        let label = label?.unwrap_or_default();
        match label.parse::<PopulationBucket>() {
            Ok(bucket) => population_buckets.push(bucket),
            Err(e) => warn!(error = %e, "ignoring population bucket"),
        }
    }

    income_buckets.sort();
    income_buckets.dedup();
    population_buckets.sort();
    population_buckets.dedup();

    Ok(BucketLists {
        income_buckets,
        population_buckets,
    })
}

/// Colleges outside the lowest income bucket, filtered by ZIP income and
/// population, ordered by name
pub fn colleges(conn: &Connection, filter: &CollegeFilter) -> Result<Vec<College>> {
    let mut stmt = conn.prepare(
        "SELECT c.name, c.address, c.city, c.state, c.zip, c.telephone, c.population,
                c.county, c.countyfips, c.website, c.latitude, c.longitude,
                zc.latitude, zc.longitude,
                zd.median_household_income, zd.population,
                zd.income_bucket, zd.population_bucket
         FROM colleges c
         JOIN zip_demographics zd ON c.zip = zd.zip_code
         JOIN zip_coordinates zc ON c.zip = zc.zip_code
         WHERE zd.income_bucket != ?1
           AND (?2 IS NULL OR zd.median_household_income >= ?2)
           AND (?3 IS NULL OR zd.median_household_income <= ?3)
           AND (?4 IS NULL OR zd.population >= ?4)
           AND (?5 IS NULL OR zd.population <= ?5)
         ORDER BY c.name",
    )?;

    let rows = stmt.query_map(
        params![
            IncomeBucket::LOWEST.label(),
            filter.min_income,
            filter.max_income,
            filter.min_population,
            filter.max_population,
        ],
        college_from_row,
    )?;

    Ok(rows
        .collect::<rusqlite::Result<Vec<_>>>()?
        .into_iter()
        .filter(|c| c.income_bucket != IncomeBucket::LOWEST)
        .collect())
}

fn college_from_row(row: &Row) -> rusqlite::Result<College> {
    let median_household_income = row.get(14)?;
    let zip_population = row.get(15)?;

    Ok(College {
        name: row.get(0)?,
        address: row.get(1)?,
        city: row.get(2)?,
        state: row.get(3)?,
        zip: row.get(4)?,
        telephone: row.get(5)?,
        population: row.get(6)?,
        county: row.get(7)?,
        countyfips: row.get(8)?,
        website: row.get(9)?,
        college_latitude: row.get(10)?,
        college_longitude: row.get(11)?,
        latitude: row.get(12)?,
        longitude: row.get(13)?,
        median_household_income,
        zip_population,
        income_bucket: income_of(row.get(16)?, median_household_income),
        population_bucket: population_of(row.get(17)?, zip_population),
    })
}

/// Boundary polygons for ZIPs outside the lowest income bucket
pub fn boundaries(conn: &Connection) -> Result<Vec<Boundary>> {
    let mut stmt = conn.prepare(
        "SELECT zb.zip_code, zb.geometry, zd.income_bucket, zd.population_bucket,
                zd.median_household_income, zd.population
         FROM zip_boundaries zb
         JOIN zip_demographics zd ON zb.zip_code = zd.zip_code
         WHERE zd.income_bucket != ?1
         ORDER BY zb.zip_code",
    )?;

    let rows = stmt.query_map([IncomeBucket::LOWEST.label()], |row| {
        Ok(Boundary {
            zip_code: row.get(0)?,
            geometry: row.get(1)?,
            income_bucket: income_of(row.get(2)?, row.get(4)?),
            population_bucket: population_of(row.get(3)?, row.get(5)?),
        })
    })?;

    Ok(rows
        .collect::<rusqlite::Result<Vec<_>>>()?
        .into_iter()
        .filter(|b| b.income_bucket != IncomeBucket::LOWEST)
        .collect())
}

/// Income and population extremes over ZIPs with values
pub fn demographics_summary(conn: &Connection) -> Result<DemographicsSummary> {
    let summary = conn.query_row(
        "SELECT MIN(median_household_income), MAX(median_household_income),
                MIN(population), MAX(population)
         FROM zip_demographics",
        [],
        |row| {
            Ok(DemographicsSummary {
                min_income: row.get(0)?,
                max_income: row.get(1)?,
                min_population: row.get(2)?,
                max_population: row.get(3)?,
            })
        },
    )?;
    Ok(summary)
}

pub fn zip_detail(conn: &Connection, zip_code: &str) -> Result<Option<ZipDetail>> {
    let detail = conn
        .query_row(
            "SELECT zd.zip_code, zd.median_household_income, zd.population,
                    zd.income_bucket, zd.population_bucket,
                    zc.city, zc.state, zc.latitude, zc.longitude
             FROM zip_demographics zd
             LEFT JOIN zip_coordinates zc ON zc.zip_code = zd.zip_code
             WHERE zd.zip_code = ?1",
            [zip_code],
            |row| {
                let income = row.get(1)?;
                let population = row.get(2)?;
                Ok(ZipDetail {
                    zip_code: row.get(0)?,
                    median_household_income: income,
                    population,
                    income_bucket: income_of(row.get(3)?, income),
                    population_bucket: population_of(row.get(4)?, population),
                    city: row.get(5)?,
                    state: row.get(6)?,
                    latitude: row.get(7)?,
                    longitude: row.get(8)?,
                })
            },
        )
        .optional()?;
    Ok(detail)
}
