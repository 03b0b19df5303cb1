//! ZCTA boundary loader

use anyhow::{bail, Context, Result};
use geo::{GeodesicArea, MultiPolygon};
use rusqlite::Connection;
use shapefile::dbase::{FieldValue, Record};
use shapefile::Shape;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::download::{download_file, extract_zip, find_shapefile, ScratchDir, SHAPEFILE_PARTS};
use crate::parser::{normalize_zip, IntoRow, Row};
use crate::schema::tables::{ZIP_BOUNDARIES, ZIP_DEMOGRAPHICS};
use crate::ui::{Phase, Ui};
use crate::writer::{table_exists, KeepOnly, SqliteWriter};

/// ZCTA code attribute in the 2020-vintage TIGER files
pub const DEFAULT_ZIP_FIELD: &str = "ZCTA5CE20";

/// Where the polygons come from
#[derive(Debug, Clone)]
pub enum BoundarySource {
    /// Zipped shapefile to download
    Url(String),
    /// Zipped shapefile already on disk
    Archive(PathBuf),
    /// Extracted `.shp` (with its `.dbf` alongside)
    Shapefile(PathBuf),
}

#[derive(Debug, Clone)]
pub struct BoundaryOptions {
    /// Attribute holding the ZCTA code
    pub zip_field: String,
    /// Parent directory for the scratch directory
    pub scratch_base: Option<PathBuf>,
}

impl Default for BoundaryOptions {
    fn default() -> Self {
        Self {
            zip_field: DEFAULT_ZIP_FIELD.to_string(),
            scratch_base: None,
        }
    }
}

/// One `zip_boundaries` row
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryRow {
    pub zip_code: String,
    /// GeoJSON geometry
    pub geometry: String,
    pub area_sq_meters: f64,
    pub perimeter_meters: f64,
}

impl BoundaryRow {
    /// Serialize a ZCTA polygon and measure it on the ellipsoid
    pub fn from_geometry(zip_code: String, polygon: &MultiPolygon<f64>) -> Result<Self> {
        let (perimeter_meters, area_sq_meters) = polygon.geodesic_perimeter_area_unsigned();

        // Single-part ZCTAs are written as plain polygons
        let value = match polygon.0.as_slice() {
            [single] => geojson::Value::from(single),
            _ => geojson::Value::from(polygon),
        };
        let geometry = serde_json::to_string(&geojson::Geometry::new(value))
            .context("Failed to serialize geometry")?;

        Ok(Self {
            zip_code,
            geometry,
            area_sq_meters,
            perimeter_meters,
        })
    }
}

impl IntoRow for BoundaryRow {
    fn into_row(self) -> Row {
        vec![
            self.zip_code.into(),
            self.geometry.into(),
            Some(self.area_sq_meters).into(),
            Some(self.perimeter_meters).into(),
        ]
    }
}

/// Load ZCTA polygons for every ZIP code present in `zip_demographics`.
///
/// Polygons are upserted by ZIP code and rows for ZIPs no longer in the
/// demographics table are removed, all in one transaction. Downloads and
/// extracted files live in a scratch directory that is removed on every exit
/// path.
pub fn load_boundaries(
    source: &BoundarySource,
    db_path: &Path,
    options: &BoundaryOptions,
    ui: &mut impl Ui,
) -> Result<u64> {
    let wanted = demographic_zips(db_path)?;
    if wanted.is_empty() {
        bail!("zip_demographics is empty; load demographics before boundaries");
    }
    info!(zips = wanted.len(), "ZIP codes with demographics");

    let mut scratch = None;
    let shapefile_path = match source {
        BoundarySource::Shapefile(path) => path.clone(),
        BoundarySource::Archive(path) => {
            let dir = scratch.insert(ScratchDir::new(options.scratch_base.clone())?);
            unpack(path, dir, ui)?
        }
        BoundarySource::Url(url) => {
            let dir = scratch.insert(ScratchDir::new(options.scratch_base.clone())?);
            ui.set_phase(Phase::Downloading);
            ui.set_info(format!("Downloading {}", url));
            let archive = dir.join("zcta.zip");
            download_file(url, &archive, ui)?;
            unpack(&archive, dir, ui)?
        }
    };

    ui.set_phase(Phase::Loading);
    ui.set_info(format!("Reading shapefile {:?}", shapefile_path));
    let rows = read_boundaries(&shapefile_path, &options.zip_field, &wanted, ui)?;

    let stored = store_boundaries(rows, db_path, ui)?;
    ui.log(format!("Added {} ZIP code boundaries", stored));

    // Explicit so the cleanup log follows the load summary
    drop(scratch);
    Ok(stored)
}

/// Upsert boundary rows and prune ZIPs without demographics
pub fn store_boundaries(rows: Vec<BoundaryRow>, db_path: &Path, ui: &mut impl Ui) -> Result<u64> {
    let total = rows.len() as u64;
    let mut writer = SqliteWriter::open(db_path)?;
    let count = writer.upsert_rows(
        &ZIP_BOUNDARIES,
        rows.into_iter().map(IntoRow::into_row),
        total,
        Some(KeepOnly {
            table: ZIP_DEMOGRAPHICS.name,
            column: "zip_code",
        }),
        ui,
    )?;
    writer.finalize()?;
    Ok(count)
}

fn unpack(archive: &Path, scratch: &ScratchDir, ui: &mut impl Ui) -> Result<PathBuf> {
    ui.set_phase(Phase::Extracting);
    let extracted = extract_zip(archive, scratch.path(), SHAPEFILE_PARTS, ui)?;
    find_shapefile(&extracted)
        .map(Path::to_path_buf)
        .with_context(|| format!("No .shp file in {:?}", archive))
}

/// ZIP codes present in `zip_demographics`
fn demographic_zips(db_path: &Path) -> Result<HashSet<String>> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database: {:?}", db_path))?;

    if !table_exists(&conn, ZIP_DEMOGRAPHICS.name)? {
        return Ok(HashSet::new());
    }

    let mut stmt = conn.prepare("SELECT zip_code FROM zip_demographics")?;
    let zips = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<HashSet<_>>>()?;
    Ok(zips)
}

fn read_boundaries(
    path: &Path,
    zip_field: &str,
    wanted: &HashSet<String>,
    ui: &mut impl Ui,
) -> Result<Vec<BoundaryRow>> {
    let mut reader = shapefile::Reader::from_path(path)
        .with_context(|| format!("Failed to open shapefile: {:?}", path))?;

    let mut rows = Vec::new();
    let mut scanned: u64 = 0;

    for result in reader.iter_shapes_and_records() {
        let (shape, record) =
            result.with_context(|| format!("Failed to read shape #{}", scanned))?;
        scanned += 1;

        if scanned % 5000 == 0 {
            ui.set_info(format!("Scanned {} shapes, kept {}", scanned, rows.len()));
        }

        let Some(zip_code) = zip_of(&record, zip_field) else {
            continue;
        };
        if !wanted.contains(&zip_code) {
            continue;
        }

        let polygon = match shape {
            Shape::Polygon(polygon) => MultiPolygon::<f64>::from(polygon),
            Shape::NullShape => {
                debug!(zip = %zip_code, "skipping null shape");
                continue;
            }
            other => bail!(
                "ZCTA {} has unsupported shape type {:?}",
                zip_code,
                other.shapetype()
            ),
        };

        rows.push(BoundaryRow::from_geometry(zip_code, &polygon)?);
    }

    info!(scanned, kept = rows.len(), "read ZCTA shapefile");
    Ok(rows)
}

fn zip_of(record: &Record, field: &str) -> Option<String> {
    match record.get(field)? {
        FieldValue::Character(Some(code)) => normalize_zip(code),
        FieldValue::Numeric(Some(code)) => normalize_zip(&format!("{}", *code as i64)),
        _ => None,
    }
}
