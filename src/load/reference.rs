//! College and ZIP centroid loaders

use anyhow::Result;
use std::path::Path;
use tracing::warn;

use crate::parser::{read_colleges, read_zip_coordinates, IntoRow};
use crate::schema::tables::{COLLEGES, ZIP_COORDINATES};
use crate::ui::{Phase, Ui};
use crate::writer::SqliteWriter;

/// Replace the `colleges` table with the contents of a college CSV
pub fn load_colleges(csv_path: &Path, db_path: &Path, ui: &mut impl Ui) -> Result<u64> {
    ui.set_phase(Phase::Loading);
    ui.set_info(format!("Reading college data from {:?}", csv_path));

    let csv = read_colleges(csv_path)?;
    if csv.skipped > 0 {
        warn!(skipped = csv.skipped, "some college rows could not be read");
    }

    let total = csv.records.len() as u64;
    ui.log(format!("Inserting {} college records", total));

    let mut writer = SqliteWriter::open(db_path)?;
    let count = writer.replace_table(
        &COLLEGES,
        csv.records.into_iter().map(IntoRow::into_row),
        total,
        ui,
    )?;
    writer.finalize()?;

    ui.log(format!("College data import complete: {} rows", count));
    Ok(count)
}

/// Replace the `zip_coordinates` table with the contents of a ZIP centroid CSV
pub fn load_zip_coordinates(csv_path: &Path, db_path: &Path, ui: &mut impl Ui) -> Result<u64> {
    ui.set_phase(Phase::Loading);
    ui.set_info(format!("Reading ZIP coordinates from {:?}", csv_path));

    let csv = read_zip_coordinates(csv_path)?;
    if csv.skipped > 0 {
        warn!(
            skipped = csv.skipped,
            "dropped coordinate rows with invalid or repeated ZIP codes"
        );
    }

    let total = csv.records.len() as u64;
    ui.log(format!("Inserting {} ZIP coordinate records", total));

    let mut writer = SqliteWriter::open(db_path)?;
    let count = writer.replace_table(
        &ZIP_COORDINATES,
        csv.records.into_iter().map(IntoRow::into_row),
        total,
        ui,
    )?;
    writer.finalize()?;

    ui.log(format!("ZIP coordinates import complete: {} rows", count));
    Ok(count)
}
