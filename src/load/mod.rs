//! Batch jobs that populate the store.
//!
//! Every loader fully rebuilds its table (boundaries upsert, then prune), so
//! running one twice against the same input leaves identical contents.

pub mod boundaries;
pub mod demographics;
pub mod reference;

pub use boundaries::*;
pub use demographics::*;
pub use reference::*;

use anyhow::Result;
use std::path::Path;

use crate::download::CensusClient;
use crate::ui::Ui;

/// Row counts written by [`setup`]
#[derive(Debug)]
pub struct SetupSummary {
    pub colleges: u64,
    pub zip_coordinates: u64,
    pub demographics: DemographicsReport,
}

/// Load colleges, ZIP centroids and Census demographics into a store.
///
/// Mirrors the one-shot database setup: the three tables are independent and
/// each is replaced in its own transaction.
pub fn setup(
    colleges_csv: &Path,
    coordinates_csv: &Path,
    client: &CensusClient,
    db_path: &Path,
    ui: &mut impl Ui,
) -> Result<SetupSummary> {
    let colleges = load_colleges(colleges_csv, db_path, ui)?;
    let zip_coordinates = load_zip_coordinates(coordinates_csv, db_path, ui)?;
    let demographics = load_demographics(client, db_path, ui)?;

    Ok(SetupSummary {
        colleges,
        zip_coordinates,
        demographics,
    })
}
