//! Census demographics loader

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::bucket::{IncomeBucket, PopulationBucket};
use crate::download::{CensusClient, ZctaRecord};
use crate::parser::{IntoRow, Row};
use crate::schema::tables::{ZIP_BOUNDARIES, ZIP_DEMOGRAPHICS};
use crate::ui::{Phase, Ui};
use crate::writer::{Dependent, SqliteWriter};

/// One `zip_demographics` row; buckets always derive from the stored numbers
#[derive(Debug, Clone, PartialEq)]
pub struct DemographicsRow {
    pub zip_code: String,
    pub median_household_income: Option<i64>,
    pub population: Option<i64>,
    pub income_bucket: IncomeBucket,
    pub population_bucket: PopulationBucket,
}

impl DemographicsRow {
    pub fn new(zip_code: String, income: Option<f64>, population: Option<f64>) -> Self {
        let median_household_income = income.map(|v| v.round() as i64);
        let population = population.map(|v| v.round() as i64);

        Self {
            zip_code,
            median_household_income,
            population,
            income_bucket: IncomeBucket::from_value(median_household_income.map(|v| v as f64)),
            population_bucket: PopulationBucket::from_value(population.map(|v| v as f64)),
        }
    }
}

impl From<ZctaRecord> for DemographicsRow {
    fn from(record: ZctaRecord) -> Self {
        DemographicsRow::new(
            record.zip_code,
            record.median_household_income,
            record.population,
        )
    }
}

impl IntoRow for DemographicsRow {
    fn into_row(self) -> Row {
        vec![
            self.zip_code.into(),
            self.median_household_income.into(),
            self.population.into(),
            self.income_bucket.label().to_string().into(),
            self.population_bucket.label().to_string().into(),
        ]
    }
}

/// Outcome of a demographics load
#[derive(Debug, Default)]
pub struct DemographicsReport {
    pub rows: u64,
    pub income: BTreeMap<IncomeBucket, usize>,
    pub population: BTreeMap<PopulationBucket, usize>,
}

impl DemographicsReport {
    fn log_distribution(&self, ui: &mut impl Ui) {
        let total = self.rows.max(1) as f64;

        ui.log("Income bucket distribution:");
        for (bucket, count) in &self.income {
            ui.log(format!(
                "- {}: {} ZIP codes ({:.1}%)",
                bucket,
                count,
                *count as f64 / total * 100.0
            ));
        }

        ui.log("Population bucket distribution:");
        for (bucket, count) in &self.population {
            ui.log(format!(
                "- {}: {} ZIP codes ({:.1}%)",
                bucket,
                count,
                *count as f64 / total * 100.0
            ));
        }
    }
}

/// Fetch every ZCTA from the Census API and replace `zip_demographics`.
///
/// The store is not opened until the fetch has succeeded, so a failed fetch
/// leaves the previous table untouched.
pub fn load_demographics(
    client: &CensusClient,
    db_path: &Path,
    ui: &mut impl Ui,
) -> Result<DemographicsReport> {
    ui.set_phase(Phase::Fetching);
    ui.set_info("Requesting demographic data from the Census API");

    let records = client.fetch_zcta_demographics()?;
    info!(zctas = records.len(), "received Census data");

    write_demographics(records, db_path, ui)
}

/// Bucket the records and replace `zip_demographics` with them
pub fn write_demographics(
    records: Vec<ZctaRecord>,
    db_path: &Path,
    ui: &mut impl Ui,
) -> Result<DemographicsReport> {
    ui.set_phase(Phase::Loading);
    ui.set_info(format!("Processing {} ZIP codes", records.len()));

    let rows: Vec<DemographicsRow> = records.into_iter().map(DemographicsRow::from).collect();

    let mut report = DemographicsReport::default();
    for row in &rows {
        *report.income.entry(row.income_bucket).or_default() += 1;
        *report.population.entry(row.population_bucket).or_default() += 1;
    }

    let total = rows.len() as u64;
    let mut writer = SqliteWriter::open(db_path)?;
    report.rows = writer.replace_table_with_dependents(
        &ZIP_DEMOGRAPHICS,
        rows.into_iter().map(IntoRow::into_row),
        total,
        &[Dependent {
            table: ZIP_BOUNDARIES.name,
            column: "zip_code",
        }],
        ui,
    )?;
    writer.finalize()?;

    report.log_distribution(ui);
    Ok(report)
}
