use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

use super::record::{normalize_zip, IntoRow, Row};

/// One institution from the college location CSV.
///
/// Column names follow the HIFLD colleges export; unlisted columns are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct CollegeRecord {
    #[serde(rename = "NAME", default)]
    pub name: Option<String>,
    #[serde(rename = "ADDRESS", default)]
    pub address: Option<String>,
    #[serde(rename = "CITY", default)]
    pub city: Option<String>,
    #[serde(rename = "STATE", default)]
    pub state: Option<String>,
    #[serde(rename = "ZIP", default)]
    pub zip: Option<String>,
    #[serde(rename = "TELEPHONE", default)]
    pub telephone: Option<String>,
    #[serde(rename = "POPULATION", default, deserialize_with = "csv::invalid_option")]
    pub population: Option<i64>,
    #[serde(rename = "COUNTY", default)]
    pub county: Option<String>,
    #[serde(rename = "COUNTYFIPS", default)]
    pub countyfips: Option<String>,
    #[serde(rename = "COUNTRY", default)]
    pub country: Option<String>,
    #[serde(rename = "LATITUDE", default, deserialize_with = "csv::invalid_option")]
    pub latitude: Option<f64>,
    #[serde(rename = "LONGITUDE", default, deserialize_with = "csv::invalid_option")]
    pub longitude: Option<f64>,
    #[serde(rename = "WEBSITE", default)]
    pub website: Option<String>,
}

impl IntoRow for CollegeRecord {
    fn into_row(self) -> Row {
        vec![
            self.name.into(),
            self.address.into(),
            self.city.into(),
            self.state.into(),
            self.zip.as_deref().and_then(normalize_zip).into(),
            self.telephone.into(),
            self.population.into(),
            self.county.into(),
            self.countyfips.into(),
            self.country.into(),
            self.latitude.into(),
            self.longitude.into(),
            self.website.into(),
        ]
    }
}

/// Raw row of the ZIP centroid CSV
#[derive(Debug, Deserialize)]
struct RawCoordinate {
    #[serde(rename = "STD_ZIP5")]
    zip: String,
    #[serde(rename = "USPS_ZIP_PREF_CITY", default)]
    city: Option<String>,
    #[serde(rename = "USPS_ZIP_PREF_STATE", default)]
    state: Option<String>,
    #[serde(rename = "LATITUDE", default, deserialize_with = "csv::invalid_option")]
    latitude: Option<f64>,
    #[serde(rename = "LONGITUDE", default, deserialize_with = "csv::invalid_option")]
    longitude: Option<f64>,
}

/// Centroid of one ZIP code
#[derive(Debug, Clone, PartialEq)]
pub struct ZipCoordinate {
    pub zip_code: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl IntoRow for ZipCoordinate {
    fn into_row(self) -> Row {
        vec![
            self.zip_code.into(),
            self.city.into(),
            self.state.into(),
            self.latitude.into(),
            self.longitude.into(),
        ]
    }
}

/// Records read from a CSV file plus the rows that had to be dropped
#[derive(Debug)]
pub struct CsvRecords<T> {
    pub records: Vec<T>,
    pub skipped: usize,
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV: {:?}", path))
}

/// Read the college location CSV
pub fn read_colleges(path: &Path) -> Result<CsvRecords<CollegeRecord>> {
    let mut reader = open_reader(path)?;
    let mut records = Vec::new();
    let mut skipped = 0;

    for (line, result) in reader.deserialize::<CollegeRecord>().enumerate() {
        match result {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(line = line + 2, error = %e, "skipping unreadable college row");
                skipped += 1;
            }
        }
    }

    Ok(CsvRecords { records, skipped })
}

/// Read the ZIP centroid CSV; repeated ZIP codes keep their first row
pub fn read_zip_coordinates(path: &Path) -> Result<CsvRecords<ZipCoordinate>> {
    let mut reader = open_reader(path)?;
    let mut records = Vec::new();
    let mut seen = HashSet::new();
    let mut skipped = 0;

    for (line, result) in reader.deserialize::<RawCoordinate>().enumerate() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!(line = line + 2, error = %e, "skipping unreadable coordinate row");
                skipped += 1;
                continue;
            }
        };

        let Some(zip_code) = normalize_zip(&raw.zip) else {
            warn!(line = line + 2, zip = %raw.zip, "skipping row with invalid ZIP");
            skipped += 1;
            continue;
        };

        if !seen.insert(zip_code.clone()) {
            skipped += 1;
            continue;
        }

        records.push(ZipCoordinate {
            zip_code,
            city: raw.city,
            state: raw.state,
            latitude: raw.latitude,
            longitude: raw.longitude,
        });
    }

    Ok(CsvRecords { records, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SqlValue;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_read_colleges_ignores_extra_columns_and_bad_numbers() {
        let file = write_csv(
            "X,NAME,ADDRESS,CITY,STATE,ZIP,TELEPHONE,POPULATION,COUNTY,COUNTYFIPS,COUNTRY,LATITUDE,LONGITUDE,WEBSITE\n\
             1,Harvard University,Massachusetts Hall,Cambridge,MA,2138,(617) 495-1000,36012,MIDDLESEX,25017,USA,42.37,-71.12,harvard.edu\n\
             2,Mystery College,,Nowhere,ZZ,99999,,lots,,,USA,bad,,\n",
        );

        let csv = read_colleges(file.path()).unwrap();
        assert_eq!(csv.records.len(), 2);
        assert_eq!(csv.skipped, 0);

        let harvard = csv.records[0].clone().into_row();
        assert_eq!(harvard[0], SqlValue::Text("Harvard University".into()));
        assert_eq!(harvard[4], SqlValue::Text("02138".into()));
        assert_eq!(harvard[6], SqlValue::Integer(36012));

        let mystery = &csv.records[1];
        assert_eq!(mystery.population, None);
        assert_eq!(mystery.latitude, None);
        assert_eq!(mystery.address, None);
    }

    #[test]
    fn test_read_zip_coordinates_pads_and_dedupes() {
        let file = write_csv(
            "STD_ZIP5,USPS_ZIP_PREF_CITY,USPS_ZIP_PREF_STATE,LATITUDE,LONGITUDE\n\
             601,ADJUNTAS,PR,18.18,-66.75\n\
             00601,ADJUNTAS,PR,0,0\n\
             02138,CAMBRIDGE,MA,42.38,-71.13\n\
             nope,NOWHERE,ZZ,1,1\n",
        );

        let csv = read_zip_coordinates(file.path()).unwrap();
        assert_eq!(csv.skipped, 2);
        assert_eq!(csv.records.len(), 2);
        assert_eq!(csv.records[0].zip_code, "00601");
        assert_eq!(csv.records[0].latitude, Some(18.18));
        assert_eq!(csv.records[1].city.as_deref(), Some("CAMBRIDGE"));
    }
}
