use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde_json::Value;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use crate::error::Error;
use crate::parser::{normalize_zip, parse_number};
use crate::ui::Ui;

/// ACS 5-year estimates endpoint
pub const CENSUS_API_URL: &str = "https://api.census.gov/data/2021/acs/acs5";
/// National ZCTA boundaries, TIGER/Line 2023
pub const ZCTA_SHAPEFILE_URL: &str =
    "https://www2.census.gov/geo/tiger/TIGER2023/ZCTA520/tl_2023_us_zcta520.zip";

const INCOME_VAR: &str = "B19013_001E";
const POPULATION_VAR: &str = "B01003_001E";
const NAME_VAR: &str = "NAME";
const ZCTA_GEOGRAPHY: &str = "zip code tabulation area";

/// One ZCTA row from the Census API
#[derive(Debug, Clone, PartialEq)]
pub struct ZctaRecord {
    pub zip_code: String,
    pub name: Option<String>,
    pub median_household_income: Option<f64>,
    pub population: Option<f64>,
}

fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!("edu-demographics/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(30))
        // National datasets take minutes; only the connect is bounded
        .timeout(None::<Duration>)
        .build()
        .context("Failed to create HTTP client")
}

pub struct CensusClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl CensusClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Fetch median household income and population for every ZCTA.
    ///
    /// Single attempt; a non-success status becomes [`Error::UpstreamFetch`].
    pub fn fetch_zcta_demographics(&self) -> Result<Vec<ZctaRecord>> {
        let get = format!("{},{},{}", INCOME_VAR, POPULATION_VAR, NAME_VAR);
        let geography = format!("{}:*", ZCTA_GEOGRAPHY);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("get", get.as_str()),
                ("for", geography.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .context("Failed to reach the Census API")?;

        let status = response.status();
        let text = response.text().context("Failed to read Census response")?;

        if !status.is_success() {
            return Err(Error::UpstreamFetch {
                status: status.as_u16(),
                body: text.chars().take(500).collect(),
            }
            .into());
        }

        parse_census_table(&text)
    }
}

/// Parse the Census API's array-of-arrays table.
///
/// The first row is the header; columns are located by variable name.
/// Negative values are Census annotation codes (e.g. `-666666666`) and count
/// as missing, as does anything that is not a number.
pub fn parse_census_table(body: &str) -> Result<Vec<ZctaRecord>> {
    let table: Vec<Vec<Value>> =
        serde_json::from_str(body).context("Failed to parse Census response")?;

    let mut rows = table.into_iter();
    let header = rows.next().context("Census response has no header row")?;

    let position = |name: &str| {
        header
            .iter()
            .position(|h| h.as_str() == Some(name))
            .with_context(|| format!("Census response is missing column {}", name))
    };
    let income_idx = position(INCOME_VAR)?;
    let population_idx = position(POPULATION_VAR)?;
    let zip_idx = position(ZCTA_GEOGRAPHY)?;
    let name_idx = position(NAME_VAR).ok();

    let records = rows
        .filter_map(|row| {
            let zip_code = row.get(zip_idx).and_then(as_text).and_then(|z| normalize_zip(&z))?;
            Some(ZctaRecord {
                zip_code,
                name: name_idx.and_then(|i| row.get(i)).and_then(as_text),
                median_household_income: row.get(income_idx).and_then(as_measure),
                population: row.get(population_idx).and_then(as_measure),
            })
        })
        .collect();

    Ok(records)
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_measure(value: &Value) -> Option<f64> {
    let number = match value {
        Value::String(s) => parse_number(s),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }?;
    (number >= 0.0).then_some(number)
}

/// Stream `url` into `dest`, reporting progress
pub fn download_file(url: &str, dest: &Path, ui: &mut impl Ui) -> Result<u64> {
    let response = http_client()?
        .get(url)
        .send()
        .with_context(|| format!("Failed to start download: {}", url))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::UpstreamFetch {
            status: status.as_u16(),
            body: format!("download of {} refused", url),
        }
        .into());
    }

    let total_size = response.content_length().unwrap_or(0);

    let mut file = std::fs::File::create(dest).context("Failed to create destination file")?;

    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 8192];
    let mut reader = response;

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .context("Failed to read from response")?;

        if bytes_read == 0 {
            break;
        }

        file.write_all(&buffer[..bytes_read])
            .context("Failed to write to file")?;

        downloaded += bytes_read as u64;
        ui.set_progress(downloaded, total_size, format_bytes(downloaded, total_size));
    }

    ui.log(format!("Downloaded {}", format_bytes(downloaded, total_size)));
    Ok(downloaded)
}

/// Format bytes as human-readable string
fn format_bytes(current: u64, total: u64) -> String {
    fn fmt(bytes: u64) -> String {
        if bytes >= 1_000_000_000 {
            format!("{:.1} GB", bytes as f64 / 1_000_000_000.0)
        } else if bytes >= 1_000_000 {
            format!("{:.1} MB", bytes as f64 / 1_000_000.0)
        } else if bytes >= 1_000 {
            format!("{:.1} KB", bytes as f64 / 1_000.0)
        } else {
            format!("{} B", bytes)
        }
    }
    format!("{} / {}", fmt(current), fmt(total))
}
