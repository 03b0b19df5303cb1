use axum::extract::{Path, Query, State};
use axum::http::Uri;
use axum::response::Html;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use super::page::render_index;
use super::state::AppState;
use super::store::{self, Boundary, BucketLists, College, CollegeFilter, DemographicsSummary, ZipDetail};
use crate::error::{Error, Result};
use crate::parser::{normalize_zip, parse_number};

/// Raw query string for `/get_colleges`; values are validated into a
/// [`CollegeFilter`] so a bad number is a 400 rather than an extractor rejection
#[derive(Debug, Default, Deserialize)]
pub struct RangeParams {
    pub min_income: Option<String>,
    pub max_income: Option<String>,
    pub min_population: Option<String>,
    pub max_population: Option<String>,
}

impl TryFrom<RangeParams> for CollegeFilter {
    type Error = Error;

    fn try_from(params: RangeParams) -> Result<Self> {
        let filter = CollegeFilter {
            min_income: bound("min_income", params.min_income)?,
            max_income: bound("max_income", params.max_income)?,
            min_population: bound("min_population", params.min_population)?,
            max_population: bound("max_population", params.max_population)?,
        };

        check_range("income", filter.min_income, filter.max_income)?;
        check_range("population", filter.min_population, filter.max_population)?;
        Ok(filter)
    }
}

fn bound(name: &str, raw: Option<String>) -> Result<Option<f64>> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_number(value)
            .map(Some)
            .ok_or_else(|| Error::Validation(format!("{} must be a number, got {:?}", name, value))),
    }
}

fn check_range(name: &str, min: Option<f64>, max: Option<f64>) -> Result<()> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(Error::Validation(format!(
            "min_{name} ({min}) is greater than max_{name} ({max})"
        ))),
        _ => Ok(()),
    }
}

pub async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>> {
    let lists = state.bucket_lists().await?;
    Ok(Html(render_index(&lists)))
}

pub async fn colleges(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Vec<College>>> {
    let filter = CollegeFilter::try_from(params)?;
    let colleges = state
        .store
        .run(move |conn| store::colleges(conn, &filter))
        .await?;
    Ok(Json(colleges))
}

pub async fn boundaries(State(state): State<Arc<AppState>>) -> Result<Json<Arc<Vec<Boundary>>>> {
    Ok(Json(state.boundaries().await?))
}

pub async fn demographics(State(state): State<Arc<AppState>>) -> Result<Json<DemographicsSummary>> {
    let summary = state.store.run(store::demographics_summary).await?;
    Ok(Json(summary))
}

pub async fn buckets(State(state): State<Arc<AppState>>) -> Result<Json<Arc<BucketLists>>> {
    Ok(Json(state.bucket_lists().await?))
}

pub async fn zip_detail(
    State(state): State<Arc<AppState>>,
    Path(zip_code): Path<String>,
) -> Result<Json<ZipDetail>> {
    let zip = normalize_zip(&zip_code)
        .ok_or_else(|| Error::Validation(format!("invalid ZIP code {:?}", zip_code)))?;

    let lookup = zip.clone();
    state
        .store
        .run(move |conn| store::zip_detail(conn, &lookup))
        .await?
        .map(Json)
        .ok_or_else(|| Error::NotFound(format!("ZIP code {}", zip)))
}

pub async fn not_found(uri: Uri) -> Error {
    Error::NotFound(format!("no route for {}", uri.path()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(min_income: &str, max_income: &str) -> RangeParams {
        RangeParams {
            min_income: Some(min_income.into()),
            max_income: Some(max_income.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_params_mean_no_bound() {
        let filter = CollegeFilter::try_from(params("", " ")).unwrap();
        assert_eq!(filter, CollegeFilter::default());
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let err = CollegeFilter::try_from(params("150000", "100000")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("min_income"));
    }

    #[test]
    fn test_non_numeric_is_rejected() {
        let err = CollegeFilter::try_from(params("lots", "")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_equal_bounds_allowed() {
        let filter = CollegeFilter::try_from(params("100000", "100000")).unwrap();
        assert_eq!(filter.min_income, Some(100_000.0));
        assert_eq!(filter.max_income, Some(100_000.0));
    }
}
