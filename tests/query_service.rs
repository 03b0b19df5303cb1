//! End-to-end tests for the HTTP query service.
//!
//! A small store is built once through the real loaders and every test drives
//! the router in-process with `oneshot`.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use geo::{polygon, MultiPolygon};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tower::ServiceExt;

use edu_demographics::download::ZctaRecord;
use edu_demographics::load::{
    load_colleges, load_zip_coordinates, store_boundaries, write_demographics, BoundaryRow,
};
use edu_demographics::server::{router, AppState, CachePolicy, Store};
use edu_demographics::ui::SilentUi;

// =============================================================================
// Shared Test Store
// =============================================================================

const COLLEGES_CSV: &str = "\
NAME,ADDRESS,CITY,STATE,ZIP,TELEPHONE,POPULATION,COUNTY,COUNTYFIPS,COUNTRY,LATITUDE,LONGITUDE,WEBSITE
Harvard University,Massachusetts Hall,CAMBRIDGE,MA,02138,617-495-1000,36000,MIDDLESEX,25017,USA,42.3744,-71.1169,http://www.harvard.edu
Penn Station Institute,1 Penn Plaza,NEW YORK,NY,10001,212-000-0000,800,NEW YORK,36061,USA,40.7506,-73.9935,
Stanford University,450 Serra Mall,STANFORD,CA,94305,650-723-2300,17000,SANTA CLARA,06085,USA,37.4275,-122.1697,http://www.stanford.edu
Menlo College,1000 El Camino Real,ATHERTON,CA,94027,650-543-3753,800,SAN MATEO,06081,USA,37.4613,-122.1997,http://www.menlo.edu
Windy City College,30 E Lake St,CHICAGO,IL,60601,312-000-0000,NOT AVAILABLE,COOK,17031,USA,41.8858,-87.6250,
Nowhere College,1 Void Rd,NOWHERE,AK,99999,,,,,USA,,,
";

const COORDINATES_CSV: &str = "\
STD_ZIP5,USPS_ZIP_PREF_CITY,USPS_ZIP_PREF_STATE,LATITUDE,LONGITUDE
02138,CAMBRIDGE,MA,42.3803,-71.1389
10001,NEW YORK,NY,40.7506,-73.9972
94305,STANFORD,CA,37.4241,-122.1661
94027,ATHERTON,CA,37.4539,-122.2032
60601,CHICAGO,IL,41.8857,-87.6181
99999,NOWHERE,AK,64.0000,-150.0000
";

/// (zip, median household income, population)
const DEMOGRAPHICS: &[(&str, Option<f64>, Option<f64>)] = &[
    ("02138", Some(120_000.0), Some(45_000.0)),
    ("10001", Some(90_000.0), Some(500.0)),
    ("94305", Some(180_000.0), Some(15_000.0)),
    ("94027", Some(260_000.0), Some(7_000.0)),
    ("60601", None, Some(3_000.0)),
];

struct TestStore {
    _dir: TempDir,
    db_path: PathBuf,
}

static TEST_STORE: Lazy<TestStore> = Lazy::new(|| {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = build_store(dir.path());
    TestStore { _dir: dir, db_path }
});

fn square(lon: f64, lat: f64) -> MultiPolygon<f64> {
    let d = 0.01;
    MultiPolygon(vec![polygon![
        (x: lon - d, y: lat - d),
        (x: lon + d, y: lat - d),
        (x: lon + d, y: lat + d),
        (x: lon - d, y: lat + d),
        (x: lon - d, y: lat - d),
    ]])
}

fn build_store(dir: &Path) -> PathBuf {
    let db = dir.join("store.db");
    let mut ui = SilentUi::new();

    let colleges = dir.join("colleges.csv");
    std::fs::write(&colleges, COLLEGES_CSV).unwrap();
    load_colleges(&colleges, &db, &mut ui).expect("Failed to load colleges");

    let coordinates = dir.join("zip_coordinates.csv");
    std::fs::write(&coordinates, COORDINATES_CSV).unwrap();
    load_zip_coordinates(&coordinates, &db, &mut ui).expect("Failed to load coordinates");

    let records = DEMOGRAPHICS
        .iter()
        .map(|(zip, income, population)| ZctaRecord {
            zip_code: zip.to_string(),
            name: None,
            median_household_income: *income,
            population: *population,
        })
        .collect();
    write_demographics(records, &db, &mut ui).expect("Failed to load demographics");

    // 99999 has no demographics and must be pruned
    let boundaries = [
        ("02138", -71.14, 42.38),
        ("10001", -73.99, 40.75),
        ("94305", -122.17, 37.42),
        ("94027", -122.20, 37.45),
        ("99999", -150.0, 64.0),
    ]
    .into_iter()
    .map(|(zip, lon, lat)| BoundaryRow::from_geometry(zip.to_string(), &square(lon, lat)).unwrap())
    .collect();
    store_boundaries(boundaries, &db, &mut ui).expect("Failed to store boundaries");

    db
}

fn app(db: &Path, policy: CachePolicy) -> Router {
    router(AppState::new(Store::new(db), policy), None)
}

fn shared_app() -> Router {
    app(&TEST_STORE.db_path, CachePolicy::Lazy)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = get(app, uri).await;
    let json = serde_json::from_slice(&body)
        .unwrap_or_else(|e| panic!("{} returned non-JSON ({}): {:?}", uri, e, String::from_utf8_lossy(&body)));
    (status, json)
}

fn names(colleges: &Value) -> Vec<&str> {
    colleges
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["NAME"].as_str().unwrap())
        .collect()
}

// =============================================================================
// Colleges
// =============================================================================

#[tokio::test]
async fn test_colleges_exclude_lowest_income_bucket() {
    let (status, body) = get_json(shared_app(), "/get_colleges").await;
    assert_eq!(status, StatusCode::OK);

    // 10001 is Under $100k, 99999 has no demographics
    assert_eq!(
        names(&body),
        vec!["Harvard University", "Menlo College", "Stanford University", "Windy City College"]
    );
    for college in body.as_array().unwrap() {
        assert_ne!(college["income_bucket"], "Under $100k");
    }
}

#[tokio::test]
async fn test_college_json_shape() {
    let (_, body) = get_json(shared_app(), "/api/colleges").await;
    let harvard = &body[0];

    assert_eq!(harvard["NAME"], "Harvard University");
    assert_eq!(harvard["ZIP"], "02138");
    assert_eq!(harvard["WEBSITE"], "http://www.harvard.edu");
    assert_eq!(harvard["POPULATION"], 36000);
    assert_eq!(harvard["income_bucket"], "$100k-$125k");
    assert_eq!(harvard["population_bucket"], "40,000+");
    // Centroid comes from zip_coordinates, not the college row
    assert_eq!(harvard["latitude"], 42.3803);
    assert_eq!(harvard["LATITUDE"], 42.3744);

    let windy = &body[3];
    assert_eq!(windy["income_bucket"], "Unknown");
    assert!(windy["POPULATION"].is_null());
}

#[tokio::test]
async fn test_colleges_range_filters() {
    let (_, body) = get_json(shared_app(), "/get_colleges?min_income=150000").await;
    assert_eq!(names(&body), vec!["Menlo College", "Stanford University"]);

    let (_, body) = get_json(shared_app(), "/get_colleges?max_population=10000").await;
    assert_eq!(names(&body), vec!["Menlo College", "Windy City College"]);

    let (_, body) = get_json(
        shared_app(),
        "/get_colleges?min_income=100000&max_income=120000&min_population=&max_population=",
    )
    .await;
    assert_eq!(names(&body), vec!["Harvard University"]);
}

#[tokio::test]
async fn test_colleges_reject_bad_ranges() {
    let (status, body) =
        get_json(shared_app(), "/get_colleges?min_income=200000&max_income=100000").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("min_income"));

    let (status, _) = get_json(shared_app(), "/get_colleges?min_population=many").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Boundaries
// =============================================================================

#[tokio::test]
async fn test_boundaries_are_a_subset_of_demographics() {
    let (status, body) = get_json(shared_app(), "/get_boundaries").await;
    assert_eq!(status, StatusCode::OK);

    let demographic_zips: HashSet<&str> = DEMOGRAPHICS.iter().map(|(zip, _, _)| *zip).collect();
    let boundaries = body.as_array().unwrap();
    let zips: Vec<&str> = boundaries
        .iter()
        .map(|b| b["zip_code"].as_str().unwrap())
        .collect();

    assert_eq!(zips, vec!["02138", "94027", "94305"]);
    for boundary in boundaries {
        assert!(demographic_zips.contains(boundary["zip_code"].as_str().unwrap()));
        assert_ne!(boundary["income_bucket"], "Under $100k");

        let geometry: Value = serde_json::from_str(boundary["geometry"].as_str().unwrap()).unwrap();
        assert_eq!(geometry["type"], "Polygon");
    }
}

// =============================================================================
// Lookups
// =============================================================================

#[tokio::test]
async fn test_demographics_summary() {
    let (status, body) = get_json(shared_app(), "/api/demographics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["min_income"], 90000);
    assert_eq!(body["max_income"], 260000);
    assert_eq!(body["min_population"], 500);
    assert_eq!(body["max_population"], 45000);
}

#[tokio::test]
async fn test_buckets_are_in_semantic_order() {
    let (_, body) = get_json(shared_app(), "/api/buckets").await;

    assert_eq!(
        body["income_buckets"],
        serde_json::json!(["$100k-$125k", "$175k-$200k", "$250k+", "Unknown"])
    );
    // Lexicographic order would put "1,000-5,000" first
    assert_eq!(
        body["population_buckets"],
        serde_json::json!(["Under 1,000", "1,000-5,000", "5,000-10,000", "10,000-25,000", "40,000+"])
    );
}

#[tokio::test]
async fn test_index_page_lists_buckets() {
    let (status, body) = get(shared_app(), "/").await;
    assert_eq!(status, StatusCode::OK);

    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("value=\"$250k+\""));
    assert!(html.contains("value=\"10,000-25,000\""));
    assert!(!html.contains("Under $100k"));
    assert!(html.contains("/static/js/map.js"));
}

#[tokio::test]
async fn test_zip_detail() {
    // Leading zero restored
    let (status, body) = get_json(shared_app(), "/api/zip/2138").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["zip_code"], "02138");
    assert_eq!(body["city"], "CAMBRIDGE");
    assert_eq!(body["income_bucket"], "$100k-$125k");

    let (status, _) = get_json(shared_app(), "/api/zip/00000").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get_json(shared_app(), "/api/zip/abcde").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let (status, body) = get_json(shared_app(), "/api/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("/api/nope"));
}

// =============================================================================
// Store availability and caching
// =============================================================================

#[tokio::test]
async fn test_missing_store_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir.path().join("missing.db"), CachePolicy::Lazy);

    let (status, body) = get_json(app.clone(), "/get_colleges").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());

    let (status, _) = get_json(app, "/api/buckets").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_eager_cache_survives_store_removal() {
    let dir = tempfile::tempdir().unwrap();
    let db = build_store(dir.path());

    let state = AppState::new(Store::new(&db), CachePolicy::Eager);
    state.warm().await.unwrap();
    assert!(state.cache.is_warm());
    let app = router(state, None);

    std::fs::remove_file(&db).unwrap();

    let (status, body) = get_json(app.clone(), "/get_boundaries").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);

    // Uncached lookups go to the store
    let (status, _) = get_json(app, "/api/demographics").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_no_cache_sees_reloaded_store() {
    let dir = tempfile::tempdir().unwrap();
    let db = build_store(dir.path());
    let app = app(&db, CachePolicy::None);

    let (_, before) = get_json(app.clone(), "/api/buckets").await;
    assert_eq!(before["income_buckets"][0], "$100k-$125k");

    let records = vec![ZctaRecord {
        zip_code: "02138".into(),
        name: None,
        median_household_income: Some(300_000.0),
        population: Some(45_000.0),
    }];
    write_demographics(records, &db, &mut SilentUi::new()).unwrap();

    let (_, after) = get_json(app, "/api/buckets").await;
    assert_eq!(after["income_buckets"], serde_json::json!(["$250k+"]));
}
