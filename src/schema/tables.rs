//! Table schema definitions for the demographics store

use super::types::*;

pub static COLLEGES: TableSchema = TableSchema {
    name: "colleges",
    columns: &[
        Column::serial("id"),
        Column::new("name", ColumnType::Text(255)),
        Column::new("address", ColumnType::Text(255)),
        Column::new("city", ColumnType::Text(100)),
        Column::new("state", ColumnType::Text(2)),
        Column::new("zip", ColumnType::Text(10)),
        Column::new("telephone", ColumnType::Text(20)),
        Column::new("population", ColumnType::Integer),
        Column::new("county", ColumnType::Text(100)),
        Column::new("countyfips", ColumnType::Text(10)),
        Column::new("country", ColumnType::Text(10)),
        Column::new("latitude", ColumnType::Real),
        Column::new("longitude", ColumnType::Real),
        Column::new("website", ColumnType::Text(255)),
    ],
    indexes: &[Index::on(&["zip"])],
};

pub static ZIP_DEMOGRAPHICS: TableSchema = TableSchema {
    name: "zip_demographics",
    columns: &[
        Column::key("zip_code", ColumnType::Text(10)),
        Column::new("median_household_income", ColumnType::Integer),
        Column::new("population", ColumnType::Integer),
        Column::new("income_bucket", ColumnType::Text(50)),
        Column::new("population_bucket", ColumnType::Text(50)),
    ],
    indexes: &[
        Index::on(&["income_bucket"]),
        Index::on(&["population_bucket"]),
    ],
};

pub static ZIP_COORDINATES: TableSchema = TableSchema {
    name: "zip_coordinates",
    columns: &[
        Column::key("zip_code", ColumnType::Text(10)),
        Column::new("city", ColumnType::Text(100)),
        Column::new("state", ColumnType::Text(2)),
        Column::new("latitude", ColumnType::Real),
        Column::new("longitude", ColumnType::Real),
    ],
    indexes: &[],
};

pub static ZIP_BOUNDARIES: TableSchema = TableSchema {
    name: "zip_boundaries",
    columns: &[
        Column::key("zip_code", ColumnType::Text(10)),
        // GeoJSON text
        Column::new("geometry", ColumnType::LongText),
        Column::new("area_sq_meters", ColumnType::Real),
        Column::new("perimeter_meters", ColumnType::Real),
    ],
    indexes: &[],
};

/// All table schemas, in migration order
pub static ALL_TABLES: &[&TableSchema] = &[
    &COLLEGES,
    &ZIP_DEMOGRAPHICS,
    &ZIP_COORDINATES,
    &ZIP_BOUNDARIES,
];

/// Get table schema by name
pub fn get_table(name: &str) -> Option<&'static TableSchema> {
    ALL_TABLES.iter().find(|t| t.name == name).copied()
}

/// Get all table names
pub fn table_names() -> Vec<&'static str> {
    ALL_TABLES.iter().map(|t| t.name).collect()
}
