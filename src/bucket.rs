//! Income and population buckets.
//!
//! Every bucket label in the store, the HTTP responses and the front end comes
//! from the two enums below. Variants are declared in their semantic order, so
//! `Ord` sorts them the way the map legend lists them, with `Unknown` last.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Median household income bucket for a ZIP code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IncomeBucket {
    #[serde(rename = "Under $100k")]
    Under100k,
    #[serde(rename = "$100k-$125k")]
    From100kTo125k,
    #[serde(rename = "$125k-$150k")]
    From125kTo150k,
    #[serde(rename = "$150k-$175k")]
    From150kTo175k,
    #[serde(rename = "$175k-$200k")]
    From175kTo200k,
    #[serde(rename = "$200k-$250k")]
    From200kTo250k,
    #[serde(rename = "$250k+")]
    Over250k,
    Unknown,
}

/// Population bucket for a ZIP code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PopulationBucket {
    #[serde(rename = "Under 1,000")]
    Under1k,
    #[serde(rename = "1,000-5,000")]
    From1kTo5k,
    #[serde(rename = "5,000-10,000")]
    From5kTo10k,
    #[serde(rename = "10,000-25,000")]
    From10kTo25k,
    #[serde(rename = "25,000-40,000")]
    From25kTo40k,
    #[serde(rename = "40,000+")]
    Over40k,
    Unknown,
}

/// Lower bounds (inclusive) of each income bucket after `Under100k`
const INCOME_BOUNDS: [(f64, IncomeBucket); 6] = [
    (250_000.0, IncomeBucket::Over250k),
    (200_000.0, IncomeBucket::From200kTo250k),
    (175_000.0, IncomeBucket::From175kTo200k),
    (150_000.0, IncomeBucket::From150kTo175k),
    (125_000.0, IncomeBucket::From125kTo150k),
    (100_000.0, IncomeBucket::From100kTo125k),
];

const POPULATION_BOUNDS: [(f64, PopulationBucket); 5] = [
    (40_000.0, PopulationBucket::Over40k),
    (25_000.0, PopulationBucket::From25kTo40k),
    (10_000.0, PopulationBucket::From10kTo25k),
    (5_000.0, PopulationBucket::From5kTo10k),
    (1_000.0, PopulationBucket::From1kTo5k),
];

impl IncomeBucket {
    /// All buckets in semantic order
    pub const ALL: [IncomeBucket; 8] = [
        IncomeBucket::Under100k,
        IncomeBucket::From100kTo125k,
        IncomeBucket::From125kTo150k,
        IncomeBucket::From150kTo175k,
        IncomeBucket::From175kTo200k,
        IncomeBucket::From200kTo250k,
        IncomeBucket::Over250k,
        IncomeBucket::Unknown,
    ];

    /// The bucket the map hides by default
    pub const LOWEST: IncomeBucket = IncomeBucket::Under100k;

    pub fn from_value(income: Option<f64>) -> Self {
        match income {
            Some(v) if !v.is_nan() => INCOME_BOUNDS
                .iter()
                .find(|(lower, _)| v >= *lower)
                .map(|(_, bucket)| *bucket)
                .unwrap_or(IncomeBucket::Under100k),
            _ => IncomeBucket::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            IncomeBucket::Under100k => "Under $100k",
            IncomeBucket::From100kTo125k => "$100k-$125k",
            IncomeBucket::From125kTo150k => "$125k-$150k",
            IncomeBucket::From150kTo175k => "$150k-$175k",
            IncomeBucket::From175kTo200k => "$175k-$200k",
            IncomeBucket::From200kTo250k => "$200k-$250k",
            IncomeBucket::Over250k => "$250k+",
            IncomeBucket::Unknown => "Unknown",
        }
    }
}

impl PopulationBucket {
    /// All buckets in semantic order
    pub const ALL: [PopulationBucket; 7] = [
        PopulationBucket::Under1k,
        PopulationBucket::From1kTo5k,
        PopulationBucket::From5kTo10k,
        PopulationBucket::From10kTo25k,
        PopulationBucket::From25kTo40k,
        PopulationBucket::Over40k,
        PopulationBucket::Unknown,
    ];

    pub fn from_value(population: Option<f64>) -> Self {
        match population {
            Some(v) if !v.is_nan() => POPULATION_BOUNDS
                .iter()
                .find(|(lower, _)| v >= *lower)
                .map(|(_, bucket)| *bucket)
                .unwrap_or(PopulationBucket::Under1k),
            _ => PopulationBucket::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PopulationBucket::Under1k => "Under 1,000",
            PopulationBucket::From1kTo5k => "1,000-5,000",
            PopulationBucket::From5kTo10k => "5,000-10,000",
            PopulationBucket::From10kTo25k => "10,000-25,000",
            PopulationBucket::From25kTo40k => "25,000-40,000",
            PopulationBucket::Over40k => "40,000+",
            PopulationBucket::Unknown => "Unknown",
        }
    }
}

/// Bucket a median household income; missing values map to `Unknown`
pub fn income_bucket(income: Option<f64>) -> IncomeBucket {
    IncomeBucket::from_value(income)
}

/// Bucket a population count; missing values map to `Unknown`
pub fn population_bucket(population: Option<f64>) -> PopulationBucket {
    PopulationBucket::from_value(population)
}

/// Label did not match any bucket
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown bucket label: {0:?}")]
pub struct UnknownLabel(pub String);

impl FromStr for IncomeBucket {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IncomeBucket::ALL
            .into_iter()
            .find(|b| b.label() == s)
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

impl FromStr for PopulationBucket {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PopulationBucket::ALL
            .into_iter()
            .find(|b| b.label() == s)
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

impl fmt::Display for IncomeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for PopulationBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
