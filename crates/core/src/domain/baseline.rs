use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Percentile summary of a route's recent prices. Always `p10 <= p50 <= p90`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PercentileBaseline {
    pub p10: Decimal,
    pub p50: Decimal,
    pub p90: Decimal,
    pub sample_size: usize,
    pub mean: Decimal,
    pub std_dev: Decimal,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Baseline {
    Available(PercentileBaseline),
    Unavailable { sample_size: usize },
}

impl Baseline {
    pub fn available(&self) -> Option<&PercentileBaseline> {
        match self {
            Self::Available(b) => Some(b),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn sample_size(&self) -> usize {
        match self {
            Self::Available(b) => b.sample_size,
            Self::Unavailable { sample_size } => *sample_size,
        }
    }
}
