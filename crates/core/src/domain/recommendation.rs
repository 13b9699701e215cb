use crate::domain::baseline::Baseline;
use crate::domain::forecast::{ForecastPoint, TrendDirection};
use crate::domain::quote::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    BuyNow,
    Buy,
    Wait,
    Alternate,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BuyNow => "BUY NOW",
            Self::Buy => "BUY",
            Self::Wait => "WAIT",
            Self::Alternate => "ALTERNATE",
        };
        f.write_str(s)
    }
}

/// Identifies the classifier rule that produced an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    BelowP10,
    PriceCeiling,
    BelowMedianWithinBudget,
    AboveMedian,
    BudgetOnly,
}

/// The value the current price was compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    P10,
    P50,
    P90,
    Budget,
    /// Budget scaled by the over-budget tolerance.
    BudgetCeiling,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::P10 => "10th percentile",
            Self::P50 => "median",
            Self::P90 => "90th percentile",
            Self::Budget => "budget",
            Self::BudgetCeiling => "budget ceiling",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    LessOrEqual,
    GreaterOrEqual,
    Greater,
}

impl Relation {
    pub fn holds(self, lhs: Decimal, rhs: Decimal) -> bool {
        match self {
            Self::LessOrEqual => lhs <= rhs,
            Self::GreaterOrEqual => lhs >= rhs,
            Self::Greater => lhs > rhs,
        }
    }
}

/// One observation the classifier based its decision on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RationaleFact {
    Comparison {
        metric: Metric,
        current_price: Decimal,
        relation: Relation,
        threshold: Decimal,
        holds: bool,
    },
    BaselineUnavailable {
        sample_size: usize,
    },
    SampleSize {
        sample_size: usize,
        factor: f64,
    },
    ForecastTrend {
        direction: TrendDirection,
        reduces_confidence: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: Action,
    pub confidence: f64,
    pub current_price: Money,
    pub baseline_used: Baseline,
    pub forecast_used: Vec<ForecastPoint>,
    pub decided_by: RuleId,
    pub rationale_facts: Vec<RationaleFact>,
}
