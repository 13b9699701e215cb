use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// Rejections raised at the query boundary, before any component runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be a three-letter airport code (got {value:?})")]
    InvalidAirportCode { field: &'static str, value: String },

    #[error("origin and destination must differ (both {0})")]
    SameOriginDestination(String),

    #[error("budget must be positive (got {0})")]
    NonPositiveBudget(Decimal),

    #[error("flexibility_days must not be negative (got {0})")]
    NegativeFlexibility(i64),

    #[error("flexibility_days must be at most {max} (got {requested})")]
    FlexibilityTooLarge { requested: i64, max: u32 },

    #[error("{field} {date} plus {flexibility_days} flexible days is past the supported calendar")]
    DateOutOfRange {
        field: &'static str,
        date: NaiveDate,
        flexibility_days: i64,
    },

    #[error("return_date {return_date} is before departure_date {departure_date}")]
    ReturnBeforeDeparture {
        departure_date: NaiveDate,
        return_date: NaiveDate,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("invalid query: {0}")]
    InvalidInput(#[from] ValidationError),

    #[error("no fare data available for {route}: {reason}")]
    DataUnavailable { route: String, reason: String },
}

impl QueryError {
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}
