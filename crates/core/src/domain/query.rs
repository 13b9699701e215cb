use crate::domain::route::Route;
use crate::error::ValidationError;
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Caller-facing request, as received from the API or CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuery {
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    #[serde(default)]
    pub return_date: Option<NaiveDate>,
    pub budget: Decimal,
    #[serde(default)]
    pub flexibility_days: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedQuery {
    pub route: Route,
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub budget: Decimal,
    pub flexibility_days: u32,
}

impl PriceQuery {
    pub fn validate(&self, max_flexibility_days: u32) -> Result<ValidatedQuery, ValidationError> {
        let route = Route::new(&self.origin, &self.destination)?;

        if self.budget <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveBudget(self.budget));
        }

        if self.flexibility_days < 0 {
            return Err(ValidationError::NegativeFlexibility(self.flexibility_days));
        }
        if self.flexibility_days > i64::from(max_flexibility_days) {
            return Err(ValidationError::FlexibilityTooLarge {
                requested: self.flexibility_days,
                max: max_flexibility_days,
            });
        }

        if let Some(return_date) = self.return_date {
            if return_date < self.departure_date {
                return Err(ValidationError::ReturnBeforeDeparture {
                    departure_date: self.departure_date,
                    return_date,
                });
            }
        }

        let dates = [
            ("departure_date", Some(self.departure_date)),
            ("return_date", self.return_date),
        ];
        for (field, date) in dates {
            let Some(date) = date else { continue };
            if date
                .checked_add_signed(Duration::days(self.flexibility_days))
                .is_none()
            {
                return Err(ValidationError::DateOutOfRange {
                    field,
                    date,
                    flexibility_days: self.flexibility_days,
                });
            }
        }

        Ok(ValidatedQuery {
            route,
            departure_date: self.departure_date,
            return_date: self.return_date,
            budget: self.budget,
            flexibility_days: self.flexibility_days as u32,
        })
    }
}

impl ValidatedQuery {
    /// Departure dates covered by the flexibility window, earliest first.
    pub fn candidate_dates(&self) -> Vec<NaiveDate> {
        date_window(self.departure_date, self.flexibility_days)
    }
}

/// Stops at the end of the calendar instead of overflowing.
pub fn date_window(base: NaiveDate, flexibility_days: u32) -> Vec<NaiveDate> {
    (0..=i64::from(flexibility_days))
        .map_while(|offset| base.checked_add_signed(Duration::days(offset)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> PriceQuery {
        PriceQuery {
            origin: "sin".to_string(),
            destination: "nrt".to_string(),
            departure_date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            return_date: None,
            budget: Decimal::from(400),
            flexibility_days: 3,
        }
    }

    #[test]
    fn accepts_well_formed_query() {
        let validated = query().validate(14).unwrap();
        assert_eq!(validated.route.key(), "SIN-NRT");
        assert_eq!(validated.flexibility_days, 3);
        assert_eq!(validated.candidate_dates().len(), 4);
    }

    #[test]
    fn rejects_non_positive_budget() {
        let mut q = query();
        q.budget = Decimal::ZERO;
        assert_eq!(
            q.validate(14),
            Err(ValidationError::NonPositiveBudget(Decimal::ZERO))
        );
    }

    #[test]
    fn rejects_negative_and_oversized_flexibility() {
        let mut q = query();
        q.flexibility_days = -1;
        assert_eq!(q.validate(14), Err(ValidationError::NegativeFlexibility(-1)));

        q.flexibility_days = 15;
        assert_eq!(
            q.validate(14),
            Err(ValidationError::FlexibilityTooLarge {
                requested: 15,
                max: 14
            })
        );
    }

    #[test]
    fn rejects_return_before_departure() {
        let mut q = query();
        q.return_date = Some(NaiveDate::from_ymd_opt(2026, 11, 1).unwrap());
        assert!(matches!(
            q.validate(14),
            Err(ValidationError::ReturnBeforeDeparture { .. })
        ));
    }

    #[test]
    fn rejects_windows_past_the_calendar_end() {
        let mut q = query();
        q.departure_date = NaiveDate::MAX;
        q.flexibility_days = 1;
        assert_eq!(
            q.validate(14),
            Err(ValidationError::DateOutOfRange {
                field: "departure_date",
                date: NaiveDate::MAX,
                flexibility_days: 1,
            })
        );

        q.flexibility_days = 0;
        assert!(q.validate(14).is_ok());

        let mut q = query();
        q.return_date = NaiveDate::MAX.pred_opt();
        q.flexibility_days = 3;
        assert!(matches!(
            q.validate(14),
            Err(ValidationError::DateOutOfRange {
                field: "return_date",
                ..
            })
        ));
    }

    #[test]
    fn date_window_stops_at_calendar_end() {
        let last = NaiveDate::MAX.pred_opt().unwrap();
        assert_eq!(date_window(last, 5), vec![last, NaiveDate::MAX]);
    }

    #[test]
    fn rejects_malformed_route() {
        let mut q = query();
        q.origin = "SINGAPORE".to_string();
        assert!(matches!(
            q.validate(14),
            Err(ValidationError::InvalidAirportCode { .. })
        ));
    }
}
