use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered origin/destination pair of upper-case three-letter airport codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Route {
    pub origin: String,
    pub destination: String,
}

impl Route {
    pub fn new(origin: &str, destination: &str) -> Result<Self, ValidationError> {
        let origin = normalize_airport_code("origin", origin)?;
        let destination = normalize_airport_code("destination", destination)?;
        if origin == destination {
            return Err(ValidationError::SameOriginDestination(origin));
        }
        Ok(Self {
            origin,
            destination,
        })
    }

    pub fn reversed(&self) -> Self {
        Self {
            origin: self.destination.clone(),
            destination: self.origin.clone(),
        }
    }

    /// `ORG-DST`, the key used by history stores.
    pub fn key(&self) -> String {
        format!("{}-{}", self.origin, self.destination)
    }

    /// Parses `ORG-DST` (also accepts `ORG/DST`).
    pub fn parse_key(s: &str) -> Result<Self, ValidationError> {
        let mut parts = s.trim().splitn(2, |c: char| c == '-' || c == '/');
        let origin = parts.next().unwrap_or_default();
        let destination = parts.next().unwrap_or_default();
        Self::new(origin, destination)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.origin, self.destination)
    }
}

pub fn normalize_airport_code(field: &'static str, code: &str) -> Result<String, ValidationError> {
    let trimmed = code.trim();
    if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::InvalidAirportCode {
            field,
            value: code.to_string(),
        });
    }
    Ok(trimmed.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        let route = Route::new(" sin", "jfk ").unwrap();
        assert_eq!(route.origin, "SIN");
        assert_eq!(route.destination, "JFK");
        assert_eq!(route.key(), "SIN-JFK");
    }

    #[test]
    fn rejects_malformed_codes() {
        assert!(matches!(
            Route::new("SI", "JFK"),
            Err(ValidationError::InvalidAirportCode { field: "origin", .. })
        ));
        assert!(matches!(
            Route::new("SIN", "J3K"),
            Err(ValidationError::InvalidAirportCode { field: "destination", .. })
        ));
    }

    #[test]
    fn rejects_identical_endpoints() {
        assert_eq!(
            Route::new("lax", "LAX"),
            Err(ValidationError::SameOriginDestination("LAX".to_string()))
        );
    }

    #[test]
    fn parses_keys_and_reverses() {
        let route = Route::parse_key("jfk/lax").unwrap();
        assert_eq!(route.to_string(), "JFK-LAX");
        assert_eq!(route.reversed().to_string(), "LAX-JFK");
        assert!(Route::parse_key("JFK").is_err());
    }
}
