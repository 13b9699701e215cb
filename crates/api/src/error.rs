use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fareadvisor_core::error::{QueryError, ValidationError};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

#[derive(Debug)]
pub enum AppError {
    /// No search endpoint configured; the API is running degraded.
    Unavailable,
    Query(QueryError),
    BadRequest(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE"),
            Self::Query(QueryError::InvalidInput(_)) | Self::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, "INVALID_INPUT")
            }
            Self::Query(QueryError::DataUnavailable { .. }) => {
                (StatusCode::NOT_FOUND, "DATA_UNAVAILABLE")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match self {
            Self::Unavailable => "price engine is not configured".to_string(),
            Self::Query(err) => err.to_string(),
            Self::BadRequest(msg) => msg,
        };
        (status, Json(ErrorBody { code, message })).into_response()
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        Self::Query(err)
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Query(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn maps_errors_to_status_codes() {
        let invalid: AppError = ValidationError::NonPositiveBudget(Decimal::ZERO).into();
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);

        let missing = AppError::from(QueryError::DataUnavailable {
            route: "JFK-LAX".to_string(),
            reason: "no quotes".to_string(),
        });
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        assert_eq!(
            AppError::Unavailable.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
