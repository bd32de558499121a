//! API error envelope
//!
//! Every failure leaves the API as `{"error": {code, message, details?}}`
//! with the HTTP status derived from the code, so clients switch on one
//! field.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::services::BookingError;

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::Validation { field, message } => ApiError::with_details(
                "VALIDATION_ERROR",
                format!("{}: {}", field, message),
                serde_json::json!({ "field": field }),
            ),
            BookingError::Conflict { room_id, stay } => ApiError::conflict(format!(
                "Room {} is unavailable for {}",
                room_id, stay
            )),
            BookingError::NotFound(id) => {
                ApiError::not_found(format!("Reservation not found: {}", id))
            }
            BookingError::MissingReference(msg) => ApiError::not_found(msg),
            BookingError::Internal(err) => {
                tracing::error!("booking operation failed: {:#}", err);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StayRange;
    use chrono::NaiveDate;

    #[test]
    fn test_validation_error_carries_field() {
        let api: ApiError = BookingError::Validation {
            field: "check_in_date",
            message: "not a valid ISO date (YYYY-MM-DD)".to_string(),
        }
        .into();
        assert_eq!(api.error.code, "VALIDATION_ERROR");
        assert_eq!(
            api.error.details,
            Some(serde_json::json!({ "field": "check_in_date" }))
        );
    }

    #[test]
    fn test_conflict_maps_to_conflict_code() {
        let stay = StayRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        )
        .unwrap();
        let api: ApiError = BookingError::Conflict { room_id: 7, stay }.into();
        assert_eq!(api.error.code, "CONFLICT");
    }

    #[test]
    fn test_internal_error_is_opaque() {
        let api: ApiError = BookingError::Internal(anyhow::anyhow!("pool exhausted")).into();
        assert_eq!(api.error.code, "INTERNAL_ERROR");
        assert!(!api.error.message.contains("pool"));
    }
}
