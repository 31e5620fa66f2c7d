// Response types for API endpoints

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::core::errors::RelayError;
use crate::core::models::ConfigSummary;

/// Error body: every failure is reported as `{"cause": "..."}`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub cause: String,
}

/// Body returned by register and config creation
#[derive(Debug, Serialize)]
pub struct IdResponse {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct ConfigListResponse {
    pub configs: Vec<ConfigSummary>,
}

/// API error type that converts domain errors to HTTP responses
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub cause: String,
}

impl ApiError {
    pub fn new(status: StatusCode, cause: &str) -> Self {
        Self {
            status,
            cause: cause.to_string(),
        }
    }

    pub fn not_logged_in() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "not logged in")
    }

    /// Keep the status of `err` but report a route-specific cause
    pub fn with_cause(err: RelayError, cause: &str) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, cause)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse { cause: self.cause });
        (self.status, body).into_response()
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            status,
            cause: err.user_message(),
        }
    }
}
