// Domain error types - typed results at every component boundary

use thiserror::Error;

/// Main error type for the relay
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// Storage unreachable or the operation failed (HTTP 500)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Id has no record (HTTP 404)
    #[error("Not found")]
    NotFound,

    /// Callback verification failed or the callback was unreachable (HTTP 500)
    #[error("Callback error: {0}")]
    CallbackError(String),

    /// Neither credential valid (HTTP 401)
    #[error("Unauthorized")]
    Unauthorized,

    /// Webhook delivery to a registration failed
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    /// Identity service unreachable or returned garbage
    #[error("Identity service error: {0}")]
    IdentityService(String),

    /// Configuration error (HTTP 500)
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Request body lacks a required field (HTTP 400)
    #[error("Missing property")]
    MissingProperty,
}

impl RelayError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            RelayError::StoreUnavailable(_) => 500,
            RelayError::NotFound => 404,
            RelayError::CallbackError(_) => 500,
            RelayError::Unauthorized => 401,
            RelayError::DeliveryFailed(_) => 502,
            RelayError::IdentityService(_) => 401,
            RelayError::ConfigurationError(_) => 500,
            RelayError::MissingProperty => 400,
        }
    }

    /// Get user-facing message (no internal details)
    pub fn user_message(&self) -> String {
        match self {
            RelayError::StoreUnavailable(_) => "retrieval failed".to_string(),
            RelayError::NotFound => "not found".to_string(),
            RelayError::CallbackError(_) => "creation failed".to_string(),
            RelayError::Unauthorized => "not logged in".to_string(),
            RelayError::DeliveryFailed(_) => "delivery failed".to_string(),
            RelayError::IdentityService(_) => "not logged in".to_string(),
            RelayError::ConfigurationError(_) => "internal error".to_string(),
            RelayError::MissingProperty => "missing property".to_string(),
        }
    }
}

pub type RelayResult<T> = Result<T, RelayError>;
