// HTTP client for callback verification and webhook delivery

use async_trait::async_trait;
use reqwest::header::COOKIE;
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::errors::{RelayError, RelayResult};
use crate::core::models::{CallbackSpec, ConfigRecord, RegistrationId};
use crate::core::traits::{CallbackDelivery, CallbackVerifier};

/// Cookie carrying the caller-supplied token during callback verification
pub const CALLBACK_ID_COOKIE: &str = "callbackId";

/// Cookie identifying the registration on every pushed event
pub const REGISTRATION_ID_COOKIE: &str = "registrationId";

/// reqwest-backed callback client
///
/// One pooled client is shared by verification, fan-out and initial sync.
/// Delivery is single-shot: no retries beyond what the caller decides.
pub struct HttpCallbackClient {
    http_client: Client,
    default_timeout: Duration,
}

impl HttpCallbackClient {
    /// Create a client whose requests give up after `timeout_secs`
    pub fn new(timeout_secs: u64) -> RelayResult<Self> {
        let timeout = Duration::from_secs(timeout_secs);
        let connect_timeout = Duration::from_secs(timeout_secs.min(5));

        let http_client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| {
                RelayError::ConfigurationError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            http_client,
            default_timeout: timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.default_timeout
    }

    fn delivery_error(uri: &str, e: reqwest::Error) -> RelayError {
        if e.is_timeout() {
            RelayError::DeliveryFailed(format!("{}: timed out", uri))
        } else if e.is_connect() {
            RelayError::DeliveryFailed(format!("{}: connection failed", uri))
        } else {
            RelayError::DeliveryFailed(format!("{}: {}", uri, e))
        }
    }

    fn check_delivered(uri: &str, response: Response) -> RelayResult<()> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(RelayError::DeliveryFailed(format!("{}: HTTP {}", uri, status)))
        }
    }
}

/// Target of a delete event: `<callback>/<config_id>`
pub fn delete_uri(callback: &str, config_id: &str) -> String {
    format!("{}/{}", callback.trim_end_matches('/'), config_id)
}

fn cookie(name: &str, value: &str) -> String {
    format!("{}={}", name, value)
}

#[async_trait]
impl CallbackVerifier for HttpCallbackClient {
    async fn verify(&self, callback: &CallbackSpec) -> RelayResult<()> {
        url::Url::parse(&callback.uri).map_err(|e| {
            RelayError::CallbackError(format!("Invalid callback URI '{}': {}", callback.uri, e))
        })?;

        debug!(uri = %callback.uri, "Verifying callback");

        let response = self
            .http_client
            .get(&callback.uri)
            .header(COOKIE, cookie(CALLBACK_ID_COOKIE, &callback.id))
            .send()
            .await
            .map_err(|e| {
                warn!(uri = %callback.uri, error = %e, "Callback unreachable");
                RelayError::CallbackError(format!("Callback unreachable: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(uri = %callback.uri, status = %status, "Callback rejected verification");
            return Err(RelayError::CallbackError(format!(
                "Callback answered HTTP {}",
                status
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl CallbackDelivery for HttpCallbackClient {
    async fn push_config(
        &self,
        uri: &str,
        registration_id: &RegistrationId,
        record: &ConfigRecord,
    ) -> RelayResult<()> {
        debug!(uri = %uri, config_id = %record.config_id, "Sending config");

        let response = self
            .http_client
            .post(uri)
            .header(COOKIE, cookie(REGISTRATION_ID_COOKIE, registration_id.as_str()))
            .json(record)
            .send()
            .await
            .map_err(|e| Self::delivery_error(uri, e))?;

        Self::check_delivered(uri, response)
    }

    async fn push_delete(
        &self,
        uri: &str,
        registration_id: &RegistrationId,
        config_id: &str,
    ) -> RelayResult<()> {
        let target = delete_uri(uri, config_id);
        debug!(uri = %target, "Sending config deletion");

        let response = self
            .http_client
            .delete(&target)
            .header(COOKIE, cookie(REGISTRATION_ID_COOKIE, registration_id.as_str()))
            .send()
            .await
            .map_err(|e| Self::delivery_error(&target, e))?;

        Self::check_delivered(&target, response)
    }
}
