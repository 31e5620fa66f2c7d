// HTTP client for the remote identity service

use async_trait::async_trait;
use reqwest::header::COOKIE;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::errors::{RelayError, RelayResult};
use crate::core::models::Identity;
use crate::core::traits::IdentityVerifier;

/// Cookie holding the user's session token
pub const SESSION_ID_COOKIE: &str = "sessionId";

/// Verifies session tokens against the identity service's "session valid" endpoint
pub struct HttpIdentityVerifier {
    http_client: Client,
    session_url: String,
}

impl HttpIdentityVerifier {
    pub fn new(session_url: &str, timeout_secs: u64) -> RelayResult<Self> {
        url::Url::parse(session_url).map_err(|e| {
            RelayError::ConfigurationError(format!(
                "Invalid identity session URL '{}': {}",
                session_url, e
            ))
        })?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| {
                RelayError::ConfigurationError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            http_client,
            session_url: session_url.to_string(),
        })
    }
}

#[async_trait]
impl IdentityVerifier for HttpIdentityVerifier {
    async fn verify_session(&self, session_id: &str) -> RelayResult<Identity> {
        let response = self
            .http_client
            .get(&self.session_url)
            .header(COOKIE, format!("{}={}", SESSION_ID_COOKIE, session_id))
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Identity service unreachable");
                RelayError::IdentityService(format!("Request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = %status, "Identity service rejected session");
            return Err(RelayError::Unauthorized);
        }

        response.json::<Identity>().await.map_err(|e| {
            warn!(error = %e, "Identity service returned an unreadable body");
            RelayError::IdentityService(format!("Invalid identity body: {}", e))
        })
    }
}
