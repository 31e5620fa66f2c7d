// Axum admission gate: session cookie or accepted registration

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::responses::ApiError;
use crate::auth::session_token::SessionToken;
use crate::client::callback_client::REGISTRATION_ID_COOKIE;
use crate::client::identity_client::SESSION_ID_COOKIE;
use crate::core::models::{Caller, RegistrationId};
use crate::core::traits::IdentityVerifier;
use crate::metrics::Metrics;
use crate::registration::RegistrationService;
use crate::state::SessionCache;

/// The only path admitted without credentials
pub const REGISTER_PATH: &str = "/api/register";

/// Dependencies of the admission gate
#[derive(Clone)]
pub struct AuthState {
    pub sessions: Arc<SessionCache>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub registrations: Arc<RegistrationService>,
    pub metrics: Arc<Metrics>,
}

/// Admission middleware
///
/// `sessionId` wins over `registrationId` when both are present. A session is
/// served from the cache while fresh and re-verified remotely on a miss; a
/// failed verification leaves the cache untouched. On success the resolved
/// [`Caller`] is placed in the request extensions for handlers.
pub async fn auth_gate(
    State(auth): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if request.uri().path() == REGISTER_PATH {
        return Ok(next.run(request).await);
    }

    let (session, registration) = {
        let jar = CookieJar::from_headers(request.headers());
        (
            cookie_value(&jar, SESSION_ID_COOKIE),
            cookie_value(&jar, REGISTRATION_ID_COOKIE),
        )
    };

    let caller = if let Some(session) = session {
        admit_session(&auth, SessionToken::new(&session)).await?
    } else if let Some(registration) = registration {
        admit_registration(&auth, RegistrationId::from(registration)).await?
    } else {
        debug!(path = %request.uri().path(), "No credentials presented");
        count(&auth, "none", "rejected");
        return Err(ApiError::not_logged_in());
    };

    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

async fn admit_session(auth: &AuthState, token: SessionToken) -> Result<Caller, ApiError> {
    let fingerprint = token.fingerprint();

    if let Ok(identity) = auth.sessions.get(fingerprint.as_str()).await {
        auth.metrics.session_cache.with_label_values(&["hit"]).inc();
        count(auth, "session", "admitted");
        return Ok(Caller::User(identity));
    }
    auth.metrics.session_cache.with_label_values(&["miss"]).inc();

    match auth.identity.verify_session(token.expose()).await {
        Ok(identity) => {
            info!(session = %fingerprint, user_id = %identity.id, "Session verified");
            auth.sessions
                .add(fingerprint.as_str(), identity.clone())
                .await;
            count(auth, "session", "admitted");
            Ok(Caller::User(identity))
        }
        Err(e) => {
            warn!(session = %fingerprint, error = %e, "Session rejected");
            count(auth, "session", "rejected");
            Err(ApiError::not_logged_in())
        }
    }
}

async fn admit_registration(auth: &AuthState, id: RegistrationId) -> Result<Caller, ApiError> {
    match auth.registrations.is_accepted(&id).await {
        Ok(true) => {
            count(auth, "registration", "admitted");
            Ok(Caller::Registration(id))
        }
        Ok(false) => {
            debug!(registration_id = %id, "Registration unknown or not accepted");
            count(auth, "registration", "rejected");
            Err(ApiError::not_logged_in())
        }
        Err(e) => {
            warn!(registration_id = %id, error = %e, "Registration check failed");
            count(auth, "registration", "rejected");
            Err(ApiError::not_logged_in())
        }
    }
}

fn count(auth: &AuthState, path: &str, outcome: &str) {
    auth.metrics
        .auth_decisions
        .with_label_values(&[path, outcome])
        .inc();
}

/// Value of cookie `name`, if present and non-empty
fn cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}
