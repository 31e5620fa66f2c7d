// Common test utilities and helpers for all test modules
#![allow(dead_code)]

use async_trait::async_trait;
use config_relay::app::{Collaborators, Relay};
use config_relay::config::Config;
use config_relay::core::errors::{RelayError, RelayResult};
use config_relay::core::models::*;
use config_relay::core::traits::*;
use config_relay::state::{InMemoryConfigStore, InMemoryRegistrationStore};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// One webhook push observed by [`RecordingDelivery`]
#[derive(Debug, Clone)]
pub struct Pushed {
    pub uri: String,
    pub registration_id: RegistrationId,
    /// `Some` for a config push, `None` for a delete
    pub record: Option<ConfigRecord>,
    pub config_id: String,
    pub at: Instant,
}

/// Records every push; URIs in `failing` return `DeliveryFailed`
///
/// A push is recorded when it starts. URIs with a delay answer only after it.
#[derive(Default)]
pub struct RecordingDelivery {
    pushed: Mutex<Vec<Pushed>>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
}

impl RecordingDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(uris: &[&str]) -> Self {
        Self {
            failing: uris.iter().map(|u| u.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, uri: &str, delay: Duration) -> Self {
        self.delays.insert(uri.to_string(), delay);
        self
    }

    pub fn pushed(&self) -> Vec<Pushed> {
        self.pushed.lock().unwrap().clone()
    }

    pub fn pushed_to(&self, uri: &str) -> Vec<Pushed> {
        self.pushed().into_iter().filter(|p| p.uri == uri).collect()
    }

    async fn record(&self, pushed: Pushed) -> RelayResult<()> {
        let fail = self.failing.contains(&pushed.uri);
        let delay = self.delays.get(&pushed.uri).copied();
        let uri = pushed.uri.clone();
        self.pushed.lock().unwrap().push(pushed);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            Err(RelayError::DeliveryFailed(format!("{} refused", uri)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CallbackDelivery for RecordingDelivery {
    async fn push_config(
        &self,
        uri: &str,
        registration_id: &RegistrationId,
        record: &ConfigRecord,
    ) -> RelayResult<()> {
        self.record(Pushed {
            uri: uri.to_string(),
            registration_id: registration_id.clone(),
            record: Some(record.clone()),
            config_id: record.config_id.clone(),
            at: Instant::now(),
        })
        .await
    }

    async fn push_delete(
        &self,
        uri: &str,
        registration_id: &RegistrationId,
        config_id: &str,
    ) -> RelayResult<()> {
        self.record(Pushed {
            uri: uri.to_string(),
            registration_id: registration_id.clone(),
            record: None,
            config_id: config_id.to_string(),
            at: Instant::now(),
        })
        .await
    }
}

/// Identity service double: known tokens map to identities, calls are counted
#[derive(Default)]
pub struct MockIdentityVerifier {
    sessions: HashMap<String, Identity>,
    calls: AtomicUsize,
}

impl MockIdentityVerifier {
    pub fn with_session(token: &str, identity: Identity) -> Self {
        let mut sessions = HashMap::new();
        sessions.insert(token.to_string(), identity);
        Self {
            sessions,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityVerifier for MockIdentityVerifier {
    async fn verify_session(&self, session_id: &str) -> RelayResult<Identity> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sessions
            .get(session_id)
            .cloned()
            .ok_or(RelayError::Unauthorized)
    }
}

/// Callback verification double
pub struct MockCallbackVerifier {
    reachable: bool,
    calls: Mutex<Vec<CallbackSpec>>,
}

impl MockCallbackVerifier {
    pub fn reachable() -> Self {
        Self {
            reachable: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<CallbackSpec> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CallbackVerifier for MockCallbackVerifier {
    async fn verify(&self, callback: &CallbackSpec) -> RelayResult<()> {
        self.calls.lock().unwrap().push(callback.clone());
        if self.reachable {
            Ok(())
        } else {
            Err(RelayError::CallbackError(format!(
                "{} unreachable",
                callback.uri
            )))
        }
    }
}

/// Registration store whose every operation fails
pub struct FailingRegistrationStore;

#[async_trait]
impl RegistrationStore for FailingRegistrationStore {
    async fn insert(&self, _registration: &Registration) -> RelayResult<()> {
        Err(unavailable())
    }

    async fn get(&self, _id: &RegistrationId) -> RelayResult<Option<Registration>> {
        Err(unavailable())
    }

    async fn accept(&self, _id: &RegistrationId) -> RelayResult<AcceptOutcome> {
        Err(unavailable())
    }

    async fn delete(&self, _id: &RegistrationId) -> RelayResult<bool> {
        Err(unavailable())
    }

    async fn list_accepted_with_callback(&self) -> RelayResult<Vec<Registration>> {
        Err(unavailable())
    }
}

/// Config store whose every operation fails
pub struct FailingConfigStore;

#[async_trait]
impl ConfigStore for FailingConfigStore {
    async fn list_all(&self) -> RelayResult<Vec<ConfigRecord>> {
        Err(unavailable())
    }

    async fn list_for_owner(&self, _owner: &str) -> RelayResult<Vec<ConfigRecord>> {
        Err(unavailable())
    }

    async fn get(&self, _owner: &str, _config_id: &str) -> RelayResult<Option<ConfigRecord>> {
        Err(unavailable())
    }

    async fn insert(&self, _record: &ConfigRecord) -> RelayResult<()> {
        Err(unavailable())
    }

    async fn update(&self, _record: &ConfigRecord) -> RelayResult<bool> {
        Err(unavailable())
    }

    async fn delete(&self, _owner: &str, _config_id: &str) -> RelayResult<bool> {
        Err(unavailable())
    }
}

fn unavailable() -> RelayError {
    RelayError::StoreUnavailable("connection refused".to_string())
}

pub const USER_TOKEN: &str = "valid-session";

pub fn user() -> Identity {
    Identity {
        id: "user-1".to_string(),
        name: "Ada".to_string(),
    }
}

pub fn record(config_id: &str, owner: &str) -> ConfigRecord {
    ConfigRecord {
        config_id: config_id.to_string(),
        owner: owner.to_string(),
        name: format!("{} name", config_id),
        model: "gpt".to_string(),
        message: "hello".to_string(),
    }
}

/// Insert an already accepted registration directly into `store`
pub async fn accepted(store: &dyn RegistrationStore, callback: Option<&str>) -> Registration {
    let mut registration = Registration::pending(callback.map(str::to_string));
    registration.accepted = true;
    store.insert(&registration).await.unwrap();
    registration
}

/// Relay over in-memory stores with handles to every double
pub struct TestRelay {
    pub relay: Relay,
    pub registrations: Arc<InMemoryRegistrationStore>,
    pub configs: Arc<InMemoryConfigStore>,
    pub identity: Arc<MockIdentityVerifier>,
    pub verifier: Arc<MockCallbackVerifier>,
    pub delivery: Arc<RecordingDelivery>,
}

pub struct TestRelayBuilder {
    config: Config,
    configs: Vec<ConfigRecord>,
    verifier: MockCallbackVerifier,
    delivery: RecordingDelivery,
    identity: MockIdentityVerifier,
}

impl TestRelayBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::test_config(),
            configs: Vec::new(),
            verifier: MockCallbackVerifier::reachable(),
            delivery: RecordingDelivery::new(),
            identity: MockIdentityVerifier::with_session(USER_TOKEN, user()),
        }
    }

    pub fn config(mut self, f: impl FnOnce(&mut Config)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn configs(mut self, records: Vec<ConfigRecord>) -> Self {
        self.configs = records;
        self
    }

    pub fn verifier(mut self, verifier: MockCallbackVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn delivery(mut self, delivery: RecordingDelivery) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn build(self) -> TestRelay {
        let registrations = Arc::new(InMemoryRegistrationStore::new());
        let configs = Arc::new(InMemoryConfigStore::with_records(self.configs));
        let identity = Arc::new(self.identity);
        let verifier = Arc::new(self.verifier);
        let delivery = Arc::new(self.delivery);

        let relay = Relay::assemble(
            self.config,
            Collaborators {
                registrations: registrations.clone(),
                configs: configs.clone(),
                identity: identity.clone(),
                callback_verifier: verifier.clone(),
                delivery: delivery.clone(),
            },
        )
        .unwrap();

        TestRelay {
            relay,
            registrations,
            configs,
            identity,
            verifier,
            delivery,
        }
    }
}

impl Default for TestRelayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Send one request through the router, returning status and JSON body (Null if not JSON)
pub async fn call(
    router: axum::Router,
    request: axum::http::Request<axum::body::Body>,
) -> (axum::http::StatusCode, serde_json::Value) {
    use tower::ServiceExt;

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

/// Request with an optional `Cookie` header and optional JSON body
pub fn request(
    method: &str,
    path: &str,
    cookie: Option<&str>,
    body: Option<&str>,
) -> axum::http::Request<axum::body::Body> {
    let mut builder = axum::http::Request::builder().method(method).uri(path);
    if let Some(cookie) = cookie {
        builder = builder.header(axum::http::header::COOKIE, cookie);
    }
    match body {
        Some(body) => builder
            .header(axum::http::header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    }
}

pub fn session_cookie(token: &str) -> String {
    format!("sessionId={}", token)
}

pub fn registration_cookie(id: &RegistrationId) -> String {
    format!("registrationId={}", id)
}
