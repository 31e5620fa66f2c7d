// Unit tests for the admission gate

use crate::common::*;
use axum::http::StatusCode;
use config_relay::core::models::RegistrationId;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_register_bypasses_gate() {
    let t = TestRelayBuilder::new().build();

    let (status, body) = call(
        t.relay.router(),
        request("POST", "/api/register", None, Some("{}")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let id = body["id"].as_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());
    assert_eq!(t.registrations.len().await, 1);
}

#[tokio::test]
async fn test_missing_credentials_rejected() {
    let t = TestRelayBuilder::new().build();

    let (status, body) = call(t.relay.router(), request("GET", "/api/config", None, None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"cause": "not logged in"}));
    assert_eq!(t.identity.calls(), 0);
}

#[tokio::test]
async fn test_register_prefix_is_not_bypassed() {
    let t = TestRelayBuilder::new().build();

    let (status, _) = call(
        t.relay.router(),
        request("GET", "/api/register/extra", None, None),
    )
    .await;

    assert_ne!(status, StatusCode::OK);
    assert!(t.registrations.is_empty().await);
}

#[tokio::test]
async fn test_invalid_session_rejected_and_not_cached() {
    let t = TestRelayBuilder::new().build();

    let (status, _) = call(
        t.relay.router(),
        request("GET", "/api/config", Some(&session_cookie("bogus")), None),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(t.identity.calls(), 1);
    assert!(t.relay.sessions.is_empty().await);
}

#[tokio::test]
async fn test_valid_session_is_cached() {
    let t = TestRelayBuilder::new().build();
    let cookie = session_cookie(USER_TOKEN);

    for _ in 0..3 {
        let (status, body) = call(
            t.relay.router(),
            request("GET", "/api/config", Some(&cookie), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"configs": []}));
    }

    assert_eq!(t.identity.calls(), 1);
    let cache = &t.relay.metrics.session_cache;
    assert_eq!(cache.with_label_values(&["miss"]).get(), 1);
    assert_eq!(cache.with_label_values(&["hit"]).get(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_session_reverified_once_after_ttl() {
    let t = TestRelayBuilder::new()
        .config(|c| c.session_ttl_secs = 60)
        .build();
    let cookie = session_cookie(USER_TOKEN);
    let get = || request("GET", "/api/config", Some(&cookie), None);

    call(t.relay.router(), get()).await;
    tokio::time::advance(Duration::from_secs(59)).await;
    call(t.relay.router(), get()).await;
    assert_eq!(t.identity.calls(), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    let (status, _) = call(t.relay.router(), get()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(t.identity.calls(), 2);

    call(t.relay.router(), get()).await;
    assert_eq!(t.identity.calls(), 2);
}

#[tokio::test]
async fn test_pending_registration_rejected_until_accepted() {
    let t = TestRelayBuilder::new().build();
    let id = t.relay.registrations.create(None).await.unwrap();
    let cookie = registration_cookie(&id);

    let (status, _) = call(
        t.relay.router(),
        request("GET", "/api/metrics", Some(&cookie), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    t.relay.registrations.accept(&id).await.unwrap();

    let (status, _) = call(
        t.relay.router(),
        request("GET", "/api/metrics", Some(&cookie), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_registration_rejected() {
    let t = TestRelayBuilder::new().build();
    let cookie = registration_cookie(&RegistrationId::from("nope"));

    let (status, body) = call(
        t.relay.router(),
        request("GET", "/api/metrics", Some(&cookie), None),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["cause"], "not logged in");
}

#[tokio::test]
async fn test_session_cookie_takes_priority() {
    let t = TestRelayBuilder::new().build();
    let reg = accepted(t.registrations.as_ref(), None).await;
    let cookie = format!("{}; {}", session_cookie("bogus"), registration_cookie(&reg.id));

    let (status, _) = call(
        t.relay.router(),
        request("GET", "/api/metrics", Some(&cookie), None),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(t.identity.calls(), 1);
}

#[tokio::test]
async fn test_registration_caller_is_not_a_user() {
    let t = TestRelayBuilder::new().build();
    let reg = accepted(t.registrations.as_ref(), None).await;

    let (status, body) = call(
        t.relay.router(),
        request("GET", "/api/config", Some(&registration_cookie(&reg.id)), None),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"cause": "invalid user"}));
}

#[tokio::test]
async fn test_registration_lookup_failure_is_unauthorized() {
    use config_relay::app::{Collaborators, Relay};
    use config_relay::config::Config;
    use config_relay::state::InMemoryConfigStore;
    use std::sync::Arc;

    let relay = Relay::assemble(
        Config::test_config(),
        Collaborators {
            registrations: Arc::new(FailingRegistrationStore),
            configs: Arc::new(InMemoryConfigStore::new()),
            identity: Arc::new(MockIdentityVerifier::with_session(USER_TOKEN, user())),
            callback_verifier: Arc::new(MockCallbackVerifier::reachable()),
            delivery: Arc::new(RecordingDelivery::new()),
        },
    )
    .unwrap();

    let id = RegistrationId::from("reg-1");
    let (status, body) = call(
        relay.router(),
        request("GET", "/api/config", Some(&registration_cookie(&id)), None),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"cause": "not logged in"}));
    assert_eq!(
        relay
            .metrics
            .auth_decisions
            .with_label_values(&["registration", "rejected"])
            .get(),
        1
    );
}
