// Integration tests for the configuration CRUD surface

use crate::common::*;
use axum::http::StatusCode;
use config_relay::app::{Collaborators, Relay};
use config_relay::config::Config;
use config_relay::core::traits::ConfigStore;
use config_relay::state::InMemoryRegistrationStore;
use serde_json::json;
use std::sync::Arc;

fn user_cookie() -> String {
    session_cookie(USER_TOKEN)
}

#[tokio::test]
async fn test_create_list_get_config() {
    let t = TestRelayBuilder::new().build();
    let cookie = user_cookie();

    let (status, body) = call(
        t.relay.router(),
        request(
            "POST",
            "/api/config",
            Some(&cookie),
            Some(r#"{"name":"Support","model":"gpt","message":"hi"}"#),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["id"].as_str().unwrap().to_string();

    let (status, body) = call(
        t.relay.router(),
        request("GET", "/api/config", Some(&cookie), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"configs": [{"id": id, "name": "Support"}]}));

    let (status, body) = call(
        t.relay.router(),
        request("GET", &format!("/api/config/{}", id), Some(&cookie), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"configId": id, "name": "Support", "model": "gpt", "message": "hi"})
    );
}

#[tokio::test]
async fn test_create_requires_every_property() {
    let t = TestRelayBuilder::new().build();

    for body in [
        r#"{"name":"x","model":"gpt"}"#,
        r#"{"name":"","model":"gpt","message":"m"}"#,
        r#"{}"#,
    ] {
        let (status, response) = call(
            t.relay.router(),
            request("POST", "/api/config", Some(&user_cookie()), Some(body)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response, json!({"cause": "missing property"}));
    }
    assert!(t.configs.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_rejects_malformed_json() {
    let t = TestRelayBuilder::new().build();

    let (status, body) = call(
        t.relay.router(),
        request("POST", "/api/config", Some(&user_cookie()), Some("{not json")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"cause": "wrong format"}));
}

#[tokio::test]
async fn test_configs_are_scoped_to_owner() {
    let t = TestRelayBuilder::new()
        .configs(vec![record("theirs", "someone-else")])
        .build();

    let (status, body) = call(
        t.relay.router(),
        request("GET", "/api/config/theirs", Some(&user_cookie()), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"cause": "config not found"}));

    let (_, body) = call(
        t.relay.router(),
        request("GET", "/api/config", Some(&user_cookie()), None),
    )
    .await;
    assert_eq!(body, json!({"configs": []}));
}

#[tokio::test]
async fn test_change_config() {
    let t = TestRelayBuilder::new()
        .configs(vec![record("cfg-1", "user-1")])
        .build();
    let reg = accepted(t.registrations.as_ref(), Some("http://consumer/cb")).await;

    let (status, body) = call(
        t.relay.router(),
        request(
            "PUT",
            "/api/config/cfg-1",
            Some(&user_cookie()),
            Some(r#"{"message":"updated"}"#),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "updated");
    assert_eq!(body["model"], "gpt");

    // Changes are not pushed to registrants
    t.relay.tasks.wait_idle().await;
    assert!(t.delivery.pushed_to(reg.callback.as_deref().unwrap()).is_empty());
}

#[tokio::test]
async fn test_change_config_errors() {
    let t = TestRelayBuilder::new()
        .configs(vec![record("cfg-1", "user-1")])
        .build();

    let cases = [
        ("/api/config/cfg-1", r#"{}"#, StatusCode::BAD_REQUEST, "missing property"),
        ("/api/config/cfg-1", r#"{"model":""}"#, StatusCode::BAD_REQUEST, "missing property"),
        ("/api/config/cfg-1", "[oops", StatusCode::BAD_REQUEST, "wrong format"),
        ("/api/config/missing", r#"{"model":"m"}"#, StatusCode::NOT_FOUND, "config not found"),
    ];

    for (path, body, expected_status, cause) in cases {
        let (status, response) = call(
            t.relay.router(),
            request("PUT", path, Some(&user_cookie()), Some(body)),
        )
        .await;
        assert_eq!(status, expected_status, "{} {}", path, body);
        assert_eq!(response["cause"], cause);
    }
}

#[tokio::test]
async fn test_delete_config_notifies_and_then_404s() {
    let t = TestRelayBuilder::new()
        .configs(vec![record("cfg-1", "user-1")])
        .build();
    accepted(t.registrations.as_ref(), Some("http://consumer/cb")).await;

    let (status, _) = call(
        t.relay.router(),
        request("DELETE", "/api/config/cfg-1", Some(&user_cookie()), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    t.relay.tasks.wait_idle().await;
    let pushed = t.delivery.pushed_to("http://consumer/cb");
    assert_eq!(pushed.len(), 1);
    assert!(pushed[0].record.is_none());
    assert_eq!(pushed[0].config_id, "cfg-1");

    let (status, body) = call(
        t.relay.router(),
        request("DELETE", "/api/config/cfg-1", Some(&user_cookie()), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"cause": "config doesn't exist"}));
}

#[tokio::test]
async fn test_store_failures_map_to_causes() {
    let relay = Relay::assemble(
        Config::test_config(),
        Collaborators {
            registrations: Arc::new(InMemoryRegistrationStore::new()),
            configs: Arc::new(FailingConfigStore),
            identity: Arc::new(MockIdentityVerifier::with_session(USER_TOKEN, user())),
            callback_verifier: Arc::new(MockCallbackVerifier::reachable()),
            delivery: Arc::new(RecordingDelivery::new()),
        },
    )
    .unwrap();

    let cases = [
        ("GET", "/api/config", "retrieval failed"),
        ("GET", "/api/config/x", "retrieval failed"),
        ("DELETE", "/api/config/x", "deletion failed"),
    ];
    for (method, path, cause) in cases {
        let (status, body) = call(
            relay.router(),
            request(method, path, Some(&user_cookie()), None),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"cause": cause}));
    }
}

#[tokio::test]
async fn test_metrics_exposition() {
    let t = TestRelayBuilder::new().build();
    t.relay.registrations.create(None).await.unwrap();

    let response = {
        use tower::ServiceExt;
        t.relay
            .router()
            .oneshot(request("GET", "/api/metrics", Some(&user_cookie()), None))
            .await
            .unwrap()
    };
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("config_relay_registrations_created_total 1"));
}
