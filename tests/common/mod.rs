//! Shared helpers for API integration tests.

#![allow(dead_code, reason = "not every test binary uses every helper")]

use eventsub_conduits::{Config, ConduitRegistry};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CALLBACK_BASE: &str = "https://hooks.example.com/eventsub/";
pub const TOKEN: &str = "test-app-token";

/// Config pointing every endpoint at the mock server.
pub fn config(server: &MockServer) -> Config {
    Config {
        client_id: "test-client".to_string(),
        client_secret: "test-secret".to_string(),
        api_base_url: server.uri(),
        token_url: format!("{}/oauth2/token", server.uri()),
        validate_url: format!("{}/oauth2/validate", server.uri()),
        callback_base_url: CALLBACK_BASE.to_string(),
        request_timeout_secs: 5,
        connect_timeout_secs: 2,
        max_concurrent_requests: 4,
    }
}

/// Mounts the token endpoint.
pub async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": TOKEN,
            "expires_in": 3600,
            "token_type": "bearer"
        })))
        .mount(server)
        .await;
}

/// Mounts the conduit list endpoint.
pub async fn mount_conduits(server: &MockServer, conduits: Value) {
    Mock::given(method("GET"))
        .and(path("/eventsub/conduits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": conduits })))
        .mount(server)
        .await;
}

/// Mounts a single-page shard list endpoint.
pub async fn mount_shards(server: &MockServer, shards: Value) {
    Mock::given(method("GET"))
        .and(path("/eventsub/conduits/shards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": shards })))
        .mount(server)
        .await;
}

/// Registry with a token already acquired.
pub async fn registry(server: &MockServer) -> ConduitRegistry {
    mount_token(server).await;
    let registry = ConduitRegistry::new(config(server)).unwrap();
    registry.acquire_token().await.unwrap();
    registry
}

/// Registry with a token and the given conduits discovered (no shards loaded).
pub async fn registry_with_conduits(server: &MockServer, conduits: Value) -> ConduitRegistry {
    mount_conduits(server, conduits).await;
    let mut registry = registry(server).await;
    registry.discover_conduits().await.unwrap();
    registry
}

/// Webhook shard as the service reports it.
pub fn webhook_shard(id: &str, secret: &str, status: &str) -> Value {
    json!({
        "id": id,
        "status": status,
        "transport": {
            "method": "webhook",
            "callback": format!("{CALLBACK_BASE}{secret}")
        }
    })
}
