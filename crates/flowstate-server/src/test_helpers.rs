use axum::Router;
use tokio::net::TcpListener;

use crate::auth::{build_auth_config_with_key, generate_api_key};
use crate::hub::NotificationHub;

/// Build a test router with a fresh hub and no auth.
pub fn test_router() -> Router {
    crate::routes::build_router(NotificationHub::default(), None)
}

/// Build a test router with auth enabled, returning (router, api_key).
pub fn test_router_with_auth() -> (Router, String) {
    let api_key = generate_api_key();
    let auth = build_auth_config_with_key(Some(&api_key));
    let router = crate::routes::build_router(NotificationHub::default(), auth);
    (router, api_key)
}

/// A running test server. The hub is shared with the server so tests can
/// publish directly or watch the subscriber count.
pub struct TestServer {
    pub base_url: String,
    pub hub: NotificationHub,
    pub api_key: Option<String>,
    _handle: tokio::task::JoinHandle<()>,
}

/// Spawn an axum test server on a random port. Returns the TestServer
/// with the `base_url` (e.g. "http://127.0.0.1:12345").
pub async fn spawn_test_server() -> TestServer {
    spawn(None).await
}

/// Same as [`spawn_test_server`] but with bearer auth enabled.
pub async fn spawn_test_server_with_auth() -> TestServer {
    spawn(Some(generate_api_key())).await
}

async fn spawn(api_key: Option<String>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{addr}");
    let hub = NotificationHub::default();
    let auth = build_auth_config_with_key(api_key.as_deref());
    let app = crate::routes::build_router(hub.clone(), auth);
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestServer {
        base_url,
        hub,
        api_key,
        _handle: handle,
    }
}
