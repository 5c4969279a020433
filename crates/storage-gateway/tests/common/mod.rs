//! Test utilities and common setup.

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response},
};
use tower::ServiceExt;

use storage_gateway::routes::create_router;
use storage_gateway::{AppState, GatewayConfig, MemoryAccount};

/// Create a test application backed by in-memory storage.
///
/// The returned account shares state with the router, so tests can inspect
/// what a request wrote.
pub fn test_app() -> (Router, MemoryAccount) {
    test_app_with_config(GatewayConfig::default())
}

/// Create a test application with a custom config.
pub fn test_app_with_config(config: GatewayConfig) -> (Router, MemoryAccount) {
    let account = MemoryAccount::new();
    let state = AppState::with_config(account.clone(), config);
    (create_router(state), account)
}

/// Send a request through a clone of the router.
pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

/// POST `body` to `uri`.
pub async fn post(app: &Router, uri: &str, body: impl Into<Body>) -> Response<Body> {
    send(
        app,
        Request::builder()
            .uri(uri)
            .method(Method::POST)
            .body(body.into())
            .unwrap(),
    )
    .await
}

/// GET `uri`.
pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(
        app,
        Request::builder()
            .uri(uri)
            .method(Method::GET)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

/// Read a response body as UTF-8 text.
pub async fn body_text(response: Response<Body>) -> String {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}
