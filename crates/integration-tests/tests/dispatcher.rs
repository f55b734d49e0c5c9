mod harness;

use axum::response::IntoResponse;
use axum::{Router, routing};
use harness::server::TestServer;
use http::StatusCode;
use retort_config::Config;
use retort_core::HandlerRegistry;
use retort_server::{Dispatch, ReplyHandle, ReplyRejection};

fn routes() -> Router {
    Router::new()
        .route("/raw", routing::get(raw))
        .route("/io-fault", routing::get(io_fault))
        .route("/forbidden", routing::get(forbidden))
}

/// A handler that builds its own response, bypassing the dispatcher
async fn raw() -> impl IntoResponse {
    (StatusCode::IM_A_TEAPOT, "teapot")
}

async fn io_fault(_reply: ReplyHandle) -> Result<Dispatch, ReplyRejection> {
    read_upstream()?;
    Ok(Dispatch)
}

fn read_upstream() -> Result<(), std::io::Error> {
    Err(std::io::Error::other("connection reset by peer"))
}

async fn forbidden(reply: ReplyHandle) -> Result<Dispatch, ReplyRejection> {
    reply.seal_forbidden().await
}

#[tokio::test]
async fn handler_response_passes_through_untouched() {
    let server = TestServer::start(Config::default(), HandlerRegistry::with_defaults(), routes())
        .await
        .unwrap();

    let resp = server.client().get(server.url("/raw")).send().await.unwrap();

    assert_eq!(resp.status(), 418);
    assert_eq!(resp.text().await.unwrap(), "teapot");
}

#[tokio::test]
async fn rejection_routes_fault_into_envelope() {
    let server = TestServer::start(Config::default(), HandlerRegistry::with_defaults(), routes())
        .await
        .unwrap();

    let resp = server.client().get(server.url("/io-fault")).send().await.unwrap();

    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["errors"][0]["message"], "connection reset by peer");
}

#[tokio::test]
async fn seal_forbidden_delivers_immediately() {
    let server = TestServer::start(Config::default(), HandlerRegistry::with_defaults(), routes())
        .await
        .unwrap();

    let resp = server.client().get(server.url("/forbidden")).send().await.unwrap();

    assert_eq!(resp.status(), 403);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["errors"][0]["message"], "Forbidden");
}

#[tokio::test]
async fn missing_dispatch_layer_is_a_configuration_error() {
    // The route extracts a ReplyHandle, but no dispatch layer was installed
    let server = TestServer::start_raw(Router::new().route("/forbidden", routing::get(forbidden)))
        .await
        .unwrap();

    let resp = server.client().get(server.url("/forbidden")).send().await.unwrap();

    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(
        body["errors"][0]["message"],
        "An internal server error has occurred."
    );
}
