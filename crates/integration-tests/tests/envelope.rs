mod harness;

use async_trait::async_trait;
use axum::{Router, routing};
use harness::server::TestServer;
use retort_config::Config;
use retort_core::{
    Fault, Handler, HandlerContext, HandlerInput, HandlerKind, HandlerOptions, HandlerOutput,
    HandlerRegistry, TableTranslator,
};
use retort_server::{Dispatch, ReplyHandle, ReplyRejection};
use serde_json::json;

fn routes() -> Router {
    Router::new()
        .route("/widget", routing::get(widget))
        .route("/broken", routing::get(broken))
        .route("/cascade", routing::get(cascade))
        .route("/secret", routing::get(secret))
        .fallback(fallback)
}

async fn widget(reply: ReplyHandle) -> Dispatch {
    reply.set_data(json!({"a": 1})).await;
    Dispatch
}

async fn broken(reply: ReplyHandle) -> Result<Dispatch, ReplyRejection> {
    reply.add_error("boom").await?;
    Ok(Dispatch)
}

async fn cascade(reply: ReplyHandle) -> Result<Dispatch, ReplyRejection> {
    let mut guard = reply.lock().await;
    guard.add_not_found().await?;
    guard.add_forbidden().await?;
    drop(guard);
    Ok(Dispatch)
}

async fn secret(reply: ReplyHandle) -> Dispatch {
    reply
        .set_data(json!({"name": "widget", "password": "hunter2"}))
        .await;
    Dispatch
}

async fn fallback() -> Dispatch {
    Dispatch
}

#[tokio::test]
async fn empty_reply_returns_404_envelope() {
    let server = TestServer::start(Config::default(), HandlerRegistry::with_defaults(), routes())
        .await
        .unwrap();

    let resp = server.client().get(server.url("/does-not-exist")).send().await.unwrap();

    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(!body["id"].as_str().unwrap().is_empty());
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["message"], "Not found");
}

#[tokio::test]
async fn data_only_reply_returns_200() {
    let server = TestServer::start(Config::default(), HandlerRegistry::with_defaults(), routes())
        .await
        .unwrap();

    let resp = server.client().get(server.url("/widget")).send().await.unwrap();

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["data"], json!({"a": 1}));
    assert!(body.get("errors").is_none());
    assert!(!body["id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn plain_error_returns_500_with_message() {
    let server = TestServer::start(Config::default(), HandlerRegistry::with_defaults(), routes())
        .await
        .unwrap();

    let resp = server.client().get(server.url("/broken")).send().await.unwrap();

    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["errors"][0]["message"], "boom");
}

#[tokio::test]
async fn multiple_errors_use_stable_max_and_preserve_order() {
    let server = TestServer::start(Config::default(), HandlerRegistry::with_defaults(), routes())
        .await
        .unwrap();

    let resp = server.client().get(server.url("/cascade")).send().await.unwrap();

    // max(404, 403) = 404
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0]["message"], "Not found");
    assert_eq!(errors[1]["message"], "Forbidden");
}

#[tokio::test]
async fn replacement_sanitizer_strips_sensitive_fields() {
    struct StripPasswords;

    #[async_trait]
    impl Handler for StripPasswords {
        async fn handle(
            &self,
            input: HandlerInput,
            _options: &HandlerOptions,
            _ctx: &HandlerContext,
        ) -> Result<HandlerOutput, Fault> {
            match input {
                HandlerInput::Data(mut value) => {
                    if let Some(object) = value.as_object_mut() {
                        object.remove("password");
                    }
                    Ok(HandlerOutput::Data(value))
                }
                _ => Err(Fault::UnexpectedOutput {
                    kind: HandlerKind::SanitizeReplyData,
                }),
            }
        }
    }

    let registry = HandlerRegistry::builder()
        .handler(HandlerKind::SanitizeReplyData, StripPasswords)
        .build();
    let server = TestServer::start(Config::default(), registry, routes()).await.unwrap();

    let resp = server.client().get(server.url("/secret")).send().await.unwrap();

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["data"], json!({"name": "widget"}));
}

#[tokio::test]
async fn configured_locale_renders_at_serialization_time() {
    let mut translator = TableTranslator::new("en");
    translator.insert("en", "server.400.notfound", "Not found");
    translator.insert("fr", "server.400.notfound", "Introuvable");
    let registry = HandlerRegistry::builder().translator(translator).build();

    let mut config = Config::default();
    config.reply.locale = Some("fr".to_owned());

    let server = TestServer::start(config, registry, routes()).await.unwrap();

    let resp = server.client().get(server.url("/does-not-exist")).send().await.unwrap();

    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["errors"][0]["message"], "Introuvable");
}
