//! Sample routes exercising the reply flows
//!
//! Three shapes worth demonstrating: data-only success, an accumulated
//! error, and a seal-and-send shorthand. Unmatched paths fall through to
//! the dispatcher empty-handed and resolve to the canonical 404 envelope.

use axum::{Router, routing};
use retort_server::{Dispatch, ReplyHandle, ReplyRejection};

pub fn router() -> Router {
    Router::new()
        .route("/success", routing::get(success))
        .route("/error", routing::get(error))
        .route("/forbidden", routing::get(forbidden))
        .fallback(fallback)
}

/// Simulate a successful API call
async fn success(reply: ReplyHandle) -> Dispatch {
    reply
        .set_data(serde_json::json!({"message": "A successful API call."}))
        .await;
    Dispatch
}

/// Simulate an API call that accumulates an error
async fn error(reply: ReplyHandle) -> Result<Dispatch, ReplyRejection> {
    reply.add_error("An error occurred during the API call.").await?;
    Ok(Dispatch)
}

/// Simulate a short-circuiting forbidden response
async fn forbidden(reply: ReplyHandle) -> Result<Dispatch, ReplyRejection> {
    reply.seal_forbidden().await
}

/// Unmatched paths resolve through the empty-reply rule
async fn fallback() -> Dispatch {
    Dispatch
}
