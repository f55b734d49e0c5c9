//! Binds replies to requests and delivers resolved envelopes
//!
//! The dispatcher is the only piece that knows about the transport. Its
//! middleware creates a fresh [`Reply`] per request and parks it in the
//! request extensions; handlers extract a [`ReplyHandle`], mutate the
//! reply, and return [`Dispatch`] to ask for delivery — the axum rendition
//! of falling through to a post-middleware. Handlers that build their own
//! response pass through untouched.

use std::sync::Arc;

use axum::Json;
use axum::extract::{FromRequestParts, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use http::request::Parts;
use retort_config::ReplyConfig;
use retort_core::defaults::GENERIC_SERVER_ERROR_MESSAGE;
use retort_core::{Envelope, Fault, HandlerRegistry, RawError, Reply, ResolveOptions};
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};
use tracing::Level;
use uuid::Uuid;

/// Largest request body the dispatcher will buffer for logging
const LOG_BODY_LIMIT: usize = 16 * 1024;

/// Transport-side preferences for the dispatcher
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Level for inbound request logging; `None` disables it
    pub request_level: Option<Level>,
    /// Level for outbound reply logging; `None` disables it
    pub reply_level: Option<Level>,
    /// Level for fault logging; `None` disables it
    pub error_level: Option<Level>,
    /// Default locale applied to every resolution
    pub locale: Option<String>,
    /// Whether reply data runs through the sanitize handler
    pub sanitize_data: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            request_level: Some(Level::TRACE),
            reply_level: Some(Level::TRACE),
            error_level: Some(Level::ERROR),
            locale: None,
            sanitize_data: true,
        }
    }
}

impl From<&ReplyConfig> for DispatchOptions {
    fn from(config: &ReplyConfig) -> Self {
        Self {
            request_level: config.log.request_level(),
            reply_level: config.log.reply_level(),
            error_level: config.log.error_level(),
            locale: config.locale.clone(),
            sanitize_data: config.sanitize_data,
        }
    }
}

/// Per-request binding between the transport and the reply pipeline
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    options: DispatchOptions,
}

impl Dispatcher {
    /// Create a dispatcher with default transport options
    #[must_use]
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self::with_options(registry, DispatchOptions::default())
    }

    /// Create a dispatcher with explicit transport options
    #[must_use]
    pub const fn with_options(registry: Arc<HandlerRegistry>, options: DispatchOptions) -> Self {
        Self { registry, options }
    }

    /// The registry replies resolve through
    #[must_use]
    pub const fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Middleware entry point
    ///
    /// Pre-hook: binds a fresh reply to the request and logs the inbound
    /// metadata. Post-hook: when the handler returned [`Dispatch`], the
    /// bound reply is resolved and delivered; any parked fault is routed
    /// into the reply first. Every dispatched request terminates with
    /// exactly one response — a resolution fault produces the last-resort
    /// generic 500.
    pub async fn dispatch(&self, request: Request, next: Next) -> Response {
        let reply = ReplyHandle::new(Reply::new(Arc::clone(&self.registry)));

        let mut request = self.log_request(request, reply.id()).await;
        request.extensions_mut().insert(reply.clone());

        let response = next.run(request).await;

        if response.extensions().get::<DispatchMarker>().is_none() {
            return response;
        }

        if let Some(parked) = response.extensions().get::<ParkedFault>() {
            let mut guard = reply.lock().await;
            if let Err(fault) = guard.add_error(parked.0.clone()).await {
                return self.last_resort(&fault);
            }
        }

        self.deliver(&reply).await
    }

    /// Resolve the bound reply and turn it into the transport response
    async fn deliver(&self, reply: &ReplyHandle) -> Response {
        let options = ResolveOptions {
            locale: self.options.locale.clone(),
            sanitize_data: self.options.sanitize_data,
        };

        let guard = reply.lock().await;
        match guard.resolve(&options).await {
            Ok(envelope) => {
                self.log_reply(&envelope);
                envelope_response(&envelope)
            }
            Err(fault) => self.last_resort(&fault),
        }
    }

    /// Last-resort response when resolution itself failed
    fn last_resort(&self, fault: &Fault) -> Response {
        if let Some(level) = self.options.error_level {
            emit_at(level, &format!("reply resolution failed: {fault}"));
        }
        generic_failure_response()
    }

    /// Log inbound request metadata, buffering the body for mutating verbs
    async fn log_request(&self, request: Request, id: &str) -> Request {
        let Some(level) = self.options.request_level else {
            return request;
        };

        let method = request.method().clone();
        let uri = request.uri().clone();

        // Only bodies with a known, bounded length are buffered for logging
        let content_length = request
            .headers()
            .get(http::header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());
        let buffer_body = matches!(method.as_str(), "POST" | "PUT" | "PATCH")
            && content_length.is_some_and(|size| size <= LOG_BODY_LIMIT as u64);

        if buffer_body {
            let (parts, body) = request.into_parts();
            match axum::body::to_bytes(body, LOG_BODY_LIMIT).await {
                Ok(bytes) => {
                    emit_at(
                        level,
                        &format!(
                            "[{id}] {method} {uri}\nHeaders: {:?}\nBody: {}",
                            parts.headers,
                            String::from_utf8_lossy(&bytes)
                        ),
                    );
                    Request::from_parts(parts, axum::body::Body::from(bytes))
                }
                Err(e) => {
                    tracing::debug!("failed to buffer request body for logging: {e}");
                    Request::from_parts(parts, axum::body::Body::empty())
                }
            }
        } else {
            emit_at(level, &format!("[{id}] {method} {uri}"));
            request
        }
    }

    /// Log the outbound envelope
    fn log_reply(&self, envelope: &Envelope) {
        let Some(level) = self.options.reply_level else {
            return;
        };
        let body = serde_json::to_string(&envelope.body).unwrap_or_default();
        emit_at(
            level,
            &format!(
                "[{}] reply with status code {}\nBody: {body}",
                envelope.body.id,
                envelope.status.as_u16()
            ),
        );
    }
}

/// Convert a resolved envelope into an axum response
#[must_use]
pub fn envelope_response(envelope: &Envelope) -> Response {
    (envelope.status, Json(&envelope.body)).into_response()
}

/// Generic 500 envelope used when no reply can be resolved
fn generic_failure_response() -> Response {
    let body = serde_json::json!({
        "id": Uuid::new_v4().to_string(),
        "errors": [{
            "httpStatusCode": 500,
            "message": GENERIC_SERVER_ERROR_MESSAGE,
        }],
    });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// Clonable handle to the reply bound to the current request
///
/// Extractable in any handler behind the dispatch layer. The handle locks
/// internally; hold the guard from [`ReplyHandle::lock`] for multi-step
/// mutations.
#[derive(Clone)]
pub struct ReplyHandle {
    inner: Arc<Mutex<Reply>>,
    id: String,
}

impl ReplyHandle {
    fn new(reply: Reply) -> Self {
        let id = reply.id().to_owned();
        Self {
            inner: Arc::new(Mutex::new(reply)),
            id,
        }
    }

    /// The bound reply's correlation identifier
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Lock the underlying reply for direct mutation
    pub async fn lock(&self) -> MutexGuard<'_, Reply> {
        self.inner.lock().await
    }

    /// Replace the reply's payload
    pub async fn set_data(&self, data: impl Into<Value>) {
        self.lock().await.set_data(data);
    }

    /// Normalize and append one error
    ///
    /// # Errors
    ///
    /// Propagates a `create-error` handler fault as a rejection
    pub async fn add_error(&self, error: impl Into<RawError>) -> Result<(), ReplyRejection> {
        self.lock().await.add_error(error).await?;
        Ok(())
    }

    /// Normalize and append errors, preserving order
    ///
    /// # Errors
    ///
    /// Propagates a `create-error` handler fault as a rejection
    pub async fn add_errors<I, E>(&self, errors: I) -> Result<(), ReplyRejection>
    where
        I: IntoIterator<Item = E>,
        E: Into<RawError>,
    {
        self.lock().await.add_errors(errors).await?;
        Ok(())
    }

    /// Replace all errors with a 400 Bad Request and request delivery
    ///
    /// # Errors
    ///
    /// Propagates a factory handler fault as a rejection
    pub async fn seal_bad_request(&self) -> Result<Dispatch, ReplyRejection> {
        self.lock().await.set_bad_request().await?;
        Ok(Dispatch)
    }

    /// Replace all errors with a 401 Unauthorized and request delivery
    ///
    /// # Errors
    ///
    /// Propagates a factory handler fault as a rejection
    pub async fn seal_unauthorized(&self) -> Result<Dispatch, ReplyRejection> {
        self.lock().await.set_unauthorized().await?;
        Ok(Dispatch)
    }

    /// Replace all errors with a 403 Forbidden and request delivery
    ///
    /// # Errors
    ///
    /// Propagates a factory handler fault as a rejection
    pub async fn seal_forbidden(&self) -> Result<Dispatch, ReplyRejection> {
        self.lock().await.set_forbidden().await?;
        Ok(Dispatch)
    }

    /// Replace all errors with a 404 Not Found and request delivery
    ///
    /// # Errors
    ///
    /// Propagates a factory handler fault as a rejection
    pub async fn seal_not_found(&self) -> Result<Dispatch, ReplyRejection> {
        self.lock().await.set_not_found().await?;
        Ok(Dispatch)
    }

    /// Replace all errors with a 500 and request delivery
    ///
    /// # Errors
    ///
    /// Propagates a factory handler fault as a rejection
    pub async fn seal_internal_server_error(&self) -> Result<Dispatch, ReplyRejection> {
        self.lock().await.set_internal_server_error().await?;
        Ok(Dispatch)
    }
}

impl<S> FromRequestParts<S> for ReplyHandle
where
    S: Send + Sync,
{
    type Rejection = MissingReply;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or(MissingReply)
    }
}

/// Rejection when no reply is bound to the request
///
/// A configuration error, distinct from business errors: the dispatch
/// layer was never installed on this router.
#[derive(Debug)]
pub struct MissingReply;

impl IntoResponse for MissingReply {
    fn into_response(self) -> Response {
        tracing::error!(
            "no reply bound to this request; was the dispatch layer installed before the routes?"
        );
        generic_failure_response()
    }
}

/// Marker a handler returns to request dispatcher delivery
///
/// Returning `Dispatch` ends the handler the way calling `next()` ends an
/// express route: the dispatcher resolves the bound reply and sends it.
#[derive(Debug, Clone, Copy)]
pub struct Dispatch;

impl IntoResponse for Dispatch {
    fn into_response(self) -> Response {
        let mut response = ().into_response();
        response.extensions_mut().insert(DispatchMarker);
        response
    }
}

/// Response-extension marker set by [`Dispatch`] and [`ReplyRejection`]
#[derive(Debug, Clone, Copy)]
struct DispatchMarker;

/// An uncaught fault parked for the dispatcher to route into the reply
#[derive(Debug, Clone)]
struct ParkedFault(RawError);

/// Error wrapper that routes a handler failure through the reply pipeline
///
/// Converting any `std::error::Error` (or a pipeline [`Fault`]) into a
/// `ReplyRejection` lets handlers use `?`; the dispatcher adds the error to
/// the bound reply and delivers the resolved envelope.
#[derive(Debug)]
pub struct ReplyRejection(RawError);

impl ReplyRejection {
    /// Wrap raw error material directly
    #[must_use]
    pub fn new(error: impl Into<RawError>) -> Self {
        Self(error.into())
    }
}

impl<E> From<E> for ReplyRejection
where
    E: std::error::Error + 'static,
{
    fn from(error: E) -> Self {
        Self(RawError::from_source(&error))
    }
}

impl IntoResponse for ReplyRejection {
    fn into_response(self) -> Response {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response.extensions_mut().insert(DispatchMarker);
        response.extensions_mut().insert(ParkedFault(self.0));
        response
    }
}

/// Emit a message at a runtime-chosen level
fn emit_at(level: Level, message: &str) {
    if level == Level::ERROR {
        tracing::error!("{message}");
    } else if level == Level::WARN {
        tracing::warn!("{message}");
    } else if level == Level::INFO {
        tracing::info!("{message}");
    } else if level == Level::DEBUG {
        tracing::debug!("{message}");
    } else {
        tracing::trace!("{message}");
    }
}
