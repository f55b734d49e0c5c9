//! Per-request reply aggregate and its resolution pipeline
//!
//! A `Reply` collects response data and normalized errors while a request
//! is being handled, then resolves exactly once into an [`Envelope`], the
//! canonical status code plus wire body. Resolution is deterministic: the
//! same data and error list always produce the same envelope.

use std::sync::Arc;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Fault, NormalizedError, RawError};
use crate::handler::{HandlerInput, HandlerKind, HandlerOptions, HandlerOutput, HandlerRegistry};

/// Wire body of a resolved reply
///
/// The status code is never part of the body; it travels as the transport
/// status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyBody {
    /// Correlation identifier, equal to the reply's id
    pub id: String,
    /// Sanitized application payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Serialized errors in insertion order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<Value>>,
}

/// A resolved reply: transport status plus wire body
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Status delivered to the transport
    pub status: StatusCode,
    /// JSON body delivered to the client
    pub body: ReplyBody,
}

/// Preferences for a single resolution
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Locale for serialization-time translation
    pub locale: Option<String>,
    /// Whether reply data runs through the sanitize handler
    pub sanitize_data: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            locale: None,
            sanitize_data: true,
        }
    }
}

impl ResolveOptions {
    /// Options targeting a specific locale
    #[must_use]
    pub fn with_locale(locale: impl Into<String>) -> Self {
        Self {
            locale: Some(locale.into()),
            ..Self::default()
        }
    }
}

/// Per-request aggregate of response data and errors
///
/// Owned exclusively by the request-handling context that created it; never
/// shared across requests. Mutate it freely before resolution; `resolve`
/// does not consume it and repeated calls yield structurally equal
/// envelopes.
pub struct Reply {
    id: String,
    data: Option<Value>,
    errors: Vec<NormalizedError>,
    http_status_code: Option<u16>,
    registry: Arc<HandlerRegistry>,
}

impl Reply {
    /// Create a fresh reply with a generated id
    #[must_use]
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self::with_id(registry, Uuid::new_v4().to_string())
    }

    /// Create a reply with a caller-supplied id
    #[must_use]
    pub fn with_id(registry: Arc<HandlerRegistry>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: None,
            errors: Vec::new(),
            http_status_code: None,
            registry,
        }
    }

    /// The reply's correlation identifier
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The current payload, if any
    #[must_use]
    pub const fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Errors accumulated so far, in insertion order
    #[must_use]
    pub fn errors(&self) -> &[NormalizedError] {
        &self.errors
    }

    /// The registry this reply resolves through
    #[must_use]
    pub const fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Replace the payload; no shape validation is performed
    pub fn set_data(&mut self, data: impl Into<Value>) -> &mut Self {
        self.data = Some(data.into());
        self
    }

    /// Pin the resolved status code, overriding error-derived resolution
    pub fn pin_status(&mut self, status: u16) -> &mut Self {
        self.http_status_code = Some(status);
        self
    }

    /// Normalize and append one error
    ///
    /// # Errors
    ///
    /// Propagates a `create-error` handler fault
    pub async fn add_error(&mut self, error: impl Into<RawError>) -> Result<&mut Self, Fault> {
        let normalized = self.normalize(error.into()).await?;
        self.errors.push(normalized);
        Ok(self)
    }

    /// Normalize and append errors, preserving the given order
    ///
    /// # Errors
    ///
    /// Propagates a `create-error` handler fault; errors normalized before
    /// the fault remain appended
    pub async fn add_errors<I, E>(&mut self, errors: I) -> Result<&mut Self, Fault>
    where
        I: IntoIterator<Item = E>,
        E: Into<RawError>,
    {
        for error in errors {
            self.add_error(error).await?;
        }
        Ok(self)
    }

    /// Clear the error list, then append the given errors
    ///
    /// # Errors
    ///
    /// Propagates a `create-error` handler fault
    pub async fn set_errors<I, E>(&mut self, errors: I) -> Result<&mut Self, Fault>
    where
        I: IntoIterator<Item = E>,
        E: Into<RawError>,
    {
        self.errors.clear();
        self.add_errors(errors).await
    }

    /// Run a factory handler for `status` and append its error
    ///
    /// The generic form behind the convenience methods; `create-ok`
    /// acknowledgements append nothing.
    ///
    /// # Errors
    ///
    /// Propagates the factory or `create-error` handler fault
    pub async fn add_status(
        &mut self,
        kind: HandlerKind,
        status: u16,
        options: Option<&HandlerOptions>,
    ) -> Result<&mut Self, Fault> {
        match self.registry.handle(kind, HandlerInput::Status(status), options).await? {
            HandlerOutput::Error(error) => self.errors.push(error),
            HandlerOutput::Ok => {}
            _ => return Err(Fault::UnexpectedOutput { kind }),
        }
        Ok(self)
    }

    /// Append a 400 Bad Request error
    ///
    /// # Errors
    ///
    /// Propagates a factory handler fault
    pub async fn add_bad_request(&mut self) -> Result<&mut Self, Fault> {
        self.add_status(HandlerKind::CreateClientError, 400, None).await
    }

    /// Append a 401 Unauthorized error
    ///
    /// # Errors
    ///
    /// Propagates a factory handler fault
    pub async fn add_unauthorized(&mut self) -> Result<&mut Self, Fault> {
        self.add_status(HandlerKind::CreateClientError, 401, None).await
    }

    /// Append a 402 Payment Required error
    ///
    /// # Errors
    ///
    /// Propagates a factory handler fault
    pub async fn add_payment_required(&mut self) -> Result<&mut Self, Fault> {
        self.add_status(HandlerKind::CreateClientError, 402, None).await
    }

    /// Append a 403 Forbidden error
    ///
    /// # Errors
    ///
    /// Propagates a factory handler fault
    pub async fn add_forbidden(&mut self) -> Result<&mut Self, Fault> {
        self.add_status(HandlerKind::CreateClientError, 403, None).await
    }

    /// Append a 404 Not Found error
    ///
    /// # Errors
    ///
    /// Propagates a factory handler fault
    pub async fn add_not_found(&mut self) -> Result<&mut Self, Fault> {
        self.add_status(HandlerKind::CreateClientError, 404, None).await
    }

    /// Append a 409 Conflict error
    ///
    /// # Errors
    ///
    /// Propagates a factory handler fault
    pub async fn add_conflict(&mut self) -> Result<&mut Self, Fault> {
        self.add_status(HandlerKind::CreateClientError, 409, None).await
    }

    /// Append a 500 Internal Server Error
    ///
    /// # Errors
    ///
    /// Propagates a factory handler fault
    pub async fn add_internal_server_error(&mut self) -> Result<&mut Self, Fault> {
        self.add_status(HandlerKind::CreateServerError, 500, None).await
    }

    /// Append a 3xx redirection error
    ///
    /// # Errors
    ///
    /// Propagates a factory handler fault
    pub async fn add_redirection(&mut self, status: u16) -> Result<&mut Self, Fault> {
        self.add_status(HandlerKind::CreateRedirectionError, status, None).await
    }

    /// Replace all errors with a 400 Bad Request
    ///
    /// # Errors
    ///
    /// Propagates a factory handler fault
    pub async fn set_bad_request(&mut self) -> Result<&mut Self, Fault> {
        self.errors.clear();
        self.add_bad_request().await
    }

    /// Replace all errors with a 401 Unauthorized
    ///
    /// # Errors
    ///
    /// Propagates a factory handler fault
    pub async fn set_unauthorized(&mut self) -> Result<&mut Self, Fault> {
        self.errors.clear();
        self.add_unauthorized().await
    }

    /// Replace all errors with a 403 Forbidden
    ///
    /// # Errors
    ///
    /// Propagates a factory handler fault
    pub async fn set_forbidden(&mut self) -> Result<&mut Self, Fault> {
        self.errors.clear();
        self.add_forbidden().await
    }

    /// Replace all errors with a 404 Not Found
    ///
    /// # Errors
    ///
    /// Propagates a factory handler fault
    pub async fn set_not_found(&mut self) -> Result<&mut Self, Fault> {
        self.errors.clear();
        self.add_not_found().await
    }

    /// Replace all errors with a 500 Internal Server Error
    ///
    /// # Errors
    ///
    /// Propagates a factory handler fault
    pub async fn set_internal_server_error(&mut self) -> Result<&mut Self, Fault> {
        self.errors.clear();
        self.add_internal_server_error().await
    }

    /// Resolve the reply into its wire envelope
    ///
    /// The pipeline runs its stages strictly in order: the empty-reply
    /// check, data projection through `sanitize-reply-data`, per-error
    /// serialization with running-maximum status resolution, identifier
    /// attachment, and the status fallback. Each error's conversion is a
    /// discrete suspension point; errors are processed one after another in
    /// insertion order, never concurrently.
    ///
    /// # Errors
    ///
    /// A handler fault in any stage aborts resolution; no partial body is
    /// produced
    pub async fn resolve(&self, options: &ResolveOptions) -> Result<Envelope, Fault> {
        // Nothing to send resolves to a synthesized 404
        if self.data.is_none() && self.errors.is_empty() {
            let synthesized = match self
                .registry
                .handle(HandlerKind::CreateClientError, HandlerInput::Status(404), None)
                .await?
            {
                HandlerOutput::Error(error) => error,
                _ => {
                    return Err(Fault::UnexpectedOutput {
                        kind: HandlerKind::CreateClientError,
                    });
                }
            };

            let status = synthesized.status();
            let object = self.error_object(&synthesized, options).await?;
            let envelope = Envelope {
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::NOT_FOUND),
                body: ReplyBody {
                    id: self.id.clone(),
                    data: None,
                    errors: Some(vec![object]),
                },
            };
            self.registry.observer().on_reply(&self.id, envelope.status.as_u16());
            return Ok(envelope);
        }

        // Data projection through the sanitize handler
        let data = match &self.data {
            Some(value) if options.sanitize_data => {
                match self
                    .registry
                    .handle(HandlerKind::SanitizeReplyData, HandlerInput::Data(value.clone()), None)
                    .await?
                {
                    HandlerOutput::Data(clean) => Some(clean),
                    _ => {
                        return Err(Fault::UnexpectedOutput {
                            kind: HandlerKind::SanitizeReplyData,
                        });
                    }
                }
            }
            Some(value) => Some(value.clone()),
            None => None,
        };

        // Serialize errors in insertion order while tracking the stable
        // maximum status; unclassified errors count as 500
        let mut derived: Option<u16> = None;
        let mut errors = None;
        if self.errors.is_empty() {
            derived = Some(200);
        } else {
            let mut objects = Vec::with_capacity(self.errors.len());
            for error in &self.errors {
                let candidate = error.status();
                if derived.is_none_or(|current| candidate > current) {
                    derived = Some(candidate);
                }
                objects.push(self.error_object(error, options).await?);
            }
            errors = Some(objects);
        }

        // A caller-pinned status wins over the derived one; 500 is the
        // last-resort fallback
        let status = self.http_status_code.or(derived).unwrap_or(500);

        let envelope = Envelope {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body: ReplyBody {
                id: self.id.clone(),
                data,
                errors,
            },
        };
        self.registry.observer().on_reply(&self.id, envelope.status.as_u16());
        Ok(envelope)
    }

    async fn normalize(&self, raw: RawError) -> Result<NormalizedError, Fault> {
        match self
            .registry
            .handle(HandlerKind::CreateError, HandlerInput::Raw(raw), None)
            .await?
        {
            HandlerOutput::Error(error) => Ok(error),
            _ => Err(Fault::UnexpectedOutput {
                kind: HandlerKind::CreateError,
            }),
        }
    }

    async fn error_object(
        &self,
        error: &NormalizedError,
        options: &ResolveOptions,
    ) -> Result<Value, Fault> {
        let mut handler_options = self.registry.default_options(HandlerKind::ErrorToObject);
        if let Some(locale) = &options.locale {
            handler_options.locale = Some(locale.clone());
        }

        match self
            .registry
            .handle(
                HandlerKind::ErrorToObject,
                HandlerInput::Error(error.clone()),
                Some(&handler_options),
            )
            .await?
        {
            HandlerOutput::Object(object) => Ok(object),
            _ => Err(Fault::UnexpectedOutput {
                kind: HandlerKind::ErrorToObject,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::handler::HandlerRegistry;
    use crate::translate::TableTranslator;

    use super::*;

    #[tokio::test]
    async fn empty_reply_resolves_to_404_with_one_error() {
        let reply = Reply::new(HandlerRegistry::with_defaults());
        let envelope = reply.resolve(&ResolveOptions::default()).await.unwrap();

        assert_eq!(envelope.status, StatusCode::NOT_FOUND);
        assert!(envelope.body.data.is_none());
        let errors = envelope.body.errors.unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["message"], "Not found");
    }

    #[tokio::test]
    async fn data_only_reply_resolves_to_200() {
        let mut reply = Reply::new(HandlerRegistry::with_defaults());
        reply.set_data(json!({"a": 1}));

        let envelope = reply.resolve(&ResolveOptions::default()).await.unwrap();

        assert_eq!(envelope.status, StatusCode::OK);
        assert_eq!(envelope.body.data, Some(json!({"a": 1})));
        assert!(envelope.body.errors.is_none());
        assert_eq!(envelope.body.id, reply.id());
    }

    #[tokio::test]
    async fn plain_error_resolves_to_500() {
        let mut reply = Reply::new(HandlerRegistry::with_defaults());
        reply.add_error("boom").await.unwrap();

        let envelope = reply.resolve(&ResolveOptions::default()).await.unwrap();

        assert_eq!(envelope.status, StatusCode::INTERNAL_SERVER_ERROR);
        let errors = envelope.body.errors.unwrap();
        assert_eq!(errors[0]["message"], "boom");
    }

    #[tokio::test]
    async fn status_is_stable_maximum_across_errors() {
        let mut reply = Reply::new(HandlerRegistry::with_defaults());
        reply.add_not_found().await.unwrap();
        reply.add_forbidden().await.unwrap();

        let envelope = reply.resolve(&ResolveOptions::default()).await.unwrap();

        assert_eq!(envelope.status, StatusCode::NOT_FOUND);
        let errors = envelope.body.errors.unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0]["message"], "Not found");
        assert_eq!(errors[1]["message"], "Forbidden");
    }

    #[tokio::test]
    async fn insertion_order_is_preserved() {
        let mut reply = Reply::new(HandlerRegistry::with_defaults());
        reply.add_errors(["first", "second", "third"]).await.unwrap();

        let envelope = reply.resolve(&ResolveOptions::default()).await.unwrap();

        let errors = envelope.body.errors.unwrap();
        let messages: Vec<_> = errors.iter().map(|e| e["message"].as_str().unwrap()).collect();
        assert_eq!(messages, ["first", "second", "third"]);
    }

    #[tokio::test]
    async fn resolution_is_idempotent() {
        let mut reply = Reply::new(HandlerRegistry::with_defaults());
        reply.set_data(json!({"n": 7}));
        reply.add_bad_request().await.unwrap();

        let first = reply.resolve(&ResolveOptions::default()).await.unwrap();
        let second = reply.resolve(&ResolveOptions::default()).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn pinned_status_wins_over_derived() {
        let mut reply = Reply::new(HandlerRegistry::with_defaults());
        reply.pin_status(503);
        reply.add_bad_request().await.unwrap();

        let envelope = reply.resolve(&ResolveOptions::default()).await.unwrap();
        assert_eq!(envelope.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn set_errors_replaces_existing_list() {
        let mut reply = Reply::new(HandlerRegistry::with_defaults());
        reply.add_error("stale").await.unwrap();
        reply.set_errors(["fresh"]).await.unwrap();

        assert_eq!(reply.errors().len(), 1);
        assert_eq!(reply.errors()[0].message, "fresh");
    }

    #[tokio::test]
    async fn set_not_found_clears_then_appends() {
        let mut reply = Reply::new(HandlerRegistry::with_defaults());
        reply.add_error("stale").await.unwrap();
        reply.set_not_found().await.unwrap();

        assert_eq!(reply.errors().len(), 1);
        assert_eq!(reply.errors()[0].message, "Not found");
    }

    #[tokio::test]
    async fn source_error_keeps_message() {
        let mut reply = Reply::new(HandlerRegistry::with_defaults());
        let io = std::io::Error::other("boom");
        reply.add_error(RawError::from_source(&io)).await.unwrap();

        let envelope = reply.resolve(&ResolveOptions::default()).await.unwrap();
        assert_eq!(envelope.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(envelope.body.errors.unwrap()[0]["message"], "boom");
    }

    #[tokio::test]
    async fn locale_varies_per_resolution() {
        let mut translator = TableTranslator::new("en");
        translator.insert("en", "server.400.notfound", "Not found");
        translator.insert("fr", "server.400.notfound", "Introuvable");
        let registry = HandlerRegistry::builder().translator(translator).build();

        let mut reply = Reply::new(registry);
        reply.add_not_found().await.unwrap();

        let english = reply.resolve(&ResolveOptions::default()).await.unwrap();
        let french = reply.resolve(&ResolveOptions::with_locale("fr")).await.unwrap();

        assert_eq!(english.body.errors.unwrap()[0]["message"], "Not found");
        assert_eq!(french.body.errors.unwrap()[0]["message"], "Introuvable");
    }

    #[tokio::test]
    async fn unknown_factory_status_downgrades_to_generic_500() {
        let mut reply = Reply::new(HandlerRegistry::with_defaults());
        reply
            .add_status(HandlerKind::CreateClientError, 418, None)
            .await
            .unwrap();

        let envelope = reply.resolve(&ResolveOptions::default()).await.unwrap();
        assert_eq!(envelope.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            envelope.body.errors.unwrap()[0]["message"],
            crate::defaults::GENERIC_SERVER_ERROR_MESSAGE
        );
    }

    #[tokio::test]
    async fn factory_conveniences_map_their_status_codes() {
        let mut reply = Reply::new(HandlerRegistry::with_defaults());
        reply.add_conflict().await.unwrap();
        reply.add_payment_required().await.unwrap();
        reply.add_redirection(302).await.unwrap();
        // A create-ok acknowledgement appends nothing
        reply.add_status(HandlerKind::CreateOk, 200, None).await.unwrap();

        let statuses: Vec<_> = reply.errors().iter().map(NormalizedError::status).collect();
        assert_eq!(statuses, [409, 402, 302]);

        let envelope = reply.resolve(&ResolveOptions::default()).await.unwrap();
        assert_eq!(envelope.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn body_serializes_camel_case_without_empty_fields() {
        let mut reply = Reply::with_id(HandlerRegistry::with_defaults(), "fixed-id");
        reply.set_data(json!({"a": 1}));

        let envelope = reply.resolve(&ResolveOptions::default()).await.unwrap();
        let wire = serde_json::to_value(&envelope.body).unwrap();

        assert_eq!(wire, json!({"id": "fixed-id", "data": {"a": 1}}));
    }
}
