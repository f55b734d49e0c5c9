//! Default handlers installed at registry construction
//!
//! Each extension point ships a default so a bare registry is fully
//! functional. Hosts replace individual handlers to change behavior; the
//! factory tables and fallback text here are the canonical set.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::{Fault, NormalizedError, RawError};
use crate::handler::{Handler, HandlerContext, HandlerInput, HandlerKind, HandlerOptions, HandlerOutput};
use crate::translate::Translator;

/// Literal text of the generic server error
pub const GENERIC_SERVER_ERROR_MESSAGE: &str = "An internal server error has occurred.";

/// Localization key of the generic server error
pub const GENERIC_SERVER_ERROR_KEY: &str = "server.500.generic";

/// The default handler for an extension point
pub(crate) fn for_kind(kind: HandlerKind) -> Arc<dyn Handler> {
    match kind {
        HandlerKind::CreateClientError => Arc::new(ClientErrorFactory),
        HandlerKind::CreateError => Arc::new(ErrorNormalizer),
        HandlerKind::CreateOk => Arc::new(OkFactory),
        HandlerKind::CreateRedirectionError => Arc::new(RedirectionErrorFactory),
        HandlerKind::CreateServerError => Arc::new(ServerErrorFactory),
        HandlerKind::ErrorToObject => Arc::new(ErrorToObjectSerializer),
        HandlerKind::SanitizeReplyData => Arc::new(IdentitySanitizer),
        HandlerKind::Translate => Arc::new(KeyPassthrough),
    }
}

/// Default `create-error` handler
///
/// Normalizes the three accepted inputs: a bare string becomes a new error,
/// a source error keeps its message and captured chain, and an already
/// normalized error passes through unchanged. The target status from the
/// option bag is attached only when the error carries none. Never fails.
pub struct ErrorNormalizer;

#[async_trait]
impl Handler for ErrorNormalizer {
    async fn handle(
        &self,
        input: HandlerInput,
        options: &HandlerOptions,
        _ctx: &HandlerContext,
    ) -> Result<HandlerOutput, Fault> {
        let error = match input {
            HandlerInput::Raw(RawError::Message(message)) => NormalizedError::from_message(message),
            HandlerInput::Raw(RawError::Source { message, chain }) => {
                let mut error = NormalizedError::from_message(message);
                error.stack = Some(chain);
                error
            }
            // Idempotent passthrough for rich errors
            HandlerInput::Raw(RawError::Normalized(error)) | HandlerInput::Error(error) => {
                return Ok(HandlerOutput::Error(error));
            }
            HandlerInput::Status(status) => {
                NormalizedError::from_message(GENERIC_SERVER_ERROR_MESSAGE).with_status(status)
            }
            HandlerInput::Data(value) => NormalizedError::from_message(value.to_string()),
            HandlerInput::Key { key, .. } => NormalizedError::from_message(key),
        };

        let error = match (error.http_status_code, options.http_status_code) {
            (None, Some(status)) => error.with_status(status),
            _ => error,
        };

        Ok(HandlerOutput::Error(error))
    }
}

/// Build a canonical error and feed it through `create-error`
async fn canonical_error(
    ctx: &HandlerContext,
    options: &HandlerOptions,
    status: u16,
    literal: &str,
    key: &str,
) -> Result<HandlerOutput, Fault> {
    let mut error = NormalizedError::from_message(literal).with_status(status);
    if ctx.has_translator() {
        error = error.with_message_key(key);
    }

    let mut options = options.clone();
    options.http_status_code = Some(status);
    ctx.create_error(HandlerInput::Raw(RawError::Normalized(error)), &options).await
}

/// Downgrade an unhandled factory request to the generic 500 error
async fn downgrade(
    ctx: &HandlerContext,
    options: &HandlerOptions,
    fault: &str,
) -> Result<HandlerOutput, Fault> {
    ctx.observer().on_config_fault(fault);
    canonical_error(ctx, options, 500, GENERIC_SERVER_ERROR_MESSAGE, GENERIC_SERVER_ERROR_KEY).await
}

/// Default `create-client-error` factory for well-known 4xx codes
pub struct ClientErrorFactory;

impl ClientErrorFactory {
    const fn entry(status: u16) -> Option<(&'static str, &'static str)> {
        match status {
            400 => Some(("Bad request", "server.400.badRequest")),
            401 => Some(("Unauthorized", "server.400.unauthorized")),
            402 => Some(("Payment required", "server.400.paymentRequired")),
            403 => Some(("Forbidden", "server.400.forbidden")),
            404 => Some(("Not found", "server.400.notfound")),
            409 => Some(("Conflict", "server.400.conflict")),
            _ => None,
        }
    }
}

#[async_trait]
impl Handler for ClientErrorFactory {
    async fn handle(
        &self,
        input: HandlerInput,
        options: &HandlerOptions,
        ctx: &HandlerContext,
    ) -> Result<HandlerOutput, Fault> {
        let HandlerInput::Status(status) = input else {
            return downgrade(ctx, options, "create-client-error invoked without a status code").await;
        };

        match Self::entry(status) {
            Some((literal, key)) => canonical_error(ctx, options, status, literal, key).await,
            None => {
                let fault = format!("unhandled status code {status} in create-client-error");
                downgrade(ctx, options, &fault).await
            }
        }
    }
}

/// Default `create-server-error` factory
pub struct ServerErrorFactory;

#[async_trait]
impl Handler for ServerErrorFactory {
    async fn handle(
        &self,
        input: HandlerInput,
        options: &HandlerOptions,
        ctx: &HandlerContext,
    ) -> Result<HandlerOutput, Fault> {
        match input {
            HandlerInput::Status(500) => {
                canonical_error(ctx, options, 500, GENERIC_SERVER_ERROR_MESSAGE, GENERIC_SERVER_ERROR_KEY)
                    .await
            }
            HandlerInput::Status(status) => {
                let fault = format!("unhandled status code {status} in create-server-error");
                downgrade(ctx, options, &fault).await
            }
            _ => downgrade(ctx, options, "create-server-error invoked without a status code").await,
        }
    }
}

/// Default `create-redirection-error` factory for well-known 3xx codes
pub struct RedirectionErrorFactory;

impl RedirectionErrorFactory {
    const fn entry(status: u16) -> Option<(&'static str, &'static str)> {
        match status {
            300 => Some(("Multiple Choices", "server.300.multipleChoices")),
            301 => Some(("Moved Permanently", "server.301.movedPermanently")),
            302 => Some(("Found", "server.302.found")),
            304 => Some(("Not Modified", "server.304.notModified")),
            305 => Some(("Use Proxy", "server.305.useProxy")),
            307 => Some(("Temporary Redirect", "server.307.temporaryRedirect")),
            308 => Some(("Permanent Redirect", "server.308.permanentRedirect")),
            _ => None,
        }
    }
}

#[async_trait]
impl Handler for RedirectionErrorFactory {
    async fn handle(
        &self,
        input: HandlerInput,
        options: &HandlerOptions,
        ctx: &HandlerContext,
    ) -> Result<HandlerOutput, Fault> {
        let HandlerInput::Status(status) = input else {
            return downgrade(ctx, options, "create-redirection-error invoked without a status code")
                .await;
        };

        match Self::entry(status) {
            Some((literal, key)) => canonical_error(ctx, options, status, literal, key).await,
            None => {
                let fault = format!("unhandled status code {status} in create-redirection-error");
                downgrade(ctx, options, &fault).await
            }
        }
    }
}

/// Default `create-ok` handler: acknowledges a 200, errors anything else
pub struct OkFactory;

#[async_trait]
impl Handler for OkFactory {
    async fn handle(
        &self,
        input: HandlerInput,
        options: &HandlerOptions,
        ctx: &HandlerContext,
    ) -> Result<HandlerOutput, Fault> {
        match input {
            HandlerInput::Status(200) => Ok(HandlerOutput::Ok),
            HandlerInput::Status(status) => {
                let fault = format!("unhandled status code {status} in create-ok");
                downgrade(ctx, options, &fault).await
            }
            _ => downgrade(ctx, options, "create-ok invoked without a status code").await,
        }
    }
}

/// Default `error-to-object` serializer
///
/// Emits the camelCase wire object. Localization keys resolve through the
/// translate handler here, at serialization time, so the locale can vary
/// per resolution. Internal-only errors keep their status but have their
/// text replaced by the generic server error.
pub struct ErrorToObjectSerializer;

#[async_trait]
impl Handler for ErrorToObjectSerializer {
    async fn handle(
        &self,
        input: HandlerInput,
        options: &HandlerOptions,
        ctx: &HandlerContext,
    ) -> Result<HandlerOutput, Fault> {
        let HandlerInput::Error(error) = input else {
            return Err(Fault::UnexpectedOutput {
                kind: HandlerKind::ErrorToObject,
            });
        };

        let status = options
            .http_status_code
            .or(error.http_status_code)
            .unwrap_or(500);

        if error.internal_only {
            return Ok(HandlerOutput::Object(json!({
                "httpStatusCode": status,
                "message": GENERIC_SERVER_ERROR_MESSAGE,
            })));
        }

        let mut message = error.message.clone();
        if let Some(key) = &error.message_key
            && let Some(translated) = ctx.translate_key(key, error.message_data.as_ref(), options).await?
        {
            message = translated;
        }

        let mut object = serde_json::Map::new();
        object.insert("httpStatusCode".to_owned(), json!(status));
        object.insert("message".to_owned(), Value::String(message));
        if let Some(code) = &error.code {
            object.insert("code".to_owned(), Value::String(code.clone()));
        }
        if options.include_stack.unwrap_or(false)
            && let Some(stack) = &error.stack
        {
            object.insert("stack".to_owned(), Value::String(stack.clone()));
        }

        Ok(HandlerOutput::Object(Value::Object(object)))
    }
}

/// Default `sanitize-reply-data` handler: identity
pub struct IdentitySanitizer;

#[async_trait]
impl Handler for IdentitySanitizer {
    async fn handle(
        &self,
        input: HandlerInput,
        _options: &HandlerOptions,
        _ctx: &HandlerContext,
    ) -> Result<HandlerOutput, Fault> {
        match input {
            HandlerInput::Data(value) => Ok(HandlerOutput::Data(value)),
            _ => Err(Fault::UnexpectedOutput {
                kind: HandlerKind::SanitizeReplyData,
            }),
        }
    }
}

/// Translate handler backed by a [`Translator`]
///
/// Installed automatically when a translator is configured. An unknown key
/// yields no output, which callers treat as "use the literal message".
pub struct TranslateThroughCatalog {
    translator: Arc<dyn Translator>,
}

impl TranslateThroughCatalog {
    /// Wrap a translation collaborator
    #[must_use]
    pub fn new(translator: Arc<dyn Translator>) -> Self {
        Self { translator }
    }
}

#[async_trait]
impl Handler for TranslateThroughCatalog {
    async fn handle(
        &self,
        input: HandlerInput,
        options: &HandlerOptions,
        _ctx: &HandlerContext,
    ) -> Result<HandlerOutput, Fault> {
        let HandlerInput::Key { key, data } = input else {
            return Ok(HandlerOutput::Ok);
        };

        match self
            .translator
            .translate(&key, data.as_ref(), options.locale.as_deref())
            .await?
        {
            Some(text) => Ok(HandlerOutput::Text(text)),
            None => Ok(HandlerOutput::Ok),
        }
    }
}

/// Fallback translate handler when no translator is configured
struct KeyPassthrough;

#[async_trait]
impl Handler for KeyPassthrough {
    async fn handle(
        &self,
        input: HandlerInput,
        _options: &HandlerOptions,
        _ctx: &HandlerContext,
    ) -> Result<HandlerOutput, Fault> {
        match input {
            HandlerInput::Key { key, .. } => Ok(HandlerOutput::Text(key)),
            _ => Ok(HandlerOutput::Ok),
        }
    }
}
