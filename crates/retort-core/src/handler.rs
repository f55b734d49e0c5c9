//! Pluggable handler registry
//!
//! Every stage of reply resolution runs through a named extension point.
//! Defaults are installed for every point at construction; a host replaces
//! one by registering its own handler under the same tag. The registry is
//! built once, wrapped in an `Arc`, and shared read-only across requests;
//! reconfiguration means building a new registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::defaults;
use crate::error::{Fault, NormalizedError, RawError};
use crate::observe::{ReplyObserver, TracingObserver};
use crate::translate::Translator;

/// Named extension points consumed from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum HandlerKind {
    /// Map a well-known 4xx status to a canonical error
    CreateClientError,
    /// Normalize arbitrary error material
    CreateError,
    /// Acknowledge a 200 without producing an error
    CreateOk,
    /// Map a well-known 3xx status to a canonical error
    CreateRedirectionError,
    /// Map a well-known 5xx status to a canonical error
    CreateServerError,
    /// Serialize a normalized error into its wire object
    ErrorToObject,
    /// Strip sensitive fields from reply data
    SanitizeReplyData,
    /// Resolve a localization key
    Translate,
}

impl HandlerKind {
    /// All points that receive a default handler at construction
    const WITH_DEFAULTS: [Self; 7] = [
        Self::CreateClientError,
        Self::CreateError,
        Self::CreateOk,
        Self::CreateRedirectionError,
        Self::CreateServerError,
        Self::ErrorToObject,
        Self::SanitizeReplyData,
    ];
}

/// Input handed to a handler invocation
#[derive(Debug, Clone)]
pub enum HandlerInput {
    /// Raw error material for `create-error`
    Raw(RawError),
    /// Well-known status code for the factory handlers
    Status(u16),
    /// A normalized error for `error-to-object`
    Error(NormalizedError),
    /// Reply payload for `sanitize-reply-data`
    Data(Value),
    /// Localization key for `translate`
    Key {
        /// Lookup key, e.g. `server.400.notfound`
        key: String,
        /// Substitution values from the error's `message_data`
        data: Option<Value>,
    },
}

/// Result of a handler invocation
#[derive(Debug, Clone)]
pub enum HandlerOutput {
    /// A normalized error
    Error(NormalizedError),
    /// A wire-ready JSON object
    Object(Value),
    /// Sanitized reply data
    Data(Value),
    /// Resolved localized text
    Text(String),
    /// Nothing to add (e.g. `create-ok` for a 200)
    Ok,
}

/// Option bag passed to handlers
///
/// Unknown concerns travel in `extra`; handlers ignore what they don't
/// understand.
#[derive(Debug, Clone, Default)]
pub struct HandlerOptions {
    /// Target status code for error creation
    pub http_status_code: Option<u16>,
    /// Whether `error-to-object` emits the captured stack
    pub include_stack: Option<bool>,
    /// Locale for serialization-time translation
    pub locale: Option<String>,
    /// Handler-specific extras
    pub extra: serde_json::Map<String, Value>,
}

impl HandlerOptions {
    /// An option bag targeting a status code
    #[must_use]
    pub fn with_status(status: u16) -> Self {
        Self {
            http_status_code: Some(status),
            ..Self::default()
        }
    }
}

/// Context available to a running handler
///
/// Carries the collaborators a handler may delegate to: the current
/// `create-error` handler (so factories feed through normalization), the
/// translate handler when one is configured, and the observer.
pub struct HandlerContext {
    create_error: Arc<dyn Handler>,
    translate: Option<Arc<dyn Handler>>,
    observer: Arc<dyn ReplyObserver>,
}

impl HandlerContext {
    /// Delegate to the registered `create-error` handler
    ///
    /// # Errors
    ///
    /// Propagates the delegate handler's fault
    pub async fn create_error(
        &self,
        input: HandlerInput,
        options: &HandlerOptions,
    ) -> Result<HandlerOutput, Fault> {
        self.create_error.handle(input, options, self).await
    }

    /// Resolve a localization key through the translate handler
    ///
    /// Returns `Ok(None)` when no translate handler is configured or the
    /// key is unknown.
    ///
    /// # Errors
    ///
    /// Propagates the translate handler's fault
    pub async fn translate_key(
        &self,
        key: &str,
        data: Option<&Value>,
        options: &HandlerOptions,
    ) -> Result<Option<String>, Fault> {
        let Some(translate) = &self.translate else {
            return Ok(None);
        };

        let input = HandlerInput::Key {
            key: key.to_owned(),
            data: data.cloned(),
        };
        match translate.handle(input, options, self).await? {
            HandlerOutput::Text(text) => Ok(Some(text)),
            _ => Ok(None),
        }
    }

    /// Whether a translate handler is available
    #[must_use]
    pub const fn has_translator(&self) -> bool {
        self.translate.is_some()
    }

    /// The configured observer
    #[must_use]
    pub fn observer(&self) -> &dyn ReplyObserver {
        self.observer.as_ref()
    }
}

/// A replaceable function bound to a named extension point
///
/// The returned future is the continuation: resolve it with the stage's
/// output, or fail it to abort the reply's resolution.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Run the handler
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] to abort the resolution pipeline
    async fn handle(
        &self,
        input: HandlerInput,
        options: &HandlerOptions,
        ctx: &HandlerContext,
    ) -> Result<HandlerOutput, Fault>;
}

/// Immutable table of handlers shared across requests
pub struct HandlerRegistry {
    handlers: HashMap<HandlerKind, Arc<dyn Handler>>,
    defaults: HashMap<HandlerKind, HandlerOptions>,
    translator: Option<Arc<dyn Translator>>,
    observer: Arc<dyn ReplyObserver>,
}

impl HandlerRegistry {
    /// Start building a registry with the default handlers installed
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// A registry with only the defaults, wrapped for sharing
    #[must_use]
    pub fn with_defaults() -> Arc<Self> {
        Self::builder().build()
    }

    /// Invoke the handler registered for `kind`
    ///
    /// When `options` is `None` the kind's default option bag applies,
    /// whole-bag, matching registration-time replacement semantics. A kind
    /// with no handler (only possible for `translate`) falls through to a
    /// logged identity default.
    ///
    /// # Errors
    ///
    /// Propagates the handler's fault
    pub async fn handle(
        &self,
        kind: HandlerKind,
        input: HandlerInput,
        options: Option<&HandlerOptions>,
    ) -> Result<HandlerOutput, Fault> {
        self.observer.on_handler(kind);

        let merged = options
            .cloned()
            .or_else(|| self.defaults.get(&kind).cloned())
            .unwrap_or_default();
        let ctx = self.context();

        match self.handlers.get(&kind) {
            Some(handler) => handler.handle(input, &merged, &ctx).await,
            None => {
                tracing::debug!(handler = %kind, "no handler registered, passing input through");
                Ok(passthrough(input))
            }
        }
    }

    /// The default option bag for a kind
    #[must_use]
    pub fn default_options(&self, kind: HandlerKind) -> HandlerOptions {
        self.defaults.get(&kind).cloned().unwrap_or_default()
    }

    /// The configured translation collaborator, if any
    #[must_use]
    pub fn translator(&self) -> Option<&Arc<dyn Translator>> {
        self.translator.as_ref()
    }

    /// The configured observer
    #[must_use]
    pub fn observer(&self) -> &dyn ReplyObserver {
        self.observer.as_ref()
    }

    fn context(&self) -> HandlerContext {
        let create_error = self
            .handlers
            .get(&HandlerKind::CreateError)
            .expect("create-error handler installed at construction");

        HandlerContext {
            create_error: Arc::clone(create_error),
            translate: self.handlers.get(&HandlerKind::Translate).cloned(),
            observer: Arc::clone(&self.observer),
        }
    }
}

/// Identity fall-through for unregistered extension points
fn passthrough(input: HandlerInput) -> HandlerOutput {
    match input {
        HandlerInput::Key { key, .. } => HandlerOutput::Text(key),
        HandlerInput::Data(value) => HandlerOutput::Data(value),
        HandlerInput::Error(error) => HandlerOutput::Error(error),
        HandlerInput::Raw(raw) => HandlerOutput::Error(match raw {
            RawError::Message(message) => NormalizedError::from_message(message),
            RawError::Source { message, chain } => {
                let mut error = NormalizedError::from_message(message);
                error.stack = Some(chain);
                error
            }
            RawError::Normalized(error) => error,
        }),
        HandlerInput::Status(_) => HandlerOutput::Ok,
    }
}

/// Builder for a [`HandlerRegistry`]
///
/// Registration is whole-value replacement: installing a handler for a tag
/// discards the previous one entirely.
pub struct RegistryBuilder {
    handlers: HashMap<HandlerKind, Arc<dyn Handler>>,
    defaults: HashMap<HandlerKind, HandlerOptions>,
    translator: Option<Arc<dyn Translator>>,
    observer: Option<Arc<dyn ReplyObserver>>,
}

impl RegistryBuilder {
    /// Create a builder with the default handler set
    #[must_use]
    pub fn new() -> Self {
        let mut handlers: HashMap<HandlerKind, Arc<dyn Handler>> = HashMap::new();
        for kind in HandlerKind::WITH_DEFAULTS {
            handlers.insert(kind, defaults::for_kind(kind));
        }

        Self {
            handlers,
            defaults: HashMap::new(),
            translator: None,
            observer: None,
        }
    }

    /// Replace the handler for an extension point
    #[must_use]
    pub fn handler(mut self, kind: HandlerKind, handler: impl Handler + 'static) -> Self {
        self.handlers.insert(kind, Arc::new(handler));
        self
    }

    /// Set the default option bag for an extension point
    #[must_use]
    pub fn default_options(mut self, kind: HandlerKind, options: HandlerOptions) -> Self {
        self.defaults.insert(kind, options);
        self
    }

    /// Configure the translation collaborator
    ///
    /// Also installs the default translate handler unless the host
    /// registered its own.
    #[must_use]
    pub fn translator(mut self, translator: impl Translator + 'static) -> Self {
        self.translator = Some(Arc::new(translator));
        self
    }

    /// Replace the observer
    #[must_use]
    pub fn observer(mut self, observer: impl ReplyObserver + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Finish building; the registry is immutable from here on
    #[must_use]
    pub fn build(mut self) -> Arc<HandlerRegistry> {
        if let Some(translator) = &self.translator
            && !self.handlers.contains_key(&HandlerKind::Translate)
        {
            self.handlers.insert(
                HandlerKind::Translate,
                Arc::new(defaults::TranslateThroughCatalog::new(Arc::clone(translator))),
            );
        }

        Arc::new(HandlerRegistry {
            handlers: self.handlers,
            defaults: self.defaults,
            translator: self.translator,
            observer: self
                .observer
                .unwrap_or_else(|| Arc::new(TracingObserver::default())),
        })
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
