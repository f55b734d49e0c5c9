use serde_json::Value;

use crate::handler::HandlerKind;

/// Canonical internal error representation
///
/// Every error entering a reply (a bare string, a `std::error::Error`, or
/// an already-rich error) is normalized into this shape by the
/// `create-error` handler. The status code stays optional until resolution;
/// [`NormalizedError::status`] falls back to 500 for unclassified errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedError {
    /// HTTP status code, 100..=599 when set
    pub http_status_code: Option<u16>,
    /// Human-readable message (literal text or localized fallback)
    pub message: String,
    /// Localization lookup key, resolved at serialization time
    pub message_key: Option<String>,
    /// Machine-readable error code
    pub code: Option<String>,
    /// Source chain captured at normalization time
    pub stack: Option<String>,
    /// Substitution values for localized messages
    pub message_data: Option<Value>,
    /// Correlation context, never shown to clients
    pub reference_data: Option<Value>,
    /// When set, the wire form is redacted to the generic server error
    pub internal_only: bool,
}

impl NormalizedError {
    /// Create an error from a plain message
    #[must_use]
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            http_status_code: None,
            message: message.into(),
            message_key: None,
            code: None,
            stack: None,
            message_data: None,
            reference_data: None,
            internal_only: false,
        }
    }

    /// Create an error from a source error, capturing its chain as `stack`
    #[must_use]
    pub fn from_source(source: &(dyn std::error::Error + 'static)) -> Self {
        let mut chain = source.to_string();
        let mut cause = source.source();
        while let Some(err) = cause {
            chain.push_str("\n  caused by: ");
            chain.push_str(&err.to_string());
            cause = err.source();
        }

        let mut normalized = Self::from_message(source.to_string());
        normalized.stack = Some(chain);
        normalized
    }

    /// Attach a status code, replacing any existing one
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status_code = Some(status);
        self
    }

    /// Attach a machine-readable code
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attach a localization key
    #[must_use]
    pub fn with_message_key(mut self, key: impl Into<String>) -> Self {
        self.message_key = Some(key.into());
        self
    }

    /// Mark this error as internal-only
    #[must_use]
    pub const fn internal(mut self) -> Self {
        self.internal_only = true;
        self
    }

    /// Resolved status code; unclassified errors default to 500
    #[must_use]
    pub fn status(&self) -> u16 {
        self.http_status_code.unwrap_or(500)
    }
}

/// Raw error material accepted by normalization
///
/// Mirrors the three inputs the `create-error` handler understands: a plain
/// string, a source error, or an error that is already normalized (which
/// passes through unchanged).
#[derive(Debug, Clone)]
pub enum RawError {
    /// A bare message that becomes a new error
    Message(String),
    /// Display text and captured chain of a source error
    Source {
        /// `Display` output of the source error
        message: String,
        /// Full `source()` chain, one cause per line
        chain: String,
    },
    /// Already normalized; passes through untouched
    Normalized(NormalizedError),
}

impl RawError {
    /// Capture a source error's display text and cause chain
    #[must_use]
    pub fn from_source(source: &(dyn std::error::Error + 'static)) -> Self {
        let message = source.to_string();
        let mut chain = message.clone();
        let mut cause = source.source();
        while let Some(err) = cause {
            chain.push_str("\n  caused by: ");
            chain.push_str(&err.to_string());
            cause = err.source();
        }
        Self::Source { message, chain }
    }
}

impl From<&str> for RawError {
    fn from(message: &str) -> Self {
        Self::Message(message.to_owned())
    }
}

impl From<String> for RawError {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<NormalizedError> for RawError {
    fn from(error: NormalizedError) -> Self {
        Self::Normalized(error)
    }
}

/// Faults raised by the resolution pipeline itself
///
/// Distinct from business errors (which live inside the reply) and from
/// configuration faults (which are logged and downgraded in place). A fault
/// aborts resolution; the dispatcher is responsible for the last-resort
/// response.
#[derive(Debug, thiserror::Error)]
pub enum Fault {
    /// A handler reported failure during a pipeline stage
    #[error("handler `{kind}` failed: {message}")]
    Handler {
        /// The extension point that failed
        kind: HandlerKind,
        /// Handler-provided failure description
        message: String,
    },

    /// The translator failed to resolve a message key
    #[error("translation failed for key `{key}`: {message}")]
    Translation {
        /// The lookup key that failed
        key: String,
        /// Translator-provided failure description
        message: String,
    },

    /// A handler returned an output variant the stage cannot use
    #[error("handler `{kind}` returned an unexpected output")]
    UnexpectedOutput {
        /// The extension point that misbehaved
        kind: HandlerKind,
    },
}

impl Fault {
    /// Build a handler fault for the given extension point
    #[must_use]
    pub fn handler(kind: HandlerKind, message: impl Into<String>) -> Self {
        Self::Handler {
            kind,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unclassified_error_defaults_to_500() {
        let err = NormalizedError::from_message("boom");
        assert_eq!(err.status(), 500);
    }

    #[test]
    fn with_status_overrides_default() {
        let err = NormalizedError::from_message("missing").with_status(404);
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn from_source_captures_cause_chain() {
        let io = std::io::Error::other("disk on fire");
        let err = NormalizedError::from_source(&io);
        assert_eq!(err.message, "disk on fire");
        assert!(err.stack.as_deref().unwrap().contains("disk on fire"));
    }

    #[test]
    fn raw_error_from_str_is_message() {
        let raw = RawError::from("boom");
        assert!(matches!(raw, RawError::Message(m) if m == "boom"));
    }
}
