//! Structured observer for reply-lifecycle events
//!
//! Replaces ad-hoc logging hooks with a small injectable trait. The default
//! implementation forwards to `tracing` at configurable levels; hosts that
//! need richer telemetry provide their own implementation.

use tracing::Level;

use crate::handler::HandlerKind;

/// Callbacks invoked by the registry and resolution pipeline
pub trait ReplyObserver: Send + Sync {
    /// A handler is about to run
    fn on_handler(&self, kind: HandlerKind) {
        let _ = kind;
    }

    /// A recoverable misconfiguration was downgraded in place
    fn on_config_fault(&self, message: &str);

    /// A reply finished resolving
    fn on_reply(&self, id: &str, status: u16);
}

/// Default observer backed by `tracing`
///
/// A category with no level is silent. Configuration faults default to
/// `ERROR`, resolved replies to `TRACE`, matching how noisy each event is
/// in production.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    reply_level: Option<Level>,
    error_level: Option<Level>,
}

impl TracingObserver {
    /// Create an observer with explicit per-category levels
    #[must_use]
    pub const fn new(reply_level: Option<Level>, error_level: Option<Level>) -> Self {
        Self {
            reply_level,
            error_level,
        }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new(Some(Level::TRACE), Some(Level::ERROR))
    }
}

impl ReplyObserver for TracingObserver {
    fn on_handler(&self, kind: HandlerKind) {
        tracing::trace!(handler = %kind, "invoking handler");
    }

    fn on_config_fault(&self, message: &str) {
        if let Some(level) = self.error_level {
            emit(level, message);
        }
    }

    fn on_reply(&self, id: &str, status: u16) {
        if let Some(level) = self.reply_level {
            emit(level, &format!("[{id}] reply resolved with status {status}"));
        }
    }
}

/// Emit a message at a runtime-chosen level
fn emit(level: Level, message: &str) {
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
