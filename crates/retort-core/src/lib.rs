//! Reply-normalization core
//!
//! Collects arbitrary application data and heterogeneous errors gathered
//! while handling a request, and resolves them into one canonical response
//! envelope: a transport status code plus a JSON body. The resolution
//! pipeline is extensible through a registry of named handlers (error
//! creation, factories for well-known status codes, wire serialization,
//! data sanitization, translation), each replaceable by the host.
//!
//! This crate is transport-agnostic; the axum binding lives in
//! `retort-server`.

pub mod defaults;
mod error;
mod handler;
mod observe;
mod reply;
mod translate;

pub use error::{Fault, NormalizedError, RawError};
pub use handler::{
    Handler, HandlerContext, HandlerInput, HandlerKind, HandlerOptions, HandlerOutput,
    HandlerRegistry, RegistryBuilder,
};
pub use observe::{ReplyObserver, TracingObserver};
pub use reply::{Envelope, Reply, ReplyBody, ResolveOptions};
pub use translate::{TableTranslator, Translator};
