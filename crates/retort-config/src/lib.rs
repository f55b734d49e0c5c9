#![allow(clippy::must_use_candidate)]

mod env;
pub mod health;
mod loader;
pub mod reply;
pub mod server;

use serde::Deserialize;

pub use health::HealthConfig;
pub use reply::{LogLevels, ReplyConfig};
pub use server::ServerConfig;

/// Top-level Retort configuration
///
/// Unknown keys anywhere in the tree are ignored, not rejected.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Reply-pipeline configuration
    #[serde(default)]
    pub reply: ReplyConfig,
}
