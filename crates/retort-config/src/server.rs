use std::net::SocketAddr;

use serde::Deserialize;

use crate::health::HealthConfig;

/// HTTP server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    /// Address to bind; defaults to 0.0.0.0:3000 when unset
    pub listen_address: Option<SocketAddr>,
    /// Health check endpoint
    #[serde(default)]
    pub health: HealthConfig,
}
