use std::path::PathBuf;

use clap::Parser;

/// Retort reply-normalization server
#[derive(Debug, Parser)]
#[command(name = "retort", about = "Canonical reply envelopes for HTTP services")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "retort.toml", env = "RETORT_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "RETORT_LISTEN")]
    pub listen: Option<std::net::SocketAddr>,
}
