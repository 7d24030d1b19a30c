//! pairpad server — runs the collaborative room server.
//!
//! Configuration comes from `PAIRPAD_`-prefixed environment variables,
//! optionally loaded from a `.env` file:
//!
//! - `PAIRPAD_BIND_ADDR` — listen address (default `127.0.0.1:9090`)
//! - `PAIRPAD_CHANNEL_CAPACITY` — frames buffered per room member
//!   (default `256`)
//! - `PAIRPAD_EXEC_ENDPOINT` — code-execution service URL (unset =
//!   execution requests answered as unavailable)

use pairpad_collab::server::{CollabServer, ServerConfig};
use serde::Deserialize;

/// Environment configuration.
#[derive(Debug, Deserialize)]
struct Config {
    #[serde(default = "default_bind_addr")]
    bind_addr: String,

    #[serde(default = "default_channel_capacity")]
    channel_capacity: usize,

    exec_endpoint: Option<String>,
}

fn default_bind_addr() -> String {
    "127.0.0.1:9090".to_string()
}

fn default_channel_capacity() -> usize {
    256
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config: Config = envy::prefixed("PAIRPAD_").from_env()?;
    log::info!("configuration loaded: {config:?}");

    let server = CollabServer::new(ServerConfig {
        bind_addr: config.bind_addr,
        channel_capacity: config.channel_capacity,
        exec_endpoint: config.exec_endpoint,
    });
    server.run().await
}
