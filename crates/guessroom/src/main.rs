//! guessroom server binary.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default address (127.0.0.1:5000)
//! guessroom-server
//!
//! # Custom address and verbose logs
//! GUESSROOM_BIND=0.0.0.0:5000 RUST_LOG=guessroom=debug guessroom-server
//! ```

use std::sync::Arc;

use guessroom::prelude::*;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let bind = std::env::var("GUESSROOM_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
    tracing::info!(%bind, "guessroom server starting");

    let server = GuessroomServer::builder()
        .bind(&bind)
        .session_config(SessionConfig::default())
        .build(Arc::new(MemoryStore::new()))
        .await?;

    tracing::info!(addr = %server.local_addr()?, "listening");

    server.run().await?;

    Ok(())
}
