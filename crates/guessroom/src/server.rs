//! `GuessroomServer` builder and server loop.
//!
//! This is the entry point for running a guessroom server. It ties the
//! layers together: transport → protocol → room registry → store.

use std::sync::Arc;

use guessroom_protocol::{Codec, JsonCodec};
use guessroom_room::{SessionConfig, SessionRegistry};
use guessroom_store::PlayerStore;
use guessroom_transport::{Transport, TransportError, WebSocketTransport};

use crate::GuessroomError;
use crate::handler::handle_connection;

/// Address used when neither the builder nor `GUESSROOM_BIND` says otherwise.
pub const DEFAULT_BIND: &str = "127.0.0.1:5000";

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<S, C> {
    pub(crate) registry: SessionRegistry<S>,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a guessroom server.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use guessroom::prelude::*;
///
/// # async fn run() -> Result<(), GuessroomError> {
/// let server = GuessroomServer::builder()
///     .bind("0.0.0.0:5000")
///     .build(Arc::new(MemoryStore::new()))
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct GuessroomServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
}

impl GuessroomServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            session_config: SessionConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the room session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Binds the listener and wires the registry to `store`.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<S: PlayerStore>(
        self,
        store: Arc<S>,
    ) -> Result<GuessroomServer<S, JsonCodec>, GuessroomError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            registry: SessionRegistry::new(store, self.session_config),
            codec: JsonCodec,
        });

        Ok(GuessroomServer { transport, state })
    }
}

impl Default for GuessroomServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound guessroom server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct GuessroomServer<S, C> {
    transport: WebSocketTransport,
    state: Arc<ServerState<S, C>>,
}

impl GuessroomServer<(), JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> GuessroomServerBuilder {
        GuessroomServerBuilder::new()
    }
}

impl<S, C> GuessroomServer<S, C>
where
    S: PlayerStore,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The room registry, for out-of-band queries.
    pub fn registry(&self) -> &SessionRegistry<S> {
        &self.state.registry
    }

    /// Runs the accept loop, spawning a handler task per connection.
    ///
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), GuessroomError> {
        tracing::info!("guessroom server running");

        loop {
            match self.transport.accept().await {
                Ok(link) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(link, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e @ TransportError::Handshake { .. }) => {
                    tracing::debug!(error = %e, "client dropped during handshake");
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
