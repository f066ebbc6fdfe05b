//! `ParlorServer` builder and accept loop.
//!
//! Binds the WebSocket endpoint, identifies each upgrade, and hands the
//! socket to the [`GameServer`] coordinator.

use std::sync::Arc;

use parlor_game::GamePlugin;
use parlor_hub::Identifier;
use parlor_protocol::Renderer;
use parlor_transport::{ConnectionConfig, Transport, WebSocketTransport};

use crate::{GameServer, ParlorError};

/// Builder for configuring and starting a Parlor server.
///
/// # Example
///
/// ```rust,ignore
/// let server = ParlorServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .app("ttt")
///     .build(TicTacToe, QueryIdentifier, Arc::new(JsonRenderer::new()))
///     .await?;
/// server.run().await
/// ```
pub struct ParlorServerBuilder {
    bind_addr: String,
    app: String,
    connection_config: ConnectionConfig,
}

impl ParlorServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            app: "game".to_string(),
            connection_config: ConnectionConfig::default(),
        }
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the application name; sockets are accepted on
    /// `/{app}/htmx/connect` only.
    pub fn app(mut self, app: &str) -> Self {
        self.app = app.to_string();
        self
    }

    pub fn connection_config(mut self, config: ConnectionConfig) -> Self {
        self.connection_config = config;
        self
    }

    /// Binds the listener and spawns the coordinator.
    pub async fn build<P, I>(
        self,
        plugin: P,
        identifier: I,
        renderer: Arc<dyn Renderer>,
    ) -> Result<ParlorServer<P, I>, ParlorError>
    where
        P: GamePlugin,
        I: Identifier,
    {
        let route = format!("/{}/htmx/connect", self.app);
        let transport = WebSocketTransport::bind(&self.bind_addr)
            .await?
            .with_route(route.clone());
        let game_server = GameServer::new(plugin, renderer, self.connection_config);
        tracing::info!(addr = %self.bind_addr, %route, "parlor server bound");

        Ok(ParlorServer {
            transport,
            game_server,
            identifier: Arc::new(identifier),
        })
    }
}

impl Default for ParlorServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Parlor server. Call [`run()`](Self::run) to start accepting
/// connections.
pub struct ParlorServer<P: GamePlugin, I: Identifier> {
    transport: WebSocketTransport,
    game_server: Arc<GameServer<P>>,
    identifier: Arc<I>,
}

impl<P: GamePlugin, I: Identifier> ParlorServer<P, I> {
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ParlorError> {
        Ok(self.transport.local_addr()?)
    }

    /// The coordinator, for inspecting hub and game state.
    pub fn game_server(&self) -> &Arc<GameServer<P>> {
        &self.game_server
    }

    /// Runs the accept loop until the process is terminated.
    ///
    /// Each accepted socket is identified and connected in its own task,
    /// so a slow identification never holds up other upgrades.
    pub async fn run(mut self) -> Result<(), ParlorError> {
        tracing::info!("parlor server running");

        loop {
            match self.transport.accept().await {
                Ok((socket, handshake)) => {
                    let game_server = Arc::clone(&self.game_server);
                    let identifier = Arc::clone(&self.identifier);
                    tokio::spawn(async move {
                        let identity = match identifier.identify(&handshake).await {
                            Ok(identity) => identity,
                            Err(e) => {
                                tracing::warn!(peer = ?handshake.peer, error = %e, "connection rejected");
                                return;
                            }
                        };
                        if let Err(e) = game_server.connect(identity, socket).await {
                            tracing::warn!(error = %e, "connect failed");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
