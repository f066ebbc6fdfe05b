//! # Parlor
//!
//! Real-time session coordinator for server-rendered browser games.
//!
//! A game variant implements [`GamePlugin`](parlor_game::GamePlugin); Parlor
//! keeps one socket per user, runs the lobby and game lifecycle, and pushes
//! rendered fragments (`select-game`, `game-layout`, `players`, `board`,
//! `info`, `error`, `user`) to whoever needs them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use parlor::prelude::*;
//!
//! # async fn run<P: GamePlugin>(plugin: P) -> Result<(), ParlorError> {
//! let server = ParlorServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .app("cards")
//!     .build(plugin, QueryIdentifier, Arc::new(JsonRenderer::new()))
//!     .await?;
//! server.run().await
//! # }
//! ```

pub mod error;
pub mod game_server;
pub mod handler;
pub mod server;

pub use error::ParlorError;
pub use game_server::{fragment, GameServer};
pub use handler::action;
pub use server::{ParlorServer, ParlorServerBuilder};

pub use parlor_game as game;
pub use parlor_hub as hub;
pub use parlor_protocol as protocol;
pub use parlor_transport as transport;

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, defaulting to
/// `info`. Later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Everything a game variant and its binary usually need.
pub mod prelude {
    pub use crate::{action, fragment, GameServer, ParlorError, ParlorServer, ParlorServerBuilder};
    pub use parlor_game::{
        Game, GameError, GameOf, GamePlugin, GameService, GameStatus, Member, Player,
        PlayerBounds, PlayerRank, PlayerResult, PlayerStatus,
    };
    pub use parlor_hub::{Hub, Identifier, Identity, Participant, QueryIdentifier, User};
    pub use parlor_protocol::{
        Data, Field, GameId, InboundMessage, JsonRenderer, PlayerId, Profile, ProtocolError,
        Renderer, UserId,
    };
    pub use parlor_transport::ConnectionConfig;
}
