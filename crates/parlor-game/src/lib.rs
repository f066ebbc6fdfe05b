//! Generic game lifecycle for Parlor.
//!
//! - [`GameStatus`]: the lifecycle state machine and its guards.
//! - [`Game`]: seats, turn order, rounds, ranking and results, generic
//!   over a variant's board and seat payloads.
//! - [`GamePlugin`]: what a game variant implements.
//! - [`GameService`]: runs create/join/start/stop/leave/delete/play
//!   against a plugin and a [`GameStore`], then notifies callbacks.
//!
//! Nothing here touches sockets; the web layer subscribes to the
//! service's callbacks and decides what to broadcast.

mod error;
mod game;
mod player;
mod plugin;
mod service;
mod status;
mod store;

pub use error::GameError;
pub use game::Game;
pub use player::{Player, PlayerRank, PlayerResult, PlayerStatus};
pub use plugin::{GameOf, GamePlugin, Member};
pub use service::GameService;
pub use status::{GameStatus, PlayerBounds};
pub use store::{GameStore, MemoryGameStore};
