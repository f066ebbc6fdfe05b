//! Error types for the game layer.
//!
//! Every variant's `Display` is the message shown to the acting player,
//! so keep them short and free of internal detail.

use parlor_protocol::{GameId, ProtocolError};

/// Errors returned by game lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("game not found")]
    GameNotFound(GameId),

    #[error("player not found")]
    PlayerNotFound,

    #[error("game not joinable")]
    NotJoinable,

    #[error("game already started")]
    AlreadyStarted,

    #[error("game stopped")]
    Stopped,

    /// Fewer players than the variant's minimum.
    #[error("game not startable")]
    NotStartable,

    #[error("game not started")]
    NotStarted,

    /// Deleting a game that is still running.
    #[error("game not stopped")]
    NotStopped,

    #[error("game marked for deletion")]
    MarkedForDeletion,

    /// The acting player is not one of the current round's players.
    #[error("wrong player")]
    WrongPlayer,

    #[error("missing players")]
    MissingPlayers,

    #[error("player not in game")]
    PlayerNotInGame,

    /// Creating or joining a game while seated in another one.
    #[error("player already in game")]
    AlreadyInGame,

    /// A malformed move (missing field, bad number).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A variant-specific rule was broken ("cell already taken", …).
    #[error("{0}")]
    Rule(String),
}

impl GameError {
    /// Shorthand for [`GameError::Rule`].
    pub fn rule(message: impl Into<String>) -> Self {
        Self::Rule(message.into())
    }
}
