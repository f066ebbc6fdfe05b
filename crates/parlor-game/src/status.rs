//! Game lifecycle state machine.

use serde::{Deserialize, Serialize};

use crate::GameError;

// ---------------------------------------------------------------------------
// PlayerBounds
// ---------------------------------------------------------------------------

/// How many players a game variant accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerBounds {
    /// Players needed before the game can start.
    pub min: usize,
    /// Players at which the game stops accepting joins.
    pub max: usize,
}

impl PlayerBounds {
    /// # Panics
    ///
    /// If `min` is zero or greater than `max`.
    pub fn new(min: usize, max: usize) -> Self {
        assert!(min > 0 && min <= max, "invalid player bounds {min}..={max}");
        Self { min, max }
    }
}

impl Default for PlayerBounds {
    fn default() -> Self {
        Self { min: 2, max: 2 }
    }
}

// ---------------------------------------------------------------------------
// GameStatus
// ---------------------------------------------------------------------------

/// The lifecycle state of a game.
///
/// ```text
/// JoinableNotStartable ⇄ JoinableAndStartable ⇄ NotJoinableAndStartable
///                                 ↓
///                              Started → Stopped
/// ```
///
/// The three pre-start states are derived from the player count (see
/// [`from_player_count`](Self::from_player_count)). `MarkedForDeletion`
/// sits outside the chain: it is set when the last player leaves a game
/// that never started, and the next save removes the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameStatus {
    JoinableNotStartable,
    JoinableAndStartable,
    NotJoinableAndStartable,
    Started,
    Stopped,
    MarkedForDeletion,
}

impl GameStatus {
    /// The pre-start status for `count` attached players.
    pub fn from_player_count(count: usize, bounds: PlayerBounds) -> Self {
        if count < bounds.min {
            Self::JoinableNotStartable
        } else if count < bounds.max {
            Self::JoinableAndStartable
        } else {
            Self::NotJoinableAndStartable
        }
    }

    pub fn is_joinable(self) -> bool {
        matches!(self, Self::JoinableNotStartable | Self::JoinableAndStartable)
    }

    pub fn is_startable(self) -> bool {
        matches!(
            self,
            Self::JoinableAndStartable | Self::NotJoinableAndStartable
        )
    }

    /// Any of the three states before the game starts.
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            Self::JoinableNotStartable
                | Self::JoinableAndStartable
                | Self::NotJoinableAndStartable
        )
    }

    pub fn is_started(self) -> bool {
        self == Self::Started
    }

    pub fn is_stopped(self) -> bool {
        self == Self::Stopped
    }

    pub fn is_marked_for_deletion(self) -> bool {
        self == Self::MarkedForDeletion
    }

    pub fn can_join(self) -> Result<(), GameError> {
        match self {
            Self::NotJoinableAndStartable => Err(GameError::NotJoinable),
            Self::Started => Err(GameError::AlreadyStarted),
            Self::Stopped => Err(GameError::Stopped),
            Self::MarkedForDeletion => Err(GameError::MarkedForDeletion),
            Self::JoinableNotStartable | Self::JoinableAndStartable => Ok(()),
        }
    }

    pub fn can_start(self) -> Result<(), GameError> {
        match self {
            Self::JoinableNotStartable => Err(GameError::NotStartable),
            Self::Started => Err(GameError::AlreadyStarted),
            Self::Stopped => Err(GameError::Stopped),
            Self::MarkedForDeletion => Err(GameError::MarkedForDeletion),
            Self::JoinableAndStartable | Self::NotJoinableAndStartable => Ok(()),
        }
    }

    pub fn can_stop(self) -> Result<(), GameError> {
        self.require_started()
    }

    pub fn can_play(self) -> Result<(), GameError> {
        self.require_started()
    }

    fn require_started(self) -> Result<(), GameError> {
        match self {
            Self::JoinableNotStartable
            | Self::JoinableAndStartable
            | Self::NotJoinableAndStartable => Err(GameError::NotStarted),
            Self::Stopped => Err(GameError::Stopped),
            Self::MarkedForDeletion => Err(GameError::MarkedForDeletion),
            Self::Started => Ok(()),
        }
    }

    pub fn can_leave(self) -> Result<(), GameError> {
        match self {
            Self::MarkedForDeletion => Err(GameError::MarkedForDeletion),
            _ => Ok(()),
        }
    }

    pub fn can_delete(self) -> Result<(), GameError> {
        match self {
            Self::Started => Err(GameError::NotStopped),
            Self::MarkedForDeletion => Err(GameError::MarkedForDeletion),
            _ => Ok(()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::JoinableNotStartable => "joinable",
            Self::JoinableAndStartable => "joinable-startable",
            Self::NotJoinableAndStartable => "not-joinable-startable",
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::MarkedForDeletion => "marked-for-deletion",
        }
    }
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
