//! A participant's seat in one game.

use parlor_protocol::{PlayerId, Profile, UserId};
use serde::{Deserialize, Serialize};

/// Where a player stands in the game flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlayerStatus {
    /// Seated, but the game still needs more players.
    #[default]
    WaitingToJoin,
    /// Enough players are seated; waiting for someone to start.
    WaitingToStart,
    /// Started, but this is not the player's round.
    WaitingToPlay,
    /// One of the current round's players.
    Playing,
}

impl PlayerStatus {
    pub fn is_playing(self) -> bool {
        self == Self::Playing
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::WaitingToJoin => "waiting-to-join",
            Self::WaitingToStart => "waiting-to-start",
            Self::WaitingToPlay => "waiting-to-play",
            Self::Playing => "playing",
        }
    }
}

impl std::fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-game outcome. Every player has a definite result once any of the
/// `set_*` result methods on [`Game`](crate::Game) has run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerResult {
    #[default]
    Unknown,
    Win,
    Tie,
    Loose,
}

impl PlayerResult {
    pub fn is_unknown(self) -> bool {
        self == Self::Unknown
    }

    pub fn is_win(self) -> bool {
        self == Self::Win
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Win => "win",
            Self::Tie => "tie",
            Self::Loose => "loose",
        }
    }
}

impl std::fmt::Display for PlayerResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 1-based rank. `0` means not ranked yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerRank(pub u8);

impl PlayerRank {
    pub const UNKNOWN: Self = Self(0);

    pub fn is_ranked(self) -> bool {
        self.0 > 0
    }

    /// `"gold"`, `"silver"` or `"bronze"` for the podium.
    pub fn medal(self) -> Option<&'static str> {
        match self.0 {
            1 => Some("gold"),
            2 => Some("silver"),
            3 => Some("bronze"),
            _ => None,
        }
    }
}

/// A seat in a game: who sits there and how they are doing.
///
/// `S` is the variant's per-player payload (a symbol, a hand of cards…).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player<S> {
    pub id: PlayerId,
    pub profile: Profile,
    pub status: PlayerStatus,
    pub result: PlayerResult,
    pub rank: PlayerRank,
    pub score: i32,
    pub seat: S,
}

impl<S> Player<S> {
    pub fn new(id: PlayerId, profile: Profile, seat: S) -> Self {
        Self {
            id,
            profile,
            status: PlayerStatus::default(),
            result: PlayerResult::default(),
            rank: PlayerRank::UNKNOWN,
            score: 0,
            seat,
        }
    }

    pub fn user_id(&self) -> &UserId {
        self.id.user_id()
    }

    pub fn is_playing(&self) -> bool {
        self.status.is_playing()
    }
}
