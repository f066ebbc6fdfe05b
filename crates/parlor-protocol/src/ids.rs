//! Identity types.
//!
//! All three ids are strings on the wire. [`UserId`] and [`GameId`] are
//! short random codes that a human can read aloud ("join game QXBTRA");
//! [`PlayerId`] is the seat of one user in one game and is written
//! `GAME-USER`.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

const USER_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const GAME_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ID_LEN: usize = 6;

/// Ids are ASCII letters and digits only, so `GAME-USER` always splits
/// back into exactly two parts.
fn is_code(id: &str) -> bool {
    id.bytes().all(|b| b.is_ascii_alphanumeric())
}

fn random_code(alphabet: &[u8]) -> String {
    let mut rng = rand::rng();
    (0..ID_LEN)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())] as char)
        .collect()
}

// ---------------------------------------------------------------------------
// UserId
// ---------------------------------------------------------------------------

/// A participant's identity. Survives reloads and reconnects.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wraps an existing id. It must be non-empty ASCII letters and
    /// digits.
    pub fn new(id: impl Into<String>) -> Result<Self, ProtocolError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ProtocolError::MissingUserId);
        }
        if !is_code(&id) {
            return Err(ProtocolError::InvalidUserId(id));
        }
        Ok(Self(id))
    }

    /// Generates a fresh 6-character id from `A-Z0-9`.
    pub fn generate() -> Self {
        Self(random_code(USER_ID_ALPHABET))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// GameId
// ---------------------------------------------------------------------------

/// One match.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GameId(String);

impl GameId {
    /// Wraps an existing id. It must be non-empty ASCII letters and
    /// digits.
    pub fn new(id: impl Into<String>) -> Result<Self, ProtocolError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ProtocolError::Missing("game id"));
        }
        if !is_code(&id) {
            return Err(ProtocolError::InvalidGameId(id));
        }
        Ok(Self(id))
    }

    /// Generates a fresh 6-letter id from `A-Z`.
    pub fn generate() -> Self {
        Self(random_code(GAME_ID_ALPHABET))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// PlayerId
// ---------------------------------------------------------------------------

/// The seat of one user in one game, written `GAME-USER`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PlayerId {
    game_id: GameId,
    user_id: UserId,
}

impl PlayerId {
    pub fn new(game_id: GameId, user_id: UserId) -> Self {
        Self { game_id, user_id }
    }

    pub fn game_id(&self) -> &GameId {
        &self.game_id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Returns `true` if this seat belongs to `user_id`.
    pub fn matches_user(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.game_id, self.user_id)
    }
}

impl FromStr for PlayerId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('-');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(game), Some(user), None) => match (GameId::new(game), UserId::new(user)) {
                (Ok(game_id), Ok(user_id)) => Ok(Self::new(game_id, user_id)),
                _ => Err(ProtocolError::InvalidPlayerId(s.to_string())),
            },
            _ => Err(ProtocolError::InvalidPlayerId(s.to_string())),
        }
    }
}

impl From<PlayerId> for String {
    fn from(id: PlayerId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for PlayerId {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
