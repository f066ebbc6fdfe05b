//! Inbound socket messages.
//!
//! Browsers send one flat JSON object per message: an `action` plus
//! whatever string fields that action needs. Form libraries are sloppy
//! about types, so every field accepts strings, numbers, booleans or
//! `null`, and numeric fields are parsed leniently: anything that is not
//! a positive integer reads as `0`, which means "missing".

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{Codec, GameId, JsonCodec, ProtocolError};

/// Numeric fields an action may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Card,
    Discard,
    Column,
    Row,
    X,
    Y,
}

impl Field {
    /// Human label used in "missing …" errors.
    pub fn label(self) -> &'static str {
        match self {
            Self::Card => "card index",
            Self::Discard => "discard index",
            Self::Column => "column",
            Self::Row => "row",
            Self::X => "x",
            Self::Y => "y",
        }
    }
}

/// One decoded inbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(default, deserialize_with = "lenient")]
    pub action: String,
    #[serde(default, deserialize_with = "lenient")]
    pub game: String,
    #[serde(default, deserialize_with = "lenient")]
    pub card: String,
    #[serde(default, deserialize_with = "lenient")]
    pub discard: String,
    #[serde(default, deserialize_with = "lenient")]
    pub column: String,
    #[serde(default, deserialize_with = "lenient")]
    pub row: String,
    #[serde(default, deserialize_with = "lenient")]
    pub x: String,
    #[serde(default, deserialize_with = "lenient")]
    pub y: String,
    #[serde(default, deserialize_with = "lenient")]
    pub name: String,
}

fn lenient<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    })
}

impl InboundMessage {
    /// Parses a raw socket payload.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        JsonCodec.decode(bytes)
    }

    /// Shorthand for tests and scripted clients.
    pub fn action(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Self::default()
        }
    }

    /// The requested action, or [`ProtocolError::MissingAction`].
    pub fn require_action(&self) -> Result<&str, ProtocolError> {
        match self.action.trim() {
            "" => Err(ProtocolError::MissingAction),
            action => Ok(action),
        }
    }

    /// The `game` field as a game id, if present.
    pub fn game_id(&self) -> Option<GameId> {
        GameId::new(self.game.trim()).ok()
    }

    /// The trimmed `name` field, if present.
    pub fn name(&self) -> Option<&str> {
        Some(self.name.trim()).filter(|name| !name.is_empty())
    }

    /// Leniently parsed numeric field; `0` when absent or not a number.
    pub fn number(&self, field: Field) -> u32 {
        let raw = match field {
            Field::Card => &self.card,
            Field::Discard => &self.discard,
            Field::Column => &self.column,
            Field::Row => &self.row,
            Field::X => &self.x,
            Field::Y => &self.y,
        };
        raw.trim().parse().unwrap_or(0)
    }

    /// Like [`number`](Self::number) but `0` is an error naming the field.
    pub fn require(&self, field: Field) -> Result<u32, ProtocolError> {
        match self.number(field) {
            0 => Err(ProtocolError::Missing(field.label())),
            n => Ok(n),
        }
    }
}
