//! Error types for the protocol layer.
//!
//! Everything here is a problem with what a client *said* (a malformed
//! message, a missing field, an invalid profile) rather than with the
//! socket it said it on. These errors never close a connection; they are
//! answered with an "error" fragment to the sender.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON or wrong shape.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message had no `action`, or one nobody handles.
    #[error("missing action")]
    MissingAction,

    /// A field the action needs was absent, empty, or not a number.
    ///
    /// The payload is the field's human label, so the message reads
    /// "missing card index", "missing game id", …
    #[error("missing {0}")]
    Missing(&'static str),

    /// A player id that is not `GAME-USER`.
    #[error("invalid player id: {0}")]
    InvalidPlayerId(String),

    #[error("missing user id")]
    MissingUserId,

    /// An id with characters outside ASCII letters and digits.
    #[error("invalid user id: {0}")]
    InvalidUserId(String),

    #[error("invalid game id: {0}")]
    InvalidGameId(String),

    #[error("missing user name")]
    MissingUserName,

    #[error("invalid user avatar: {0}")]
    InvalidUserAvatar(u8),

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
}

/// A fragment could not be rendered for one participant.
///
/// The hub logs these and skips that participant; they never reach
/// whoever asked for the broadcast.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The renderer has no template under this name.
    #[error("unknown fragment: {0}")]
    UnknownFragment(String),

    /// The template exists but rendering it failed.
    #[error("render of {name} failed: {reason}")]
    Failed { name: String, reason: String },

    /// Encoding the payload failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
