//! Error types for the hub layer.

use parlor_protocol::UserId;

/// Errors that can occur in the participant registry and hub.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// No participant is registered under this id.
    #[error("user {0} not found")]
    NotFound(UserId),

    /// The hub loop has stopped; nothing can be registered or delivered.
    #[error("hub is unavailable")]
    Unavailable,

    /// The upgrade request did not identify a valid participant.
    #[error("identification failed: {0}")]
    IdentificationFailed(String),
}
