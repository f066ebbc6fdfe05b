//! Unified error type for Parlor.

use parlor_game::GameError;
use parlor_hub::HubError;
use parlor_protocol::ProtocolError;
use parlor_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// `Display` is the inner error's message, which is what ends up in the
/// "error" fragment shown to the acting player.
#[derive(Debug, thiserror::Error)]
pub enum ParlorError {
    /// Socket accept, read or write failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Malformed inbound message or invalid profile.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Registry lookup or identification failure.
    #[error(transparent)]
    Hub(#[from] HubError),

    /// Lifecycle guard or game rule violation.
    #[error(transparent)]
    Game(#[from] GameError),
}
