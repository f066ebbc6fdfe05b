//! Participant registry and broadcast hub.
//!
//! A [`Hub`] owns the set of connected [`Participant`]s and delivers
//! rendered fragments to whichever subset a broadcast targets: one user,
//! one seat, everyone, everyone in the lobby, everyone in a game.
//!
//! All registry mutations and all deliveries are serialized through one
//! task, so two broadcasts never interleave on the same socket and a
//! failing recipient never holds up the others.
//!
//! [`User`] is the standard participant. [`Identifier`] turns an upgrade
//! request into the identity a `User` is built from.

mod error;
mod hub;
mod identify;
mod participant;

pub use error::HubError;
pub use hub::{Hub, WrapFn};
pub use identify::{Identifier, Identity, QueryIdentifier};
pub use participant::{Participant, User};
