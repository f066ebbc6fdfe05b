//! Wire-level vocabulary for Parlor.
//!
//! - **Identity** ([`UserId`], [`GameId`], [`PlayerId`], [`Profile`]):
//!   who is talking and what others see of them.
//! - **Inbound** ([`InboundMessage`], [`Field`]): the flat JSON actions
//!   browsers send.
//! - **Outbound** ([`Data`], [`Renderer`], [`JsonRenderer`]): named
//!   fragments rendered per participant.
//! - **Codec** ([`Codec`], [`JsonCodec`]): bytes ↔ values.
//!
//! The protocol layer knows nothing about sockets, hubs or games.

mod codec;
mod data;
mod error;
mod ids;
mod message;
mod profile;
mod render;

pub use codec::{Codec, JsonCodec};
pub use data::Data;
pub use error::{ProtocolError, RenderError};
pub use ids::{GameId, PlayerId, UserId};
pub use message::{Field, InboundMessage};
pub use profile::{Avatar, Language, Profile};
pub use render::{JsonRenderer, Renderer};
