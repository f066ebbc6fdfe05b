//! Transport layer for Parlor.
//!
//! Two levels live here:
//!
//! - **Sockets** ([`Socket`], [`FrameSink`], [`FrameStream`]): a raw duplex
//!   channel split into a write half and a read half. The WebSocket
//!   implementation wraps `tokio-tungstenite`; [`memory`] provides an
//!   in-process pair for tests.
//! - **Connections** ([`Connection`]): one managed session on top of a
//!   socket: a reader task, a writer task with a ping ticker, a bounded
//!   outbound queue, and an idempotent close sequence.
//!
//! ```text
//! Hub (above)          ← calls Connection::send with rendered bytes
//!     ↕
//! Connection           ← reader/writer tasks, ping, close choreography
//!     ↕
//! Socket (below)       ← WebSocket or in-memory frames
//! ```
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod connection;
mod error;
pub mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use connection::{Connection, ConnectionConfig, ConnectionHandler};
pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    WebSocketSink, WebSocketSocket, WebSocketSource, WebSocketTransport,
};

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for one physical socket session.
///
/// A participant keeps its identity across reloads; every reopen of its
/// [`Connection`] gets a fresh `ConnectionId`, which is what shows up in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-wide id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Frames and sockets
// ---------------------------------------------------------------------------

/// One unit of traffic on a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

impl Frame {
    /// Wraps an outbound payload, preferring a text frame when the bytes
    /// are valid UTF-8 (rendered fragments almost always are).
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Self::Text(text),
            Err(e) => Self::Binary(e.into_bytes()),
        }
    }
}

/// The write half of a socket.
pub trait FrameSink: Send + 'static {
    /// Writes one frame to the peer.
    fn send(
        &mut self,
        frame: Frame,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Flushes and shuts down the write half.
    fn close(
        &mut self,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// The read half of a socket.
pub trait FrameStream: Send + 'static {
    /// Waits for the next frame. `None` means the peer went away.
    fn next(
        &mut self,
    ) -> impl Future<Output = Option<Result<Frame, TransportError>>> + Send;
}

/// A duplex socket that can be split into independently owned halves,
/// one per connection task.
pub trait Socket: Send + 'static {
    type Sink: FrameSink;
    type Stream: FrameStream;

    fn split(self) -> (Self::Sink, Self::Stream);
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// What the upgrade request told us about the client.
///
/// Identity resolution happens above the transport; this just carries the
/// raw material (route, query string, cookie header) up to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Handshake {
    pub path: String,
    pub query: Option<String>,
    pub cookie: Option<String>,
    pub peer: Option<SocketAddr>,
}

impl Handshake {
    /// Returns the first value of `name` in the query string.
    ///
    /// Values are taken verbatim; `+` becomes a space, nothing else is
    /// decoded.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query.as_deref()?.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key == name).then(|| value.replace('+', " "))
        })
    }

    /// Returns the value of cookie `name` from the `Cookie` header.
    pub fn cookie_value(&self, name: &str) -> Option<String> {
        self.cookie.as_deref()?.split(';').find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
    }
}

/// Accepts new incoming sockets.
pub trait Transport: Send + 'static {
    /// The socket type produced by this transport.
    type Socket: Socket;

    /// Waits for and accepts the next upgraded socket.
    async fn accept(
        &mut self,
    ) -> Result<(Self::Socket, Handshake), TransportError>;
}
