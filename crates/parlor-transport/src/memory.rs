//! In-process socket pair.
//!
//! [`pair`] returns a [`MemorySocket`] (the server end, handed to
//! [`Connection::open`](crate::Connection::open)) and a [`MemoryPeer`]
//! (the "browser" end, driven by the test). The peer can also inject
//! read failures, which real sockets make awkward to provoke.

use tokio::sync::mpsc;

use crate::{Frame, FrameSink, FrameStream, Socket, TransportError};

/// Creates a connected socket/peer pair.
pub fn pair() -> (MemorySocket, MemoryPeer) {
    let (to_peer, from_server) = mpsc::unbounded_channel();
    let (to_server, from_peer) = mpsc::unbounded_channel();
    (
        MemorySocket {
            outbound: to_peer,
            inbound: from_peer,
        },
        MemoryPeer {
            inbound: to_server,
            outbound: from_server,
        },
    )
}

/// Server end of an in-memory socket.
pub struct MemorySocket {
    outbound: mpsc::UnboundedSender<Frame>,
    inbound: mpsc::UnboundedReceiver<Result<Frame, TransportError>>,
}

impl Socket for MemorySocket {
    type Sink = MemorySink;
    type Stream = MemoryStream;

    fn split(self) -> (MemorySink, MemoryStream) {
        (
            MemorySink {
                tx: Some(self.outbound),
            },
            MemoryStream { rx: self.inbound },
        )
    }
}

/// Write half of a [`MemorySocket`].
pub struct MemorySink {
    tx: Option<mpsc::UnboundedSender<Frame>>,
}

impl FrameSink for MemorySink {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or_else(|| {
            TransportError::ConnectionClosed("sink closed".into())
        })?;
        tx.send(frame).map_err(|_| {
            TransportError::ConnectionClosed("peer dropped".into())
        })
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx = None;
        Ok(())
    }
}

/// Read half of a [`MemorySocket`].
pub struct MemoryStream {
    rx: mpsc::UnboundedReceiver<Result<Frame, TransportError>>,
}

impl FrameStream for MemoryStream {
    async fn next(&mut self) -> Option<Result<Frame, TransportError>> {
        self.rx.recv().await
    }
}

/// Client end of an in-memory socket.
pub struct MemoryPeer {
    inbound: mpsc::UnboundedSender<Result<Frame, TransportError>>,
    outbound: mpsc::UnboundedReceiver<Frame>,
}

impl MemoryPeer {
    /// Sends a text message to the server. Returns `false` once the
    /// server side has stopped reading.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.send_frame(Frame::Text(text.into()))
    }

    /// Sends a raw frame to the server.
    pub fn send_frame(&self, frame: Frame) -> bool {
        self.inbound.send(Ok(frame)).is_ok()
    }

    /// Makes the server's next read fail with `error`.
    pub fn fail(&self, error: TransportError) -> bool {
        self.inbound.send(Err(error)).is_ok()
    }

    /// Waits for the next frame from the server. `None` once the server
    /// closed its write half.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.outbound.recv().await
    }

    /// Returns a frame if one is already waiting.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.outbound.try_recv().ok()
    }

    /// Waits for the next text payload, skipping pings.
    pub async fn recv_text(&mut self) -> Option<String> {
        loop {
            match self.outbound.recv().await? {
                Frame::Text(text) => return Some(text),
                Frame::Binary(bytes) => {
                    return Some(String::from_utf8_lossy(&bytes).into_owned());
                }
                Frame::Ping(_) | Frame::Pong(_) => continue,
                Frame::Close => return None,
            }
        }
    }
}
