/// Errors that can occur in the transport layer.
///
/// Every variant is terminal for the connection that produced it and for
/// nothing else: a failing socket closes its own [`Connection`](crate::Connection)
/// and deactivates its owner, but never reaches the hub.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The upgrade request was refused (wrong route, bad handshake).
    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),

    /// The outbound queue stayed full for the whole write-wait window.
    #[error("outbound queue full")]
    QueueFull,

    /// A frame could not be written before the write deadline.
    #[error("write deadline exceeded")]
    WriteTimeout,

    /// Nothing (not even a pong) arrived before the read deadline.
    #[error("read deadline exceeded")]
    ReadTimeout,

    /// The peer sent a message above the configured read limit.
    #[error("message too large: {size} bytes (limit {limit})")]
    MessageTooLarge { size: usize, limit: usize },
}
