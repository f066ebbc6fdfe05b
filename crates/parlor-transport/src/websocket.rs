//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::http::StatusCode;

use crate::{
    Frame, FrameSink, FrameStream, Handshake, Socket, Transport,
    TransportError,
};

type WsStream = WebSocketStream<TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming upgrades.
pub struct WebSocketTransport {
    listener: TcpListener,
    route: Option<String>,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self {
            listener,
            route: None,
        })
    }

    /// Only accept upgrades whose request path is exactly `route`.
    /// Anything else is answered with `404 Not Found`.
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)
    }
}

impl Transport for WebSocketTransport {
    type Socket = WebSocketSocket;

    async fn accept(
        &mut self,
    ) -> Result<(WebSocketSocket, Handshake), TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let route = self.route.as_deref();
        let mut captured: Option<Handshake> = None;
        let callback = |request: &Request, response: Response| {
            let handshake = Handshake {
                path: request.uri().path().to_string(),
                query: request.uri().query().map(str::to_string),
                cookie: request
                    .headers()
                    .get("cookie")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
                peer: Some(addr),
            };
            if route.is_some_and(|route| route != handshake.path) {
                let mut refusal =
                    ErrorResponse::new(Some("unknown route".to_string()));
                *refusal.status_mut() = StatusCode::NOT_FOUND;
                return Err(refusal);
            }
            captured = Some(handshake);
            Ok(response)
        };

        let ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .map_err(|e| TransportError::HandshakeRejected(e.to_string()))?;
        let handshake = captured.ok_or_else(|| {
            TransportError::HandshakeRejected("no upgrade request".into())
        })?;

        tracing::debug!(%addr, path = %handshake.path, "accepted WebSocket connection");
        Ok((WebSocketSocket { ws }, handshake))
    }
}

/// An upgraded WebSocket, ready to be split between connection tasks.
pub struct WebSocketSocket {
    ws: WsStream,
}

impl Socket for WebSocketSocket {
    type Sink = WebSocketSink;
    type Stream = WebSocketSource;

    fn split(self) -> (WebSocketSink, WebSocketSource) {
        let (sink, stream) = self.ws.split();
        (WebSocketSink(sink), WebSocketSource(stream))
    }
}

/// Write half of a [`WebSocketSocket`].
pub struct WebSocketSink(SplitSink<WsStream, Message>);

impl FrameSink for WebSocketSink {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let message = match frame {
            Frame::Text(text) => Message::text(text),
            Frame::Binary(bytes) => Message::binary(bytes),
            Frame::Ping(bytes) => Message::Ping(bytes.into()),
            Frame::Pong(bytes) => Message::Pong(bytes.into()),
            Frame::Close => Message::Close(None),
        };
        self.0.send(message).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        SinkExt::close(&mut self.0).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }
}

/// Read half of a [`WebSocketSocket`].
pub struct WebSocketSource(SplitStream<WsStream>);

impl FrameStream for WebSocketSource {
    async fn next(&mut self) -> Option<Result<Frame, TransportError>> {
        loop {
            let frame = match StreamExt::next(&mut self.0).await? {
                Ok(Message::Text(text)) => Frame::Text(text.as_str().to_owned()),
                Ok(Message::Binary(bytes)) => Frame::Binary(bytes.to_vec()),
                Ok(Message::Ping(bytes)) => Frame::Ping(bytes.to_vec()),
                Ok(Message::Pong(bytes)) => Frame::Pong(bytes.to_vec()),
                Ok(Message::Close(_)) => Frame::Close,
                Ok(Message::Frame(_)) => continue, // raw frames only appear on write
                Err(e) => {
                    return Some(Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    )));
                }
            };
            return Some(Ok(frame));
        }
    }
}
