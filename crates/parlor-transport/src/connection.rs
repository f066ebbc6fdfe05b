//! Managed connection: one socket session bound to one participant.
//!
//! Opening a connection spawns two tasks:
//!
//! - the **reader** waits for inbound frames under a sliding read
//!   deadline and hands every non-empty message to the
//!   [`ConnectionHandler`];
//! - the **writer** drains the bounded outbound queue and sends a ping
//!   every `ping_period`.
//!
//! Whichever side fails first calls [`Connection::close`]. Close runs at
//! most once per session, however many tasks race into it:
//!
//! ```text
//! closing → on_close → close queue → wait close-frame ack → stop reader
//!         → closed → deactivate (on_update(false))
//! ```
//!
//! Every open bumps a generation counter. Tasks and close calls carry the
//! generation they belong to, so a slow task from a previous socket can
//! never tear down its successor.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::{
    ConnectionId, Frame, FrameSink, FrameStream, Socket, TransportError,
};

// ---------------------------------------------------------------------------
// ConnectionConfig
// ---------------------------------------------------------------------------

/// Timing and sizing knobs for a [`Connection`].
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Upper bound for writing one frame, and for waiting on a full
    /// outbound queue.
    pub write_wait: Duration,

    /// Read deadline. Refreshed by every inbound frame, pongs included.
    pub pong_wait: Duration,

    /// Ping interval. Must be shorter than `pong_wait`.
    pub ping_period: Duration,

    /// Largest inbound message accepted, in bytes.
    pub max_message_size: usize,

    /// Capacity of the outbound queue, in messages.
    pub queue_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            write_wait: Duration::from_secs(10),
            pong_wait: Duration::from_secs(60),
            ping_period: Duration::from_secs(54),
            max_message_size: 4096,
            queue_capacity: 256,
        }
    }
}

impl ConnectionConfig {
    /// Returns a copy that is safe to run with.
    ///
    /// A ping period at or above the read deadline would let healthy but
    /// idle peers time out, so it is pulled down to 9/10 of `pong_wait`.
    pub fn validated(mut self) -> Self {
        if self.ping_period >= self.pong_wait {
            let clamped = self.pong_wait * 9 / 10;
            tracing::warn!(
                ping_period = ?self.ping_period,
                pong_wait = ?self.pong_wait,
                clamped = ?clamped,
                "ping period must be shorter than pong wait, clamping"
            );
            self.ping_period = clamped;
        }
        if self.queue_capacity == 0 {
            tracing::warn!("queue capacity 0 is not allowed, using 1");
            self.queue_capacity = 1;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// ConnectionHandler
// ---------------------------------------------------------------------------

/// Callbacks from a connection back to whoever owns the participant.
///
/// This is the only path from a connection upward: it carries no owning
/// pointer to the registry, just whatever the implementor captured
/// (typically a participant id and a weak handle).
///
/// All methods run on the connection's own tasks and must not block.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// A non-empty inbound message arrived.
    fn on_message(&self, _message: Vec<u8>) {}

    /// The participant's active flag flipped.
    fn on_update(&self, _active: bool) {}

    /// The close sequence started.
    fn on_close(&self) {}
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

struct State {
    conn_id: Option<ConnectionId>,
    generation: u64,
    active: bool,
    read_closed: bool,
    write_closed: bool,
    closing: bool,
    closed: bool,
    outbound: Option<mpsc::Sender<Vec<u8>>>,
    write_done: Option<oneshot::Receiver<()>>,
    stop_reader: Option<watch::Sender<bool>>,
}

struct Shared {
    owner: String,
    config: ConnectionConfig,
    handler: Arc<dyn ConnectionHandler>,
    state: Mutex<State>,
}

/// A reopenable socket session for one participant.
///
/// Cheap to clone: every clone drives the same session.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    /// Creates a closed connection for `owner` (used in logs).
    pub fn new(
        owner: impl Into<String>,
        config: ConnectionConfig,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                owner: owner.into(),
                config: config.validated(),
                handler,
                state: Mutex::new(State {
                    conn_id: None,
                    generation: 0,
                    active: false,
                    read_closed: true,
                    write_closed: true,
                    closing: false,
                    closed: true,
                    outbound: None,
                    write_done: None,
                    stop_reader: None,
                }),
            }),
        }
    }

    /// Attaches a fresh socket and starts the reader and writer tasks.
    ///
    /// A session that is still open is closed first, so there is never
    /// more than one live socket per participant.
    pub async fn open<S: Socket>(&self, socket: S) {
        if !self.is_closed() {
            tracing::info!(
                owner = %self.shared.owner,
                "connection still open, closing before reopen"
            );
            self.shared.close(None).await;
        }

        let conn_id = ConnectionId::next();
        let (sink, stream) = socket.split();
        let (outbound_tx, outbound_rx) =
            mpsc::channel(self.shared.config.queue_capacity);
        let (done_tx, done_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = watch::channel(false);

        let generation = {
            let mut state = self.shared.lock();
            state.generation += 1;
            state.conn_id = Some(conn_id);
            state.read_closed = false;
            state.write_closed = false;
            state.closing = false;
            state.closed = false;
            state.outbound = Some(outbound_tx);
            state.write_done = Some(done_rx);
            state.stop_reader = Some(stop_tx);
            state.generation
        };

        tokio::spawn(write_loop(
            Arc::clone(&self.shared),
            generation,
            sink,
            outbound_rx,
            done_tx,
        ));
        tokio::spawn(read_loop(
            Arc::clone(&self.shared),
            generation,
            stream,
            stop_rx,
        ));

        tracing::info!(owner = %self.shared.owner, %conn_id, "connection opened");
        self.shared.set_active(true);
    }

    /// Queues `message` for the writer.
    ///
    /// Does nothing when the connection is inactive. Waits at most
    /// `write_wait` for room in the queue before giving up with
    /// [`TransportError::QueueFull`].
    pub async fn send(&self, message: Vec<u8>) -> Result<(), TransportError> {
        let outbound = {
            let state = self.shared.lock();
            if state.active { state.outbound.clone() } else { None }
        };
        let Some(outbound) = outbound else {
            tracing::trace!(owner = %self.shared.owner, "inactive, message dropped");
            return Ok(());
        };

        outbound
            .send_timeout(message, self.shared.config.write_wait)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => TransportError::QueueFull,
                SendTimeoutError::Closed(_) => TransportError::ConnectionClosed(
                    self.shared.owner.clone(),
                ),
            })
    }

    /// Runs the close sequence. Safe to call any number of times, from
    /// any task, concurrently.
    pub async fn close(&self) {
        self.shared.close(None).await;
    }

    /// Returns `true` while a live socket is attached.
    pub fn is_active(&self) -> bool {
        self.shared.lock().active
    }

    /// Returns `true` once the close sequence has fully completed (or
    /// before the first open).
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// The id of the current (or last) socket session.
    pub fn id(&self) -> Option<ConnectionId> {
        self.shared.lock().conn_id
    }

    /// The owner label given at construction.
    pub fn owner(&self) -> &str {
        &self.shared.owner
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("Connection")
            .field("owner", &self.shared.owner)
            .field("conn_id", &state.conn_id)
            .field("active", &state.active)
            .field("closed", &state.closed)
            .finish()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Flips the active flag, notifying the handler only on change.
    fn set_active(&self, active: bool) {
        let changed = {
            let mut state = self.lock();
            let changed = state.active != active;
            state.active = active;
            changed
        };
        if changed {
            tracing::debug!(owner = %self.owner, active, "participant activity changed");
            self.handler.on_update(active);
        }
    }

    /// The close sequence. `expected` pins the call to one socket session;
    /// `None` targets whatever session is current.
    async fn close(self: &Arc<Self>, expected: Option<u64>) {
        let (generation, conn_id, outbound, write_done, stop_reader, write_closed) = {
            let mut state = self.lock();
            if expected.is_some_and(|g| g != state.generation) {
                tracing::debug!(owner = %self.owner, "stale close ignored");
                return;
            }
            if state.closed || state.closing {
                tracing::debug!(owner = %self.owner, "already closed or closing");
                return;
            }
            state.closing = true;
            (
                state.generation,
                state.conn_id,
                state.outbound.take(),
                state.write_done.take(),
                state.stop_reader.take(),
                state.write_closed,
            )
        };

        tracing::debug!(owner = %self.owner, ?conn_id, "closing connection");
        self.handler.on_close();

        // Dropping the last queue sender ends the writer's select loop:
        // the ping ticker stops with it and the close frame goes out.
        drop(outbound);

        if !write_closed {
            if let Some(done) = write_done {
                if time::timeout(self.config.write_wait, done).await.is_err() {
                    tracing::warn!(owner = %self.owner, ?conn_id, "close frame not acknowledged");
                }
            }
        }

        if let Some(stop_reader) = stop_reader {
            let _ = stop_reader.send(true);
        }

        let current = {
            let mut state = self.lock();
            if state.generation == generation {
                state.closing = false;
                state.closed = true;
                true
            } else {
                false
            }
        };

        if current {
            self.set_active(false);
            tracing::info!(owner = %self.owner, ?conn_id, "connection closed");
        }
    }

    async fn write<K: FrameSink>(
        &self,
        sink: &mut K,
        frame: Frame,
    ) -> Result<(), TransportError> {
        match time::timeout(self.config.write_wait, sink.send(frame)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::WriteTimeout),
        }
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

async fn write_loop<K: FrameSink>(
    shared: Arc<Shared>,
    generation: u64,
    mut sink: K,
    mut outbound: mpsc::Receiver<Vec<u8>>,
    done: oneshot::Sender<()>,
) {
    let period = shared.config.ping_period;
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let failure = loop {
        tokio::select! {
            message = outbound.recv() => {
                let Some(message) = message else {
                    // Queue closed by `close`: say goodbye and acknowledge.
                    if let Err(e) = shared.write(&mut sink, Frame::Close).await {
                        tracing::debug!(owner = %shared.owner, error = %e, "close frame not sent");
                    }
                    let _ = sink.close().await;
                    let _ = done.send(());
                    tracing::debug!(owner = %shared.owner, "write loop finished");
                    return;
                };
                if let Err(e) = shared.write(&mut sink, Frame::from_bytes(message)).await {
                    break e;
                }
            }
            _ = ticker.tick() => {
                if let Err(e) = shared.write(&mut sink, Frame::Ping(Vec::new())).await {
                    tracing::debug!(owner = %shared.owner, error = %e, "ping failed");
                    break e;
                }
            }
        }
    };

    tracing::warn!(owner = %shared.owner, error = %failure, "write loop failed");
    {
        let mut state = shared.lock();
        if state.generation == generation {
            state.write_closed = true;
        }
    }
    drop(done);
    shared.close(Some(generation)).await;
}

async fn read_loop<T: FrameStream>(
    shared: Arc<Shared>,
    generation: u64,
    mut stream: T,
    mut stop: watch::Receiver<bool>,
) {
    let pong_wait = shared.config.pong_wait;
    let limit = shared.config.max_message_size;
    let mut deadline = Instant::now() + pong_wait;

    let outcome = loop {
        tokio::select! {
            _ = stop.changed() => break Ok(()),
            next = time::timeout_at(deadline, stream.next()) => {
                let frame = match next {
                    Err(_) => break Err(TransportError::ReadTimeout),
                    Ok(None) => break Ok(()),
                    Ok(Some(Err(e))) => break Err(e),
                    Ok(Some(Ok(frame))) => frame,
                };
                deadline = Instant::now() + pong_wait;

                let payload = match frame {
                    Frame::Text(text) => text.into_bytes(),
                    Frame::Binary(bytes) => bytes,
                    Frame::Ping(_) | Frame::Pong(_) => continue,
                    Frame::Close => break Ok(()),
                };
                if payload.is_empty() {
                    tracing::debug!(owner = %shared.owner, "empty message skipped");
                    continue;
                }
                if payload.len() > limit {
                    break Err(TransportError::MessageTooLarge {
                        size: payload.len(),
                        limit,
                    });
                }
                shared.handler.on_message(payload);
            }
        }
    };

    match outcome {
        Ok(()) => tracing::debug!(owner = %shared.owner, "read loop finished"),
        Err(e) => tracing::warn!(owner = %shared.owner, error = %e, "read loop failed"),
    }
    {
        let mut state = shared.lock();
        if state.generation == generation {
            state.read_closed = true;
        }
    }
    shared.close(Some(generation)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_config_default() {
        let config = ConnectionConfig::default();
        assert_eq!(config.pong_wait, Duration::from_secs(60));
        assert_eq!(config.ping_period, Duration::from_secs(54));
        assert_eq!(config.queue_capacity, 256);
    }

    #[test]
    fn test_connection_config_validated_clamps_ping_period() {
        let config = ConnectionConfig {
            ping_period: Duration::from_secs(90),
            ..ConnectionConfig::default()
        }
        .validated();
        assert_eq!(config.ping_period, Duration::from_secs(54));
    }

    #[test]
    fn test_connection_config_validated_rejects_zero_capacity() {
        let config = ConnectionConfig {
            queue_capacity: 0,
            ..ConnectionConfig::default()
        }
        .validated();
        assert_eq!(config.queue_capacity, 1);
    }

    #[test]
    fn test_new_connection_starts_closed_and_inactive() {
        struct Silent;
        impl ConnectionHandler for Silent {}

        let conn = Connection::new("U1", ConnectionConfig::default(), Arc::new(Silent));
        assert!(conn.is_closed());
        assert!(!conn.is_active());
        assert_eq!(conn.id(), None);
        assert_eq!(conn.owner(), "U1");
    }
}
