//! WebSocket connection and read/write loop.
//!
//! A [`Connection`] owns one WebSocket to one browser endpoint. It spawns a
//! single tokio task that:
//!
//! - writes outgoing frames in the order they were enqueued
//! - hands every inbound text frame to a [`FrameSink`], one at a time
//! - closes the socket when the sink rejects a frame
//! - reports the close reason to the sink exactly once
//!
//! The sink runs on the loop task. Frame N is fully routed before frame
//! N+1 is read.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, connect_async};
use tracing::{debug, error, trace};

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, SessionId};

// ============================================================================
// CloseReason
// ============================================================================

/// Why the transport closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// [`Connection::shutdown`] or every handle dropped.
    Local,
    /// The browser closed the socket or the stream ended.
    Remote,
    /// Read or write failed.
    Error(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("closed locally"),
            Self::Remote => f.write_str("closed by remote"),
            Self::Error(e) => write!(f, "transport error: {e}"),
        }
    }
}

// ============================================================================
// FrameSink
// ============================================================================

/// Receives what the loop reads off the socket.
pub trait FrameSink: Send + Sync {
    /// Called for every inbound text frame, in arrival order.
    ///
    /// # Errors
    ///
    /// An error closes the connection with [`CloseReason::Error`].
    fn on_frame(&self, text: &str) -> Result<()>;

    /// Called once when the loop exits.
    fn on_closed(&self, reason: CloseReason);
}

// ============================================================================
// OutgoingFrame
// ============================================================================

/// A serialized command ready for the wire.
#[derive(Debug, Clone)]
pub struct OutgoingFrame {
    /// Correlation id of the command.
    pub request_id: RequestId,
    /// Session the command is tagged with.
    pub session_id: Option<SessionId>,
    /// JSON text.
    pub text: String,
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the loop.
enum ConnectionCommand {
    /// Write a frame.
    Send(OutgoingFrame),
    /// Close the socket and stop.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// Handle to a running WebSocket loop.
///
/// Cheap to clone; all clones drive the same socket. The loop stops when
/// [`shutdown`](Self::shutdown) is called, when the browser closes, or when
/// every handle is dropped.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    open: Arc<AtomicBool>,
    frames_sent: Arc<AtomicU64>,
    closed_rx: watch::Receiver<bool>,
}

impl Connection {
    /// Connects to `ws_url` and starts the loop.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if the handshake exceeds `connect_timeout`
    /// - [`Error::WebSocket`] if the handshake fails
    pub async fn connect(
        ws_url: &str,
        connect_timeout: Duration,
        sink: Arc<dyn FrameSink>,
    ) -> Result<Self> {
        debug!(url = %ws_url, "Connecting");

        let (ws_stream, _) = timeout(connect_timeout, connect_async(ws_url))
            .await
            .map_err(|_| Error::connection_timeout(connect_timeout.as_millis() as u64))??;

        debug!(url = %ws_url, "WebSocket connected");
        Ok(Self::from_stream(ws_stream, sink))
    }

    /// Starts the loop over an established WebSocket.
    ///
    /// Must be called inside a tokio runtime.
    pub fn from_stream<S>(ws_stream: WebSocketStream<S>, sink: Arc<dyn FrameSink>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = watch::channel(false);
        let open = Arc::new(AtomicBool::new(true));
        let frames_sent = Arc::new(AtomicU64::new(0));

        tokio::spawn(run_event_loop(
            ws_stream,
            command_rx,
            sink,
            Arc::clone(&open),
            Arc::clone(&frames_sent),
            closed_tx,
        ));

        Self {
            inner: Arc::new(ConnectionInner {
                command_tx,
                open,
                frames_sent,
                closed_rx,
            }),
        }
    }

    /// Enqueues a frame. Never waits for the socket.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the loop has stopped.
    pub fn send(&self, frame: OutgoingFrame) -> Result<()> {
        if !self.is_open() {
            return Err(Error::ConnectionClosed);
        }
        self.inner
            .command_tx
            .send(ConnectionCommand::Send(frame))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Returns `true` while the loop is running.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::Acquire)
    }

    /// Number of frames written to the socket so far.
    #[inline]
    #[must_use]
    pub fn frames_sent(&self) -> u64 {
        self.inner.frames_sent.load(Ordering::Relaxed)
    }

    /// Asks the loop to close the socket. Returns immediately.
    pub fn shutdown(&self) {
        let _ = self.inner.command_tx.send(ConnectionCommand::Shutdown);
    }

    /// Resolves once the loop has stopped and the sink was told.
    pub async fn closed(&self) {
        let mut rx = self.inner.closed_rx.clone();
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("open", &self.is_open())
            .field("frames_sent", &self.frames_sent())
            .finish()
    }
}

// ============================================================================
// Event Loop
// ============================================================================

async fn run_event_loop<S>(
    ws_stream: WebSocketStream<S>,
    mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
    sink: Arc<dyn FrameSink>,
    open: Arc<AtomicBool>,
    frames_sent: Arc<AtomicU64>,
    closed_tx: watch::Sender<bool>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut ws_write, mut ws_read) = ws_stream.split();

    let reason = loop {
        tokio::select! {
            // Incoming frames from the browser
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        trace!(len = text.len(), "Frame received");
                        if let Err(e) = sink.on_frame(text.as_str()) {
                            error!(error = %e, "Inbound frame rejected, closing");
                            let _ = ws_write.close().await;
                            break CloseReason::Error(e.to_string());
                        }
                    }

                    Some(Ok(Message::Binary(bytes))) => {
                        let delivered = match std::str::from_utf8(&bytes) {
                            Ok(text) => sink.on_frame(text),
                            Err(_) => Err(Error::malformed_frame("binary frame is not UTF-8")),
                        };
                        if let Err(e) = delivered {
                            error!(error = %e, len = bytes.len(), "Inbound frame rejected, closing");
                            let _ = ws_write.close().await;
                            break CloseReason::Error(e.to_string());
                        }
                    }

                    Some(Ok(Message::Close(_))) => {
                        debug!("WebSocket closed by remote");
                        break CloseReason::Remote;
                    }

                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        break CloseReason::Error(e.to_string());
                    }

                    None => {
                        debug!("WebSocket stream ended");
                        break CloseReason::Remote;
                    }

                    // Ping, Pong, raw frames
                    _ => {}
                }
            }

            // Commands from sessions
            command = command_rx.recv() => {
                match command {
                    Some(ConnectionCommand::Send(frame)) => {
                        let request_id = frame.request_id;
                        if let Err(e) = ws_write.send(Message::Text(frame.text.into())).await {
                            error!(error = %e, %request_id, "Failed to write frame");
                            break CloseReason::Error(e.to_string());
                        }
                        frames_sent.fetch_add(1, Ordering::Relaxed);
                        trace!(%request_id, session = ?frame.session_id, "Frame sent");
                    }

                    Some(ConnectionCommand::Shutdown) => {
                        debug!("Shutdown command received");
                        let _ = ws_write.close().await;
                        break CloseReason::Local;
                    }

                    None => {
                        debug!("All connection handles dropped");
                        let _ = ws_write.close().await;
                        break CloseReason::Local;
                    }
                }
            }
        }
    };

    open.store(false, Ordering::Release);
    command_rx.close();
    sink.on_closed(reason);
    let _ = closed_tx.send(true);

    debug!("Event loop terminated");
}

// ============================================================================
// Tests
// ============================================================================
