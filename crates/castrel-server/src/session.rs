//! Per-connection session lifecycle.
//!
//! Each accepted socket gets one task that performs the display-name
//! handshake, registers the session, then services it until logout, I/O
//! failure, or server shutdown. Outbound delivery runs on a separate
//! writer task fed by the session's outbox queue, so a slow reader never
//! stalls the senders routing to it.

use crate::registry::{PeerHandle, Registry, SessionId};
use crate::router;
use castrel_core::{read_frame, write_frame, Envelope, Route};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Lifecycle state of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshaking,
    Active,
    Closing,
    Closed,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Logout,
    PeerClosed,
    ReadFailed,
    WriteFailed,
    Shutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CloseReason::Logout => "logout",
            CloseReason::PeerClosed => "peer closed",
            CloseReason::ReadFailed => "read failed",
            CloseReason::WriteFailed => "write failed",
            CloseReason::Shutdown => "server shutdown",
        };
        f.write_str(s)
    }
}

/// Queue depth for one session's outbound envelopes. A recipient that falls
/// this far behind starts losing deliveries instead of blocking senders.
const OUTBOX_DEPTH: usize = 64;

/// Service one accepted connection to completion.
///
/// Owns every exit path: whatever ends the session, it has left the
/// registry and released its socket by the time this returns.
pub async fn run(
    stream: TcpStream,
    peer_addr: SocketAddr,
    registry: Arc<Registry>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let (mut reader, writer) = stream.into_split();

    // Handshaking: one framed read of the claimed display name. Failure
    // here discards the connection without registering it. The shutdown
    // signal is honored here too, so a peer that connects and never speaks
    // cannot hold up server teardown.
    debug!(peer = %peer_addr, state = ?SessionState::Handshaking, "awaiting display name");
    let name = tokio::select! {
        _ = shutdown.recv() => return,
        handshake = read_frame::<_, String>(&mut reader) => match handshake {
            Ok(Some(name)) => name,
            Ok(None) => {
                debug!(peer = %peer_addr, "connection closed before handshake");
                return;
            }
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "handshake failed, discarding connection");
                return;
            }
        },
    };

    let (outbox_tx, outbox_rx) = mpsc::channel(OUTBOX_DEPTH);
    let id = registry.next_id();
    let handle = PeerHandle {
        id,
        name: name.clone(),
        outbox: outbox_tx,
    };
    if !registry.insert(handle).await {
        warn!(peer = %peer_addr, name = %name, "registry full, dropping connection");
        return;
    }
    let online = registry.len().await;
    info!(id, name = %name, peer = %peer_addr, online, "connected");

    let write_failed = Arc::new(Notify::new());
    let mut session = Session {
        id,
        name,
        state: SessionState::Active,
        registry,
        writer_task: spawn_writer(id, writer, outbox_rx, write_failed.clone()),
        write_failed,
    };

    let reason = session.serve(&mut reader, shutdown).await;
    session.close().await;
    info!(id = session.id, name = %session.name, reason = %reason, "disconnected");
}

/// Server-side state for one connected client.
struct Session {
    id: SessionId,
    name: String,
    state: SessionState,
    registry: Arc<Registry>,
    writer_task: JoinHandle<()>,
    write_failed: Arc<Notify>,
}

impl Session {
    /// Receive loop: reads envelopes and hands each to the router until
    /// something ends the session.
    async fn serve(
        &mut self,
        reader: &mut OwnedReadHalf,
        mut shutdown: broadcast::Receiver<()>,
    ) -> CloseReason {
        debug_assert_eq!(self.state, SessionState::Active);

        loop {
            tokio::select! {
                _ = shutdown.recv() => return CloseReason::Shutdown,

                // The writer task flags a failed write; treat it the same as
                // a local I/O failure.
                _ = self.write_failed.notified() => return CloseReason::WriteFailed,

                inbound = read_frame::<_, Envelope>(reader) => match inbound {
                    Ok(Some(envelope)) => {
                        if matches!(envelope.route, Route::Logout) {
                            return CloseReason::Logout;
                        }
                        router::dispatch(&self.registry, &self.name, &envelope).await;
                    }
                    Ok(None) => return CloseReason::PeerClosed,
                    Err(e) => {
                        warn!(id = self.id, name = %self.name, error = %e, "read failed");
                        return CloseReason::ReadFailed;
                    }
                },
            }
        }
    }

    /// Leave the registry and release the transport. Safe to reach from any
    /// exit path; a second call is a no-op.
    async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closing;
        self.registry.remove(self.id).await;
        self.writer_task.abort();
        self.state = SessionState::Closed;
    }
}

/// Drain the outbox onto the socket until the queue closes or a write fails.
fn spawn_writer(
    id: SessionId,
    mut writer: OwnedWriteHalf,
    mut outbox_rx: mpsc::Receiver<Envelope>,
    write_failed: Arc<Notify>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(envelope) = outbox_rx.recv().await {
            if let Err(e) = write_frame(&mut writer, &envelope).await {
                debug!(id, error = %e, "write failed, stopping session writer");
                write_failed.notify_one();
                return;
            }
        }
    })
}
