//! WebSocket control server.
//!
//! Each connection is seeded with the full state, then handles its own
//! messages strictly in order while also forwarding monitor deltas. Messages
//! from different connections interleave freely.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::State;
use axum::response::Response;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use volsync_core::{ActionResponse, StateDelta, VolumeController};

use crate::dispatch;
use crate::error::{ServerError, ServerResult};

/// How long a session may spend sending its close frame.
const CLOSE_SEND_TIMEOUT: Duration = Duration::from_millis(500);

/// A bound WebSocket listener and its client sessions.
pub struct ControlServer {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    sessions: TaskTracker,
    serve_task: JoinHandle<()>,
    connections: Arc<AtomicUsize>,
}

/// State shared by every session of one server.
#[derive(Clone)]
struct SessionContext {
    controller: VolumeController,
    deltas: broadcast::Sender<StateDelta>,
    polling_enabled: bool,
    shutdown: CancellationToken,
    sessions: TaskTracker,
    next_client_id: Arc<AtomicU64>,
    connections: Arc<AtomicUsize>,
}

impl ControlServer {
    /// Bind `addr` and start accepting connections.
    ///
    /// `deltas` carries state changes from the monitor; every open session
    /// forwards them. `polling_enabled` selects the reply policy for mutations.
    ///
    /// # Errors
    /// Returns [`ServerError::Bind`] if the address cannot be bound.
    pub async fn bind(
        addr: SocketAddr,
        controller: VolumeController,
        deltas: broadcast::Sender<StateDelta>,
        polling_enabled: bool,
    ) -> ServerResult<Self> {
        let listener =
            TcpListener::bind(addr).await.map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, polling_enabled, "Control server listening");

        let shutdown = CancellationToken::new();
        let sessions = TaskTracker::new();
        let connections = Arc::new(AtomicUsize::new(0));

        let context = SessionContext {
            controller,
            deltas,
            polling_enabled,
            shutdown: shutdown.clone(),
            sessions: sessions.clone(),
            next_client_id: Arc::new(AtomicU64::new(1)),
            connections: Arc::clone(&connections),
        };

        let app = Router::new().fallback(handle_upgrade).with_state(context);

        let signal = shutdown.clone().cancelled_owned();
        let serve_task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(signal).await {
                error!(%local_addr, error = %e, "Control server error");
            }
            debug!(%local_addr, "Listener closed");
        });

        Ok(Self { local_addr, shutdown, sessions, serve_task, connections })
    }

    /// Address the listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of currently open client connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Close every client, stop accepting and release the port.
    ///
    /// Sessions abandon in-flight requests and close as soon as shutdown is
    /// signalled. Waits at most `grace` overall, then aborts the listener
    /// task so the port is freed regardless.
    pub async fn shutdown(mut self, grace: Duration) {
        info!(
            local_addr = %self.local_addr,
            connections = self.connection_count(),
            "Shutting down control server"
        );
        let deadline = Instant::now() + grace;
        self.shutdown.cancel();
        self.sessions.close();

        if tokio::time::timeout_at(deadline, self.sessions.wait()).await.is_err() {
            warn!(
                ?grace,
                lingering = self.connection_count(),
                "Client sessions did not close in time"
            );
        }

        match tokio::time::timeout_at(deadline, &mut self.serve_task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Listener task failed"),
            Err(_) => {
                warn!(?grace, "Listener did not stop in time, aborting");
                self.serve_task.abort();
                let _ = (&mut self.serve_task).await;
            }
        }

        info!(local_addr = %self.local_addr, "Control server stopped");
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle_upgrade(ws: WebSocketUpgrade, State(context): State<SessionContext>) -> Response {
    ws.on_upgrade(move |socket| {
        let sessions = context.sessions.clone();
        sessions.track_future(run_session(socket, context))
    })
}

/// Counts a session as open for as long as it lives.
struct ConnectionGuard(Arc<AtomicUsize>);

impl ConnectionGuard {
    fn new(connections: &Arc<AtomicUsize>) -> Self {
        connections.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(connections))
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn run_session(mut socket: WebSocket, context: SessionContext) {
    let client_id = context.next_client_id.fetch_add(1, Ordering::SeqCst);
    let _guard = ConnectionGuard::new(&context.connections);
    info!(client_id, "Client connected");

    let mut delta_rx = context.deltas.subscribe();
    let mut deltas_open = true;

    let initial = tokio::select! {
        () = context.shutdown.cancelled() => {
            close_for_shutdown(&mut socket, client_id).await;
            return;
        }
        initial = context.controller.get_state() => initial,
    };
    let greeting = match initial {
        Ok(state) => ActionResponse::from(state),
        Err(e) => {
            error!(client_id, error = %e, "Failed to read initial state");
            ActionResponse::from_error(&e)
        }
    };
    if let Err(e) = send_json(&mut socket, &greeting).await {
        warn!(client_id, error = %e, "Failed to send initial state");
        return;
    }

    loop {
        tokio::select! {
            () = context.shutdown.cancelled() => {
                close_for_shutdown(&mut socket, client_id).await;
                break;
            }

            // Read request from client
            incoming = socket.recv() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                    Some(Ok(Message::Binary(bytes))) => {
                        String::from_utf8_lossy(&bytes).into_owned()
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(client_id, "Client disconnected");
                        break;
                    }
                    // Ping/pong are answered by the socket itself
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!(client_id, error = %e, "Read error");
                        break;
                    }
                };

                // A slow backend call must not hold the session open past shutdown
                let reply = tokio::select! {
                    () = context.shutdown.cancelled() => {
                        debug!(client_id, "Dropping in-flight request for server shutdown");
                        close_for_shutdown(&mut socket, client_id).await;
                        break;
                    }
                    reply = dispatch::handle_message(
                        &context.controller,
                        &text,
                        context.polling_enabled,
                    ) => reply,
                };
                if let Some(reply) = reply
                    && let Err(e) = send_json(&mut socket, &reply).await
                {
                    warn!(client_id, error = %e, "Write error");
                    break;
                }
            }

            // Forward state deltas to client
            delta = delta_rx.recv(), if deltas_open => {
                match delta {
                    Ok(delta) => {
                        if let Err(e) = send_json(&mut socket, &delta).await {
                            warn!(client_id, error = %e, "Delta write error");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(client_id, skipped, "Client fell behind state broadcasts");
                    }
                    Err(RecvError::Closed) => {
                        deltas_open = false;
                    }
                }
            }
        }
    }

    info!(client_id, "Client handler exiting");
}

async fn close_for_shutdown(socket: &mut WebSocket, client_id: u64) {
    debug!(client_id, "Closing client for server shutdown");
    let close = Message::Close(Some(CloseFrame {
        code: close_code::AWAY,
        reason: "server shutting down".into(),
    }));
    let _ = tokio::time::timeout(CLOSE_SEND_TIMEOUT, socket.send(close)).await;
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, value: &T) -> Result<(), axum::Error> {
    socket.send(encode(value)?).await
}

/// Encode `value` as a JSON text frame.
fn encode<T: Serialize>(value: &T) -> Result<Message, axum::Error> {
    let text = serde_json::to_string(value).map_err(|e| {
        error!(error = %e, "Failed to serialize message");
        axum::Error::new(e)
    })?;
    Ok(Message::Text(text.into()))
}
