#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use volsync_core::{AudioBackend, BackendResult, MemoryBackend, VolumeController, VolumeState};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(3);

pub fn memory_controller(volume: i64, muted: bool) -> (VolumeController, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new(VolumeState::new(volume, muted)));
    (VolumeController::new(backend.clone()), backend)
}

pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

pub async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
    ws
}

pub async fn try_connect(addr: SocketAddr) -> bool {
    connect_async(format!("ws://{addr}")).await.is_ok()
}

/// Next JSON text message, skipping control frames.
pub async fn next_json(ws: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a message")
            .expect("connection ended")
            .expect("read error");
        if msg.is_text() {
            return serde_json::from_str(msg.to_text().unwrap()).unwrap();
        }
    }
}

pub async fn send_json(ws: &mut Client, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

/// Assert nothing but control frames arrives within `wait`.
pub async fn assert_silent(ws: &mut Client, wait: Duration) {
    let outcome = tokio::time::timeout(wait, async {
        loop {
            match ws.next().await {
                Some(Ok(msg)) if msg.is_text() => return msg,
                Some(Ok(_)) => {}
                other => panic!("connection ended while expecting silence: {other:?}"),
            }
        }
    })
    .await;
    if let Ok(msg) = outcome {
        panic!("expected no message, got {msg:?}");
    }
}

/// Wait until the server closes the connection.
pub async fn expect_closed(ws: &mut Client) {
    let closed = tokio::time::timeout(RECV_TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "connection was not closed by the server");
}

/// Backend whose calls hang for `delay` once stalled, like an OS tool that
/// stopped answering. Calls still apply to the inner state when they finish.
pub struct StallingBackend {
    pub inner: MemoryBackend,
    stalled: AtomicBool,
    delay: Duration,
}

impl StallingBackend {
    pub fn new(initial: VolumeState, delay: Duration) -> Self {
        Self { inner: MemoryBackend::new(initial), stalled: AtomicBool::new(false), delay }
    }

    pub fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    async fn maybe_stall(&self) {
        if self.stalled.load(Ordering::SeqCst) {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl AudioBackend for StallingBackend {
    fn name(&self) -> &'static str {
        "stalling"
    }

    async fn get(&self) -> BackendResult<VolumeState> {
        self.maybe_stall().await;
        self.inner.get().await
    }

    async fn set_volume(&self, volume: u8) -> BackendResult<()> {
        self.maybe_stall().await;
        self.inner.set_volume(volume).await
    }

    async fn set_muted(&self, muted: bool) -> BackendResult<()> {
        self.maybe_stall().await;
        self.inner.set_muted(muted).await
    }
}

pub fn stalling_controller(volume: i64, delay: Duration) -> (VolumeController, Arc<StallingBackend>) {
    let backend = Arc::new(StallingBackend::new(VolumeState::new(volume, false), delay));
    (VolumeController::new(backend.clone()), backend)
}

/// Assert the next frame is a close (or the stream ends) and no reply slips in first.
pub async fn expect_closed_without_reply(ws: &mut Client) {
    let closed = tokio::time::timeout(RECV_TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_)) | Err(_)) | None => return,
                Some(Ok(msg)) if msg.is_text() => panic!("expected close, got reply {msg:?}"),
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "connection was not closed by the server");
}
