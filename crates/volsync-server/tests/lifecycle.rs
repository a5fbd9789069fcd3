mod common;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;

use volsync_core::{ConfigError, ConfigSnapshot, VolumeState};
use volsync_server::{LifecycleError, LifecycleManager, ServerError};

use common::{
    connect, expect_closed, expect_closed_without_reply, free_port, memory_controller, next_json,
    stalling_controller, try_connect,
};

fn local_config(port: u16, polling: bool) -> ConfigSnapshot {
    let mut config = ConfigSnapshot::default();
    config.websocket.host = IpAddr::V4(Ipv4Addr::LOCALHOST);
    config.websocket.port = port;
    config.polling.enabled = polling;
    config.polling.interval_ms = 50;
    config
}

fn addr(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

#[tokio::test]
async fn start_binds_configured_port() {
    let port = free_port();
    let (controller, _backend) = memory_controller(42, false);
    let manager = LifecycleManager::new(controller, local_config(port, false));

    let bound = manager.start().await.unwrap();
    assert_eq!(bound, addr(port));
    assert!(manager.is_running().await);

    let mut client = connect(bound).await;
    assert_eq!(next_json(&mut client).await, json!({"volume": 42, "muted": false}));

    manager.shutdown().await;
    assert!(!manager.is_running().await);
}

#[tokio::test]
async fn new_port_replaces_old_port() {
    let old_port = free_port();
    let (controller, _backend) = memory_controller(42, false);
    let manager = LifecycleManager::new(controller, local_config(old_port, false))
        .with_shutdown_grace(Duration::from_secs(1));
    manager.start().await.unwrap();

    let mut old_client = connect(addr(old_port)).await;
    next_json(&mut old_client).await;

    let new_port = free_port();
    let bound = manager.apply(local_config(new_port, false)).await.unwrap();
    assert_eq!(bound, addr(new_port));
    assert_eq!(manager.config().websocket.port, new_port);

    expect_closed(&mut old_client).await;
    assert!(!try_connect(addr(old_port)).await);

    let mut new_client = connect(addr(new_port)).await;
    assert_eq!(next_json(&mut new_client).await, json!({"volume": 42, "muted": false}));

    manager.shutdown().await;
}

#[tokio::test]
async fn same_port_can_be_reapplied() {
    let port = free_port();
    let (controller, _backend) = memory_controller(42, false);
    let manager = LifecycleManager::new(controller, local_config(port, false));
    manager.start().await.unwrap();

    let mut client = connect(addr(port)).await;
    next_json(&mut client).await;

    manager.apply(local_config(port, true)).await.unwrap();
    expect_closed(&mut client).await;
    assert!(manager.config().polling.enabled);

    let mut client = connect(addr(port)).await;
    assert_eq!(next_json(&mut client).await, json!({"volume": 42, "muted": false}));

    manager.shutdown().await;
}

#[tokio::test]
async fn bind_failure_leaves_no_server() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let taken_port = taken.local_addr().unwrap().port();

    let (controller, _backend) = memory_controller(42, false);
    let manager = LifecycleManager::new(controller, local_config(free_port(), false));
    manager.start().await.unwrap();

    let result = manager.apply(local_config(taken_port, false)).await;
    assert_matches!(result, Err(LifecycleError::Server(ServerError::Bind { .. })));
    assert!(!manager.is_running().await);
    assert_eq!(manager.local_addr().await, None);

    // A workable configuration recovers
    let port = free_port();
    assert_eq!(manager.apply(local_config(port, false)).await.unwrap(), addr(port));
    assert!(manager.is_running().await);

    manager.shutdown().await;
}

#[tokio::test]
async fn invalid_config_keeps_running_server() {
    let port = free_port();
    let (controller, _backend) = memory_controller(42, false);
    let manager = LifecycleManager::new(controller, local_config(port, false));
    manager.start().await.unwrap();

    let mut client = connect(addr(port)).await;
    next_json(&mut client).await;

    let result = manager.apply(local_config(0, false)).await;
    assert_matches!(result, Err(LifecycleError::InvalidConfig(ConfigError::InvalidPort(0))));
    assert_eq!(manager.config().websocket.port, port);
    assert_eq!(manager.local_addr().await, Some(addr(port)));

    // The existing client is untouched
    common::send_json(&mut client, json!({"action": "getState"})).await;
    assert_eq!(next_json(&mut client).await, json!({"volume": 42, "muted": false}));

    manager.shutdown().await;
}

#[tokio::test]
async fn polling_config_drives_broadcasts() {
    let port = free_port();
    let (controller, backend) = memory_controller(60, false);
    let manager = LifecycleManager::new(controller, local_config(port, true));
    manager.start().await.unwrap();

    let mut client = connect(addr(port)).await;
    next_json(&mut client).await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    backend.set_external(VolumeState::new(55, false));
    assert_eq!(next_json(&mut client).await, json!({"volume": 55}));

    manager.shutdown().await;
}

#[tokio::test]
async fn reapply_with_stalled_backend_replaces_server() {
    let old_port = free_port();
    let (controller, backend) = stalling_controller(42, Duration::from_secs(1));
    let manager = LifecycleManager::new(controller, local_config(old_port, false))
        .with_shutdown_grace(Duration::from_millis(200));
    manager.start().await.unwrap();

    let mut old_client = connect(addr(old_port)).await;
    next_json(&mut old_client).await;

    backend.stall();
    common::send_json(&mut old_client, json!({"action": "mute"})).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let new_port = free_port();
    let bound = manager.apply(local_config(new_port, false)).await.unwrap();
    assert_eq!(bound, addr(new_port));

    expect_closed_without_reply(&mut old_client).await;
    assert!(!try_connect(addr(old_port)).await);
    assert!(manager.is_running().await);

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert!(!backend.inner.state().muted);

    manager.shutdown().await;
}
