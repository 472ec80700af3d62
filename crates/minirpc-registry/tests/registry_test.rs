//! End-to-end tests for the registry HTTP service, heartbeat and
//! registry-backed discovery.

use std::sync::Arc;
use std::time::Duration;

use minirpc_common::protocol::DEFAULT_REGISTRY_PATH;
use minirpc_registry::{
    heartbeat, send_heartbeat, Discovery, Registry, RegistryDiscovery, SelectMode,
};
use tokio::net::TcpListener;

async fn start_registry(timeout: Duration) -> String {
    let registry = Arc::new(Registry::new(timeout));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(registry.serve(listener));
    format!("http://{}{}", addr, DEFAULT_REGISTRY_PATH)
}

#[tokio::test]
async fn test_heartbeat_then_discover() {
    let registry_url = start_registry(Duration::from_secs(60)).await;

    send_heartbeat(&registry_url, "127.0.0.1:9001").await.unwrap();
    send_heartbeat(&registry_url, "127.0.0.1:9002").await.unwrap();

    let discovery = RegistryDiscovery::new(&registry_url, None);
    let servers = discovery.get_all().await.unwrap();
    assert_eq!(
        servers,
        vec!["127.0.0.1:9001".to_string(), "127.0.0.1:9002".to_string()]
    );

    let pick = discovery.get(SelectMode::RoundRobin).await.unwrap();
    assert!(servers.contains(&pick));
}

#[tokio::test]
async fn test_discovery_sees_ttl_eviction() {
    let registry_url = start_registry(Duration::from_millis(100)).await;

    send_heartbeat(&registry_url, "127.0.0.1:9001").await.unwrap();

    // a tiny update window so the second get_all refetches
    let discovery = RegistryDiscovery::new(&registry_url, Some(Duration::from_millis(10)));
    assert_eq!(discovery.get_all().await.unwrap().len(), 1);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(discovery.get_all().await.unwrap().is_empty());

    let err = discovery.get(SelectMode::Random).await.unwrap_err();
    assert!(matches!(
        err,
        minirpc_common::RpcError::NoAvailableServers
    ));
}

#[tokio::test]
async fn test_heartbeat_task_keeps_entry_alive() {
    let registry_url = start_registry(Duration::from_millis(200)).await;

    let handle = heartbeat(
        registry_url.clone(),
        "127.0.0.1:9001".to_string(),
        Some(Duration::from_millis(50)),
    );

    tokio::time::sleep(Duration::from_millis(400)).await;

    let discovery = RegistryDiscovery::new(&registry_url, Some(Duration::ZERO));
    assert_eq!(discovery.get_all().await.unwrap().len(), 1);

    handle.abort();
}

#[tokio::test]
async fn test_heartbeat_against_dead_registry_fails() {
    let err = send_heartbeat("http://127.0.0.1:1/_minirpc_/registry", "127.0.0.1:9001")
        .await
        .unwrap_err();
    assert!(matches!(err, minirpc_common::RpcError::Registry(_)));
}
