use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use minirpc_common::protocol::{DEFAULT_REGISTRY_PATH, DEFAULT_REGISTRY_TIMEOUT};
use minirpc_common::{Result, RpcError};
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Response header carrying the comma-joined alive-server list.
pub const SERVERS_HEADER: &str = "x-minirpc-servers";
/// Request header naming the server a heartbeat announces.
pub const SERVER_HEADER: &str = "x-minirpc-server";

/// The registry: a TTL-evicting map from server address to the time it was
/// last announced. Eviction happens lazily while computing the alive list.
pub struct Registry {
    timeout: Duration,
    servers: Mutex<HashMap<String, Instant>>,
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new(DEFAULT_REGISTRY_TIMEOUT)
    }
}

impl Registry {
    /// Creates a registry whose entries expire after `timeout`; zero keeps
    /// them forever.
    pub fn new(timeout: Duration) -> Registry {
        Registry {
            timeout,
            servers: Mutex::new(HashMap::new()),
        }
    }

    fn put_server(&self, addr: &str) {
        let mut servers = self.servers.lock().unwrap();
        servers.insert(addr.to_string(), Instant::now());
    }

    fn alive_servers(&self) -> Vec<String> {
        let mut servers = self.servers.lock().unwrap();
        let now = Instant::now();
        if !self.timeout.is_zero() {
            servers.retain(|_, announced| now.duration_since(*announced) < self.timeout);
        }
        let mut alive: Vec<String> = servers.keys().cloned().collect();
        alive.sort();
        alive
    }

    /// The registry's HTTP routes, mounted at the default registry path.
    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route(DEFAULT_REGISTRY_PATH, get(list_servers).post(announce_server))
            .with_state(self)
    }

    /// Serves the registry on `listener` until it fails.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            info!("registry listening on {}", addr);
        }
        axum::serve(listener, self.router())
            .await
            .map_err(|e| RpcError::Registry(e.to_string()))
    }
}

async fn list_servers(State(registry): State<Arc<Registry>>) -> impl IntoResponse {
    let alive = registry.alive_servers().join(",");
    (
        StatusCode::OK,
        [(HeaderName::from_static(SERVERS_HEADER), alive)],
        "",
    )
}

async fn announce_server(
    State(registry): State<Arc<Registry>>,
    headers: HeaderMap,
) -> StatusCode {
    match headers.get(SERVER_HEADER).and_then(|v| v.to_str().ok()) {
        Some(addr) if !addr.is_empty() => {
            debug!("announced server {}", addr);
            registry.put_server(addr);
            StatusCode::OK
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
