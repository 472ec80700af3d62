use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use http_body_util::Empty;
use hyper::body::Bytes;
use hyper::Request;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use minirpc_common::protocol::DEFAULT_UPDATE_TIMEOUT;
use minirpc_common::{Result, RpcError};
use rand::Rng;
use tracing::debug;

use crate::registry::SERVERS_HEADER;

/// How the next server is picked from the pool.
///
/// `NotSupportedSelectMode` is reserved for modes a discovery does not
/// implement; both built-in pools support the two below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectMode {
    Random,
    RoundRobin,
}

/// Contract between multi-server clients and their server pool.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Re-reads the pool from its backing source, if it has one.
    async fn refresh(&self) -> Result<()>;
    /// Replaces the pool's contents.
    async fn update(&self, servers: Vec<String>) -> Result<()>;
    /// Picks one server according to `mode`.
    async fn get(&self, mode: SelectMode) -> Result<String>;
    /// All servers currently in the pool.
    async fn get_all(&self) -> Result<Vec<String>>;
}

/// A static server pool with random and round-robin selection.
///
/// The round-robin index starts at a random offset so a fleet of clients
/// does not converge on the same first server.
pub struct MultiServersDiscovery {
    state: Mutex<PoolState>,
}

struct PoolState {
    servers: Vec<String>,
    index: usize,
}

impl MultiServersDiscovery {
    pub fn new(servers: Vec<String>) -> MultiServersDiscovery {
        let index = rand::thread_rng().gen_range(0..i32::MAX as usize);
        MultiServersDiscovery {
            state: Mutex::new(PoolState { servers, index }),
        }
    }
}

#[async_trait]
impl Discovery for MultiServersDiscovery {
    async fn refresh(&self) -> Result<()> {
        Ok(())
    }

    async fn update(&self, servers: Vec<String>) -> Result<()> {
        self.state.lock().unwrap().servers = servers;
        Ok(())
    }

    async fn get(&self, mode: SelectMode) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        let n = state.servers.len();
        if n == 0 {
            return Err(RpcError::NoAvailableServers);
        }
        match mode {
            SelectMode::Random => Ok(state.servers[rand::thread_rng().gen_range(0..n)].clone()),
            SelectMode::RoundRobin => {
                let server = state.servers[state.index % n].clone();
                state.index = (state.index + 1) % n;
                Ok(server)
            }
        }
    }

    async fn get_all(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().servers.clone())
    }
}

/// A pool kept in sync with a registry server's alive list.
///
/// `get`/`get_all` refresh first, but at most once per update window; the
/// cached list is trusted in between.
pub struct RegistryDiscovery {
    pool: MultiServersDiscovery,
    registry_url: String,
    update_timeout: Duration,
    last_update: Mutex<Option<Instant>>,
}

impl RegistryDiscovery {
    pub fn new(registry_url: impl Into<String>, update_timeout: Option<Duration>) -> Self {
        RegistryDiscovery {
            pool: MultiServersDiscovery::new(Vec::new()),
            registry_url: registry_url.into(),
            update_timeout: update_timeout.unwrap_or(DEFAULT_UPDATE_TIMEOUT),
            last_update: Mutex::new(None),
        }
    }

    async fn fetch_servers(&self) -> Result<Vec<String>> {
        let client = Client::builder(TokioExecutor::new()).build_http::<Empty<Bytes>>();
        let request = Request::builder()
            .uri(self.registry_url.as_str())
            .body(Empty::new())
            .map_err(|e| RpcError::Registry(e.to_string()))?;
        let response = client
            .request(request)
            .await
            .map_err(|e| RpcError::Registry(e.to_string()))?;

        let raw = response
            .headers()
            .get(SERVERS_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        Ok(raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect())
    }
}

#[async_trait]
impl Discovery for RegistryDiscovery {
    async fn refresh(&self) -> Result<()> {
        {
            let last_update = self.last_update.lock().unwrap();
            if matches!(*last_update, Some(at) if at.elapsed() < self.update_timeout) {
                return Ok(());
            }
        }
        debug!("refreshing servers from registry {}", self.registry_url);
        let servers = self.fetch_servers().await?;
        self.pool.update(servers).await?;
        *self.last_update.lock().unwrap() = Some(Instant::now());
        Ok(())
    }

    async fn update(&self, servers: Vec<String>) -> Result<()> {
        self.pool.update(servers).await?;
        *self.last_update.lock().unwrap() = Some(Instant::now());
        Ok(())
    }

    async fn get(&self, mode: SelectMode) -> Result<String> {
        self.refresh().await?;
        self.pool.get(mode).await
    }

    async fn get_all(&self) -> Result<Vec<String>> {
        self.refresh().await?;
        self.pool.get_all().await
    }
}
