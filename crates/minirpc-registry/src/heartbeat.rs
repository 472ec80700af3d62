use std::time::Duration;

use http_body_util::Empty;
use hyper::body::Bytes;
use hyper::{Method, Request};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use minirpc_common::protocol::DEFAULT_REGISTRY_TIMEOUT;
use minirpc_common::{Result, RpcError};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::registry::SERVER_HEADER;

/// Announces `addr` to the registry at `registry_url` immediately and then
/// on every period, stopping at the first failed send. The default period
/// leaves a minute of slack before the registry's TTL.
pub fn heartbeat(registry_url: String, addr: String, period: Option<Duration>) -> JoinHandle<()> {
    let period =
        period.unwrap_or_else(|| DEFAULT_REGISTRY_TIMEOUT.saturating_sub(Duration::from_secs(60)));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if let Err(e) = send_heartbeat(&registry_url, &addr).await {
                error!("heartbeat to {} failed: {}", registry_url, e);
                return;
            }
            debug!("sent heartbeat for {} to {}", addr, registry_url);
        }
    })
}

/// Sends a single heartbeat POST.
pub async fn send_heartbeat(registry_url: &str, addr: &str) -> Result<()> {
    let client = Client::builder(TokioExecutor::new()).build_http::<Empty<Bytes>>();
    let request = Request::builder()
        .method(Method::POST)
        .uri(registry_url)
        .header(SERVER_HEADER, addr)
        .body(Empty::new())
        .map_err(|e| RpcError::Registry(e.to_string()))?;

    let response = client
        .request(request)
        .await
        .map_err(|e| RpcError::Registry(e.to_string()))?;
    if !response.status().is_success() {
        return Err(RpcError::Registry(format!(
            "heartbeat rejected: {}",
            response.status()
        )));
    }
    Ok(())
}
