use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;

use crate::protocol::error::{Result, RpcError};

/// A duplex byte stream the RPC protocol runs over.
///
/// Blanket-implemented for anything readable and writable, so TCP streams,
/// Unix-domain streams and in-memory duplex pipes all qualify.
pub trait Connection: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Connection for T {}

/// Dials `address` over `network` ("tcp" or "unix"), bounded by `timeout`
/// when one is given. An elapsed bound yields
/// [`RpcError::ConnectTimeout`].
pub async fn connect(
    network: &str,
    address: &str,
    timeout: Option<Duration>,
) -> Result<Box<dyn Connection>> {
    match timeout {
        None => dial(network, address).await,
        Some(bound) => match tokio::time::timeout(bound, dial(network, address)).await {
            Ok(result) => result,
            Err(_) => Err(RpcError::ConnectTimeout),
        },
    }
}

async fn dial(network: &str, address: &str) -> Result<Box<dyn Connection>> {
    match network {
        "tcp" => Ok(Box::new(TcpStream::connect(address).await?)),
        #[cfg(unix)]
        "unix" => Ok(Box::new(UnixStream::connect(address).await?)),
        other => Err(RpcError::Transport(format!(
            "unsupported network {other:?}"
        ))),
    }
}
