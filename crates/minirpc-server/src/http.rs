//! HTTP CONNECT upgrade transport
//!
//! Clients that must traverse HTTP infrastructure send a single
//! `CONNECT /_minirpc_ HTTP/1.0` request; the server hijacks the stream,
//! answers with the fixed `200 Connected to Mini RPC` status line and then
//! speaks the ordinary framed protocol on the raw bytes.

use std::sync::Arc;

use minirpc_common::protocol::{CONNECTED, DEFAULT_RPC_PATH};
use minirpc_common::transport::Connection;
use minirpc_common::{Result, RpcError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, error};

use crate::server::{Server, ServerOptions};

/// Caps the request head so a stray client cannot feed us forever.
const MAX_HEAD_SIZE: usize = 8 * 1024;

impl Server {
    /// Accepts HTTP CONNECT upgrades until the listener fails, serving each
    /// upgraded connection on its own task.
    pub async fn serve_http(self: Arc<Self>, listener: TcpListener, options: ServerOptions) {
        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    debug!("http connection established from {}", peer_addr);
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        server.serve_http_conn(Box::new(stream), options).await;
                    });
                }
                Err(e) => {
                    error!("accept error: {}", e);
                    return;
                }
            }
        }
    }

    /// Performs the CONNECT handshake on one connection, then serves RPC on
    /// the hijacked stream.
    pub async fn serve_http_conn(&self, mut conn: Box<dyn Connection>, options: ServerOptions) {
        let head = match read_request_head(&mut conn).await {
            Ok(head) => head,
            Err(e) => {
                error!("reading CONNECT request: {}", e);
                return;
            }
        };
        let request_line = head.lines().next().unwrap_or_default();
        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or_default();
        let path = parts.next().unwrap_or_default();

        if method != "CONNECT" || path != DEFAULT_RPC_PATH {
            let _ = conn.write_all(b"HTTP/1.0 405 must CONNECT\n\n").await;
            return;
        }
        if let Err(e) = conn
            .write_all(format!("HTTP/1.0 {}\n\n", CONNECTED).as_bytes())
            .await
        {
            error!("writing CONNECT reply: {}", e);
            return;
        }
        self.serve_conn(conn, options).await;
    }
}

/// Reads bytes up to the blank line ending an HTTP/1.0 request head.
async fn read_request_head(conn: &mut Box<dyn Connection>) -> Result<String> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        conn.read_exact(&mut byte).await?;
        head.push(byte[0]);
        if head.ends_with(b"\n\n") || head.ends_with(b"\r\n\r\n") {
            break;
        }
        if head.len() > MAX_HEAD_SIZE {
            return Err(RpcError::Transport("request head too large".to_string()));
        }
    }
    Ok(String::from_utf8_lossy(&head).into_owned())
}
