use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use minirpc_common::protocol::{parse_options, CONNECTED, DEFAULT_RPC_PATH};
use minirpc_common::transport::{self, CodecReader, CodecWriter, Connection, Encoding};
use minirpc_common::{Header, Options, Result, RpcError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{oneshot, Mutex};
use tracing::debug;

use crate::call::{Call, CallOutcome};

/// The call-multiplexing client.
///
/// Cheap to clone; all clones share one connection, one pending table and
/// one receive task. Calls may be issued concurrently from any number of
/// tasks; replies are correlated by sequence number, not by ordering.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

struct Inner {
    encoding: Encoding,
    /// The negotiated options, retained for reference.
    opt: Options,
    /// Serialises outbound frames. Also guards the reusable request header:
    /// `send` holds this lock for the whole write, so reusing one header
    /// across calls is safe.
    sending: Mutex<Sending>,
    /// Guards the pending table, the sequence counter and the lifecycle
    /// flags. Never held across an await point.
    state: StdMutex<State>,
}

struct Sending {
    writer: CodecWriter,
    header: Header,
}

struct State {
    seq: u64,
    pending: HashMap<u64, oneshot::Sender<CallOutcome>>,
    /// Set by an explicit `close`.
    closing: bool,
    /// Set on terminal transport failure.
    shutdown: bool,
}

impl Client {
    /// Negotiates the codec on `conn` and spawns the receive loop.
    pub async fn new(mut conn: Box<dyn Connection>, opt: Options) -> Result<Client> {
        let encoding = Encoding::from_name(&opt.codec_type)
            .ok_or_else(|| RpcError::InvalidCodecType(opt.codec_type.clone()))?;
        transport::write_options(&mut conn, &opt).await?;

        let (reader, writer) = transport::open(conn, encoding);
        let inner = Arc::new(Inner {
            encoding,
            opt,
            sending: Mutex::new(Sending {
                writer,
                header: Header::default(),
            }),
            state: StdMutex::new(State {
                seq: 1,
                pending: HashMap::new(),
                closing: false,
                shutdown: false,
            }),
        });
        tokio::spawn(receive(Arc::clone(&inner), reader));
        Ok(Client { inner })
    }

    /// Upgrades `conn` with an HTTP CONNECT handshake before negotiating.
    pub async fn new_http(mut conn: Box<dyn Connection>, opt: Options) -> Result<Client> {
        conn.write_all(format!("CONNECT {} HTTP/1.0\n\n", DEFAULT_RPC_PATH).as_bytes())
            .await?;
        let status_line = read_status_line(&mut conn).await?;
        if status_line != format!("HTTP/1.0 {}", CONNECTED) {
            return Err(RpcError::UnexpectedHttpResponse(status_line));
        }
        Client::new(conn, opt).await
    }

    /// Submits a call asynchronously. The returned handle resolves when the
    /// reply arrives or the call fails; a submission failure (shutdown,
    /// encoding, write) is delivered through the handle as well.
    pub async fn go<A: Serialize>(&self, service_method: &str, args: &A) -> Call {
        let (tx, rx) = oneshot::channel();
        let mut call = Call {
            seq: 0,
            service_method: service_method.to_string(),
            encoding: self.inner.encoding,
            rx,
        };
        match self.inner.encoding.encode(args) {
            Ok(body) => call.seq = self.send(service_method, body, tx).await,
            Err(e) => {
                let _ = tx.send(Err(e));
            }
        }
        call
    }

    async fn send(
        &self,
        service_method: &str,
        body: Vec<u8>,
        tx: oneshot::Sender<CallOutcome>,
    ) -> u64 {
        let mut sending = self.inner.sending.lock().await;

        let seq = match self.inner.register_call(tx) {
            Ok(seq) => seq,
            Err((tx, e)) => {
                let _ = tx.send(Err(e));
                return 0;
            }
        };

        sending.header.service_method = service_method.to_string();
        sending.header.seq = seq;
        sending.header.error.clear();

        let written = {
            let Sending { writer, header } = &mut *sending;
            writer.write_raw(header, &body).await
        };
        if let Err(e) = written {
            // unless a concurrent receive already claimed the call
            if let Some(tx) = self.inner.remove_call(seq) {
                let _ = tx.send(Err(e));
            }
        }
        seq
    }

    /// Issues a call and waits for its reply.
    pub async fn call<A, R>(&self, service_method: &str, args: &A) -> Result<R>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        self.go(service_method, args).await.done().await
    }

    /// Issues a call bounded by `timeout`. On elapse the pending slot is
    /// released and [`RpcError::CallTimeout`] returned without waiting for
    /// the server; a late reply is drained as an orphan.
    pub async fn call_with_timeout<A, R>(
        &self,
        service_method: &str,
        args: &A,
        timeout: Duration,
    ) -> Result<R>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        let call = self.go(service_method, args).await;
        let seq = call.seq();
        match tokio::time::timeout(timeout, call.done()).await {
            Ok(result) => result,
            Err(_) => {
                self.inner.remove_call(seq);
                Err(RpcError::CallTimeout)
            }
        }
    }

    /// Closes the connection. The receive loop observes the close and fans
    /// the failure out to any calls still pending. A second close fails
    /// with [`RpcError::Shutdown`].
    pub async fn close(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock().unwrap();
            if state.closing {
                return Err(RpcError::Shutdown);
            }
            state.closing = true;
        }
        self.inner.sending.lock().await.writer.close().await
    }

    /// Whether the client can still submit calls.
    pub fn is_available(&self) -> bool {
        let state = self.inner.state.lock().unwrap();
        !state.shutdown && !state.closing
    }

    /// The options this connection was negotiated with.
    pub fn options(&self) -> &Options {
        &self.inner.opt
    }
}

impl Inner {
    fn register_call(
        &self,
        tx: oneshot::Sender<CallOutcome>,
    ) -> std::result::Result<u64, (oneshot::Sender<CallOutcome>, RpcError)> {
        let mut state = self.state.lock().unwrap();
        if state.closing || state.shutdown {
            return Err((tx, RpcError::Shutdown));
        }
        let seq = state.seq;
        state.seq += 1;
        state.pending.insert(seq, tx);
        Ok(seq)
    }

    fn remove_call(&self, seq: u64) -> Option<oneshot::Sender<CallOutcome>> {
        self.state.lock().unwrap().pending.remove(&seq)
    }
}

/// The per-connection receive loop: demultiplexes replies to their waiters
/// and, on transport failure, terminates every pending call.
async fn receive(inner: Arc<Inner>, mut reader: CodecReader) {
    let err: RpcError = loop {
        let header = match reader.read_header().await {
            Ok(header) => header,
            Err(e) => break e,
        };
        match inner.remove_call(header.seq) {
            // reply for a cancelled or unknown call; consume its body so the
            // stream stays aligned
            None => {
                if let Err(e) = reader.discard_body().await {
                    break e;
                }
            }
            Some(tx) if !header.error.is_empty() => {
                let drained = reader.discard_body().await;
                let _ = tx.send(Err(RpcError::Remote(header.error)));
                if let Err(e) = drained {
                    break e;
                }
            }
            Some(tx) => match reader.read_body_raw().await {
                Ok(body) => {
                    let _ = tx.send(Ok(body));
                }
                Err(e) => {
                    let _ = tx.send(Err(RpcError::Transport(format!("reading body: {}", e))));
                    break e;
                }
            },
        }
    };
    debug!("receive loop terminated: {}", err);
    terminate_calls(&inner, &err).await;
}

/// Fans `err` out to every pending call and refuses further registration.
/// Lock order is sending before state, matching every other writer path.
async fn terminate_calls(inner: &Inner, err: &RpcError) {
    let _sending = inner.sending.lock().await;
    let mut state = inner.state.lock().unwrap();
    state.shutdown = true;
    for (_, tx) in state.pending.drain() {
        let _ = tx.send(Err(RpcError::Transport(err.to_string())));
    }
}

async fn read_status_line(conn: &mut Box<dyn Connection>) -> Result<String> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        conn.read_exact(&mut byte).await?;
        head.push(byte[0]);
        if head.ends_with(b"\n\n") || head.ends_with(b"\r\n\r\n") {
            break;
        }
        if head.len() > 8 * 1024 {
            return Err(RpcError::UnexpectedHttpResponse(
                "oversized response head".to_string(),
            ));
        }
    }
    let head = String::from_utf8_lossy(&head);
    Ok(head.lines().next().unwrap_or_default().trim_end().to_string())
}

/// Dials `address` over `network` and negotiates a client, all bounded by
/// the options' connect timeout.
pub async fn dial(network: &str, address: &str, opts: &[Options]) -> Result<Client> {
    dial_timeout(Client::new, network, address, opts).await
}

/// Like [`dial`], tunnelling through an HTTP CONNECT upgrade.
pub async fn dial_http(network: &str, address: &str, opts: &[Options]) -> Result<Client> {
    dial_timeout(Client::new_http, network, address, opts).await
}

/// Dials a `protocol@address` endpoint: `http@host:port` upgrades over
/// CONNECT, anything else dials that network directly (`tcp@…`, `unix@…`).
pub async fn x_dial(rpc_addr: &str, opts: &[Options]) -> Result<Client> {
    let Some((protocol, addr)) = rpc_addr.split_once('@') else {
        return Err(RpcError::Transport(format!(
            "wrong format {:?}, expect protocol@addr",
            rpc_addr
        )));
    };
    match protocol {
        "http" => dial_http("tcp", addr, opts).await,
        _ => dial(protocol, addr, opts).await,
    }
}

async fn dial_timeout<F, Fut>(
    new_client: F,
    network: &str,
    address: &str,
    opts: &[Options],
) -> Result<Client>
where
    F: FnOnce(Box<dyn Connection>, Options) -> Fut,
    Fut: Future<Output = Result<Client>>,
{
    let opt = parse_options(opts)?;
    let connect_timeout = opt.connect_timeout();
    let conn = transport::connect(network, address, connect_timeout).await?;
    match connect_timeout {
        None => new_client(conn, opt).await,
        // on elapse the construction future is dropped, closing the
        // connection with it
        Some(bound) => match tokio::time::timeout(bound, new_client(conn, opt)).await {
            Ok(result) => result,
            Err(_) => Err(RpcError::ConnectTimeout),
        },
    }
}
