use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use minirpc_common::protocol::MAGIC_NUMBER;
use minirpc_common::transport::{self, CodecReader, CodecWriter, Connection, Encoding};
use minirpc_common::{Header, Result, RpcError};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::service::{MethodType, Service};

/// Locally-enforced limits for a serving listener.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerOptions {
    /// Wall-clock bound on a single request's handler. Zero disables it.
    pub handle_timeout: Duration,
}

impl ServerOptions {
    pub fn with_handle_timeout(mut self, timeout: Duration) -> Self {
        self.handle_timeout = timeout;
        self
    }
}

/// The request-dispatch server.
///
/// Holds the service map and serves any number of connections; every
/// connection gets its own task, every request its own handler task, and
/// replies on one connection are serialised by a per-connection sending
/// lock.
pub struct Server {
    services: RwLock<HashMap<String, Arc<Service>>>,
}

impl Default for Server {
    fn default() -> Self {
        Server::new()
    }
}

impl Server {
    pub fn new() -> Server {
        Server {
            services: RwLock::new(HashMap::new()),
        }
    }

    /// Publishes `service`. Registering a second service under the same name
    /// fails with [`RpcError::ServiceAlreadyDefined`] and leaves the first
    /// registration untouched.
    pub fn register(&self, service: Service) -> Result<()> {
        let mut services = self.services.write().unwrap();
        match services.entry(service.name().to_string()) {
            Entry::Occupied(_) => Err(RpcError::ServiceAlreadyDefined(
                service.name().to_string(),
            )),
            Entry::Vacant(slot) => {
                debug!("registered service {}", service.name());
                slot.insert(Arc::new(service));
                Ok(())
            }
        }
    }

    /// Resolves a dotted `Service.Method` name, splitting at the last dot.
    fn find_service(&self, service_method: &str) -> Result<(Arc<Service>, Arc<MethodType>)> {
        let Some((service_name, method_name)) = service_method.rsplit_once('.') else {
            return Err(RpcError::ServiceIllFormed(service_method.to_string()));
        };
        let service = {
            let services = self.services.read().unwrap();
            services
                .get(service_name)
                .ok_or_else(|| RpcError::ServiceNotFound(service_method.to_string()))?
                .clone()
        };
        let method = service
            .get_method(method_name)
            .ok_or_else(|| RpcError::ServiceNotFound(service_method.to_string()))?;
        Ok((service, method))
    }

    /// Accepts connections until the listener fails, serving each one on its
    /// own task.
    pub async fn accept(self: Arc<Self>, listener: TcpListener, options: ServerOptions) {
        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    debug!("connection established from {}", peer_addr);
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        server.serve_conn(Box::new(stream), options).await;
                    });
                }
                Err(e) => {
                    error!("accept error: {}", e);
                    return;
                }
            }
        }
    }

    /// Negotiates one connection and serves requests on it until it dies.
    /// Negotiation failures are logged and the connection dropped; they
    /// never take the process down.
    pub async fn serve_conn(&self, mut conn: Box<dyn Connection>, options: ServerOptions) {
        let opt = match transport::read_options(&mut conn).await {
            Ok(opt) => opt,
            Err(e) => {
                error!("options error: {}", e);
                return;
            }
        };
        if opt.magic_number != MAGIC_NUMBER {
            error!("{}", RpcError::InvalidMagicNumber(opt.magic_number));
            return;
        }
        let Some(encoding) = Encoding::from_name(&opt.codec_type) else {
            error!("{}", RpcError::InvalidCodecType(opt.codec_type));
            return;
        };
        self.serve_codec(conn, encoding, options.handle_timeout).await;
    }

    /// Per-connection serve loop: strictly serial reads, concurrent
    /// handlers, serialised writes.
    async fn serve_codec(
        &self,
        conn: Box<dyn Connection>,
        encoding: Encoding,
        handle_timeout: Duration,
    ) {
        let (mut reader, writer) = transport::open(conn, encoding);
        let sending = Arc::new(Mutex::new(writer));
        let mut handlers = JoinSet::new();

        loop {
            match self.read_request(&mut reader).await {
                Ok(request) => {
                    handlers.spawn(handle_request(
                        request,
                        encoding,
                        Arc::clone(&sending),
                        handle_timeout,
                    ));
                }
                Err(ReadError::Invalid { mut header, source }) => {
                    header.error = source.to_string();
                    send_response(&sending, &header, &()).await;
                }
                Err(ReadError::Fatal(e)) => {
                    if !e.is_disconnect() {
                        error!("read header error: {}", e);
                    }
                    break;
                }
            }
        }

        // let in-flight handlers finish before tearing the codec down
        while handlers.join_next().await.is_some() {}
        let _ = sending.lock().await.close().await;
    }

    async fn read_request(
        &self,
        reader: &mut CodecReader,
    ) -> std::result::Result<Request, ReadError> {
        let header = reader.read_header().await.map_err(ReadError::Fatal)?;
        match self.find_service(&header.service_method) {
            Ok((service, method)) => {
                let argv = reader.read_body_raw().await.map_err(ReadError::Fatal)?;
                Ok(Request {
                    header,
                    argv,
                    service,
                    method,
                })
            }
            Err(source) => {
                // the body frame still has to be consumed so the stream
                // stays aligned for the next request
                reader.discard_body().await.map_err(ReadError::Fatal)?;
                Err(ReadError::Invalid { header, source })
            }
        }
    }
}

struct Request {
    header: Header,
    argv: Vec<u8>,
    service: Arc<Service>,
    method: Arc<MethodType>,
}

enum ReadError {
    /// The header named an unusable endpoint; the connection is still
    /// aligned and stays up.
    Invalid { header: Header, source: RpcError },
    /// The stream is unusable; the serve loop exits.
    Fatal(RpcError),
}

/// Dispatches one request under the handle timeout and writes exactly one
/// reply: the method's result, its error, or the timeout error. On elapse
/// the worker keeps running detached and its eventual result is dropped.
async fn handle_request(
    request: Request,
    encoding: Encoding,
    sending: Arc<Mutex<CodecWriter>>,
    handle_timeout: Duration,
) {
    let Request {
        mut header,
        argv,
        service,
        method,
    } = request;

    let worker = tokio::spawn(async move { service.call(&method, encoding, argv).await });
    let outcome = if handle_timeout.is_zero() {
        Some(worker.await)
    } else {
        tokio::time::timeout(handle_timeout, worker).await.ok()
    };

    match outcome {
        None => {
            header.error = RpcError::HandleTimeout.to_string();
            send_response(&sending, &header, &()).await;
        }
        Some(Ok(Ok(reply))) => {
            send_response_raw(&sending, &header, &reply).await;
        }
        Some(Ok(Err(message))) => {
            header.error = message;
            send_response(&sending, &header, &()).await;
        }
        Some(Err(join_err)) => {
            header.error = format!("rpc server: handler panicked: {}", join_err);
            send_response(&sending, &header, &()).await;
        }
    }
}

async fn send_response<T: Serialize>(sending: &Mutex<CodecWriter>, header: &Header, body: &T) {
    let mut writer = sending.lock().await;
    if let Err(e) = writer.write(header, body).await {
        error!("write response error: {}", e);
    }
}

async fn send_response_raw(sending: &Mutex<CodecWriter>, header: &Header, body: &[u8]) {
    let mut writer = sending.lock().await;
    if let Err(e) = writer.write_raw(header, body).await {
        error!("write response error: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize)]
    struct Args {
        num1: i64,
        num2: i64,
    }

    fn arith_service() -> Service {
        Service::new("Arith")
            .unwrap()
            .method("Sum", |args: Args| async move {
                Ok::<_, String>(args.num1 + args.num2)
            })
    }

    #[test]
    fn test_register_twice_fails() {
        let server = Server::new();
        server.register(arith_service()).unwrap();

        let err = server.register(arith_service()).unwrap_err();
        assert!(matches!(err, RpcError::ServiceAlreadyDefined(name) if name == "Arith"));

        // the first registration must survive
        assert!(server.find_service("Arith.Sum").is_ok());
    }

    #[test]
    fn test_find_service_requires_dot() {
        let server = Server::new();
        server.register(arith_service()).unwrap();

        let err = server.find_service("ArithSum").unwrap_err();
        assert!(matches!(err, RpcError::ServiceIllFormed(_)));
    }

    #[test]
    fn test_find_service_unknown() {
        let server = Server::new();
        server.register(arith_service()).unwrap();

        assert!(matches!(
            server.find_service("Nope.Sum").unwrap_err(),
            RpcError::ServiceNotFound(_)
        ));
        assert!(matches!(
            server.find_service("Arith.Nope").unwrap_err(),
            RpcError::ServiceNotFound(_)
        ));
    }

    #[test]
    fn test_find_service_splits_at_last_dot() {
        let server = Server::new();
        server.register(arith_service()).unwrap();

        // "A.B.C" resolves service "A.B", not "A"
        assert!(matches!(
            server.find_service("Arith.Sum.Extra").unwrap_err(),
            RpcError::ServiceNotFound(_)
        ));
    }
}
