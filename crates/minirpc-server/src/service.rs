use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use minirpc_common::{Encoding, Result, RpcError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

type MethodFuture = BoxFuture<'static, std::result::Result<Vec<u8>, String>>;
type MethodFn = Box<dyn Fn(Encoding, Vec<u8>) -> MethodFuture + Send + Sync>;

/// One remotely-callable method: a type-erased handler plus a call counter.
///
/// The handler decodes the request body with the connection's codec, runs
/// the registered function and encodes its reply; an application error
/// becomes the reply header's error string.
pub struct MethodType {
    handler: MethodFn,
    num_calls: AtomicU64,
}

impl std::fmt::Debug for MethodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodType")
            .field("num_calls", &self.num_calls)
            .finish_non_exhaustive()
    }
}

impl MethodType {
    /// How many times this method has been invoked.
    pub fn num_calls(&self) -> u64 {
        self.num_calls.load(Ordering::Relaxed)
    }
}

/// A named group of methods exposed as RPC endpoints.
///
/// The service name must be an exported-style identifier (leading uppercase
/// ASCII letter, then alphanumerics or underscores); it forms the left half
/// of the dotted `Service.Method` names clients call. Method shape is
/// enforced by the bounds on [`Service::method`]: one deserializable
/// argument in, one serializable reply out, with a displayable error.
pub struct Service {
    name: String,
    methods: HashMap<String, Arc<MethodType>>,
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Service {
    /// Creates an empty service, rejecting names that are not exported-style
    /// identifiers.
    pub fn new(name: impl Into<String>) -> Result<Service> {
        let name = name.into();
        if !is_exported(&name) {
            return Err(RpcError::InvalidServiceName(name));
        }
        Ok(Service {
            name,
            methods: HashMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers `f` under `name`. Methods whose names are not
    /// exported-style identifiers are skipped.
    pub fn method<A, R, E, F, Fut>(mut self, name: impl Into<String>, f: F) -> Service
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        E: Display + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, E>> + Send + 'static,
    {
        let name = name.into();
        if !is_exported(&name) {
            warn!("skipping method {}.{}: not an exported name", self.name, name);
            return self;
        }
        let f = Arc::new(f);
        let handler: MethodFn = Box::new(move |encoding, body| {
            let f = Arc::clone(&f);
            async move {
                let argv: A = encoding
                    .decode(&body)
                    .map_err(|e| format!("reading body: {}", e))?;
                let replyv = f(argv).await.map_err(|e| e.to_string())?;
                encoding.encode(&replyv).map_err(|e| e.to_string())
            }
            .boxed()
        });
        self.methods.insert(
            name,
            Arc::new(MethodType {
                handler,
                num_calls: AtomicU64::new(0),
            }),
        );
        self
    }

    pub(crate) fn get_method(&self, name: &str) -> Option<Arc<MethodType>> {
        self.methods.get(name).cloned()
    }

    /// Invokes `method` with the raw request body, bumping its call counter.
    /// The error string, if any, travels back in the reply header.
    pub async fn call(
        &self,
        method: &MethodType,
        encoding: Encoding,
        argv: Vec<u8>,
    ) -> std::result::Result<Vec<u8>, String> {
        method.num_calls.fetch_add(1, Ordering::Relaxed);
        (method.handler)(encoding, argv).await
    }
}

fn is_exported(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
