use minirpc_common::{Encoding, Result, RpcError};
use serde::de::DeserializeOwned;
use tokio::sync::oneshot;

/// Raw reply bytes on success, the failure otherwise. Delivered through the
/// call's oneshot channel, which guarantees a call is resolved at most once.
pub(crate) type CallOutcome = std::result::Result<Vec<u8>, RpcError>;

/// One in-flight RPC exchange, returned by [`Client::go`](crate::Client::go).
///
/// Await [`Call::done`] for the outcome; dropping the handle abandons the
/// call and any late reply is drained by the receive loop.
pub struct Call {
    pub(crate) seq: u64,
    pub(crate) service_method: String,
    pub(crate) encoding: Encoding,
    pub(crate) rx: oneshot::Receiver<CallOutcome>,
}

impl Call {
    /// The sequence number this call was registered under; zero if
    /// registration failed.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// The dotted endpoint name this call targets.
    pub fn service_method(&self) -> &str {
        &self.service_method
    }

    /// Resolves when the call completes, decoding the reply.
    pub async fn done<R: DeserializeOwned>(self) -> Result<R> {
        match self.rx.await {
            Ok(Ok(body)) => self.encoding.decode(&body),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(RpcError::Shutdown),
        }
    }
}
