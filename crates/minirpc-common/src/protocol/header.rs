use serde::{Deserialize, Serialize};

/// Message header, sent before each body in both directions.
///
/// `error` is empty on requests and on successful replies; a reply whose
/// `error` is non-empty carries a placeholder body that the receiver drains
/// without decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Dotted endpoint name, `"Service.Method"`.
    pub service_method: String,
    /// Call sequence number; allocated monotonically from 1 by the client.
    pub seq: u64,
    /// Error message, populated on failed replies.
    pub error: String,
}
