use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::constants::{DEFAULT_CODEC, MAGIC_NUMBER};
use crate::protocol::error::{Result, RpcError};

/// Connect timeout applied when the caller does not choose one.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-connection negotiation record, sent once from client to server as a
/// self-describing JSON frame before the negotiated codec takes over.
///
/// The timeouts are hints honoured locally: the client enforces
/// `connect_timeout_ms` while dialing, the server enforces its own
/// configured handle timeout. Zero disables the bound.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use minirpc_common::Options;
///
/// let opt = Options::default()
///     .with_codec("postcard")
///     .with_connect_timeout(Duration::from_secs(1));
/// assert_eq!(opt.codec_type, "postcard");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// Must equal [`MAGIC_NUMBER`]; forced by [`parse_options`] so callers
    /// cannot corrupt negotiation.
    pub magic_number: u32,
    /// Name of the codec to frame the connection with.
    pub codec_type: String,
    /// Bound on dial plus client construction, in milliseconds. Zero waits
    /// indefinitely.
    pub connect_timeout_ms: u64,
    /// Requested bound on server-side request handling, in milliseconds.
    /// The server is free to ignore it in favour of its own configuration.
    pub handle_timeout_ms: u64,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            magic_number: MAGIC_NUMBER,
            codec_type: DEFAULT_CODEC.to_string(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
            handle_timeout_ms: 0,
        }
    }
}

impl Options {
    /// Selects the codec by name.
    pub fn with_codec(mut self, codec_type: impl Into<String>) -> Self {
        self.codec_type = codec_type.into();
        self
    }

    /// Sets the connect timeout. `Duration::ZERO` disables the bound.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Sets the handle-timeout hint.
    pub fn with_handle_timeout(mut self, timeout: Duration) -> Self {
        self.handle_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// The connect timeout as a duration, `None` when unbounded.
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_ms > 0).then(|| Duration::from_millis(self.connect_timeout_ms))
    }

    /// The handle-timeout hint as a duration, `None` when unbounded.
    pub fn handle_timeout(&self) -> Option<Duration> {
        (self.handle_timeout_ms > 0).then(|| Duration::from_millis(self.handle_timeout_ms))
    }
}

/// Resolves the options a dial entry point was given.
///
/// An empty slice yields the defaults; more than one element fails with
/// [`RpcError::OptionsEmpty`]. The magic number is always forced to the
/// protocol constant and an empty codec name falls back to the default.
pub fn parse_options(opts: &[Options]) -> Result<Options> {
    if opts.is_empty() {
        return Ok(Options::default());
    }
    if opts.len() != 1 {
        return Err(RpcError::OptionsEmpty);
    }
    let mut opt = opts[0].clone();
    opt.magic_number = MAGIC_NUMBER;
    if opt.codec_type.is_empty() {
        opt.codec_type = DEFAULT_CODEC.to_string();
    }
    Ok(opt)
}
