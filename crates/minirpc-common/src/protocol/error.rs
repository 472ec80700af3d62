use thiserror::Error;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("connection is shut down")]
    Shutdown,

    #[error("number of options is more than 1")]
    OptionsEmpty,

    #[error("rpc client: connect timeout")]
    ConnectTimeout,

    #[error("rpc client: call timeout")]
    CallTimeout,

    #[error("rpc: service already defined: {0}")]
    ServiceAlreadyDefined(String),

    #[error("rpc server: service/method request ill-formed: {0}")]
    ServiceIllFormed(String),

    #[error("rpc server: can't find service {0}")]
    ServiceNotFound(String),

    #[error("rpc server: request handle timeout")]
    HandleTimeout,

    #[error("rpc server: {0} is not a valid service name")]
    InvalidServiceName(String),

    #[error("invalid codec type {0}")]
    InvalidCodecType(String),

    #[error("invalid magic number {0:#x}")]
    InvalidMagicNumber(u32),

    #[error("unexpected HTTP response: {0}")]
    UnexpectedHttpResponse(String),

    #[error("rpc discovery: no available servers")]
    NoAvailableServers,

    #[error("rpc discovery: not supported select mode")]
    NotSupportedSelectMode,

    /// An error reported by the remote peer in a reply header, surfaced to
    /// the caller with its message intact.
    #[error("{0}")]
    Remote(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("rpc registry: {0}")]
    Registry(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("serialization error: {0}")]
    Postcard(#[from] postcard::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RpcError {
    /// Whether this is an orderly peer-went-away error rather than a
    /// protocol violation. Serve loops exit quietly on these.
    pub fn is_disconnect(&self) -> bool {
        match self {
            RpcError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::NotConnected
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
