use std::time::Duration;

/// Sentinel sent in every [`Options`](super::Options) record. A connection
/// whose first frame carries anything else is closed without a reply.
pub const MAGIC_NUMBER: u32 = 0x3bef5c;

/// Status line body of a successful HTTP CONNECT upgrade. Bit-exact protocol
/// constant; both sides compare against it verbatim.
pub const CONNECTED: &str = "200 Connected to Mini RPC";

/// Path an RPC server answers CONNECT upgrades on.
pub const DEFAULT_RPC_PATH: &str = "/_minirpc_";

/// Path the registry HTTP service is mounted at.
pub const DEFAULT_REGISTRY_PATH: &str = "/_minirpc_/registry";

/// Codec negotiated when the client does not ask for one.
pub const DEFAULT_CODEC: &str = "json";

/// How long a registry entry stays alive without a heartbeat.
pub const DEFAULT_REGISTRY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// How long a registry-backed discovery trusts its cached server list.
pub const DEFAULT_UPDATE_TIMEOUT: Duration = Duration::from_secs(10);
