//! minirpc Registry and Discovery
//!
//! The collaborators that surround the RPC core: a registry HTTP service
//! that servers announce themselves to, a heartbeat task that keeps those
//! announcements fresh, and the discovery layer multi-server clients use to
//! pick an endpoint.
//!
//! # Protocol
//!
//! The registry speaks plain HTTP at `/_minirpc_/registry`:
//!
//! - `POST` with an `x-minirpc-server` header upserts that address
//! - `GET` answers with the alive addresses, sorted and comma-joined, in
//!   the `x-minirpc-servers` response header
//!
//! Entries expire after the registry's TTL unless refreshed by a heartbeat.
//!
//! # Components
//!
//! - [`Registry`] - the TTL-evicting address map and its HTTP service
//! - [`heartbeat`] - periodic re-announcement for a serving address
//! - [`Discovery`] - selection contract, with [`MultiServersDiscovery`]
//!   (static pool) and [`RegistryDiscovery`] (registry-refreshed pool)

pub mod discovery;
pub mod heartbeat;
pub mod registry;

pub use discovery::{Discovery, MultiServersDiscovery, RegistryDiscovery, SelectMode};
pub use heartbeat::{heartbeat, send_heartbeat};
pub use registry::{Registry, SERVERS_HEADER, SERVER_HEADER};
