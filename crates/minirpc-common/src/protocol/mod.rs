//! minirpc Protocol Definitions
//!
//! This module defines the records that travel on the wire and the error
//! taxonomy used throughout the framework.
//!
//! # Protocol Types
//!
//! - **[`Header`]**: precedes every message in both directions; carries the
//!   dotted `Service.Method` name, the call sequence number and an error
//!   string (empty on requests and successful replies)
//! - **[`Options`]**: the per-connection negotiation record, sent once from
//!   client to server as a self-describing JSON frame
//! - **[`RpcError`]**: the error taxonomy, with a crate-wide [`Result`] alias

pub mod constants;
pub mod error;
pub mod header;
pub mod option;

#[cfg(test)]
mod tests;

pub use constants::*;
pub use error::{Result, RpcError};
pub use header::Header;
pub use option::{parse_options, Options, DEFAULT_CONNECT_TIMEOUT};
