//! minirpc Transport Layer
//!
//! This module provides codec selection, length-prefixed framing and stream
//! dialing for RPC connections.
//!
//! # Architecture
//!
//! - **[`Encoding`]**: the codec selector, resolved by name during
//!   negotiation; encodes and decodes headers and bodies
//! - **[`CodecReader`]** / **[`CodecWriter`]**: the framed halves of a
//!   negotiated connection
//! - **[`connect`]**: dials `"tcp"` or `"unix"` endpoints under an optional
//!   connect timeout
//!
//! # Wire Format
//!
//! `[4-byte length prefix as u32 big-endian] + [data]` per frame, with a
//! 100 MB cap on the read side to bound allocations.

pub mod codec;
pub mod connect;
pub mod wire;


pub use codec::Encoding;
pub use connect::{connect, Connection};
pub use wire::{open, read_options, write_options, CodecReader, CodecWriter};
