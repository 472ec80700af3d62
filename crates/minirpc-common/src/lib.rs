//! minirpc Common Types and Transport
//!
//! This crate provides the protocol definitions, the codec layer and the
//! stream transport shared by the minirpc client and server.
//!
//! # Overview
//!
//! minirpc multiplexes many concurrent logical calls over a single duplex
//! connection. A connection starts with one JSON-encoded negotiation record
//! ([`Options`]) and then carries a sequence of framed `(Header, Body)` pairs
//! in each direction, encoded by the negotiated codec.
//!
//! # Components
//!
//! - [`protocol`] - Core protocol types (`Header`, `Options`, constants,
//!   the error taxonomy)
//! - [`transport`] - Codec selection, length-prefixed framing and stream
//!   dialing
//!
//! # Wire Format
//!
//! Every record travels as `[4-byte length as u32 big-endian] + [data]`.
//! One [`CodecWriter::write`] emits a header frame followed by a body frame;
//! the peer consumes them with one [`CodecReader::read_header`] plus one
//! body read.

pub mod protocol;
pub mod transport;

pub use protocol::error::{Result, RpcError};
pub use protocol::{parse_options, Header, Options};
pub use transport::{CodecReader, CodecWriter, Connection, Encoding};
