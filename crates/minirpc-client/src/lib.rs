//! minirpc Client
//!
//! This crate provides the call-multiplexing side of minirpc: one duplex
//! connection carries any number of concurrent logical calls, each tagged
//! with a monotonically allocated sequence number. A single receive task
//! demultiplexes replies back to their waiters; outbound frames are
//! serialised by a sending lock so no two ever interleave.
//!
//! # Failure Model
//!
//! Application errors (a method returned an error, a bad endpoint name)
//! travel back in reply headers and affect only their own call. Transport
//! errors terminate the connection: the receive task fans the error out to
//! every pending call and the client refuses new submissions with
//! `Shutdown`.
//!
//! # Usage
//!
//! ```rust,no_run
//! use minirpc_client::dial;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Args { num1: i64, num2: i64 }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = dial("tcp", "127.0.0.1:9999", &[]).await?;
//!     let sum: i64 = client.call("Arith.Sum", &Args { num1: 1, num2: 3 }).await?;
//!     println!("sum = {}", sum);
//!     Ok(())
//! }
//! ```

pub mod call;
pub mod client;

pub use call::Call;
pub use client::{dial, dial_http, x_dial, Client};
