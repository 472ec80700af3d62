//! minirpc Server
//!
//! This crate provides the request-dispatch side of minirpc: a service
//! registry mapping dotted `Service.Method` names to typed handlers, and a
//! server that negotiates a codec per connection, reads framed requests in a
//! serial loop and dispatches each one on its own task.
//!
//! # Dispatch Model
//!
//! The read loop is strictly serial so header/body framing stays aligned;
//! handlers run concurrently and their responses are serialised by a
//! per-connection sending lock, so no two reply frames ever interleave.
//! A configurable handle timeout bounds each request; on elapse the server
//! replies with a timeout error and discards whatever the detached handler
//! eventually produces.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use minirpc_server::{Server, ServerOptions, Service};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Args { num1: i64, num2: i64 }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = Service::new("Arith")?
//!     .method("Sum", |args: Args| async move {
//!         Ok::<_, String>(args.num1 + args.num2)
//!     });
//!
//! let server = Arc::new(Server::new());
//! server.register(service)?;
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
//! server.accept(listener, ServerOptions::default()).await;
//! # Ok(())
//! # }
//! ```

pub mod http;
pub mod server;
pub mod service;

pub use server::{Server, ServerOptions};
pub use service::{MethodType, Service};
