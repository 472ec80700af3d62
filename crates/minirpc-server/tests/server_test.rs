//! Wire-level integration tests for the server
//!
//! These drive a serving listener with hand-framed requests so the serve
//! loop's framing, dispatch and timeout behaviour are verified without
//! going through the client crate.

use std::sync::Arc;
use std::time::Duration;

use minirpc_common::protocol::{Header, Options, MAGIC_NUMBER};
use minirpc_common::transport::{self, CodecReader, CodecWriter, Encoding};
use minirpc_common::RpcError;
use minirpc_server::{Server, ServerOptions, Service};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Args {
    num1: i64,
    num2: i64,
}

fn arith_service() -> Service {
    Service::new("Arith")
        .unwrap()
        .method("Sum", |args: Args| async move {
            Ok::<_, String>(args.num1 + args.num2)
        })
        .method("Sleep", |args: Args| async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok::<_, String>(args.num1 + args.num2)
        })
        .method("Fail", |_args: Args| async move {
            Err::<i64, _>("arith failure".to_string())
        })
}

async fn start_server(options: ServerOptions) -> String {
    let server = Arc::new(Server::new());
    server.register(arith_service()).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(server.accept(listener, options));
    addr
}

async fn negotiate(addr: &str, options: Options) -> (CodecReader, CodecWriter) {
    let mut conn: Box<dyn transport::Connection> =
        Box::new(TcpStream::connect(addr).await.unwrap());
    transport::write_options(&mut conn, &options).await.unwrap();
    let encoding = Encoding::from_name(&options.codec_type).unwrap();
    transport::open(conn, encoding)
}

fn request_header(service_method: &str, seq: u64) -> Header {
    Header {
        service_method: service_method.to_string(),
        seq,
        error: String::new(),
    }
}

#[tokio::test]
async fn test_responds_to_framed_request() {
    let addr = start_server(ServerOptions::default()).await;
    let (mut reader, mut writer) = negotiate(&addr, Options::default()).await;

    writer
        .write(&request_header("Arith.Sum", 7), &Args { num1: 2, num2: 5 })
        .await
        .unwrap();

    let reply = reader.read_header().await.unwrap();
    assert_eq!(reply.seq, 7);
    assert!(reply.error.is_empty());

    let sum: i64 = reader.read_body().await.unwrap();
    assert_eq!(sum, 7);
}

#[tokio::test]
async fn test_postcard_negotiation() {
    let addr = start_server(ServerOptions::default()).await;
    let (mut reader, mut writer) =
        negotiate(&addr, Options::default().with_codec("postcard")).await;

    writer
        .write(&request_header("Arith.Sum", 1), &Args { num1: 40, num2: 2 })
        .await
        .unwrap();

    let reply = reader.read_header().await.unwrap();
    assert!(reply.error.is_empty());
    let sum: i64 = reader.read_body().await.unwrap();
    assert_eq!(sum, 42);
}

#[tokio::test]
async fn test_ill_formed_method_keeps_connection_up() {
    let addr = start_server(ServerOptions::default()).await;
    let (mut reader, mut writer) = negotiate(&addr, Options::default()).await;

    writer
        .write(&request_header("BadMethod", 1), &Args { num1: 1, num2: 1 })
        .await
        .unwrap();

    let reply = reader.read_header().await.unwrap();
    assert_eq!(
        reply.error,
        RpcError::ServiceIllFormed("BadMethod".to_string()).to_string()
    );
    reader.discard_body().await.unwrap();

    // the connection must survive the error reply
    writer
        .write(&request_header("Arith.Sum", 2), &Args { num1: 1, num2: 3 })
        .await
        .unwrap();
    let reply = reader.read_header().await.unwrap();
    assert_eq!(reply.seq, 2);
    assert!(reply.error.is_empty());
    let sum: i64 = reader.read_body().await.unwrap();
    assert_eq!(sum, 4);
}

#[tokio::test]
async fn test_unknown_service_and_method() {
    let addr = start_server(ServerOptions::default()).await;
    let (mut reader, mut writer) = negotiate(&addr, Options::default()).await;

    writer
        .write(&request_header("Nope.Sum", 1), &Args { num1: 1, num2: 1 })
        .await
        .unwrap();
    let reply = reader.read_header().await.unwrap();
    assert!(reply.error.contains("can't find service"));
    reader.discard_body().await.unwrap();

    writer
        .write(&request_header("Arith.Nope", 2), &Args { num1: 1, num2: 1 })
        .await
        .unwrap();
    let reply = reader.read_header().await.unwrap();
    assert!(reply.error.contains("can't find service"));
    reader.discard_body().await.unwrap();
}

#[tokio::test]
async fn test_method_error_travels_in_header() {
    let addr = start_server(ServerOptions::default()).await;
    let (mut reader, mut writer) = negotiate(&addr, Options::default()).await;

    writer
        .write(&request_header("Arith.Fail", 1), &Args { num1: 0, num2: 0 })
        .await
        .unwrap();

    let reply = reader.read_header().await.unwrap();
    assert_eq!(reply.error, "arith failure");
    reader.discard_body().await.unwrap();
}

#[tokio::test]
async fn test_handle_timeout_reply() {
    let options = ServerOptions::default().with_handle_timeout(Duration::from_millis(100));
    let addr = start_server(options).await;
    let (mut reader, mut writer) = negotiate(&addr, Options::default()).await;

    writer
        .write(&request_header("Arith.Sleep", 1), &Args { num1: 1, num2: 1 })
        .await
        .unwrap();

    let reply = reader.read_header().await.unwrap();
    assert_eq!(reply.error, RpcError::HandleTimeout.to_string());
    reader.discard_body().await.unwrap();
}

#[tokio::test]
async fn test_responses_are_correlated_not_ordered() {
    let addr = start_server(ServerOptions::default()).await;
    let (mut reader, mut writer) = negotiate(&addr, Options::default()).await;

    // a slow request followed by a fast one; the fast reply arrives first
    writer
        .write(&request_header("Arith.Sleep", 1), &Args { num1: 1, num2: 1 })
        .await
        .unwrap();
    writer
        .write(&request_header("Arith.Sum", 2), &Args { num1: 2, num2: 2 })
        .await
        .unwrap();

    let first = reader.read_header().await.unwrap();
    assert_eq!(first.seq, 2);
    let sum: i64 = reader.read_body().await.unwrap();
    assert_eq!(sum, 4);

    let second = reader.read_header().await.unwrap();
    assert_eq!(second.seq, 1);
    let sum: i64 = reader.read_body().await.unwrap();
    assert_eq!(sum, 2);
}

#[tokio::test]
async fn test_bad_magic_number_closes_connection() {
    let addr = start_server(ServerOptions::default()).await;

    let mut options = Options::default();
    options.magic_number = MAGIC_NUMBER ^ 1;
    let (mut reader, mut writer) = negotiate(&addr, options).await;

    // the server drops the connection without serving; either the write or
    // the following read observes the close
    let _ = writer
        .write(&request_header("Arith.Sum", 1), &Args { num1: 1, num2: 1 })
        .await;
    assert!(reader.read_header().await.is_err());
}

#[tokio::test]
async fn test_unknown_codec_closes_connection() {
    let addr = start_server(ServerOptions::default()).await;

    let mut conn: Box<dyn transport::Connection> =
        Box::new(TcpStream::connect(&addr).await.unwrap());
    transport::write_options(&mut conn, &Options::default().with_codec("gob"))
        .await
        .unwrap();

    let (mut reader, _writer) = transport::open(conn, Encoding::Json);
    assert!(reader.read_header().await.is_err());
}
