//! Client endpoint behavior over in-memory and fault-injecting streams.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod support;

use std::sync::atomic::Ordering;

use bytes::BytesMut;
use serde_json::{json, Value};
use tokio::io::{duplex, AsyncWriteExt};
use tokio::sync::mpsc;

use tcpbus_core::{Envelope, ErrorCode};
use tcpbus_endpoint::config::ConnectionSection;
use tcpbus_endpoint::{ClientEndpoint, MessageEndpoint};

use support::{eventually, foreign_handle, fwd, next_event, read_envelope, record, FaultyStream};

#[tokio::test]
async fn explicit_target_is_invalid_and_writes_nothing() {
    let (stream, writes) = FaultyStream::new(false);
    let client = ClientEndpoint::from_stream(stream, "server", ConnectionSection::default());

    for target in [client.server_handle(), foreign_handle()] {
        let err = client.send(Some(target), "x", json!(1)).await.expect_err("must fail");
        assert_eq!(err.code(), ErrorCode::InvalidTarget);
    }
    assert_eq!(writes.load(Ordering::SeqCst), 0);

    client.send(None, "x", json!(1)).await.unwrap();
    assert_eq!(writes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn sends_work_before_start() {
    let (stream, mut server_side) = duplex(4096);
    let client = ClientEndpoint::from_stream(stream, "server", ConnectionSection::default());

    client.send_to_server("hello", json!({ "from": "client" })).await.unwrap();

    let env = read_envelope(&mut server_side, &mut BytesMut::new()).await;
    assert_eq!(env, Envelope::new("hello", json!({ "from": "client" })));
}

#[tokio::test]
async fn start_delivers_server_envelopes_without_a_connect_event() {
    let (stream, mut server_side) = duplex(4096);
    let client = ClientEndpoint::from_stream(stream, "server", ConnectionSection::default());
    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on("connect", fwd(&tx, "connect"));
    client.on("test", fwd(&tx, "test"));
    client.start().unwrap();

    server_side.write_all(&record("test", json!("hello"))).await.unwrap();

    let (name, conn, payload) = next_event(&mut rx).await;
    assert_eq!(name, "test");
    assert_eq!(conn, client.server_handle());
    assert_eq!(payload, json!("hello"));
}

#[tokio::test]
async fn start_twice_fails() {
    let (stream, _server_side) = duplex(64);
    let client = ClientEndpoint::from_stream(stream, "server", ConnectionSection::default());
    client.start().unwrap();
    let err = client.start().unwrap_err();
    assert_eq!(err.code(), ErrorCode::Internal);
}

#[tokio::test]
async fn server_close_disconnects_client() {
    let (stream, server_side) = duplex(4096);
    let client = ClientEndpoint::from_stream(stream, "server", ConnectionSection::default());
    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on("disconnect", fwd(&tx, "disconnect"));
    client.start().unwrap();
    assert!(client.is_connected());

    drop(server_side);

    let (name, conn, payload) = next_event(&mut rx).await;
    assert_eq!((name, conn, payload), ("disconnect", client.server_handle(), Value::Null));
    assert!(!client.is_connected());

    let err = client.send(None, "x", Value::Null).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotConnected);
}

#[tokio::test]
async fn decode_failure_is_reported_to_the_hook() {
    let (stream, mut server_side) = duplex(4096);
    let client = ClientEndpoint::from_stream(stream, "server", ConnectionSection::default());
    let (err_tx, mut err_rx) = mpsc::unbounded_channel();
    client.on_error(move |_conn, err| {
        let _ = err_tx.send(err.code());
    });
    client.start().unwrap();

    // Valid record, but the envelope carries an unknown field.
    let body = br#"{"n":"x","m":1,"extra":true}"#;
    let framed = tcpbus_core::protocol::frame::encode_frame(body, 1024).unwrap();
    server_side.write_all(&framed).await.unwrap();

    let code = tokio::time::timeout(std::time::Duration::from_secs(2), err_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(code, ErrorCode::Decode);
    eventually(|| !client.is_connected()).await;
}

#[tokio::test]
async fn shutdown_disconnects() {
    let (stream, _server_side) = duplex(64);
    let client = ClientEndpoint::from_stream(stream, "server", ConnectionSection::default());
    client.start().unwrap();
    client.shutdown();
    assert!(!client.is_connected());
    assert_eq!(
        client.send_to_server("x", Value::Null).await.unwrap_err().code(),
        ErrorCode::NotConnected
    );
}
