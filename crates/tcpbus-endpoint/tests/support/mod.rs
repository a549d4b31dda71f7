//! Shared helpers for endpoint tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]

use std::future::{ready, Ready};
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, DuplexStream, ReadBuf};
use tokio::sync::mpsc;

use tcpbus_core::protocol::frame::{split_frame, DEFAULT_MAX_FRAME_BYTES};
use tcpbus_core::Envelope;
use tcpbus_endpoint::config::ConnectionSection;
use tcpbus_endpoint::transport::codec;
use tcpbus_endpoint::{ClientEndpoint, ConnHandle};

/// Stream whose reads never complete and whose writes are counted.
/// With `fail`, every write attempt errors.
pub struct FaultyStream {
    pub writes: Arc<AtomicUsize>,
    pub fail: bool,
}

impl FaultyStream {
    pub fn new(fail: bool) -> (Self, Arc<AtomicUsize>) {
        let writes = Arc::new(AtomicUsize::new(0));
        (
            Self {
                writes: Arc::clone(&writes),
                fail,
            },
            writes,
        )
    }
}

impl AsyncRead for FaultyStream {
    fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Poll::Pending
    }
}

impl AsyncWrite for FaultyStream {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "injected write failure")))
        } else {
            Poll::Ready(Ok(buf.len()))
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Framed record for `(name, payload)`.
pub fn record(name: &str, payload: Value) -> Bytes {
    codec::prepare(name, &payload, DEFAULT_MAX_FRAME_BYTES).unwrap()
}

/// Read one envelope from the far side of a duplex pipe.
pub async fn read_envelope(peer: &mut DuplexStream, buf: &mut BytesMut) -> Envelope {
    loop {
        if let Some(body) = split_frame(buf, DEFAULT_MAX_FRAME_BYTES).unwrap() {
            return codec::decode(&body).unwrap();
        }
        let n = tokio::time::timeout(Duration::from_secs(2), peer.read_buf(buf))
            .await
            .expect("timed out waiting for a record")
            .unwrap();
        assert!(n > 0, "pipe closed before a full record arrived");
    }
}

/// Poll `cond` until it holds or two seconds pass.
pub async fn eventually<F: Fn() -> bool>(cond: F) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

/// A handle minted by a throwaway client endpoint.
pub fn foreign_handle() -> ConnHandle {
    let (a, _b) = tokio::io::duplex(64);
    ClientEndpoint::from_stream(a, "foreign", ConnectionSection::default()).server_handle()
}

pub type Event = (&'static str, ConnHandle, Value);

/// Processor that forwards `(tag, conn, payload)` to a channel and consumes.
pub fn fwd(
    tx: &mpsc::UnboundedSender<Event>,
    tag: &'static str,
) -> impl Fn(ConnHandle, Value) -> Ready<bool> + Send + Sync + 'static {
    let tx = tx.clone();
    move |conn, payload| {
        let _ = tx.send((tag, conn, payload));
        ready(true)
    }
}

pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}
