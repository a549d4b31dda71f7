//! Connection reader loop.
//!
//! Pulls bytes into a growable buffer, splits off complete records, and hands
//! each decoded envelope to `on_envelope` before reading further, so envelopes
//! are delivered one at a time in stream order.

use std::future::Future;
use std::io;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use tcpbus_core::error::{BusError, Result};
use tcpbus_core::protocol::frame::split_frame;
use tcpbus_core::Envelope;

use super::codec;

const INITIAL_BUF: usize = 8 * 1024;

/// Reader limits.
#[derive(Debug, Clone, Copy)]
pub struct ReadLimits {
    pub max_frame_bytes: usize,
    pub idle_timeout: Option<Duration>,
}

/// Run until the peer closes cleanly (`Ok`) or the connection fails (`Err`).
///
/// A stream that ends in the middle of a record is an error, as is a record
/// that does not decode.
pub async fn read_loop<R, F, Fut>(mut reader: R, limits: ReadLimits, mut on_envelope: F) -> Result<()>
where
    R: AsyncRead + Unpin,
    F: FnMut(Envelope) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF);
    loop {
        while let Some(body) = split_frame(&mut buf, limits.max_frame_bytes)? {
            let env = codec::decode(&body)?;
            on_envelope(env).await;
        }

        let n = match limits.idle_timeout {
            Some(d) => tokio::time::timeout(d, reader.read_buf(&mut buf))
                .await
                .map_err(|_| BusError::Timeout)??,
            None => reader.read_buf(&mut buf).await?,
        };

        if n == 0 {
            if buf.is_empty() {
                return Ok(());
            }
            return Err(BusError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream closed with {} bytes of a partial record", buf.len()),
            )));
        }
    }
}
