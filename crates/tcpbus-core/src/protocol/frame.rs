//! Length-prefixed record framing (panic-free).
//!
//! Layout: `u32` big-endian body length, then the body. One record carries
//! exactly one encoded envelope, so split and coalesced stream reads both
//! reassemble into whole envelopes in send order.
//!
//! Parsing rules:
//! - Never index raw buffers; always check `remaining()` before `get_*`.
//! - A declared length above `max` is rejected before any body is buffered.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{BusError, Result};

/// Size of the length prefix.
pub const HEADER_LEN: usize = 4;

/// Default cap on a single record body (1 MiB).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Prefix `body` with its length.
pub fn encode_frame(body: &[u8], max: usize) -> Result<Bytes> {
    if body.len() > max || body.len() > u32::MAX as usize {
        return Err(BusError::FrameTooLarge {
            len: body.len(),
            max,
        });
    }
    let mut out = BytesMut::with_capacity(HEADER_LEN + body.len());
    out.put_u32(body.len() as u32);
    out.put_slice(body);
    Ok(out.freeze())
}

/// Try to split one complete record off the front of `buf`.
///
/// Returns `Ok(None)` when more bytes are needed; the buffer is left intact.
pub fn split_frame(buf: &mut BytesMut, max: usize) -> Result<Option<Bytes>> {
    if buf.remaining() < HEADER_LEN {
        return Ok(None);
    }

    let mut header: &[u8] = &buf[..];
    let len = header.get_u32() as usize;
    if len > max {
        return Err(BusError::FrameTooLarge { len, max });
    }

    if buf.remaining() < HEADER_LEN + len {
        // Reserve up front so the reader does not grow the buffer in small steps.
        buf.reserve(HEADER_LEN + len - buf.remaining());
        return Ok(None);
    }

    buf.advance(HEADER_LEN);
    let body = buf.split_to(len).freeze();
    tracing::trace!(len, "record split");
    Ok(Some(body))
}
