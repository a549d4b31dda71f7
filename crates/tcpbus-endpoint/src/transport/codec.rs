//! Envelope <-> record codec.
//!
//! - outbound: encode once into a framed record, shareable across writes
//! - inbound: one record body decodes to exactly one envelope

use bytes::Bytes;
use serde_json::Value;

use tcpbus_core::error::Result;
use tcpbus_core::protocol::{envelope, frame};
use tcpbus_core::Envelope;

/// Encode `(name, payload)` into a complete length-prefixed record.
pub fn prepare(name: &str, payload: &Value, max_frame_bytes: usize) -> Result<Bytes> {
    let body = envelope::encode(name, payload)?;
    frame::encode_frame(&body, max_frame_bytes)
}

/// Decode one record body.
pub fn decode(body: &[u8]) -> Result<Envelope> {
    envelope::decode(body)
}
