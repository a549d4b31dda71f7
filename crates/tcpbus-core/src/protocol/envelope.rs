//! Envelope codec (JSON).
//!
//! An envelope is `{"n": <name>, "m": <payload>}`. The payload is kept as a
//! dynamic `serde_json::Value`; processors convert it to their own types with
//! [`from_payload`] or [`Envelope::payload_as`].

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BusError, Result};

/// Decoded envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    /// Name selecting which handlers apply (field name is `n` on the wire).
    #[serde(rename = "n")]
    pub name: String,
    /// Dynamic payload (field name is `m` on the wire). Missing means null.
    #[serde(rename = "m", default)]
    pub payload: Value,
}

/// Borrowed view used for encoding without cloning the payload.
#[derive(Serialize)]
struct EnvelopeRef<'a> {
    n: &'a str,
    m: &'a Value,
}

impl Envelope {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// Encode this envelope.
    pub fn encode(&self) -> Result<Bytes> {
        encode(&self.name, &self.payload)
    }

    /// Convert the payload into an application type.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.payload)
            .map_err(|e| BusError::Decode(format!("payload of '{}': {e}", self.name)))
    }
}

/// Encode `(name, payload)` into one self-contained JSON block.
pub fn encode(name: &str, payload: &Value) -> Result<Bytes> {
    let v = serde_json::to_vec(&EnvelopeRef { n: name, m: payload })
        .map_err(|e| BusError::Encode(e.to_string()))?;
    Ok(Bytes::from(v))
}

/// Decode exactly one envelope from `bytes`.
///
/// Trailing data (such as a second concatenated envelope) is rejected.
pub fn decode(bytes: &[u8]) -> Result<Envelope> {
    serde_json::from_slice(bytes).map_err(|e| BusError::Decode(format!("invalid envelope json: {e}")))
}

/// Convert an owned payload into an application type.
pub fn from_payload<T: DeserializeOwned>(payload: Value) -> Result<T> {
    serde_json::from_value(payload).map_err(|e| BusError::Decode(format!("payload: {e}")))
}
