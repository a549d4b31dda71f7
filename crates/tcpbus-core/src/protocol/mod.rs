//! Wire protocol.
//!
//! - `envelope`: the `(name, payload)` unit, serialized as one JSON object.
//! - `frame`: length-prefixed records carrying one envelope each.
//!
//! The two layers are independent: the codec never sees stream boundaries and
//! the framer never looks inside a record.

pub mod envelope;
pub mod frame;

/// Name dispatched by a server when it accepts a connection.
pub const CONNECT: &str = "connect";

/// Name dispatched locally when a connection's reader terminates.
pub const DISCONNECT: &str = "disconnect";
