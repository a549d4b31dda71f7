//! Transport layer (byte streams).
//!
//! Owns connection handles and the live connection set, the codec that turns
//! envelopes into records, and the reader loop that turns a byte stream back
//! into envelopes.

pub mod codec;
pub mod connection;
pub mod reader;

pub use connection::{ConnHandle, Connection, ConnectionSet};
