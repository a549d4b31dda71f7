//! tcpbus core: runtime-free wire primitives and the shared error type.
//!
//! This crate defines the envelope codec, the length-prefixed record framing
//! used on every byte stream, and the error surface shared by endpoints and
//! applications. It carries no transport or runtime dependencies so the same
//! contracts can be exercised from tests, tools, or other runtimes.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here.
//! Malformed input always surfaces as `BusError`, so a hostile or buggy peer
//! can only ever tear down its own connection.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{BusError, ErrorCode, Result};
pub use protocol::envelope::Envelope;
