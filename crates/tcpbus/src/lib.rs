//! Top-level facade crate for tcpbus.
//!
//! Re-exports the wire primitives and the endpoint library so users can depend on a single crate.

pub mod core {
    pub use tcpbus_core::*;
}

pub mod endpoint {
    pub use tcpbus_endpoint::*;
}

pub use tcpbus_core::{BusError, Envelope, Result};
pub use tcpbus_endpoint::{
    BroadcastReport, ClientEndpoint, ConnHandle, Filter, MessageEndpoint, Processor, ServerEndpoint,
};
