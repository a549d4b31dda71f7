//! tcpbus endpoint library entry.
//!
//! This crate wires the record transport, the handler registry, and the two
//! endpoint roles into a bidirectional TCP message bus. It is consumed by the
//! demo binary (`main.rs`) and by integration tests.

pub mod config;
pub mod dispatch;
pub mod endpoint;
pub mod obs;
pub mod transport;

pub use dispatch::{Filter, Processor, Registry};
pub use endpoint::{BroadcastReport, ClientEndpoint, MessageEndpoint, ServerEndpoint};
pub use transport::ConnHandle;
