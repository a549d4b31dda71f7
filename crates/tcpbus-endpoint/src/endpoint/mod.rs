//! Endpoint roles.
//!
//! `ServerEndpoint` accepts many connections and can broadcast;
//! `ClientEndpoint` owns one connection to a server. Both are built on the
//! same composed core (registry + connection set + supervised reader tasks)
//! and expose the shared `MessageEndpoint` contract, so application code
//! registers handlers the same way in either role.

mod shared;
mod client;
mod server;

use async_trait::async_trait;
use serde_json::Value;

use tcpbus_core::error::{BusError, Result};

use crate::dispatch::{Filter, Processor, Registry};
use crate::obs::BusMetrics;
use crate::transport::ConnHandle;

pub use client::ClientEndpoint;
pub use server::{BroadcastReport, ServerEndpoint};

/// Capability shared by both endpoint roles.
#[async_trait]
pub trait MessageEndpoint: Send + Sync {
    fn registry(&self) -> &Registry;

    fn metrics(&self) -> &BusMetrics;

    /// Send one envelope. How `target` is resolved depends on the role.
    async fn send(&self, target: Option<ConnHandle>, name: &str, payload: Value) -> Result<()>;

    /// Register a processor for `filter` (a name, or `Filter::Any`).
    fn on<F, P>(&self, filter: F, processor: P)
    where
        Self: Sized,
        F: Into<Filter>,
        P: Processor + 'static,
    {
        self.registry().register(filter, processor);
    }

    /// Install the connection error hook.
    fn on_error<H>(&self, hook: H)
    where
        Self: Sized,
        H: Fn(ConnHandle, &BusError) + Send + Sync + 'static,
    {
        self.registry().on_error(hook);
    }
}
