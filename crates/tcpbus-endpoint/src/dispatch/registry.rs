//! Ordered short-circuit handler chain.
//!
//! Registrations are tried in the order they were added. Every registration
//! whose filter matches the envelope name runs until one reports `true`
//! (consumed); later registrations are skipped for that envelope. A wildcard
//! registered last therefore acts as a fallback.

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use tcpbus_core::error::{BusError, Result};

use crate::transport::ConnHandle;

/// Envelope processor. Returns `true` when the envelope is consumed.
///
/// Any `Fn(ConnHandle, Value) -> impl Future<Output = bool>` is a processor.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(&self, conn: ConnHandle, payload: Value) -> bool;
}

#[async_trait]
impl<F, Fut> Processor for F
where
    F: Fn(ConnHandle, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    async fn process(&self, conn: ConnHandle, payload: Value) -> bool {
        (self)(conn, payload).await
    }
}

/// Name filter of a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Matches every envelope.
    Any,
    /// Matches one name exactly.
    Name(String),
}

impl Filter {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Filter::Any => true,
            Filter::Name(n) => n == name,
        }
    }
}

impl From<&str> for Filter {
    fn from(name: &str) -> Self {
        Filter::Name(name.to_string())
    }
}

impl From<String> for Filter {
    fn from(name: String) -> Self {
        Filter::Name(name)
    }
}

/// `None` is the wildcard.
impl From<Option<&str>> for Filter {
    fn from(name: Option<&str>) -> Self {
        name.map_or(Filter::Any, Filter::from)
    }
}

type ErrorHook = Arc<dyn Fn(ConnHandle, &BusError) + Send + Sync>;

#[derive(Clone)]
struct Registration {
    filter: Filter,
    processor: Arc<dyn Processor>,
}

/// Handler registry shared by every connection of an endpoint.
#[derive(Default)]
pub struct Registry {
    entries: RwLock<Vec<Registration>>,
    error_hook: RwLock<Option<ErrorHook>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a registration. Duplicate filters are allowed and all are tried.
    pub fn register<F, P>(&self, filter: F, processor: P)
    where
        F: Into<Filter>,
        P: Processor + 'static,
    {
        let filter = filter.into();
        tracing::debug!(?filter, "handler registered");
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Registration {
                filter,
                processor: Arc::new(processor),
            });
    }

    /// Strongly-typed registration. Not supported: always fails.
    ///
    /// Register a plain processor and convert inside it with
    /// `tcpbus_core::protocol::envelope::from_payload` instead.
    pub fn register_typed<T, F, P, Fut>(&self, filter: F, processor: P) -> Result<()>
    where
        T: DeserializeOwned,
        F: Into<Filter>,
        P: Fn(ConnHandle, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let _ = (filter.into(), processor);
        Err(BusError::Unimplemented("typed handler registration"))
    }

    /// Install the hook told about errors that terminate a connection.
    pub fn on_error<H>(&self, hook: H)
    where
        H: Fn(ConnHandle, &BusError) + Send + Sync + 'static,
    {
        *self.error_hook.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(hook));
    }

    pub(crate) fn report_error(&self, conn: ConnHandle, err: &BusError) {
        let hook = self
            .error_hook
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(hook) = hook {
            hook(conn, err);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the chain for one envelope. Returns whether it was consumed.
    pub async fn dispatch(&self, name: &str, conn: ConnHandle, payload: Value) -> bool {
        // Snapshot so no lock is held across processor awaits.
        let chain: Vec<Arc<dyn Processor>> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.filter.matches(name))
            .map(|r| Arc::clone(&r.processor))
            .collect();

        for processor in chain {
            if processor.process(conn, payload.clone()).await {
                tracing::trace!(%conn, name, "envelope consumed");
                return true;
            }
        }
        tracing::debug!(%conn, name, "envelope not consumed");
        false
    }
}
