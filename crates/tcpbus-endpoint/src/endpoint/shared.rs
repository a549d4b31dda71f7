//! Composed endpoint core: registry, connection set, and reader supervision.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use dashmap::DashMap;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use tcpbus_core::error::Result;
use tcpbus_core::protocol::{CONNECT, DISCONNECT};
use tcpbus_core::Envelope;

use crate::config::ConnectionSection;
use crate::dispatch::Registry;
use crate::obs::BusMetrics;
use crate::transport::codec;
use crate::transport::reader::{read_loop, ReadLimits};
use crate::transport::{ConnHandle, Connection, ConnectionSet};

pub(crate) struct EndpointCore {
    role: &'static str,
    pub(crate) registry: Registry,
    pub(crate) conns: ConnectionSet,
    pub(crate) cfg: ConnectionSection,
    pub(crate) metrics: BusMetrics,
    tasks: DashMap<u64, JoinHandle<()>>,
}

impl EndpointCore {
    pub(crate) fn new(role: &'static str, cfg: ConnectionSection) -> Self {
        Self {
            role,
            registry: Registry::new(),
            conns: ConnectionSet::new(),
            cfg,
            metrics: BusMetrics::default(),
            tasks: DashMap::new(),
        }
    }

    fn labels(&self) -> [(&'static str, &'static str); 1] {
        [("role", self.role)]
    }

    /// Encode once into a record that can be written to any connection.
    pub(crate) fn prepare(&self, name: &str, payload: &Value) -> Result<Bytes> {
        codec::prepare(name, payload, self.cfg.max_frame_bytes)
    }

    pub(crate) async fn write_to(&self, conn: &Connection, record: &Bytes) -> Result<()> {
        match conn.write_record(record, self.cfg.write_timeout()).await {
            Ok(()) => {
                self.metrics.envelopes_out.inc(&self.labels());
                Ok(())
            }
            Err(e) => {
                self.metrics.write_failures.inc(&self.labels());
                tracing::warn!(role = self.role, conn = %conn.handle(), peer = conn.peer(), error = %e, "write failed");
                Err(e)
            }
        }
    }

    pub(crate) async fn send_raw(&self, conn: &Connection, name: &str, payload: &Value) -> Result<()> {
        let record = self.prepare(name, payload)?;
        self.write_to(conn, &record).await
    }

    /// Track the write half of a new stream.
    pub(crate) fn register_writer<W>(&self, peer: &str, writer: W) -> Connection
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let conn = self.conns.insert(peer, Box::new(writer));
        self.metrics.connections_opened.inc(&self.labels());
        self.metrics.connections_active.inc(&self.labels());
        tracing::info!(role = self.role, conn = %conn.handle(), peer, "connection opened");
        conn
    }

    /// Start the supervised reader task of `handle`.
    ///
    /// With `announce`, `connect` is dispatched before any byte is read.
    pub(crate) fn spawn_reader<R>(self: &Arc<Self>, handle: ConnHandle, reader: R, announce: bool)
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let core = Arc::clone(self);
        let (go_tx, go_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            // Wait until the handle is tracked so teardown can always untrack it.
            if go_rx.await.is_err() {
                return;
            }
            core.run_session(handle, reader, announce).await;
        });
        self.tasks.insert(handle.id(), task);
        let _ = go_tx.send(());
    }

    async fn run_session<R>(self: Arc<Self>, handle: ConnHandle, reader: R, announce: bool)
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        if announce {
            self.registry.dispatch(CONNECT, handle, Value::Null).await;
        }

        let limits = ReadLimits {
            max_frame_bytes: self.cfg.max_frame_bytes,
            idle_timeout: self.cfg.read_idle_timeout(),
        };
        let core = Arc::clone(&self);
        let outcome = read_loop(reader, limits, move |env| {
            let core = Arc::clone(&core);
            async move { core.dispatch(handle, env).await }
        })
        .await;

        if self.conns.remove(handle).is_some() {
            self.metrics.connections_active.dec(&self.labels());
        }
        match &outcome {
            Ok(()) => tracing::debug!(role = self.role, conn = %handle, "connection closed by peer"),
            Err(e) => {
                if e.is_malformed_input() {
                    self.metrics.decode_errors.inc(&self.labels());
                }
                tracing::warn!(role = self.role, conn = %handle, error = %e, code = e.code().as_str(), "connection terminated");
                self.registry.report_error(handle, e);
            }
        }

        if self.cfg.emit_disconnect {
            self.registry.dispatch(DISCONNECT, handle, Value::Null).await;
        }
        self.tasks.remove(&handle.id());
    }

    /// Dispatch an envelope read off the wire.
    async fn dispatch(&self, handle: ConnHandle, env: Envelope) {
        self.metrics.envelopes_in.inc(&self.labels());
        tracing::trace!(role = self.role, conn = %handle, name = %env.name, "envelope in");

        let started = Instant::now();
        let consumed = self.registry.dispatch(&env.name, handle, env.payload).await;
        self.metrics.dispatch_duration.observe(&self.labels(), started.elapsed());
        if !consumed {
            self.metrics.envelopes_unconsumed.inc(&self.labels());
        }
    }

    /// Abort every reader task and drop every tracked connection.
    pub(crate) fn shutdown(&self) {
        let handles: Vec<u64> = self.tasks.iter().map(|e| *e.key()).collect();
        for id in handles {
            if let Some((_, task)) = self.tasks.remove(&id) {
                task.abort();
            }
        }
        let dropped = self.conns.clear();
        self.metrics
            .connections_active
            .add(&self.labels(), -(dropped as i64));
        tracing::info!(role = self.role, dropped, "endpoint shut down");
    }

    pub(crate) fn live_tasks(&self) -> usize {
        self.tasks.len()
    }
}
