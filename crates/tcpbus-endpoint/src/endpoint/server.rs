use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use tcpbus_core::error::{BusError, Result};

use super::shared::EndpointCore;
use super::MessageEndpoint;
use crate::config::{BusConfig, ConnectionSection};
use crate::dispatch::Registry;
use crate::obs::BusMetrics;
use crate::transport::ConnHandle;

/// Pause after a failed accept (e.g. fd exhaustion) before retrying.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Outcome of one broadcast. Failures are per connection, never aggregated.
#[derive(Debug, Default)]
pub struct BroadcastReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: Vec<(ConnHandle, BusError)>,
}

/// Accepts connections, tracks them, and sends/broadcasts envelopes.
#[derive(Clone)]
pub struct ServerEndpoint {
    core: Arc<EndpointCore>,
    inner: Arc<ServerInner>,
}

struct ServerInner {
    listener: Mutex<Option<TcpListener>>,
    local_addr: SocketAddr,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    stop: watch::Sender<bool>,
}

impl ServerEndpoint {
    /// Bind on every interface at `port` with default connection limits.
    pub async fn bind(port: u16) -> Result<Self> {
        Self::bind_addr(&format!("0.0.0.0:{port}"), ConnectionSection::default()).await
    }

    pub async fn from_config(cfg: &BusConfig) -> Result<Self> {
        Self::bind_addr(&cfg.server.listen, cfg.connection.clone()).await
    }

    /// Bind the listening socket. Failure here is returned to the caller.
    pub async fn bind_addr(addr: &str, cfg: ConnectionSection) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server endpoint bound");
        Ok(Self {
            core: Arc::new(EndpointCore::new("server", cfg)),
            inner: Arc::new(ServerInner {
                listener: Mutex::new(Some(listener)),
                local_addr,
                accept_task: Mutex::new(None),
                stop: watch::channel(false).0,
            }),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    /// Track an already-open stream as a new connection.
    ///
    /// `connect` is dispatched for it before any of its bytes are processed.
    pub fn attach<S>(&self, stream: S, peer: &str) -> ConnHandle
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let handle = self.core.register_writer(peer, writer).handle();
        self.core.spawn_reader(handle, reader, true);
        handle
    }

    /// Alias of [`ServerEndpoint::run_in_background`].
    pub fn start(&self) -> Result<()> {
        self.run_in_background()
    }

    /// Spawn the accept loop and return immediately.
    pub fn run_in_background(&self) -> Result<()> {
        let listener = self.take_listener()?;
        let this = self.clone();
        let task = tokio::spawn(async move { this.accept_loop(listener).await });
        *self
            .inner
            .accept_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(task);
        Ok(())
    }

    /// Run the accept loop on the current task until [`ServerEndpoint::shutdown`].
    pub async fn run_in_foreground(&self) -> Result<()> {
        let listener = self.take_listener()?;
        self.clone().accept_loop(listener).await;
        Ok(())
    }

    fn take_listener(&self) -> Result<TcpListener> {
        self.inner
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| BusError::Internal("server endpoint already started".into()))
    }

    async fn accept_loop(self, listener: TcpListener) {
        let mut stop = self.inner.stop.subscribe();
        loop {
            if *stop.borrow_and_update() {
                break;
            }
            let accepted = tokio::select! {
                biased;
                _ = stop.changed() => continue,
                res = listener.accept() => res,
            };
            match accepted {
                Ok((stream, addr)) => {
                    if *stop.borrow() {
                        break;
                    }
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!(%addr, error = %e, "set_nodelay failed");
                    }
                    self.attach(stream, &addr.to_string());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
        tracing::info!(local_addr = %self.inner.local_addr, "accept loop stopped");
    }

    /// Send to exactly one connection of this endpoint.
    pub async fn send_to(&self, target: ConnHandle, name: &str, payload: Value) -> Result<()> {
        let conn = self.core.conns.get(target).ok_or_else(|| {
            BusError::InvalidTarget(format!("connection {target} is not tracked by this server"))
        })?;
        self.core.send_raw(&conn, name, &payload).await
    }

    /// Write one envelope to every tracked connection.
    ///
    /// The envelope is encoded once; writes run concurrently and a failure on
    /// one connection does not stop the others. Only an encoding failure is
    /// returned as `Err`.
    pub async fn broadcast(&self, name: &str, payload: Value) -> Result<BroadcastReport> {
        let record = self.core.prepare(name, &payload)?;
        let core = &self.core;

        let mut writes = FuturesUnordered::new();
        for conn in core.conns.snapshot() {
            let record = record.clone();
            writes.push(async move {
                let res = core.write_to(&conn, &record).await;
                (conn.handle(), res)
            });
        }

        let mut report = BroadcastReport {
            attempted: writes.len(),
            ..BroadcastReport::default()
        };
        while let Some((handle, res)) = writes.next().await {
            match res {
                Ok(()) => report.delivered += 1,
                Err(e) => report.failed.push((handle, e)),
            }
        }
        tracing::debug!(name, attempted = report.attempted, failed = report.failed.len(), "broadcast done");
        Ok(report)
    }

    pub fn connection_count(&self) -> usize {
        self.core.conns.len()
    }

    pub fn handles(&self) -> Vec<ConnHandle> {
        self.core.conns.handles()
    }

    pub fn is_tracked(&self, handle: ConnHandle) -> bool {
        self.core.conns.contains(handle)
    }

    /// Number of supervised reader tasks still running.
    pub fn reader_tasks(&self) -> usize {
        self.core.live_tasks()
    }

    /// Stop accepting, abort every reader, and drop every connection.
    pub fn shutdown(&self) {
        self.inner.stop.send_replace(true);
        if let Some(task) = self
            .inner
            .accept_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
        self.core.shutdown();
    }
}

#[async_trait]
impl MessageEndpoint for ServerEndpoint {
    fn registry(&self) -> &Registry {
        &self.core.registry
    }

    fn metrics(&self) -> &BusMetrics {
        &self.core.metrics
    }

    /// A server needs an explicit target; `None` is rejected.
    async fn send(&self, target: Option<ConnHandle>, name: &str, payload: Value) -> Result<()> {
        let target = target.ok_or_else(|| {
            BusError::InvalidTarget("server send requires a connection handle".into())
        })?;
        self.send_to(target, name, payload).await
    }
}
