use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use tcpbus_core::error::{BusError, Result};

use super::shared::EndpointCore;
use super::MessageEndpoint;
use crate::config::{BusConfig, ConnectionSection};
use crate::dispatch::Registry;
use crate::obs::BusMetrics;
use crate::transport::ConnHandle;

type BoxReader = Box<dyn AsyncRead + Send + Unpin>;

/// Owns exactly one connection to a server.
///
/// The connection is opened at construction so sends work immediately;
/// inbound envelopes are only read once [`ClientEndpoint::start`] is called.
#[derive(Clone)]
pub struct ClientEndpoint {
    core: Arc<EndpointCore>,
    inner: Arc<ClientInner>,
}

struct ClientInner {
    server: ConnHandle,
    pending_reader: Mutex<Option<BoxReader>>,
}

impl ClientEndpoint {
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        Self::connect_with(host, port, ConnectionSection::default()).await
    }

    pub async fn from_config(cfg: &BusConfig) -> Result<Self> {
        Self::connect_with(&cfg.client.host, cfg.client.port, cfg.connection.clone()).await
    }

    /// Open the server connection. Failure here is returned to the caller.
    pub async fn connect_with(host: &str, port: u16, cfg: ConnectionSection) -> Result<Self> {
        let stream = TcpStream::connect((host, port)).await?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(host, port, error = %e, "set_nodelay failed");
        }
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| format!("{host}:{port}"));
        Ok(Self::from_stream(stream, &peer, cfg))
    }

    /// Use an already-open stream as the server connection.
    pub fn from_stream<S>(stream: S, peer: &str, cfg: ConnectionSection) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let core = Arc::new(EndpointCore::new("client", cfg));
        let (reader, writer) = tokio::io::split(stream);
        let server = core.register_writer(peer, writer).handle();
        Self {
            core,
            inner: Arc::new(ClientInner {
                server,
                pending_reader: Mutex::new(Some(Box::new(reader))),
            }),
        }
    }

    /// Begin reading envelopes from the server. Can only be called once.
    pub fn start(&self) -> Result<()> {
        let reader = self
            .inner
            .pending_reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| BusError::Internal("client endpoint already started".into()))?;
        self.core.spawn_reader(self.inner.server, reader, false);
        Ok(())
    }

    /// Handle of the server connection, as seen by this client's processors.
    pub fn server_handle(&self) -> ConnHandle {
        self.inner.server
    }

    pub fn is_connected(&self) -> bool {
        self.core.conns.contains(self.inner.server)
    }

    pub async fn send_to_server(&self, name: &str, payload: Value) -> Result<()> {
        let conn = self
            .core
            .conns
            .get(self.inner.server)
            .ok_or(BusError::NotConnected)?;
        self.core.send_raw(&conn, name, &payload).await
    }

    /// Stop reading and drop the server connection.
    pub fn shutdown(&self) {
        self.inner
            .pending_reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.core.shutdown();
    }
}

#[async_trait]
impl MessageEndpoint for ClientEndpoint {
    fn registry(&self) -> &Registry {
        &self.core.registry
    }

    fn metrics(&self) -> &BusMetrics {
        &self.core.metrics
    }

    /// A client always sends to its server; an explicit target is rejected.
    async fn send(&self, target: Option<ConnHandle>, name: &str, payload: Value) -> Result<()> {
        if let Some(target) = target {
            return Err(BusError::InvalidTarget(format!(
                "client endpoints only send to their server (got {target}); pass None"
            )));
        }
        self.send_to_server(name, payload).await
    }
}
