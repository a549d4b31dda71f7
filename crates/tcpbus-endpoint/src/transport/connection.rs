use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use tcpbus_core::error::{BusError, Result};

/// Every connection set gets its own tag, so handles from one endpoint are
/// never accepted by another.
static NEXT_SET_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque connection handle given to processors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnHandle {
    set: u64,
    id: u64,
}

impl ConnHandle {
    /// Per-endpoint connection number.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for ConnHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.set, self.id)
    }
}

pub(crate) type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Write side of one live connection.
#[derive(Clone)]
pub struct Connection {
    handle: ConnHandle,
    peer: Arc<str>,
    writer: Arc<Mutex<BoxWriter>>,
}

impl Connection {
    pub fn handle(&self) -> ConnHandle {
        self.handle
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Write one complete record. Records from concurrent writers never interleave.
    pub async fn write_record(&self, record: &[u8], deadline: Option<Duration>) -> Result<()> {
        let write = async {
            let mut w = self.writer.lock().await;
            w.write_all(record).await?;
            w.flush().await?;
            Ok::<(), BusError>(())
        };
        match deadline {
            Some(d) => tokio::time::timeout(d, write)
                .await
                .map_err(|_| BusError::Timeout)?,
            None => write.await,
        }
    }
}

/// Live connection set of one endpoint: `id -> Connection`.
pub struct ConnectionSet {
    set: u64,
    conns: DashMap<u64, Connection>,
    seq: AtomicU64,
}

impl Default for ConnectionSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self {
            set: NEXT_SET_ID.fetch_add(1, Ordering::Relaxed),
            conns: DashMap::new(),
            seq: AtomicU64::new(1),
        }
    }

    pub(crate) fn insert(&self, peer: impl Into<Arc<str>>, writer: BoxWriter) -> Connection {
        let handle = ConnHandle {
            set: self.set,
            id: self.seq.fetch_add(1, Ordering::Relaxed),
        };
        let conn = Connection {
            handle,
            peer: peer.into(),
            writer: Arc::new(Mutex::new(writer)),
        };
        self.conns.insert(handle.id, conn.clone());
        conn
    }

    /// Whether `handle` was issued by this set (live or not).
    pub fn owns(&self, handle: ConnHandle) -> bool {
        handle.set == self.set
    }

    pub fn get(&self, handle: ConnHandle) -> Option<Connection> {
        if !self.owns(handle) {
            return None;
        }
        self.conns.get(&handle.id).map(|r| r.value().clone())
    }

    pub fn contains(&self, handle: ConnHandle) -> bool {
        self.owns(handle) && self.conns.contains_key(&handle.id)
    }

    pub fn remove(&self, handle: ConnHandle) -> Option<Connection> {
        if !self.owns(handle) {
            return None;
        }
        self.conns.remove(&handle.id).map(|(_, c)| c)
    }

    /// Point-in-time copy, so callers can write without holding map shards.
    pub fn snapshot(&self) -> Vec<Connection> {
        self.conns.iter().map(|r| r.value().clone()).collect()
    }

    pub fn handles(&self) -> Vec<ConnHandle> {
        self.conns.iter().map(|r| r.value().handle).collect()
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    /// Drop every connection; returns how many this call removed.
    pub(crate) fn clear(&self) -> usize {
        let mut n = 0;
        self.conns.retain(|_, _| {
            n += 1;
            false
        });
        n
    }
}
