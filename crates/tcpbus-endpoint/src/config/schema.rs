use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use tcpbus_core::error::{BusError, Result};
use tcpbus_core::protocol::frame::DEFAULT_MAX_FRAME_BYTES;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub client: ClientSection,

    #[serde(default)]
    pub connection: ConnectionSection,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            client: ClientSection::default(),
            connection: ConnectionSection::default(),
        }
    }
}

impl BusConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(BusError::UnsupportedVersion);
        }
        self.server.validate()?;
        self.client.validate()?;
        self.connection.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen
            .parse::<SocketAddr>()
            .map_err(|e| BusError::Config(format!("server.listen must be a socket address: {e}")))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ClientSection {
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(BusError::Config("client.host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(BusError::Config("client.port must not be 0".into()));
        }
        Ok(())
    }
}

/// Per-connection limits shared by both endpoint roles.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionSection {
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    /// 0 disables the read idle timeout.
    #[serde(default)]
    pub read_idle_timeout_ms: u64,

    /// 0 disables the write timeout.
    #[serde(default)]
    pub write_timeout_ms: u64,

    #[serde(default = "default_emit_disconnect")]
    pub emit_disconnect: bool,
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            max_frame_bytes: default_max_frame_bytes(),
            read_idle_timeout_ms: 0,
            write_timeout_ms: 0,
            emit_disconnect: default_emit_disconnect(),
        }
    }
}

const MIN_FRAME_BYTES: usize = 1024;
const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;
const TIMEOUT_RANGE_MS: std::ops::RangeInclusive<u64> = 100..=3_600_000;

impl ConnectionSection {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_FRAME_BYTES..=MAX_FRAME_BYTES).contains(&self.max_frame_bytes) {
            return Err(BusError::Config(format!(
                "connection.max_frame_bytes must be between {MIN_FRAME_BYTES} and {MAX_FRAME_BYTES}"
            )));
        }
        if self.read_idle_timeout_ms != 0 && !TIMEOUT_RANGE_MS.contains(&self.read_idle_timeout_ms) {
            return Err(BusError::Config(
                "connection.read_idle_timeout_ms must be 0 or between 100 and 3600000".into(),
            ));
        }
        if self.write_timeout_ms != 0 && !TIMEOUT_RANGE_MS.contains(&self.write_timeout_ms) {
            return Err(BusError::Config(
                "connection.write_timeout_ms must be 0 or between 100 and 3600000".into(),
            ));
        }
        Ok(())
    }

    pub fn read_idle_timeout(&self) -> Option<Duration> {
        (self.read_idle_timeout_ms > 0).then(|| Duration::from_millis(self.read_idle_timeout_ms))
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        (self.write_timeout_ms > 0).then(|| Duration::from_millis(self.write_timeout_ms))
    }
}

fn default_listen() -> String {
    "0.0.0.0:12354".into()
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    12354
}
fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}
fn default_emit_disconnect() -> bool {
    true
}
