//! Shared error type across tcpbus crates.

use thiserror::Error;

/// Stable error codes (safe to log, match on, or send to peers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Bytes did not parse as an envelope.
    Decode,
    /// Envelope could not be serialized.
    Encode,
    /// Record length exceeds the configured limit.
    FrameTooLarge,
    /// Send target is not owned by this endpoint.
    InvalidTarget,
    /// The connection is gone.
    NotConnected,
    /// Socket read/write failure.
    Io,
    /// Read idle or write deadline elapsed.
    Timeout,
    /// Declared but unsupported API.
    Unimplemented,
    /// Invalid configuration.
    Config,
    /// Unsupported config/protocol version.
    UnsupportedVersion,
    /// Internal failure.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and tests.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Decode => "DECODE",
            ErrorCode::Encode => "ENCODE",
            ErrorCode::FrameTooLarge => "FRAME_TOO_LARGE",
            ErrorCode::InvalidTarget => "INVALID_TARGET",
            ErrorCode::NotConnected => "NOT_CONNECTED",
            ErrorCode::Io => "IO",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Unimplemented => "UNIMPLEMENTED",
            ErrorCode::Config => "CONFIG",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, BusError>;

/// Unified error type used by core and endpoints.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    #[error("not connected")]
    NotConnected,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("timed out")]
    Timeout,
    #[error("unimplemented: {0}")]
    Unimplemented(&'static str),
    #[error("config: {0}")]
    Config(String),
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl BusError {
    /// Map to a stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            BusError::Decode(_) => ErrorCode::Decode,
            BusError::Encode(_) => ErrorCode::Encode,
            BusError::FrameTooLarge { .. } => ErrorCode::FrameTooLarge,
            BusError::InvalidTarget(_) => ErrorCode::InvalidTarget,
            BusError::NotConnected => ErrorCode::NotConnected,
            BusError::Io(_) => ErrorCode::Io,
            BusError::Timeout => ErrorCode::Timeout,
            BusError::Unimplemented(_) => ErrorCode::Unimplemented,
            BusError::Config(_) => ErrorCode::Config,
            BusError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            BusError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Whether the peer sent bytes that do not form a valid envelope record.
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, BusError::Decode(_) | BusError::FrameTooLarge { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_decode_and_oversize_count_as_malformed_input() {
        assert!(BusError::Decode("bad".into()).is_malformed_input());
        assert!(BusError::FrameTooLarge { len: 10, max: 1 }.is_malformed_input());
        assert!(!BusError::Timeout.is_malformed_input());
        assert!(!BusError::Io(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")).is_malformed_input());
        assert!(!BusError::NotConnected.is_malformed_input());
    }
}
