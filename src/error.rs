//! Error types for wirepool.

use thiserror::Error;

/// Main error type for all transport, framing and dispatch operations.
///
/// Domain outcomes ("user not found" and the like) are never represented
/// here. They travel inside a successfully decoded response payload.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The listener could not bind (port in use, permission denied, bad address).
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// One of the eager pool connections could not be opened.
    #[error("connection pool init failed: {0}")]
    PoolInit(String),

    /// The pool has been closed; no further connections are handed out.
    #[error("connection pool is closed")]
    PoolClosed,

    /// Encoded envelope does not fit into the fixed-width length header.
    #[error("frame body of {len} bytes exceeds maximum {max}")]
    FrameTooLarge { len: usize, max: usize },

    /// The stream closed before a full header or body arrived.
    #[error("short read: expected {expected} bytes, received {received}")]
    ShortRead { expected: usize, received: usize },

    /// Length header was not a decimal number.
    #[error("malformed frame header: {0}")]
    MalformedHeader(String),

    /// Envelope or payload could not be deserialized into the target shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// Envelope or payload could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),

    /// Writing a frame to the connection failed.
    #[error("send failed: {0}")]
    Send(#[source] std::io::Error),

    /// No handler is registered under this operation name.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// Registration rejected: duplicate name or a handler whose request or
    /// response is not a record type.
    #[error("invalid handler registration: {0}")]
    InvalidHandler(String),

    /// A client or server setting is out of range.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A read or write did not finish within the configured deadline.
    #[error("operation timed out")]
    Timeout,

    /// Reopening a single pooled connection failed.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Other socket I/O error (accept, read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RpcError {
    /// Whether this error leaves the connection it happened on in an unknown
    /// state. Such connections are discarded and the call may be retried.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RpcError::Send(_)
                | RpcError::ShortRead { .. }
                | RpcError::MalformedHeader(_)
                | RpcError::Timeout
                | RpcError::Connect { .. }
                | RpcError::Io(_)
        )
    }
}

impl From<rmp_serde::encode::Error> for RpcError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        RpcError::Encode(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for RpcError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        RpcError::Decode(e.to_string())
    }
}

/// Result type alias using RpcError.
pub type Result<T> = std::result::Result<T, RpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        let io = || std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");

        assert!(RpcError::Send(io()).is_transport());
        assert!(RpcError::ShortRead {
            expected: 4,
            received: 1
        }
        .is_transport());
        assert!(RpcError::MalformedHeader("ab12".into()).is_transport());
        assert!(RpcError::Timeout.is_transport());
        assert!(RpcError::Io(io()).is_transport());

        assert!(!RpcError::PoolClosed.is_transport());
        assert!(!RpcError::Decode("bad".into()).is_transport());
        assert!(!RpcError::Encode("bad".into()).is_transport());
        assert!(!RpcError::FrameTooLarge { len: 10_000, max: 9999 }.is_transport());
        assert!(!RpcError::UnknownOperation("nope".into()).is_transport());
        assert!(!RpcError::Config("bad".into()).is_transport());
    }

    #[test]
    fn test_display_messages() {
        let err = RpcError::FrameTooLarge {
            len: 10_000,
            max: 9999,
        };
        assert_eq!(err.to_string(), "frame body of 10000 bytes exceeds maximum 9999");

        let err = RpcError::UnknownOperation("Login".into());
        assert_eq!(err.to_string(), "unknown operation: Login");
    }
}
