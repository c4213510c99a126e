//! Error types for apc-client.

use thiserror::Error;

/// Main error type for all client operations.
#[derive(Debug, Error)]
pub enum ApcError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Protocol error (bad magic, invalid frame kind, oversized payload).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Endpoint string could not be parsed or is unsupported.
    #[error("Invalid endpoint: {0}")]
    Endpoint(String),

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type alias using ApcError.
pub type Result<T> = std::result::Result<T, ApcError>;
