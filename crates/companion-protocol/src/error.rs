//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means the peer sent something we cannot
//! interpret. Mid-stream, that means the two sides no longer agree on
//! what the bytes mean, so sessions treat it as fatal for the connection.

/// Errors that can occur while decoding a packet.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The payload is not valid UTF-8.
    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// The payload is not valid JSON, or a field is missing or mistyped.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The `type` field names a packet we do not know.
    #[error("unknown packet type {0:?}")]
    UnknownType(String),
}
