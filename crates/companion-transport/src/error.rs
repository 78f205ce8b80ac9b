use std::time::Duration;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listening socket failed (port in use, permission denied).
    #[error("bind to {addr} failed: {source}")]
    Bind {
        /// The address we tried to bind.
        addr: String,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Accepting an incoming connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// An inbound frame's length prefix exceeds the configured maximum.
    /// The reader refuses to allocate for it.
    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    FrameTooLarge {
        /// Length announced by the frame.
        len: usize,
        /// The configured ceiling.
        max: u32,
    },

    /// An outbound payload is too long for the 4-byte length prefix.
    #[error("payload of {len} bytes does not fit a frame")]
    PayloadTooLarge {
        /// Payload length.
        len: usize,
    },

    /// The peer closed the stream in the middle of a frame.
    #[error("connection closed mid-frame ({received} of {expected} bytes)")]
    TruncatedFrame {
        /// Bytes of the current section that did arrive.
        received: usize,
        /// Bytes the section needed.
        expected: usize,
    },

    /// A send did not complete in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl TransportError {
    /// Returns `true` if the peer broke framing rules, as opposed to the
    /// socket failing or our own payload being unsendable.
    pub fn is_framing_violation(&self) -> bool {
        matches!(self, Self::FrameTooLarge { .. })
    }
}
