//! Length-prefixed framing over any async byte stream.
//!
//! The reader and writer are generic over `AsyncRead`/`AsyncWrite` so the
//! same code runs over a TCP half in production and over
//! `tokio::io::duplex` in tests.
//!
//! Only the reader enforces a frame-size ceiling. It bounds what a peer
//! can make us allocate; what we send is bounded by the prefix width.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::TransportError;

/// Size of the big-endian length prefix in bytes.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Default ceiling on a single inbound frame's payload (1 MiB).
pub const DEFAULT_MAX_FRAME_LEN: u32 = 1024 * 1024;

/// Builds a complete frame (prefix + payload) in one buffer.
///
/// # Errors
/// Returns [`TransportError::PayloadTooLarge`] if the payload length does
/// not fit the 4-byte prefix.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, TransportError> {
    let len = u32::try_from(payload.len())
        .map_err(|_| TransportError::PayloadTooLarge { len: payload.len() })?;

    let mut buf = Vec::with_capacity(LENGTH_PREFIX_LEN + payload.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Reads whole frames from a byte stream.
pub struct FrameReader<R> {
    inner: R,
    max_frame_len: u32,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wraps a reader, refusing frames longer than `max_frame_len`.
    pub fn new(inner: R, max_frame_len: u32) -> Self {
        Self {
            inner,
            max_frame_len,
        }
    }

    /// Reads the next frame's payload.
    ///
    /// Returns `Ok(None)` when the peer closes cleanly on a frame boundary.
    /// A close anywhere else is [`TransportError::TruncatedFrame`].
    ///
    /// Not cancel-safe: dropping the future mid-frame loses the bytes read
    /// so far. Callers only cancel it when tearing the connection down.
    pub async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut header = [0u8; LENGTH_PREFIX_LEN];
        let got = self.fill(&mut header).await?;
        if got == 0 {
            return Ok(None);
        }
        if got < LENGTH_PREFIX_LEN {
            return Err(TransportError::TruncatedFrame {
                received: got,
                expected: LENGTH_PREFIX_LEN,
            });
        }

        let len = u32::from_be_bytes(header);
        if len > self.max_frame_len {
            return Err(TransportError::FrameTooLarge {
                len: len as usize,
                max: self.max_frame_len,
            });
        }

        let mut payload = vec![0u8; len as usize];
        let got = self.fill(&mut payload).await?;
        if got < payload.len() {
            return Err(TransportError::TruncatedFrame {
                received: got,
                expected: payload.len(),
            });
        }
        Ok(Some(payload))
    }

    /// Reads until `buf` is full or the stream ends. Returns bytes read.
    async fn fill(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .inner
                .read(&mut buf[filled..])
                .await
                .map_err(TransportError::ReceiveFailed)?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}

/// Writes whole frames to a byte stream.
///
/// There must be exactly one `FrameWriter` per stream; it is the only
/// thing that serializes writes.
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Wraps a writer.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Writes one frame and flushes it.
    pub async fn write_frame(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let frame = encode_frame(payload)?;
        self.inner
            .write_all(&frame)
            .await
            .map_err(TransportError::SendFailed)?;
        self.inner.flush().await.map_err(TransportError::SendFailed)
    }

    /// Shuts down the write side of the stream.
    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.inner
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }
}
