//! TCP transport implementation.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

use crate::{ConnectionId, FrameReader, FrameWriter, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A TCP [`Transport`] that listens for incoming connections.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    ///
    /// # Errors
    /// Returns [`TransportError::Bind`] if the address is unavailable.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self { listener })
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, peer_addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        // Frames are small and latency matters more than batching.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer_addr, error = %e, "failed to set TCP_NODELAY");
        }

        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, %peer_addr, "accepted TCP connection");

        Ok(TcpConnection {
            id,
            peer_addr,
            stream,
        })
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// A single accepted TCP connection, not yet split into halves.
pub struct TcpConnection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    stream: TcpStream,
}

impl TcpConnection {
    /// Returns the unique identifier for this connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the remote peer's address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Splits the connection into independently owned framed halves.
    ///
    /// Reading and writing then proceed on separate tasks without a lock.
    /// `max_frame_len` caps inbound frames only.
    pub fn into_framed(
        self,
        max_frame_len: u32,
    ) -> (FrameReader<OwnedReadHalf>, FrameWriter<OwnedWriteHalf>) {
        let (read, write) = self.stream.into_split();
        (
            FrameReader::new(read, max_frame_len),
            FrameWriter::new(write),
        )
    }
}
