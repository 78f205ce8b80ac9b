//! Per-connection session: one snapshot, then live two-way sync.
//!
//! Each accepted connection gets its own `Session`, running on its own
//! Tokio task:
//!
//! ```text
//! Awaiting → Syncing ─(snapshot written)→ Live ─(EOF, error, shutdown)→ Closing
//!               │                                                         ↑
//!               └──────────────────(snapshot write failed)────────────────┘
//! ```
//!
//! While Live the session runs two duties over the two halves of the
//! socket:
//!   - inbound, on the session task: read frame → decode → dispatch;
//!   - outbound, on a spawned task: authority event → packet → frame.
//!
//! The outbound task is the only writer, so frames never interleave, and
//! it writes events in the order the authority queued them.

use std::sync::Arc;

use companion_inventory::{InventoryAuthority, InventoryEvent, InventorySnapshot};
use companion_protocol::{Codec, ItemCount, Packet};
use companion_transport::{ConnectionId, FrameReader, FrameWriter, TransportError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dispatch::{dispatch, Command};
use crate::server::ServerState;
use crate::CompanionError;

/// Lifecycle state of a companion session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connection accepted, nothing exchanged yet.
    Awaiting,
    /// Subscribed to the authority, sending the snapshot.
    Syncing,
    /// Forwarding events out and applying commands in.
    Live,
    /// Unsubscribed, flushing and tearing down. Terminal.
    Closing,
}

type OutboundResult = Result<(), CompanionError>;

/// Aborts the wrapped task if it is still running when dropped.
struct AbortOnDrop(JoinHandle<OutboundResult>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub(crate) struct Session<A, C> {
    id: ConnectionId,
    state: SessionState,
    server: Arc<ServerState<A, C>>,
    cancel: CancellationToken,
}

impl<A, C> Session<A, C>
where
    A: InventoryAuthority,
    C: Codec,
{
    pub(crate) fn new(
        id: ConnectionId,
        server: Arc<ServerState<A, C>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            state: SessionState::Awaiting,
            server,
            cancel,
        }
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(conn_id = %self.id, from = ?self.state, to = ?next, "session state");
        self.state = next;
    }

    /// Drives the session from Awaiting to Closing.
    ///
    /// Returns `Ok(())` when the companion hung up or the server shut the
    /// session down; an error when the connection failed or the companion
    /// broke the protocol.
    pub(crate) async fn run<R, W>(
        mut self,
        mut reader: FrameReader<R>,
        mut writer: FrameWriter<W>,
    ) -> Result<(), CompanionError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        self.transition(SessionState::Syncing);

        // Subscribing first means events fired while the snapshot is in
        // flight queue up behind it instead of being lost.
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshot, subscription) = self.server.authority.subscribe(events_tx);

        let packet = snapshot_packet(&snapshot);
        if let Err(e) = write_packet(&mut writer, &self.server, &packet).await {
            self.transition(SessionState::Closing);
            subscription.unsubscribe();
            return Err(e.into());
        }
        tracing::debug!(conn_id = %self.id, items = snapshot.len(), "snapshot sent");

        self.transition(SessionState::Live);
        let stop = self.cancel.child_token();
        let closing = CancellationToken::new();
        let outbound = AbortOnDrop(tokio::spawn(outbound_loop(
            self.id,
            writer,
            events_rx,
            Arc::clone(&self.server),
            stop.clone(),
            closing.clone(),
        )));

        let inbound = self.inbound_loop(&mut reader, &stop).await;

        self.transition(SessionState::Closing);
        subscription.unsubscribe();
        closing.cancel();
        let outbound = self.finish_outbound(outbound).await;

        inbound.and(outbound)
    }

    async fn inbound_loop<R: AsyncRead + Unpin>(
        &self,
        reader: &mut FrameReader<R>,
        stop: &CancellationToken,
    ) -> Result<(), CompanionError> {
        loop {
            let frame = tokio::select! {
                () = stop.cancelled() => return Ok(()),
                frame = reader.read_frame() => frame?,
            };
            let Some(payload) = frame else {
                tracing::debug!(conn_id = %self.id, "companion closed the connection");
                return Ok(());
            };

            let packet = self.server.codec.decode(&payload)?;
            tracing::debug!(conn_id = %self.id, kind = packet.kind(), "packet received");
            self.apply(packet);
        }
    }

    fn apply(&self, packet: Packet) {
        let Some(command) = Command::from_packet(packet) else {
            tracing::warn!(conn_id = %self.id, "ignoring snapshot sent by companion");
            return;
        };
        let result = dispatch(self.server.authority.as_ref(), &self.server.registry, &command);
        if let Err(e) = result {
            tracing::warn!(conn_id = %self.id, error = %e, "command skipped");
        }
    }

    /// Waits for the writer to flush what was already queued, bounded by
    /// the drain timeout. Past that the writer is aborted.
    async fn finish_outbound(&self, mut outbound: AbortOnDrop) -> OutboundResult {
        let timeout = self.server.config.drain_timeout;
        match tokio::time::timeout(timeout, &mut outbound.0).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::error!(conn_id = %self.id, error = %e, "outbound task failed");
                Ok(())
            }
            Err(_) => {
                tracing::warn!(
                    conn_id = %self.id,
                    ?timeout,
                    "outbound drain timed out, dropping queued packets"
                );
                Ok(())
            }
        }
    }
}

/// The single writer: turns queued authority events into frames.
///
/// Runs until the queue is closed and empty (`closing` fired), or a
/// write fails, in which case it cancels `stop` so the inbound duty ends
/// too.
async fn outbound_loop<A, C, W>(
    id: ConnectionId,
    mut writer: FrameWriter<W>,
    mut events: mpsc::UnboundedReceiver<InventoryEvent>,
    server: Arc<ServerState<A, C>>,
    stop: CancellationToken,
    closing: CancellationToken,
) -> OutboundResult
where
    A: InventoryAuthority,
    C: Codec,
    W: AsyncWrite + Unpin,
{
    let mut draining = false;
    let result = loop {
        let event = tokio::select! {
            biased;
            event = events.recv() => event,
            () = closing.cancelled(), if !draining => {
                // No new events may enter; whatever is buffered still goes out.
                draining = true;
                events.close();
                continue;
            }
        };
        let Some(event) = event else {
            break Ok(());
        };

        let packet = event_packet(event);
        if let Err(e) = write_packet(&mut writer, &server, &packet).await {
            stop.cancel();
            break Err(e.into());
        }
    };

    if let Err(e) = writer.shutdown().await {
        tracing::debug!(conn_id = %id, error = %e, "write shutdown failed");
    }
    result
}

async fn write_packet<A, C, W>(
    writer: &mut FrameWriter<W>,
    server: &ServerState<A, C>,
    packet: &Packet,
) -> Result<(), TransportError>
where
    C: Codec,
    W: AsyncWrite + Unpin,
{
    let payload = server.codec.encode(packet);
    let timeout = server.config.write_timeout;
    tokio::time::timeout(timeout, writer.write_frame(&payload))
        .await
        .map_err(|_| TransportError::Timeout(timeout))?
}

fn snapshot_packet(snapshot: &InventorySnapshot) -> Packet {
    Packet::Snapshot {
        items: snapshot
            .iter()
            .map(|(name, amount)| ItemCount::new(name, amount))
            .collect(),
    }
}

fn event_packet(event: InventoryEvent) -> Packet {
    match event {
        InventoryEvent::ItemAdded(name) => Packet::AddOne { name },
        InventoryEvent::ItemRemoved(name) => Packet::DeleteOne { name },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use companion_inventory::{ItemDefinition, ItemRegistry, MemoryInventory};
    use companion_protocol::JsonCodec;
    use companion_transport::DEFAULT_MAX_FRAME_LEN;
    use tokio::io::{duplex, split, DuplexStream, ReadHalf, WriteHalf};

    use crate::ServerConfig;

    type Reader = FrameReader<ReadHalf<DuplexStream>>;
    type Writer = FrameWriter<WriteHalf<DuplexStream>>;

    fn wood() -> ItemDefinition {
        ItemDefinition::new("wood", "icons/wood.png", 64)
    }

    fn server_state(inv: &MemoryInventory) -> Arc<ServerState<MemoryInventory, JsonCodec>> {
        Arc::new(ServerState {
            authority: Arc::new(inv.clone()),
            registry: Arc::new(ItemRegistry::new([wood()]).unwrap()),
            codec: JsonCodec,
            config: ServerConfig::default(),
            sessions: Arc::default(),
        })
    }

    fn framed(io: DuplexStream) -> (Reader, Writer) {
        let (r, w) = split(io);
        (
            FrameReader::new(r, DEFAULT_MAX_FRAME_LEN),
            FrameWriter::new(w),
        )
    }

    async fn next_packet(reader: &mut Reader) -> Option<Packet> {
        let frame = tokio::time::timeout(Duration::from_secs(5), reader.read_frame())
            .await
            .expect("timed out waiting for a frame")
            .expect("read failed")?;
        Some(JsonCodec.decode(&frame).expect("server sent an undecodable frame"))
    }

    fn start(
        inv: &MemoryInventory,
    ) -> (
        (Reader, Writer),
        CancellationToken,
        JoinHandle<Result<(), CompanionError>>,
    ) {
        let (server_io, client_io) = duplex(64 * 1024);
        let (reader, writer) = framed(server_io);
        let cancel = CancellationToken::new();
        let session = Session::new(ConnectionId::new(1), server_state(inv), cancel.clone());
        assert_eq!(session.state, SessionState::Awaiting);
        let task = tokio::spawn(session.run(reader, writer));
        (framed(client_io), cancel, task)
    }

    #[tokio::test]
    async fn test_snapshot_then_events_in_order() {
        let inv = MemoryInventory::with_items([("wood", 3)]);
        let ((mut rx, _tx), _cancel, _task) = start(&inv);

        assert_eq!(
            next_packet(&mut rx).await,
            Some(Packet::Snapshot { items: vec![ItemCount::new("wood", 3)] })
        );

        inv.add_item(&wood(), 1);
        inv.remove_item(&wood(), 1);
        assert_eq!(next_packet(&mut rx).await, Some(Packet::AddOne { name: "wood".into() }));
        assert_eq!(next_packet(&mut rx).await, Some(Packet::DeleteOne { name: "wood".into() }));
    }

    #[tokio::test]
    async fn test_command_is_applied_and_echoed() {
        let inv = MemoryInventory::new();
        let ((mut rx, mut tx), _cancel, _task) = start(&inv);
        next_packet(&mut rx).await;

        let cmd = JsonCodec.encode(&Packet::AddOne { name: "wood".into() });
        tx.write_frame(&cmd).await.unwrap();

        assert_eq!(next_packet(&mut rx).await, Some(Packet::AddOne { name: "wood".into() }));
        assert_eq!(inv.count_of("wood"), 1);
    }

    #[tokio::test]
    async fn test_client_hangup_closes_cleanly_and_unsubscribes() {
        let inv = MemoryInventory::new();
        let ((mut rx, tx), _cancel, task) = start(&inv);
        next_packet(&mut rx).await;
        assert_eq!(inv.listener_count(), 1);

        drop(tx);
        drop(rx);
        task.await.unwrap().unwrap();
        assert_eq!(inv.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_frame_is_protocol_violation() {
        let inv = MemoryInventory::new();
        let ((mut rx, mut tx), _cancel, task) = start(&inv);
        next_packet(&mut rx).await;

        tx.write_frame(br#"{"type":"bogus","data":{}}"#).await.unwrap();

        let err = task.await.unwrap().unwrap_err();
        assert!(err.is_protocol_violation());
        assert_eq!(inv.listener_count(), 0);
        assert_eq!(next_packet(&mut rx).await, None);
    }

    #[tokio::test]
    async fn test_snapshot_write_failure_unsubscribes() {
        let inv = MemoryInventory::new();
        let (server_io, client_io) = duplex(1024);
        drop(client_io);
        let (reader, writer) = framed(server_io);
        let session = Session::new(
            ConnectionId::new(2),
            server_state(&inv),
            CancellationToken::new(),
        );

        let err = session.run(reader, writer).await.unwrap_err();
        assert!(matches!(err, CompanionError::Transport(_)));
        assert_eq!(inv.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_flushes_queued_events_before_close() {
        let inv = MemoryInventory::new();
        let ((mut rx, _tx), cancel, task) = start(&inv);
        next_packet(&mut rx).await;

        inv.add_item(&wood(), 3);
        cancel.cancel();
        task.await.unwrap().unwrap();

        for _ in 0..3 {
            assert_eq!(next_packet(&mut rx).await, Some(Packet::AddOne { name: "wood".into() }));
        }
        assert_eq!(next_packet(&mut rx).await, None);
    }

    #[tokio::test]
    async fn test_client_snapshot_is_ignored() {
        let inv = MemoryInventory::new();
        let ((mut rx, mut tx), _cancel, task) = start(&inv);
        next_packet(&mut rx).await;

        let bogus_snapshot = JsonCodec.encode(&Packet::Snapshot {
            items: vec![ItemCount::new("wood", 99)],
        });
        tx.write_frame(&bogus_snapshot).await.unwrap();
        let cmd = JsonCodec.encode(&Packet::AddOne { name: "wood".into() });
        tx.write_frame(&cmd).await.unwrap();

        assert_eq!(next_packet(&mut rx).await, Some(Packet::AddOne { name: "wood".into() }));
        assert_eq!(inv.count_of("wood"), 1);
        assert!(!task.is_finished());
    }
}
