//! `CompanionServer` builder and accept loop.
//!
//! This is the entry point for running the sync service. It ties the
//! layers together: transport → protocol → session → inventory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use companion_inventory::{InventoryAuthority, ItemRegistry};
use companion_protocol::{Codec, JsonCodec};
use companion_transport::{ConnectionId, TcpConnection, TcpTransport, Transport};
use tokio::sync::Notify;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

use crate::session::Session;
use crate::{CompanionError, ServerConfig};

/// Pause after a failed accept so a persistent failure (e.g. out of file
/// descriptors) does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// How long aborted sessions get to unwind before `run` returns.
const ABORT_GRACE: Duration = Duration::from_millis(100);

/// Shared server state passed to each session task.
pub(crate) struct ServerState<A, C> {
    pub(crate) authority: Arc<A>,
    pub(crate) registry: Arc<ItemRegistry>,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
    pub(crate) sessions: Arc<SessionArena>,
}

struct SessionEntry {
    cancel: CancellationToken,
    abort: AbortHandle,
}

/// Live sessions keyed by connection id.
///
/// An entry stays until its task exits, so the count includes sessions
/// that are still draining during shutdown.
#[derive(Default)]
pub(crate) struct SessionArena {
    entries: Mutex<HashMap<ConnectionId, SessionEntry>>,
    emptied: Notify,
}

impl SessionArena {
    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, SessionEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    fn remove(&self, id: ConnectionId) {
        let mut entries = self.lock();
        entries.remove(&id);
        if entries.is_empty() {
            self.emptied.notify_waiters();
        }
    }

    /// Signals every session to close. Returns how many were signalled.
    fn cancel_all(&self) -> usize {
        let entries = self.lock();
        for entry in entries.values() {
            entry.cancel.cancel();
        }
        entries.len()
    }

    /// Aborts every session still present. Returns how many were aborted.
    fn abort_all(&self) -> usize {
        let entries = self.lock();
        for (id, entry) in entries.iter() {
            tracing::warn!(conn_id = %id, "session did not close in time, aborting");
            entry.abort.abort();
        }
        entries.len()
    }

    /// Resolves once no session is left.
    async fn wait_empty(&self) {
        loop {
            let emptied = self.emptied.notified();
            tokio::pin!(emptied);
            // Register before checking so a removal in between is not missed.
            emptied.as_mut().enable();
            if self.len() == 0 {
                return;
            }
            emptied.await;
        }
    }
}

/// Removes a session from the arena when its task exits, however it
/// exits.
struct SessionGuard {
    id: ConnectionId,
    sessions: Arc<SessionArena>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions.remove(self.id);
    }
}

/// Builder for configuring and starting a companion server.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use companion::prelude::*;
///
/// # async fn start() -> Result<(), CompanionError> {
/// let inventory = Arc::new(MemoryInventory::new());
/// let registry = Arc::new(ItemRegistry::new([
///     ItemDefinition::new("wood", "icons/wood.png", 64),
/// ])?);
///
/// let server = CompanionServerBuilder::new()
///     .bind("0.0.0.0:7999")
///     .build(inventory, registry)
///     .await?;
/// let handle = server.handle();
/// tokio::spawn(server.run());
/// // ... later
/// handle.shutdown();
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct CompanionServerBuilder {
    config: ServerConfig,
}

impl CompanionServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the largest frame payload accepted from a companion.
    pub fn max_frame_len(mut self, len: u32) -> Self {
        self.config.max_frame_len = len;
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener and returns a server ready to [`run`](CompanionServer::run).
    ///
    /// # Errors
    /// Fails if the address cannot be bound; check
    /// [`CompanionError::is_bind_error`].
    pub async fn build<A: InventoryAuthority>(
        self,
        authority: Arc<A>,
        registry: Arc<ItemRegistry>,
    ) -> Result<CompanionServer<A, JsonCodec>, CompanionError> {
        self.build_with_codec(authority, registry, JsonCodec).await
    }

    /// Like [`build`](Self::build), with a custom codec.
    pub async fn build_with_codec<A: InventoryAuthority, C: Codec>(
        self,
        authority: Arc<A>,
        registry: Arc<ItemRegistry>,
        codec: C,
    ) -> Result<CompanionServer<A, C>, CompanionError> {
        let transport = TcpTransport::bind(&self.config.bind_addr).await?;

        let state = Arc::new(ServerState {
            authority,
            registry,
            codec,
            config: self.config,
            sessions: Arc::default(),
        });

        Ok(CompanionServer {
            transport,
            state,
            shutdown: CancellationToken::new(),
        })
    }
}

/// Cloneable handle for stopping a running server from elsewhere.
#[derive(Clone)]
pub struct ServerHandle {
    shutdown: CancellationToken,
    sessions: Arc<SessionArena>,
}

impl ServerHandle {
    /// Asks the server to stop accepting and close every session.
    ///
    /// Returns immediately; [`CompanionServer::run`] returns once the
    /// sessions are closed.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Returns `true` once shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Number of sessions currently open, including ones still draining.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

/// A bound companion server, created by [`CompanionServerBuilder`].
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct CompanionServer<A, C> {
    transport: TcpTransport,
    state: Arc<ServerState<A, C>>,
    shutdown: CancellationToken,
}

impl<A: InventoryAuthority, C: Codec> CompanionServer<A, C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns a handle that can stop the server.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shutdown: self.shutdown.clone(),
            sessions: Arc::clone(&self.state.sessions),
        }
    }

    /// Runs the accept loop until shutdown is requested, then closes
    /// every session.
    ///
    /// Each accepted connection gets its own session task. A failing
    /// session never affects the loop or other sessions.
    pub async fn run(mut self) -> Result<(), CompanionError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "companion server running");

        loop {
            let accepted = tokio::select! {
                () = self.shutdown.cancelled() => break,
                accepted = self.transport.accept() => accepted,
            };
            match accepted {
                Ok(conn) => self.spawn_session(conn),
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }

        // Dropping the listener refuses new connections while we drain.
        let Self {
            transport, state, ..
        } = self;
        drop(transport);
        close_sessions(&state.sessions, state.config.shutdown_timeout).await;

        tracing::info!("companion server stopped");
        Ok(())
    }

    fn spawn_session(&self, conn: TcpConnection) {
        let id = conn.id();
        let peer = conn.peer_addr();
        let cancel = self.shutdown.child_token();
        let state = Arc::clone(&self.state);
        let session = Session::new(id, Arc::clone(&state), cancel.clone());

        // Hold the arena lock across spawn + insert so a session that
        // ends instantly cannot remove itself before it was added.
        let mut sessions = self.state.sessions.lock();
        let task = tokio::spawn(async move {
            let _guard = SessionGuard {
                id,
                sessions: Arc::clone(&state.sessions),
            };
            let (reader, writer) = conn.into_framed(state.config.max_frame_len);
            match session.run(reader, writer).await {
                Ok(()) => tracing::info!(conn_id = %id, "companion session closed"),
                Err(e) if e.is_protocol_violation() => {
                    tracing::warn!(
                        conn_id = %id,
                        error = %e,
                        "closing session after protocol error"
                    );
                }
                Err(e) => {
                    tracing::debug!(conn_id = %id, error = %e, "session ended with error");
                }
            }
        });
        let abort = task.abort_handle();
        sessions.insert(id, SessionEntry { cancel, abort });
        tracing::info!(conn_id = %id, %peer, live = sessions.len(), "companion connected");
    }
}

/// Signals every session to close and waits for them to leave the arena,
/// aborting any still running when `timeout` elapses.
async fn close_sessions(sessions: &SessionArena, timeout: Duration) {
    let signalled = sessions.cancel_all();
    if signalled == 0 {
        return;
    }
    tracing::info!(sessions = signalled, "closing companion sessions");

    if tokio::time::timeout(timeout, sessions.wait_empty())
        .await
        .is_ok()
    {
        return;
    }

    sessions.abort_all();
    if tokio::time::timeout(ABORT_GRACE, sessions.wait_empty())
        .await
        .is_err()
    {
        tracing::warn!(remaining = sessions.len(), "sessions still unwinding after abort");
    }
}
