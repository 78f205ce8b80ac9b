//! Unified error type for the companion service.

use companion_inventory::InventoryError;
use companion_protocol::ProtocolError;
use companion_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum CompanionError {
    /// A transport-level error (bind, socket I/O, framing).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A payload could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An inventory-level error (unknown item, bad catalog).
    #[error(transparent)]
    Inventory(#[from] InventoryError),
}

impl CompanionError {
    /// Returns `true` if the listening socket could not be bound.
    pub fn is_bind_error(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Bind { .. }))
    }

    /// Returns `true` if the peer broke the protocol: undecodable payload,
    /// unknown packet type, or an oversized inbound frame. Such a session
    /// cannot be resynchronized and is closed.
    pub fn is_protocol_violation(&self) -> bool {
        match self {
            Self::Protocol(_) => true,
            Self::Transport(e) => e.is_framing_violation(),
            Self::Inventory(_) => false,
        }
    }
}
