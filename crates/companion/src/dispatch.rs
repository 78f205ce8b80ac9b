//! Maps client commands onto authority mutations.

use companion_inventory::{InventoryAuthority, InventoryError, ItemRegistry};
use companion_protocol::Packet;

/// A mutation requested by a companion client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Add one unit.
    AddOne(String),
    /// Remove one unit.
    DeleteOne(String),
    /// Remove every unit currently held.
    DeleteAll(String),
}

impl Command {
    /// Extracts the command carried by a packet.
    ///
    /// Returns `None` for snapshots, which only flow server → client.
    pub fn from_packet(packet: Packet) -> Option<Self> {
        match packet {
            Packet::AddOne { name } => Some(Self::AddOne(name)),
            Packet::DeleteOne { name } => Some(Self::DeleteOne(name)),
            Packet::DeleteAll { name } => Some(Self::DeleteAll(name)),
            Packet::Snapshot { .. } => None,
        }
    }

    /// The item the command targets.
    pub fn item_name(&self) -> &str {
        match self {
            Self::AddOne(name) | Self::DeleteOne(name) | Self::DeleteAll(name) => name,
        }
    }
}

/// Applies `command` to the authority. Exactly one authority call per
/// command.
///
/// # Errors
/// Returns [`InventoryError::UnknownItem`] if the name is not registered;
/// the authority is left untouched.
pub fn dispatch<A: InventoryAuthority + ?Sized>(
    authority: &A,
    registry: &ItemRegistry,
    command: &Command,
) -> Result<(), InventoryError> {
    let item = registry.resolve(command.item_name())?;
    match command {
        Command::AddOne(_) => authority.add_item(item, 1),
        Command::DeleteOne(_) => authority.remove_item(item, 1),
        Command::DeleteAll(_) => {
            let removed = authority.remove_all(item);
            tracing::debug!(item = %item.name, removed, "removed all units");
        }
    }
    Ok(())
}
