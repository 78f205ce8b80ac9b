//! Packet types for the companion wire format.
//!
//! Every frame carries one JSON object with a `type` discriminator and a
//! `data` object:
//!
//! ```text
//! {"type":"snapshot","data":{"items":[{"name":"wood","amount":3}]}}
//! {"type":"addOne","data":{"name":"wood"}}
//! {"type":"deleteOne","data":{"name":"wood"}}
//! {"type":"deleteAll","data":{"name":"wood"}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One line of a snapshot: how many of an item the inventory holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemCount {
    /// Stable item name, as registered in the item registry.
    pub name: String,
    /// Units held. Never zero in snapshots the server sends.
    pub amount: u32,
}

impl ItemCount {
    /// Creates a count for `name`.
    pub fn new(name: impl Into<String>, amount: u32) -> Self {
        Self {
            name: name.into(),
            amount,
        }
    }
}

/// A single message on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Server → Client: full inventory state, sent once after connect.
    Snapshot {
        /// Every held item with a non-zero count.
        items: Vec<ItemCount>,
    },

    /// Server → Client: one unit was added.
    /// Client → Server: add one unit.
    AddOne {
        /// Item name.
        name: String,
    },

    /// Server → Client: one unit was removed.
    /// Client → Server: remove one unit.
    DeleteOne {
        /// Item name.
        name: String,
    },

    /// Client → Server: remove every unit of the item.
    DeleteAll {
        /// Item name.
        name: String,
    },
}

impl Packet {
    pub(crate) const SNAPSHOT: &'static str = "snapshot";
    pub(crate) const ADD_ONE: &'static str = "addOne";
    pub(crate) const DELETE_ONE: &'static str = "deleteOne";
    pub(crate) const DELETE_ALL: &'static str = "deleteAll";

    /// The value of this packet's `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Snapshot { .. } => Self::SNAPSHOT,
            Self::AddOne { .. } => Self::ADD_ONE,
            Self::DeleteOne { .. } => Self::DELETE_ONE,
            Self::DeleteAll { .. } => Self::DELETE_ALL,
        }
    }

    /// The item a command packet refers to. `None` for snapshots.
    pub fn item_name(&self) -> Option<&str> {
        match self {
            Self::Snapshot { .. } => None,
            Self::AddOne { name }
            | Self::DeleteOne { name }
            | Self::DeleteAll { name } => Some(name),
        }
    }

    /// Builds the JSON object for this packet.
    pub fn to_json(&self) -> Value {
        let data = match self {
            Self::Snapshot { items } => json!({ "items": items }),
            Self::AddOne { name }
            | Self::DeleteOne { name }
            | Self::DeleteAll { name } => json!({ "name": name }),
        };
        json!({ "type": self.kind(), "data": data })
    }
}

/// The outer shape shared by every packet, before `data` is interpreted.
#[derive(Debug, Deserialize)]
pub(crate) struct RawPacket {
    #[serde(rename = "type")]
    pub(crate) kind: String,
    #[serde(default)]
    pub(crate) data: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SnapshotData {
    pub(crate) items: Vec<ItemCount>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NameData {
    pub(crate) name: String,
}
