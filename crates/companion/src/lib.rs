//! # Companion
//!
//! Mirrors a game's inventory to companion clients over TCP.
//!
//! Each client gets one snapshot of the inventory on connect, then a live
//! stream of single-unit changes. Clients can add, remove, or clear items
//! and every connected client sees the result.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use companion::prelude::*;
//!
//! # async fn start() -> Result<(), CompanionError> {
//! let registry = Arc::new(ItemRegistry::new([
//!     ItemDefinition::new("wood", "icons/wood.png", 64),
//! ])?);
//! let server = CompanionServerBuilder::new()
//!     .bind("127.0.0.1:7999")
//!     .build(Arc::new(MemoryInventory::new()), registry)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod dispatch;
mod error;
mod server;
mod session;
mod telemetry;

pub use config::{ServerConfig, DEFAULT_PORT};
pub use dispatch::{dispatch, Command};
pub use error::CompanionError;
pub use server::{CompanionServer, CompanionServerBuilder, ServerHandle};
pub use session::SessionState;
pub use telemetry::init_tracing;

pub mod prelude {
    pub use crate::{
        CompanionError, CompanionServer, CompanionServerBuilder, ServerConfig, ServerHandle,
    };
    pub use companion_inventory::{
        InventoryAuthority, InventoryEvent, InventorySnapshot, ItemDefinition, ItemRegistry,
        MemoryInventory,
    };
    pub use companion_protocol::{Codec, ItemCount, JsonCodec, Packet};
}
