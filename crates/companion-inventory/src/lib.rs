//! Inventory side of the companion sync service.
//!
//! The game owns the real inventory; this crate describes what the sync
//! service needs from it and nothing more:
//!
//! 1. **Item lookup**: [`ItemRegistry`] resolves a stable name to an
//!    [`ItemDefinition`], built once from the game's catalog.
//! 2. **Authority contract**: the [`InventoryAuthority`] trait to mutate,
//!    count, snapshot, and subscribe to per-unit change events.
//! 3. **Subscriptions**: an explicit [`Subscription`] handle, so a
//!    closed session can never receive another event.
//! 4. **Reference authority**: [`MemoryInventory`], a thread-safe
//!    in-memory implementation for tools, demos, and tests.
//!
//! # How it fits in the stack
//!
//! ```text
//! Session (above)  ← resolves names, applies commands, forwards events
//!     ↕
//! Inventory (this crate)  ← registry + authority contract
//! ```

mod authority;
mod error;
mod item;
mod memory;
mod snapshot;

pub use authority::{EventSink, InventoryAuthority, InventoryEvent, Subscription};
pub use error::InventoryError;
pub use item::{ItemDefinition, ItemRegistry};
pub use memory::MemoryInventory;
pub use snapshot::InventorySnapshot;
