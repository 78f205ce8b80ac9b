//! The contract the game's inventory fulfils for the sync service.
//!
//! The sync service never owns inventory state. It reads and mutates it
//! through [`InventoryAuthority`], which the game implements over its own
//! item collection (or which tests implement with a fake).

use tokio::sync::mpsc;

use crate::{InventorySnapshot, ItemDefinition};

/// A single-unit change to the inventory.
///
/// Adding three units fires `ItemAdded` three times. That granularity is
/// what lets a remote mirror stay exact by applying one event at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryEvent {
    /// One unit of the named item was added.
    ItemAdded(String),
    /// One unit of the named item was removed.
    ItemRemoved(String),
}

impl InventoryEvent {
    /// The item this event refers to.
    pub fn item_name(&self) -> &str {
        match self {
            Self::ItemAdded(name) | Self::ItemRemoved(name) => name,
        }
    }
}

/// Where an authority delivers events for one subscriber.
///
/// Unbounded so that firing an event never blocks the thread that mutated
/// the inventory (usually the game loop).
pub type EventSink = mpsc::UnboundedSender<InventoryEvent>;

/// The game's inventory, as seen by the sync service.
///
/// # Trait bounds
///
/// `Send + Sync + 'static`: the authority is shared by every session task
/// and by the game itself, possibly across threads.
pub trait InventoryAuthority: Send + Sync + 'static {
    /// Adds `count` units of `item`, firing one `ItemAdded` per unit.
    fn add_item(&self, item: &ItemDefinition, count: u32);

    /// Removes up to `count` units of `item`, clamping at zero. Fires one
    /// `ItemRemoved` per unit actually removed.
    fn remove_item(&self, item: &ItemDefinition, count: u32);

    /// Units of the named item currently held.
    fn count_of(&self, name: &str) -> u32;

    /// Removes every unit of `item` and returns how many were removed.
    ///
    /// The default reads the count and then removes it, which can race
    /// with a concurrent mutation. Implementations with a lock should
    /// override it to do both under one critical section.
    fn remove_all(&self, item: &ItemDefinition) -> u32 {
        let count = self.count_of(&item.name);
        if count > 0 {
            self.remove_item(item, count);
        }
        count
    }

    /// The current contents.
    fn snapshot(&self) -> InventorySnapshot;

    /// Registers `sink` for change events and returns the contents at the
    /// moment of registration.
    ///
    /// Both must happen atomically with respect to mutations: every change
    /// is either reflected in the returned snapshot or delivered to the
    /// sink, never both and never neither.
    fn subscribe(&self, sink: EventSink) -> (InventorySnapshot, Subscription);
}

/// Handle for an active event subscription.
///
/// Calling [`unsubscribe`](Self::unsubscribe), or dropping the handle,
/// deregisters the sink. Once that returns the authority will not deliver
/// another event through it.
#[must_use = "dropping a Subscription immediately unsubscribes"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Creates a handle that runs `cancel` exactly once on unsubscribe.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Deregisters the sink.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
