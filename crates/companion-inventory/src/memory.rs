//! In-memory [`InventoryAuthority`].
//!
//! Everything lives behind one `std::sync::Mutex`: mutations, snapshots,
//! and listener registration all serialize on it, which is what makes
//! `subscribe` atomic and keeps event order identical for every listener.
//! Events are pushed into unbounded channels while the lock is held;
//! that never blocks, so the critical section stays short.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::{
    EventSink, InventoryAuthority, InventoryEvent, InventorySnapshot,
    ItemDefinition, Subscription,
};

#[derive(Default)]
struct Shared {
    items: BTreeMap<String, u32>,
    listeners: HashMap<u64, EventSink>,
    next_listener: u64,
}

impl Shared {
    fn snapshot(&self) -> InventorySnapshot {
        self.items
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect()
    }

    /// Sends `units` copies of `event` to every listener, dropping the
    /// ones whose receiver has gone away.
    fn fire(&mut self, event: InventoryEvent, units: u32) {
        if units == 0 {
            return;
        }
        self.listeners.retain(|id, sink| {
            let alive = (0..units).all(|_| sink.send(event.clone()).is_ok());
            if !alive {
                tracing::debug!(listener = id, "pruning closed inventory listener");
            }
            alive
        });
    }

    fn remove(&mut self, name: &str, count: u32) -> u32 {
        let Some(held) = self.items.get_mut(name) else {
            return 0;
        };
        let removed = count.min(*held);
        *held -= removed;
        if *held == 0 {
            self.items.remove(name);
        }
        self.fire(InventoryEvent::ItemRemoved(name.to_string()), removed);
        removed
    }
}

/// A thread-safe inventory held entirely in memory.
///
/// Cheap to clone; clones share the same contents and listeners.
///
/// ```rust
/// use companion_inventory::{InventoryAuthority, ItemDefinition, MemoryInventory};
///
/// let wood = ItemDefinition::new("wood", "icons/wood.png", 64);
/// let inv = MemoryInventory::new();
/// inv.add_item(&wood, 3);
/// inv.remove_item(&wood, 5); // clamps at zero
/// assert_eq!(inv.count_of("wood"), 0);
/// ```
#[derive(Clone, Default)]
pub struct MemoryInventory {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryInventory {
    /// Creates an empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an inventory pre-filled with `(name, count)` pairs.
    ///
    /// No events fire; there is nobody to hear them yet.
    pub fn with_items<S: Into<String>>(items: impl IntoIterator<Item = (S, u32)>) -> Self {
        let inv = Self::new();
        {
            let mut shared = inv.lock();
            for (name, count) in items {
                if count > 0 {
                    *shared.items.entry(name.into()).or_insert(0) += count;
                }
            }
        }
        inv
    }

    /// Number of registered event listeners.
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        // A panic while holding the lock cannot leave the map half-written
        // in a way later reads would misinterpret, so keep going.
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InventoryAuthority for MemoryInventory {
    fn add_item(&self, item: &ItemDefinition, count: u32) {
        if count == 0 {
            return;
        }
        let mut shared = self.lock();
        let held = shared.items.entry(item.name.clone()).or_insert(0);
        let added = count.min(u32::MAX - *held);
        *held += added;
        shared.fire(InventoryEvent::ItemAdded(item.name.clone()), added);
    }

    fn remove_item(&self, item: &ItemDefinition, count: u32) {
        self.lock().remove(&item.name, count);
    }

    fn count_of(&self, name: &str) -> u32 {
        self.lock().items.get(name).copied().unwrap_or(0)
    }

    fn remove_all(&self, item: &ItemDefinition) -> u32 {
        self.lock().remove(&item.name, u32::MAX)
    }

    fn snapshot(&self) -> InventorySnapshot {
        self.lock().snapshot()
    }

    fn subscribe(&self, sink: EventSink) -> (InventorySnapshot, Subscription) {
        let mut shared = self.lock();
        let id = shared.next_listener;
        shared.next_listener += 1;
        shared.listeners.insert(id, sink);
        let snapshot = shared.snapshot();
        drop(shared);

        let weak: Weak<Mutex<Shared>> = Arc::downgrade(&self.shared);
        let subscription = Subscription::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .listeners
                    .remove(&id);
            }
        });
        (snapshot, subscription)
    }
}
