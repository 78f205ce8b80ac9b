//! Point-in-time view of an inventory.

use std::collections::BTreeMap;

use crate::InventoryEvent;

/// Item name → count, derived from an authority on demand.
///
/// Zero counts are never stored: a missing name and a count of zero mean
/// the same thing, and equality treats them the same way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventorySnapshot {
    counts: BTreeMap<String, u32>,
}

impl InventorySnapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Units of `name` held (zero if absent).
    pub fn count(&self, name: &str) -> u32 {
        self.counts.get(name).copied().unwrap_or(0)
    }

    /// Iterates `(name, count)` pairs in name order. Counts are non-zero.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counts.iter().map(|(name, count)| (name.as_str(), *count))
    }

    /// Number of distinct items held.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns `true` if nothing is held.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Applies one per-unit change event.
    ///
    /// Removing an absent item is a no-op, mirroring the authority's
    /// clamp at zero.
    pub fn apply(&mut self, event: &InventoryEvent) {
        match event {
            InventoryEvent::ItemAdded(name) => {
                let count = self.counts.entry(name.clone()).or_insert(0);
                *count = count.saturating_add(1);
            }
            InventoryEvent::ItemRemoved(name) => {
                if let Some(count) = self.counts.get_mut(name) {
                    *count -= 1;
                    if *count == 0 {
                        self.counts.remove(name);
                    }
                }
            }
        }
    }
}

impl<S: Into<String>> FromIterator<(S, u32)> for InventorySnapshot {
    fn from_iter<I: IntoIterator<Item = (S, u32)>>(iter: I) -> Self {
        let mut counts = BTreeMap::new();
        for (name, count) in iter {
            if count > 0 {
                *counts.entry(name.into()).or_insert(0) += count;
            }
        }
        Self { counts }
    }
}
