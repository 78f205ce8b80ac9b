//! Item definitions and the name → definition registry.

use std::collections::hash_map::{Entry, HashMap};

use serde::{Deserialize, Serialize};

use crate::InventoryError;

/// Static description of an item kind.
///
/// Catalogs use camelCase keys:
///
/// ```json
/// {"name": "wood", "displayIcon": "icons/wood.png", "maxStackSize": 64}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDefinition {
    /// Unique, stable name. This is what travels on the wire.
    pub name: String,
    /// Icon asset the companion client may show for the item.
    pub display_icon: String,
    /// Largest stack the game allows. Informational here; the game
    /// enforces it.
    pub max_stack_size: u32,
}

impl ItemDefinition {
    /// Creates a definition.
    pub fn new(
        name: impl Into<String>,
        display_icon: impl Into<String>,
        max_stack_size: u32,
    ) -> Self {
        Self {
            name: name.into(),
            display_icon: display_icon.into(),
            max_stack_size,
        }
    }
}

/// Read-only lookup from item name to [`ItemDefinition`].
///
/// Built once at startup and never modified afterwards, so it can be
/// shared behind an `Arc` and read from any task without locking.
#[derive(Debug, Default)]
pub struct ItemRegistry {
    items: HashMap<String, ItemDefinition>,
}

impl ItemRegistry {
    /// Builds a registry from every definition in the catalog.
    ///
    /// # Errors
    /// Returns [`InventoryError::DuplicateItem`] if two definitions share
    /// a name.
    pub fn new(
        definitions: impl IntoIterator<Item = ItemDefinition>,
    ) -> Result<Self, InventoryError> {
        let mut items = HashMap::new();
        for def in definitions {
            match items.entry(def.name.clone()) {
                Entry::Occupied(_) => {
                    return Err(InventoryError::DuplicateItem(def.name));
                }
                Entry::Vacant(slot) => {
                    slot.insert(def);
                }
            }
        }
        tracing::debug!(items = items.len(), "item registry built");
        Ok(Self { items })
    }

    /// Builds a registry from a JSON array of definitions.
    ///
    /// # Errors
    /// [`InventoryError::InvalidCatalog`] for malformed JSON,
    /// [`InventoryError::DuplicateItem`] for repeated names.
    pub fn from_json(bytes: &[u8]) -> Result<Self, InventoryError> {
        let definitions: Vec<ItemDefinition> =
            serde_json::from_slice(bytes).map_err(InventoryError::InvalidCatalog)?;
        Self::new(definitions)
    }

    /// Looks up an item by name.
    ///
    /// # Errors
    /// Returns [`InventoryError::UnknownItem`] when nothing matches.
    pub fn resolve(&self, name: &str) -> Result<&ItemDefinition, InventoryError> {
        self.items
            .get(name)
            .ok_or_else(|| InventoryError::UnknownItem(name.to_string()))
    }

    /// Returns `true` if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    /// Iterates over all definitions in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &ItemDefinition> {
        self.items.values()
    }

    /// Number of registered items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the registry holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
