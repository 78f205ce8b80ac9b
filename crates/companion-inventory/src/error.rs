//! Error types for the inventory layer.

/// Errors raised by the item registry.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    /// No item definition has this name.
    ///
    /// Recoverable: a command naming an unknown item is skipped and the
    /// connection carries on.
    #[error("unknown item {0:?}")]
    UnknownItem(String),

    /// Two catalog entries share a name. Names must be unique because
    /// they are the only identifier on the wire.
    #[error("duplicate item definition {0:?}")]
    DuplicateItem(String),

    /// The catalog JSON could not be parsed.
    #[error("invalid item catalog: {0}")]
    InvalidCatalog(#[source] serde_json::Error),
}
