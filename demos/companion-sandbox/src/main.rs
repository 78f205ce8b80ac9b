//! Standalone companion server over an in-memory inventory.
//!
//! Point a companion client at it to poke the protocol without a running
//! game. Set `COMPANION_CATALOG` to a JSON array of item definitions to
//! replace the built-in catalog; the other `COMPANION_*` variables are
//! described on `ServerConfig::from_env`.

use std::sync::Arc;

use companion::prelude::*;

const DEFAULT_CATALOG: &[(&str, &str, u32)] = &[
    ("wood", "icons/wood.png", 64),
    ("stone", "icons/stone.png", 64),
    ("iron_ingot", "icons/iron_ingot.png", 32),
    ("torch", "icons/torch.png", 16),
];

fn load_registry() -> Result<ItemRegistry, Box<dyn std::error::Error>> {
    match std::env::var("COMPANION_CATALOG") {
        Ok(path) => {
            let bytes = std::fs::read(&path)?;
            let registry = ItemRegistry::from_json(&bytes)?;
            tracing::info!(%path, items = registry.len(), "loaded item catalog");
            Ok(registry)
        }
        Err(_) => Ok(ItemRegistry::new(DEFAULT_CATALOG.iter().map(
            |&(name, icon, max)| ItemDefinition::new(name, icon, max),
        ))?),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    companion::init_tracing();

    let config = ServerConfig::from_env();
    let registry = Arc::new(load_registry()?);

    // Seed a little of each item so fresh clients have something to show.
    let inventory = Arc::new(MemoryInventory::with_items(
        registry.iter().map(|item| (item.name.clone(), 1)),
    ));

    let server = CompanionServerBuilder::new()
        .config(config)
        .build(inventory, registry)
        .await?;
    tracing::info!(addr = %server.local_addr()?, "sandbox ready");

    let handle = server.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, shutting down");
            handle.shutdown();
        }
    });

    server.run().await?;
    Ok(())
}
