//! Wire protocol for the companion sync service.
//!
//! This crate defines what the game and a companion client say to each
//! other:
//!
//! - **Types** ([`Packet`], [`ItemCount`]): the messages that travel
//!   inside a frame.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how a packet becomes
//!   frame payload bytes and back.
//! - **Errors** ([`ProtocolError`]): what makes an incoming payload
//!   unusable.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (frames) and the session
//! (inventory context). It knows nothing about sockets or inventories.
//!
//! ```text
//! Transport (frame bytes) → Protocol (Packet) → Session (inventory)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{ItemCount, Packet};
