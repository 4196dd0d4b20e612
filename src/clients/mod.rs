//! Type-safe wrappers around the engine's request channel.

pub mod cart_client;

pub use cart_client::*;
