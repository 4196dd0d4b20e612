//! # Cart Actor
//!
//! Keeps the displayed cart in step with the remote cart while the user edits
//! quantities faster than the remote can answer.
//!
//! ## Structure
//!
//! - [`engine`] - [`CartEngine`], the actor loop and reconciliation state
//! - [`messages`] - [`CartRequest`] and the engine's internal events
//! - [`error`] - [`CartError`] for client-facing failures
//! - [`new()`] - Factory function that creates the engine and client
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use storefront_overlay::broadcast::CartBroadcaster;
//! use storefront_overlay::cart_actor::{self, CartContext};
//! use storefront_overlay::lifecycle::CartConfig;
//! use storefront_overlay::remote::InMemoryCartService;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = Arc::new(
//!         InMemoryCartService::new()
//!             .with_product("tee", 2500, 10)
//!             .with_line("tee", 1),
//!     );
//!     let (engine, client) = cart_actor::new(&CartConfig::default());
//!     tokio::spawn(engine.run(CartContext {
//!         service,
//!         broadcaster: CartBroadcaster::new(),
//!     }));
//!
//!     client.refresh().await?;
//!     let snapshot = client.request_quantity_change("tee", 1).await?;
//!     assert_eq!(snapshot.item_count, 2);
//!     Ok(())
//! }
//! ```
//!
//! ## Key Features
//!
//! - **Optimistic edits**: the reply to a change is the updated display, before
//!   the remote has seen anything
//! - **Debounce**: a burst of edits to one line becomes one request
//! - **Stale-response rejection**: per-line sequence numbers decide, not
//!   arrival order
//! - **Revert on failure**: the line returns to its confirmed value and shows
//!   an error for a short while; nothing is retried

pub mod engine;
pub mod error;
pub mod messages;

pub use engine::{CartContext, CartEngine};
pub use error::*;
pub use messages::{CartRequest, Response};

use crate::clients::CartClient;
use crate::lifecycle::CartConfig;

/// Creates a new cart engine and its client.
pub fn new(config: &CartConfig) -> (CartEngine, CartClient) {
    CartEngine::new(config)
}
