//! # Storefront Lifecycle & Orchestration
//!
//! Starting, wiring and stopping the interactive layer of a page.
//!
//! ## The Storefront Pattern
//!
//! [`Storefront`] is the conductor:
//!
//! 1. **Actor Creation** - the cart engine and its client
//! 2. **Dependency Injection** - the remote service and the broadcaster are
//!    handed to the engine at `run(context)`, not at construction
//! 3. **Overlay Registration** - every overlay is registered with one
//!    resource manager, and the trigger table is filled in
//! 4. **Graceful Shutdown** - overlays are torn down, the client is dropped,
//!    and the engine task is awaited
//!
//! ```rust,ignore
//! let storefront = Storefront::builder(config)
//!     .count_display(badge)
//!     .cart_panel("cart", "cart-toggle", "cart-drawer")
//!     .start(document, service);
//! // ...
//! storefront.shutdown().await;
//! ```
//!
//! ## Cached-page restoration
//!
//! When the browser restores the page from its back/forward cache, call
//! [`Storefront::restore`]. It closes every overlay, starts a new resource
//! generation and registers the overlays again, so nothing acquired before the
//! page was cached can leak into the restored one.
//!
//! ## Observability
//!
//! [`setup_tracing`] initializes structured logging; see [`tracing`].
//!
//! ## Configuration
//!
//! [`StorefrontConfig`] is loaded from TOML; see [`config`].

pub mod config;
pub mod storefront;
pub mod tracing;

pub use config::*;
pub use storefront::*;
pub use self::tracing::*;
