//! # Storefront Overlay
//!
//! > **The interactive layer of a storefront, without the DOM.**
//!
//! Two problems sit at the center of every theme script: overlays that fight
//! over the page (scroll, focus, "only one menu open"), and a cart summary that
//! must stay truthful while the user clicks `+` faster than the server answers.
//! This crate solves both behind small traits, so a browser binding only has to
//! implement the page ([`resources::Document`]) and the cart endpoint
//! ([`remote::CartService`]).
//!
//! ## Architecture Notes
//!
//! ### 1. One owner per shared resource
//! The [`resources::ResourceManager`] is the only writer of the scroll lock and
//! the focus-trap stack. Overlays hold capabilities (a scroll lock token, a
//! focus trap handle) and hand them back; they never toggle page state
//! themselves. The lock is reference counted, so closing one of two open
//! overlays leaves the page locked.
//!
//! ### 2. The cart engine is an actor
//! [`cart_actor::CartEngine`] owns all cart state and processes requests
//! sequentially in its own task. Dependencies (the remote service, the
//! broadcaster) are injected at `run(context)`. Callers talk to it through the
//! cloneable [`clients::CartClient`].
//!
//! ### 3. Staleness is a comparison, not a race
//! Every edit gets a per-line sequence number. A response older than one
//! already applied is dropped, whatever order the network delivers them in.
//!
//! ### 4. Observability
//! `tracing` everywhere, with `key`/`seq` fields on cart events. See
//! [`lifecycle::tracing`].
//!
//! ## Module Tour
//!
//! ### 1. The Page ([`resources`], [`overlay`])
//! - **Role**: arbitration of scroll, focus and exclusivity; the four overlay
//!   widgets; one delegated entry point for page events.
//! - **Key items**: [`ResourceManager`](resources::ResourceManager),
//!   [`OverlayHost`](overlay::OverlayHost).
//!
//! ### 2. The Cart ([`cart_actor`], [`clients`], [`remote`])
//! - **Role**: optimistic edits, debounce, reconciliation against the remote.
//! - **Key items**: [`CartClient`](clients::CartClient),
//!   [`CartService`](remote::CartService).
//!
//! ### 3. The Surfaces ([`broadcast`])
//! - **Role**: every count badge and the cart panel show the same snapshot.
//!
//! ### 4. The Orchestrator ([`lifecycle`])
//! - **Role**: configuration, tracing, starting and stopping everything.
//! - **Key items**: [`Storefront`](lifecycle::Storefront).
//!
//! ## Quick Start
//!
//! ```bash
//! # Run the demo against an in-memory cart
//! RUST_LOG=info cargo run
//!
//! # With a config file
//! STOREFRONT_CONFIG=storefront.toml RUST_LOG=debug cargo run
//! ```
//!
//! ### Running Tests
//!
//! ```bash
//! cargo test
//! ```

pub mod broadcast;
pub mod cart_actor;
pub mod clients;
pub mod lifecycle;
pub mod model;
pub mod neighbors;
pub mod overlay;
pub mod remote;
pub mod resources;
