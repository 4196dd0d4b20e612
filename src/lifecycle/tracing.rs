//! # Observability & Tracing
//!
//! [`setup_tracing`] installs structured logging for the whole storefront,
//! filtered by `RUST_LOG`.
//!
//! ## What Gets Traced
//!
//! - **Engine lifecycle**: start (with its tuning) and shutdown
//! - **Cart edits**: optimistic updates, dispatches, confirmations, reverts,
//!   each with `key` and `seq` fields
//! - **Overlays**: registration, open/close, dispatch of page events
//! - **Resources**: scroll lock and focus trap depth changes, misuse
//!
//! ## Usage Examples
//!
//! ```bash
//! # Confirmations, dispatches and failures
//! RUST_LOG=info cargo run
//!
//! # Every optimistic update and stale response
//! RUST_LOG=debug cargo run
//! ```
//!
//! ## Workflow Trace Example
//!
//! Three rapid increments on one line, with `RUST_LOG=debug`:
//!
//! ```text
//! DEBUG request_quantity_change{key="abc" delta=1}: Optimistic update key=abc seq=1 target=2
//! DEBUG request_quantity_change{key="abc" delta=1}: Optimistic update key=abc seq=2 target=3
//! DEBUG request_quantity_change{key="abc" delta=1}: Optimistic update key=abc seq=3 target=4
//! DEBUG Debounce superseded key=abc seq=1
//! DEBUG Debounce superseded key=abc seq=2
//! INFO Dispatching change key=abc seq=3 target=4 waited_ms=250
//! INFO Change confirmed key=abc seq=3
//! ```

/// Installs the global subscriber. Call once, at startup.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
