//! # Remote Cart Service
//!
//! The authoritative cart lives on the storefront's server. The engine only
//! sees it through [`CartService`], which returns the complete cart after every
//! call.
//!
//! Implementations:
//! - [`HttpCartService`]: the storefront's Ajax cart endpoints.
//! - [`InMemoryCartService`]: a local cart with stock limits, for the demo and
//!   full-system tests.
//! - [`mock`]: channel-backed and expectation-based doubles for tests.

pub mod http;
pub mod memory;
pub mod mock;

pub use http::HttpCartService;
pub use memory::InMemoryCartService;

use crate::model::{LineKey, ProductRef, RemoteCart};
use async_trait::async_trait;
use thiserror::Error;

/// Shown when a rejection carries no reason of its own.
pub const GENERIC_REJECTION_MESSAGE: &str = "This item could not be updated.";

/// Shown for every transport-class failure.
pub const TRANSPORT_MESSAGE: &str = "Could not reach the cart. Please try again.";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Change rejected: {}", reason.as_deref().unwrap_or("no reason given"))]
    Rejected { reason: Option<String> },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("No response after {after_ms}ms")]
    Timeout { after_ms: u64 },
}

impl RemoteError {
    /// Text to show next to the affected line.
    pub fn user_message(&self) -> String {
        match self {
            RemoteError::Rejected { reason: Some(reason) } => reason.clone(),
            RemoteError::Rejected { reason: None } => GENERIC_REJECTION_MESSAGE.to_string(),
            RemoteError::Transport(_) | RemoteError::Malformed(_) | RemoteError::Timeout { .. } => {
                TRANSPORT_MESSAGE.to_string()
            }
        }
    }
}

/// The remote system of record for the cart.
#[async_trait]
pub trait CartService: Send + Sync {
    /// Fetches the current cart.
    async fn current_cart(&self) -> Result<RemoteCart, RemoteError>;

    /// Sets `key` to `quantity`. Zero removes the line.
    async fn change_line(&self, key: &LineKey, quantity: u32) -> Result<RemoteCart, RemoteError>;

    /// Adds `quantity` of `product`, merging into an existing line if there is one.
    async fn add_line(&self, product: &ProductRef, quantity: u32) -> Result<RemoteCart, RemoteError>;
}
