//! Error types for the overlay resource manager.

use crate::model::{ElementId, OverlayId};
use thiserror::Error;

/// A capability was released that the manager never handed out, or already
/// took back.
///
/// This is a programming error. Debug builds panic on it; release builds log
/// and ignore it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResourceMisuseError {
    #[error("scroll lock token {token} (generation {generation}) is not outstanding")]
    UnknownScrollLock { token: u64, generation: u64 },

    #[error("focus trap {trap} (generation {generation}) is not on the stack")]
    UnknownFocusTrap { trap: u64, generation: u64 },
}

/// Runtime failures an overlay can hit while acquiring resources.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResourceError {
    /// The page has no element with the container's identity.
    #[error("Container not found: {0}")]
    MissingContainer(ElementId),

    /// The overlay was never registered with the manager.
    #[error("Overlay not registered: {0}")]
    UnknownOverlay(OverlayId),
}
