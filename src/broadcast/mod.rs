//! # Cart Badge Broadcaster
//!
//! Fans every snapshot the cart engine settles on out to all display surfaces:
//! the count badges in the header and the cart panel's content region.
//!
//! # Architecture Note
//! Surfaces are updated inside a single `publish` call, and the panel content
//! goes out through one `watch` channel, so no surface can observe a snapshot
//! newer or older than another. A snapshot whose version is not above the last
//! published one is dropped, which keeps every surface monotonic even if a
//! caller publishes out of order.

use crate::model::CartSnapshot;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::debug;

/// A surface that shows the cart item count.
pub trait CountDisplay: Send {
    /// `visible` is `false` when the cart is empty.
    fn show_count(&mut self, count: u32, visible: bool);
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct BadgeState {
    count: u32,
    visible: bool,
}

/// An in-memory count badge. Clones share state, so one clone can be
/// registered while another is read.
#[derive(Debug, Clone, Default)]
pub struct CountBadge {
    state: Arc<Mutex<BadgeState>>,
}

impl CountBadge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u32 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).count
    }

    pub fn is_visible(&self) -> bool {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).visible
    }
}

impl CountDisplay for CountBadge {
    fn show_count(&mut self, count: u32, visible: bool) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = BadgeState { count, visible };
    }
}

pub struct CartBroadcaster {
    displays: Vec<Box<dyn CountDisplay>>,
    content: watch::Sender<Arc<CartSnapshot>>,
    last_version: Option<u64>,
}

impl Default for CartBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl CartBroadcaster {
    pub fn new() -> Self {
        let (content, _) = watch::channel(Arc::new(CartSnapshot::default()));
        Self {
            displays: Vec::new(),
            content,
            last_version: None,
        }
    }

    /// Adds a count surface and brings it up to date immediately.
    pub fn register_display(&mut self, mut display: impl CountDisplay + 'static) {
        let latest = self.latest();
        display.show_count(latest.item_count, latest.item_count > 0);
        self.displays.push(Box::new(display));
    }

    /// Receiver for the panel content region.
    pub fn subscribe(&self) -> watch::Receiver<Arc<CartSnapshot>> {
        self.content.subscribe()
    }

    /// Pushes `snapshot` to every surface. Returns `false` if it was stale and
    /// nothing was updated.
    pub fn publish(&mut self, snapshot: Arc<CartSnapshot>) -> bool {
        if self.last_version.is_some_and(|last| snapshot.version <= last) {
            debug!(version = snapshot.version, last = ?self.last_version, "Stale snapshot dropped");
            return false;
        }
        self.last_version = Some(snapshot.version);
        let count = snapshot.item_count;
        for display in &mut self.displays {
            display.show_count(count, count > 0);
        }
        self.content.send_replace(snapshot);
        debug!(count, surfaces = self.displays.len(), "Snapshot published");
        true
    }

    pub fn latest(&self) -> Arc<CartSnapshot> {
        self.content.borrow().clone()
    }
}
