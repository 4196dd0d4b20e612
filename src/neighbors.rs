//! Persisted state owned by neighbouring page features.
//!
//! The announcement bar remembers, for the session, that it was dismissed. The
//! wishlist keeps a durable list of product ids. Both stores are browser
//! storage in a real page; only their interfaces matter here.

use crate::model::ProductRef;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Session flag set when the announcement bar is closed.
pub const ANNOUNCEMENT_DISMISSED: &str = "announcement-dismissed";

/// Durable list holding wishlisted product ids.
pub const WISHLIST: &str = "wishlist";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("stored list '{name}' is not a JSON array of strings: {source}")]
    Corrupt {
        name: String,
        source: serde_json::Error,
    },
}

/// Session-scoped boolean flags.
pub trait SessionFlags: Send {
    fn get(&self, name: &str) -> bool;
    fn set(&mut self, name: &str, value: bool);
}

/// Durable per-origin lists of strings, stored as JSON.
pub trait ListStore: Send {
    fn load(&self, name: &str) -> Result<Vec<String>, StoreError>;
    fn save(&mut self, name: &str, items: &[String]);
}

#[derive(Debug, Clone, Default)]
pub struct MemorySessionFlags {
    flags: Arc<Mutex<BTreeSet<String>>>,
}

impl SessionFlags for MemorySessionFlags {
    fn get(&self, name: &str) -> bool {
        self.flags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name)
    }

    fn set(&mut self, name: &str, value: bool) {
        let mut flags = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
        if value {
            flags.insert(name.to_string());
        } else {
            flags.remove(name);
        }
    }
}

/// Keeps each list as serialized JSON text, like browser local storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryListStore {
    raw: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryListStore {
    /// Stores raw text under `name`, bypassing serialization.
    pub fn put_raw(&self, name: &str, text: &str) {
        self.raw
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), text.to_string());
    }
}

impl ListStore for MemoryListStore {
    fn load(&self, name: &str) -> Result<Vec<String>, StoreError> {
        let raw = self.raw.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(text) = raw.get(name) else {
            return Ok(Vec::new());
        };
        serde_json::from_str(text).map_err(|source| StoreError::Corrupt {
            name: name.to_string(),
            source,
        })
    }

    fn save(&mut self, name: &str, items: &[String]) {
        let text = Value::from(items.to_vec()).to_string();
        self.raw
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), text);
    }
}

/// Toggles `product` in the wishlist. Returns whether it is now listed.
///
/// A corrupt list is replaced rather than blocking the toggle.
pub fn toggle_listed(store: &mut dyn ListStore, product: &ProductRef) -> bool {
    let mut items = store.load(WISHLIST).unwrap_or_else(|error| {
        tracing::warn!(%error, "Discarding unreadable wishlist");
        Vec::new()
    });
    let listed = match items.iter().position(|id| id == &product.0) {
        Some(pos) => {
            items.remove(pos);
            false
        }
        None => {
            items.push(product.0.clone());
            true
        }
    };
    store.save(WISHLIST, &items);
    listed
}
