/// Cart data as the storefront displays it.
///
/// # Ownership
/// The cart engine is the only writer of [`CartSnapshot`] and [`PendingEdit`].
/// Everything else (badges, the cart panel) receives snapshots behind an `Arc`
/// and only reads them.
///
/// See [`crate::cart_actor`] for the state machine producing these values.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use tokio::time::Instant;

/// Default upper bound for a line quantity when the remote does not specify one.
pub const DEFAULT_MAX_QUANTITY: u32 = 99;

/// Opaque key identifying one cart line. Stable across quantity edits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineKey(pub String);

impl From<&str> for LineKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for LineKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl Display for LineKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque product identifier used for display lookup and for adding lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductRef(pub String);

impl From<&str> for ProductRef {
    fn from(product: &str) -> Self {
        Self(product.to_string())
    }
}

impl Display for ProductRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One line of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    pub key: LineKey,
    pub quantity: u32,
    pub unit_price_minor: i64,
    pub product_ref: ProductRef,
    /// Per-line limit reported by the remote, if any.
    #[serde(default)]
    pub max_quantity: Option<u32>,
}

impl CartLineItem {
    /// Creates a line with no remote-specified quantity limit.
    pub fn new(
        key: impl Into<LineKey>,
        product_ref: impl Into<ProductRef>,
        quantity: u32,
        unit_price_minor: i64,
    ) -> Self {
        Self {
            key: key.into(),
            quantity,
            unit_price_minor,
            product_ref: product_ref.into(),
            max_quantity: None,
        }
    }

    pub fn line_total_minor(&self) -> i64 {
        self.unit_price_minor * i64::from(self.quantity)
    }

    /// The clamp ceiling for this line.
    pub fn max_allowed(&self, default_max: u32) -> u32 {
        self.max_quantity.unwrap_or(default_max)
    }
}

/// The cart exactly as the remote service returned it. Unversioned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCart {
    pub items: Vec<CartLineItem>,
}

impl RemoteCart {
    pub fn new(items: Vec<CartLineItem>) -> Self {
        Self { items }
    }
}

/// A versioned, display-ready view of the cart.
///
/// `version` is assigned by the engine and strictly increases with every
/// snapshot it publishes. `errors` holds the user-visible failure message for
/// lines whose last edit was reverted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartSnapshot {
    pub items: Vec<CartLineItem>,
    pub item_count: u32,
    pub subtotal_minor: i64,
    pub version: u64,
    pub errors: BTreeMap<LineKey, String>,
}

impl CartSnapshot {
    /// Builds a snapshot, dropping zero-quantity lines and computing totals.
    pub fn from_items(
        items: impl IntoIterator<Item = CartLineItem>,
        version: u64,
        errors: BTreeMap<LineKey, String>,
    ) -> Self {
        let items: Vec<CartLineItem> = items.into_iter().filter(|i| i.quantity > 0).collect();
        let item_count = items.iter().map(|i| i.quantity).sum();
        let subtotal_minor = items.iter().map(CartLineItem::line_total_minor).sum();
        Self {
            items,
            item_count,
            subtotal_minor,
            version,
            errors,
        }
    }

    pub fn line(&self, key: &LineKey) -> Option<&CartLineItem> {
        self.items.iter().find(|item| &item.key == key)
    }

    /// Displayed quantity for `key`; absent lines count as zero.
    pub fn quantity_of(&self, key: &LineKey) -> u32 {
        self.line(key).map_or(0, |item| item.quantity)
    }

    pub fn error_for(&self, key: &LineKey) -> Option<&str> {
        self.errors.get(key).map(String::as_str)
    }
}

/// A requested quantity change, relative or absolute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    Delta(i64),
    Absolute(u32),
}

impl QuantityChange {
    /// Resolves the change against the displayed quantity, clamped to `[0, max]`.
    pub fn target(self, current: u32, max: u32) -> u32 {
        let raw = match self {
            QuantityChange::Delta(delta) => i64::from(current).saturating_add(delta),
            QuantityChange::Absolute(value) => i64::from(value),
        };
        raw.clamp(0, i64::from(max)) as u32
    }
}

/// An optimistic edit that has been applied locally but not yet settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEdit {
    pub key: LineKey,
    pub target_quantity: u32,
    pub sequence_number: u64,
    pub issued_at: Instant,
}
