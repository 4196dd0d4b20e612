//! A cart held in process memory, with per-product stock limits.

use super::{CartService, RemoteError};
use crate::model::{CartLineItem, LineKey, ProductRef, RemoteCart};
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct Product {
    unit_price_minor: i64,
    stock: u32,
}

#[derive(Debug, Default)]
struct Store {
    products: BTreeMap<ProductRef, Product>,
    lines: Vec<CartLineItem>,
    failures: VecDeque<RemoteError>,
}

impl Store {
    fn cart(&self) -> RemoteCart {
        RemoteCart::new(self.lines.clone())
    }

    fn take_failure(&mut self) -> Result<(), RemoteError> {
        match self.failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn over_stock(stock: u32) -> RemoteError {
    RemoteError::Rejected {
        reason: Some(format!("You can only add {stock} of this item to your cart.")),
    }
}

/// Behaves like the storefront's cart endpoints: quantities above stock are
/// rejected with a reason, zero removes the line, adds merge into the existing
/// line for a product.
#[derive(Debug, Default)]
pub struct InMemoryCartService {
    store: Mutex<Store>,
    latency: Duration,
}

impl InMemoryCartService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Adds a purchasable product.
    pub fn with_product(self, product: impl Into<ProductRef>, unit_price_minor: i64, stock: u32) -> Self {
        self.store().products.insert(
            product.into(),
            Product {
                unit_price_minor,
                stock,
            },
        );
        self
    }

    /// Puts a line in the cart directly. The line key is the product ref.
    pub fn with_line(self, product: impl Into<ProductRef>, quantity: u32) -> Self {
        let product = product.into();
        {
            let mut store = self.store();
            let unit_price_minor = store
                .products
                .get(&product)
                .map_or(0, |p| p.unit_price_minor);
            store.lines.push(CartLineItem::new(
                product.0.clone(),
                product,
                quantity,
                unit_price_minor,
            ));
        }
        self
    }

    /// Makes the next call fail with `error`. Queued failures apply in order.
    pub fn fail_next(&self, error: RemoteError) {
        self.store().failures.push_back(error);
    }

    /// The cart as currently stored.
    pub fn snapshot(&self) -> RemoteCart {
        self.store().cart()
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl CartService for InMemoryCartService {
    async fn current_cart(&self) -> Result<RemoteCart, RemoteError> {
        self.delay().await;
        let mut store = self.store();
        store.take_failure()?;
        Ok(store.cart())
    }

    async fn change_line(&self, key: &LineKey, quantity: u32) -> Result<RemoteCart, RemoteError> {
        self.delay().await;
        let mut store = self.store();
        store.take_failure()?;

        let Some(pos) = store.lines.iter().position(|line| &line.key == key) else {
            return Err(RemoteError::Rejected {
                reason: Some("This item is no longer in your cart.".to_string()),
            });
        };
        if quantity == 0 {
            store.lines.remove(pos);
            debug!(%key, "Line removed");
            return Ok(store.cart());
        }
        let product = store.lines[pos].product_ref.clone();
        if let Some(stock) = store.products.get(&product).map(|p| p.stock) {
            if quantity > stock {
                return Err(over_stock(stock));
            }
        }
        store.lines[pos].quantity = quantity;
        debug!(%key, quantity, "Line changed");
        Ok(store.cart())
    }

    async fn add_line(&self, product: &ProductRef, quantity: u32) -> Result<RemoteCart, RemoteError> {
        self.delay().await;
        let mut store = self.store();
        store.take_failure()?;

        let Some(details) = store.products.get(product).copied() else {
            return Err(RemoteError::Rejected {
                reason: Some("This product is unavailable.".to_string()),
            });
        };
        let existing = store.lines.iter().position(|line| &line.product_ref == product);
        let in_cart = existing.map_or(0, |pos| store.lines[pos].quantity);
        let total = in_cart.saturating_add(quantity);
        if total > details.stock {
            return Err(over_stock(details.stock));
        }
        match existing {
            Some(pos) => store.lines[pos].quantity = total,
            None => store.lines.push(CartLineItem::new(
                product.0.clone(),
                product.clone(),
                quantity,
                details.unit_price_minor,
            )),
        }
        debug!(%product, quantity, total, "Line added");
        Ok(store.cart())
    }
}
