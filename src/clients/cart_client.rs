//! # Cart Client
//!
//! Provides a high‑level API for interacting with the cart engine.
use crate::cart_actor::{CartError, CartRequest};
use crate::model::{CartSnapshot, LineKey, ProductRef, QuantityChange};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument};

/// Client for interacting with the cart engine. Cheap to clone.
#[derive(Clone)]
pub struct CartClient {
    sender: mpsc::Sender<CartRequest>,
}

impl CartClient {
    pub fn new(sender: mpsc::Sender<CartRequest>) -> Self {
        Self { sender }
    }

    async fn request(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<Arc<CartSnapshot>, CartError>>) -> CartRequest,
    ) -> Result<Arc<CartSnapshot>, CartError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(build(respond_to))
            .await
            .map_err(|_| CartError::EngineClosed)?;
        response.await.map_err(|_| CartError::EngineDropped)?
    }

    /// Adds `delta` (negative to decrease) to the displayed quantity of `key`.
    ///
    /// Returns the optimistic snapshot immediately. The remote sees the edit
    /// once the line has been quiet for the debounce interval.
    #[instrument(skip(self))]
    pub async fn request_quantity_change(
        &self,
        key: impl Into<LineKey> + std::fmt::Debug,
        delta: i64,
    ) -> Result<Arc<CartSnapshot>, CartError> {
        self.change(key.into(), QuantityChange::Delta(delta)).await
    }

    #[instrument(skip(self))]
    pub async fn set_quantity(&self, key: LineKey, quantity: u32) -> Result<Arc<CartSnapshot>, CartError> {
        self.change(key, QuantityChange::Absolute(quantity)).await
    }

    /// Same path as setting the quantity to zero.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, key: LineKey) -> Result<Arc<CartSnapshot>, CartError> {
        self.change(key, QuantityChange::Absolute(0)).await
    }

    pub async fn change(&self, key: LineKey, change: QuantityChange) -> Result<Arc<CartSnapshot>, CartError> {
        debug!(%key, ?change, "Sending change to cart engine");
        self.request(|respond_to| CartRequest::ChangeQuantity {
            key,
            change,
            respond_to,
        })
        .await
    }

    /// Adds a product and waits for the remote. Not optimistic.
    #[instrument(skip(self))]
    pub async fn add_item(&self, product: ProductRef, quantity: u32) -> Result<Arc<CartSnapshot>, CartError> {
        self.request(|respond_to| CartRequest::AddItem {
            product,
            quantity,
            respond_to,
        })
        .await
    }

    /// Fetches the remote cart. Lines with unsent edits keep their optimistic
    /// quantity.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Arc<CartSnapshot>, CartError> {
        self.request(|respond_to| CartRequest::Refresh { respond_to })
            .await
    }

    /// The snapshot currently displayed.
    pub async fn snapshot(&self) -> Result<Arc<CartSnapshot>, CartError> {
        self.request(|respond_to| CartRequest::Snapshot { respond_to })
            .await
    }
}
