//! Storefront Ajax cart endpoints over HTTP.
//!
//! - `GET  /cart.js` returns the cart.
//! - `POST /cart/change.js {"id": key, "quantity": n}` returns the cart.
//! - `POST /cart/add.js {"id": product, "quantity": n}` returns the added line
//!   only, so it is followed by a `GET /cart.js`.
//!
//! A 422 carries a human-readable `description`.

use super::{CartService, RemoteError};
use crate::model::{CartLineItem, LineKey, ProductRef, RemoteCart};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct WireCart {
    items: Vec<WireLine>,
}

#[derive(Debug, Deserialize)]
struct WireLine {
    key: String,
    quantity: u32,
    /// Unit price in minor units.
    price: i64,
    variant_id: u64,
    #[serde(default)]
    quantity_limit: Option<u32>,
}

impl From<WireCart> for RemoteCart {
    fn from(cart: WireCart) -> Self {
        RemoteCart::new(
            cart.items
                .into_iter()
                .map(|line| CartLineItem {
                    key: line.key.into(),
                    quantity: line.quantity,
                    unit_price_minor: line.price,
                    product_ref: ProductRef(line.variant_id.to_string()),
                    max_quantity: line.quantity_limit,
                })
                .collect(),
        )
    }
}

#[derive(Debug, Serialize)]
struct LineUpdate<'a> {
    id: &'a str,
    quantity: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpCartService {
    client: Client,
    base_url: String,
}

impl HttpCartService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, path: &str, id: &str, quantity: u32) -> Result<Response, RemoteError> {
        debug!(path, id, quantity, "POST");
        self.client
            .post(self.url(path))
            .json(&LineUpdate { id, quantity })
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))
    }

    /// Maps the status to an error, or hands the successful response back.
    async fn check_status(response: Response) -> Result<Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let reason = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.description);
            return Err(RemoteError::Rejected { reason });
        }
        Err(RemoteError::Transport(format!(
            "cart endpoint returned {}",
            status.as_u16()
        )))
    }

    async fn read_cart(response: Response) -> Result<RemoteCart, RemoteError> {
        let response = Self::check_status(response).await?;
        let text = response
            .text()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        let cart: WireCart =
            serde_json::from_str(&text).map_err(|e| RemoteError::Malformed(e.to_string()))?;
        Ok(cart.into())
    }
}

#[async_trait]
impl CartService for HttpCartService {
    async fn current_cart(&self) -> Result<RemoteCart, RemoteError> {
        let response = self
            .client
            .get(self.url("/cart.js"))
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Self::read_cart(response).await
    }

    async fn change_line(&self, key: &LineKey, quantity: u32) -> Result<RemoteCart, RemoteError> {
        let response = self.post("/cart/change.js", &key.0, quantity).await?;
        Self::read_cart(response).await
    }

    async fn add_line(&self, product: &ProductRef, quantity: u32) -> Result<RemoteCart, RemoteError> {
        let response = self.post("/cart/add.js", &product.0, quantity).await?;
        Self::check_status(response).await?;
        self.current_cart().await
    }
}
