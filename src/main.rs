//! # Storefront Demo
//!
//! Drives the interactive layer against an in-memory page and cart:
//!
//! 1. Opening the cart panel (which seeds the cart from the remote).
//! 2. Three rapid increments on one line, sent as a single request.
//! 3. Stacking the navigation menu over the cart panel and closing both.
//! 4. A rejected change that reverts and flags the line.
//!
//! Set `STOREFRONT_CONFIG` to a TOML file to override the defaults. If the
//! file sets `remote.base_url`, the demo talks to that storefront over HTTP.

use std::sync::Arc;
use std::time::Duration;
use storefront_overlay::broadcast::CountBadge;
use storefront_overlay::lifecycle::{setup_tracing, Storefront, StorefrontConfig};
use storefront_overlay::model::{ElementId, OverlayId};
use storefront_overlay::overlay::{TriggerAction, UiEvent};
use storefront_overlay::remote::{CartService, HttpCartService, InMemoryCartService};
use storefront_overlay::resources::MemoryDocument;
use tracing::{info, warn, Instrument};

fn demo_page() -> MemoryDocument {
    let page = MemoryDocument::new();
    let drawer = ElementId::from("cart-drawer");
    let menu = ElementId::from("mobile-menu");
    page.add_focusable("cart-toggle", None)
        .add_focusable("menu-toggle", None)
        .add_element("cart-drawer", None)
        .add_focusable("cart-close", Some(&drawer))
        .add_focusable("checkout", Some(&drawer))
        .add_element("mobile-menu", None)
        .add_focusable("menu-close", Some(&menu))
        .add_focusable("menu-shop", Some(&menu));
    page
}

fn demo_service(config: &StorefrontConfig) -> Arc<dyn CartService> {
    match &config.remote.base_url {
        Some(base_url) => {
            info!(%base_url, "Using HTTP cart service");
            Arc::new(HttpCartService::new(base_url.clone()))
        }
        None => Arc::new(
            InMemoryCartService::new()
                .with_latency(Duration::from_millis(80))
                .with_product("tee", 2500, 10)
                .with_product("mug", 1200, 3)
                .with_line("tee", 1)
                .with_line("mug", 2),
        ),
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    let config = match std::env::var("STOREFRONT_CONFIG") {
        Ok(path) => StorefrontConfig::load(&path).map_err(|e| e.to_string())?,
        Err(_) => StorefrontConfig::default(),
    };
    info!(?config, "Starting storefront demo");

    let badge = CountBadge::new();
    let service = demo_service(&config);
    let mut storefront = Storefront::builder(config)
        .count_display(badge.clone())
        .cart_panel("cart", "cart-toggle", "cart-drawer")
        .navigation_menu("nav", "menu-toggle", "mobile-menu")
        .bind("cart-close", "cart", TriggerAction::Close)
        .bind("menu-close", "nav", TriggerAction::Close)
        .start(demo_page(), service);

    // 1. Open the cart panel
    storefront
        .dispatch(UiEvent::Click {
            target: "cart-toggle".into(),
        })
        .map_err(|e| e.to_string())?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    info!(count = badge.count(), "Cart panel open");

    // 2. Rapid edits
    let span = tracing::info_span!("rapid_edits");
    async {
        for _ in 0..3 {
            match storefront.cart().request_quantity_change("tee", 1).await {
                Ok(snapshot) => info!(displayed = snapshot.quantity_of(&"tee".into()), "Optimistic"),
                Err(e) => warn!(error = %e, "Edit refused"),
            }
        }
    }
    .instrument(span)
    .await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    info!(count = badge.count(), "Edits confirmed");

    // 3. Stack the menu on top, then close both
    let cart = OverlayId::from("cart");
    let nav = OverlayId::from("nav");
    storefront.open(&nav).map_err(|e| e.to_string())?;
    info!(
        locks = storefront.overlays().manager().scroll_lock_depth(),
        "Menu opened over the cart panel"
    );
    storefront.close(&cart).map_err(|e| e.to_string())?;
    storefront
        .dispatch(UiEvent::Click {
            target: "menu-close".into(),
        })
        .map_err(|e| e.to_string())?;
    info!(
        locks = storefront.overlays().manager().scroll_lock_depth(),
        "All overlays closed"
    );

    // 4. More mugs than there are in stock
    let snapshot = storefront
        .cart()
        .request_quantity_change("mug", 5)
        .await
        .map_err(|e| e.to_string())?;
    info!(displayed = snapshot.quantity_of(&"mug".into()), "Optimistic");
    tokio::time::sleep(Duration::from_millis(500)).await;
    let snapshot = storefront.cart().snapshot().await.map_err(|e| e.to_string())?;
    info!(
        displayed = snapshot.quantity_of(&"mug".into()),
        error = snapshot.error_for(&"mug".into()),
        "Change rejected"
    );

    storefront.shutdown().await;
    info!("Demo completed");
    Ok(())
}
