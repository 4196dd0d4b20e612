//! End-to-end tests: a whole storefront on an in-memory page and cart.

use std::sync::Arc;
use std::time::Duration;
use storefront_overlay::broadcast::CountBadge;
use storefront_overlay::cart_actor::CartError;
use storefront_overlay::lifecycle::{Storefront, StorefrontConfig};
use storefront_overlay::model::{ElementId, OverlayId};
use storefront_overlay::neighbors::{MemoryListStore, WISHLIST};
use storefront_overlay::overlay::{TriggerAction, UiEvent};
use storefront_overlay::remote::{CartService, InMemoryCartService};
use storefront_overlay::resources::MemoryDocument;

fn page() -> MemoryDocument {
    let page = MemoryDocument::new();
    let drawer = ElementId::from("cart-drawer");
    let menu = ElementId::from("mobile-menu");
    page.add_element("main", None)
        .add_focusable("cart-toggle", None)
        .add_focusable("menu-toggle", None)
        .add_element("cart-drawer", None)
        .add_focusable("cart-close", Some(&drawer))
        .add_focusable("checkout", Some(&drawer))
        .add_element("mobile-menu", None)
        .add_focusable("menu-shop", Some(&menu));
    page
}

fn service() -> Arc<InMemoryCartService> {
    Arc::new(
        InMemoryCartService::new()
            .with_product("tee", 2500, 10)
            .with_product("mug", 1200, 3)
            .with_line("tee", 1)
            .with_line("mug", 2),
    )
}

struct Fixture {
    storefront: Storefront,
    service: Arc<InMemoryCartService>,
    badge: CountBadge,
    page: MemoryDocument,
}

fn start(config: StorefrontConfig) -> Fixture {
    let service = service();
    let badge = CountBadge::new();
    let page = page();
    let storefront = Storefront::builder(config)
        .count_display(badge.clone())
        .cart_panel("cart", "cart-toggle", "cart-drawer")
        .navigation_menu("nav", "menu-toggle", "mobile-menu")
        .bind("cart-close", "cart", TriggerAction::Close)
        .start(page.clone(), service.clone());
    Fixture {
        storefront,
        service,
        badge,
        page,
    }
}

async fn open_cart(fixture: &mut Fixture) {
    fixture
        .storefront
        .dispatch(UiEvent::Click {
            target: "cart-toggle".into(),
        })
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
}

fn remote_quantity(service: &InMemoryCartService, key: &str) -> Option<u32> {
    service
        .snapshot()
        .items
        .iter()
        .find(|line| line.key.0 == key)
        .map(|line| line.quantity)
}

#[tokio::test(start_paused = true)]
async fn opening_the_cart_panel_loads_the_cart() {
    let mut f = start(StorefrontConfig::default());
    assert_eq!(f.badge.count(), 0);
    assert!(!f.badge.is_visible());

    open_cart(&mut f).await;

    assert_eq!(f.badge.count(), 3);
    assert!(f.badge.is_visible());
    assert!(f.page.is_scroll_blocked());
    let content = f.storefront.overlays().content(&OverlayId::from("cart")).unwrap();
    assert_eq!(content.item_count, 3);
    assert_eq!(content.subtotal_minor, 2500 + 2 * 1200);

    f.storefront.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn edits_before_the_cart_is_known_are_refused() {
    let f = start(StorefrontConfig::default());
    let result = f.storefront.cart().request_quantity_change("tee", 1).await;
    assert_eq!(result, Err(CartError::UnknownLine("tee".into())));
    f.storefront.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn rapid_edits_reach_the_remote_once() {
    let mut f = start(StorefrontConfig::default());
    open_cart(&mut f).await;

    for _ in 0..3 {
        f.storefront.cart().request_quantity_change("tee", 1).await.unwrap();
    }
    assert_eq!(f.badge.count(), 6);
    assert_eq!(remote_quantity(&f.service, "tee"), Some(1));

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(remote_quantity(&f.service, "tee"), Some(4));
    assert_eq!(f.badge.count(), 6);

    f.storefront.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn over_stock_edit_reverts_with_the_reason() {
    let mut f = start(StorefrontConfig::default());
    open_cart(&mut f).await;

    let snapshot = f.storefront.cart().set_quantity("mug".into(), 7).await.unwrap();
    assert_eq!(snapshot.quantity_of(&"mug".into()), 7);

    tokio::time::sleep(Duration::from_millis(300)).await;
    let snapshot = f.storefront.cart().snapshot().await.unwrap();
    assert_eq!(snapshot.quantity_of(&"mug".into()), 2);
    assert_eq!(
        snapshot.error_for(&"mug".into()),
        Some("You can only add 3 of this item to your cart.")
    );
    assert_eq!(f.badge.count(), 3);

    f.storefront.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn restore_reinitializes_and_picks_up_remote_changes() {
    let mut f = start(StorefrontConfig::default());
    open_cart(&mut f).await;
    let generation = f.storefront.overlays().manager().generation();

    // Another tab changed the cart while this page sat in the cache.
    f.service.change_line(&"tee".into(), 3).await.unwrap();

    f.storefront.restore();
    assert!(f.storefront.overlays().open_overlays().is_empty());
    assert!(!f.page.is_scroll_blocked());
    assert_eq!(f.storefront.overlays().manager().generation(), generation + 1);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(f.badge.count(), 5);

    f.storefront.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn debounce_follows_configuration() {
    let config = StorefrontConfig::from_toml_str("[cart]\ndebounce_ms = 50\n").unwrap();
    let mut f = start(config);
    open_cart(&mut f).await;

    f.storefront.cart().request_quantity_change("tee", 1).await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(remote_quantity(&f.service, "tee"), Some(2));

    f.storefront.shutdown().await;
}

#[tokio::test]
async fn announcement_and_wishlist_persist_in_their_stores() {
    let lists = MemoryListStore::default();
    lists.put_raw(WISHLIST, "{not json");

    let mut storefront = Storefront::builder(StorefrontConfig::default())
        .list_store(lists)
        .start(page(), service());

    assert!(!storefront.announcement_dismissed());
    storefront.dismiss_announcement();
    assert!(storefront.announcement_dismissed());

    // A corrupt list is replaced on first toggle.
    assert!(storefront.toggle_wishlist(&"tee".into()));
    assert!(storefront.toggle_wishlist(&"mug".into()));
    assert!(!storefront.toggle_wishlist(&"tee".into()));

    storefront.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_closes_overlays_and_stops_the_engine() {
    let mut f = start(StorefrontConfig::default());
    open_cart(&mut f).await;
    f.storefront.open(&OverlayId::from("nav")).unwrap();
    assert_eq!(f.storefront.overlays().manager().scroll_lock_depth(), 2);

    let cart = f.storefront.cart().clone();
    drop(cart);
    f.storefront.shutdown().await;

    assert!(!f.page.is_scroll_blocked());
}
