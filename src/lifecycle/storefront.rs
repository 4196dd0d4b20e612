use crate::broadcast::{CartBroadcaster, CountDisplay};
use crate::cart_actor::{self, CartContext};
use crate::clients::CartClient;
use crate::lifecycle::StorefrontConfig;
use crate::model::{ElementId, OverlayId, ProductRef};
use crate::neighbors::{
    toggle_listed, ListStore, MemoryListStore, MemorySessionFlags, SessionFlags,
    ANNOUNCEMENT_DISMISSED,
};
use crate::overlay::{
    CartPanel, DispatchOutcome, Dropdown, NavigationMenu, OverlayComponent, OverlayError,
    OverlayHost, OverlayKind, SearchPanel, TriggerAction, UiEvent,
};
use crate::remote::CartService;
use crate::resources::{Document, ResourceManager};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Collects the page's overlays and display surfaces before anything runs.
pub struct StorefrontBuilder {
    config: StorefrontConfig,
    broadcaster: CartBroadcaster,
    overlays: Vec<OverlayComponent>,
    bindings: Vec<(ElementId, OverlayId, TriggerAction)>,
    flags: Box<dyn SessionFlags>,
    lists: Box<dyn ListStore>,
}

impl StorefrontBuilder {
    pub fn count_display(mut self, display: impl CountDisplay + 'static) -> Self {
        self.broadcaster.register_display(display);
        self
    }

    /// Adds the cart panel; it renders whatever the cart engine last published.
    pub fn cart_panel(
        mut self,
        id: impl Into<OverlayId>,
        trigger: impl Into<ElementId>,
        container: impl Into<ElementId>,
    ) -> Self {
        let panel = CartPanel::new(self.broadcaster.subscribe());
        self.overlays
            .push(OverlayComponent::new(id, trigger, container, panel));
        self
    }

    pub fn navigation_menu(
        mut self,
        id: impl Into<OverlayId>,
        trigger: impl Into<ElementId>,
        container: impl Into<ElementId>,
    ) -> Self {
        let menu = NavigationMenu::new(self.config.overlays.desktop_breakpoint);
        self.overlays
            .push(OverlayComponent::new(id, trigger, container, menu));
        self
    }

    pub fn search_panel(
        mut self,
        id: impl Into<OverlayId>,
        trigger: impl Into<ElementId>,
        container: impl Into<ElementId>,
        input: impl Into<ElementId>,
    ) -> Self {
        self.overlays.push(OverlayComponent::new(
            id,
            trigger,
            container,
            SearchPanel::new(input),
        ));
        self
    }

    /// Adds any overlay, including custom-configured dropdowns.
    pub fn overlay(mut self, component: OverlayComponent) -> Self {
        self.overlays.push(component);
        self
    }

    pub fn dropdown(
        self,
        id: impl Into<OverlayId>,
        trigger: impl Into<ElementId>,
        container: impl Into<ElementId>,
        dropdown: Dropdown,
    ) -> Self {
        self.overlay(OverlayComponent::new(id, trigger, container, dropdown))
    }

    /// Adds a row to the trigger table.
    pub fn bind(
        mut self,
        element: impl Into<ElementId>,
        overlay: impl Into<OverlayId>,
        action: TriggerAction,
    ) -> Self {
        self.bindings.push((element.into(), overlay.into(), action));
        self
    }

    pub fn session_flags(mut self, flags: impl SessionFlags + 'static) -> Self {
        self.flags = Box::new(flags);
        self
    }

    pub fn list_store(mut self, lists: impl ListStore + 'static) -> Self {
        self.lists = Box::new(lists);
        self
    }

    /// Spawns the cart engine and activates the overlays on `document`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self, document: impl Document + 'static, service: Arc<dyn CartService>) -> Storefront {
        // 1. Create the engine (no dependencies yet)
        let (engine, cart) = cart_actor::new(&self.config.cart);

        // 2. Start it with its context injected
        let engine_handle = tokio::spawn(engine.run(CartContext {
            service,
            broadcaster: self.broadcaster,
        }));

        // 3. Register overlays and the trigger table
        let mut overlays = OverlayHost::new(ResourceManager::new(document));
        let count = self.overlays.len();
        for component in self.overlays {
            overlays.add(component);
        }
        for (element, overlay, action) in self.bindings {
            overlays.bind(element, overlay, action);
        }
        info!(overlays = count, "Storefront started");

        Storefront {
            cart,
            overlays,
            flags: self.flags,
            lists: self.lists,
            background: Vec::new(),
            engine_handle,
        }
    }
}

/// The running interactive layer of one page.
///
/// # Example
///
/// ```ignore
/// let storefront = Storefront::builder(config)
///     .count_display(header_badge)
///     .cart_panel("cart", "cart-toggle", "cart-drawer")
///     .navigation_menu("nav", "menu-toggle", "mobile-menu")
///     .start(document, service);
///
/// storefront.dispatch(UiEvent::Click { target: "cart-toggle".into() })?;
/// storefront.cart().request_quantity_change("abc", 1).await?;
///
/// storefront.shutdown().await;
/// ```
pub struct Storefront {
    cart: CartClient,
    overlays: OverlayHost,
    flags: Box<dyn SessionFlags>,
    lists: Box<dyn ListStore>,
    /// Cart refreshes triggered by overlays opening.
    background: Vec<JoinHandle<()>>,
    engine_handle: JoinHandle<()>,
}

impl Storefront {
    pub fn builder(config: StorefrontConfig) -> StorefrontBuilder {
        StorefrontBuilder {
            config,
            broadcaster: CartBroadcaster::new(),
            overlays: Vec::new(),
            bindings: Vec::new(),
            flags: Box::new(MemorySessionFlags::default()),
            lists: Box::new(MemoryListStore::default()),
        }
    }

    pub fn cart(&self) -> &CartClient {
        &self.cart
    }

    pub fn overlays(&self) -> &OverlayHost {
        &self.overlays
    }

    /// Routes a page event. Opening the cart panel also refreshes the cart.
    pub fn dispatch(&mut self, event: UiEvent) -> Result<DispatchOutcome, OverlayError> {
        let outcome = self.overlays.dispatch(event)?;
        self.after(&outcome);
        Ok(outcome)
    }

    pub fn open(&mut self, id: &OverlayId) -> Result<DispatchOutcome, OverlayError> {
        let outcome = self.overlays.open(id)?;
        self.after(&outcome);
        Ok(outcome)
    }

    pub fn close(&mut self, id: &OverlayId) -> Result<DispatchOutcome, OverlayError> {
        self.overlays.close(id)
    }

    pub fn finish_transitions(&mut self) {
        self.overlays.finish_transitions();
    }

    /// Re-activates after the page came back from the back/forward cache.
    pub fn restore(&mut self) {
        self.overlays.reinitialize();
        self.spawn_refresh();
    }

    pub fn announcement_dismissed(&self) -> bool {
        self.flags.get(ANNOUNCEMENT_DISMISSED)
    }

    pub fn dismiss_announcement(&mut self) {
        self.flags.set(ANNOUNCEMENT_DISMISSED, true);
    }

    /// Returns whether `product` is wishlisted after the toggle.
    pub fn toggle_wishlist(&mut self, product: &ProductRef) -> bool {
        toggle_listed(self.lists.as_mut(), product)
    }

    /// Closes every overlay, stops the cart engine and waits for it.
    ///
    /// Edits still waiting for their debounce are sent first, so this returns
    /// once the remote has answered them or the request timeout has passed.
    pub async fn shutdown(mut self) {
        info!("Shutting down storefront");
        self.overlays.teardown();
        drop(self.cart);
        for handle in self.background {
            let _ = handle.await;
        }
        if let Err(e) = self.engine_handle.await {
            error!(error = %e, "Cart engine panicked");
        }
        info!("Storefront stopped");
    }

    fn after(&mut self, outcome: &DispatchOutcome) {
        let cart_opened = outcome
            .opened
            .iter()
            .any(|id| self.overlays.kind_of(id) == Some(OverlayKind::CartPanel));
        if cart_opened {
            self.spawn_refresh();
        }
    }

    fn spawn_refresh(&mut self) {
        self.background.retain(|handle| !handle.is_finished());
        let cart = self.cart.clone();
        self.background.push(tokio::spawn(async move {
            if let Err(error) = cart.refresh().await {
                warn!(%error, "Cart refresh failed");
            }
        }));
    }
}
