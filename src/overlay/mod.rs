//! # Overlay Components
//!
//! Every widget that covers or extends the page (cart panel, navigation menu,
//! search panel, dropdown) is an [`OverlayComponent`]. They all share one
//! open/close contract and one lifecycle:
//!
//! ```text
//! closed ──open──▶ opening ──finish──▶ open ──close──▶ closing ──finish──▶ closed
//!   ▲  acquire lock + trap                             release trap + lock  │
//!   └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Non-animated overlays skip the transitional states. Whatever differs between
//! widgets (which dismissals apply, where focus goes first, hover, resize) lives
//! behind the [`OverlayVariant`] trait; see [`variants`].
//!
//! Components never touch the scroll lock or the focus stack directly. They
//! hold the capabilities the [`ResourceManager`] hands out and give them back.

pub mod error;
pub mod host;
pub mod variants;

pub use error::OverlayError;
pub use host::{DispatchOutcome, Key, OverlayHost, TriggerAction, UiEvent};
pub use variants::{CartPanel, Dropdown, NavigationMenu, SearchPanel};

use crate::model::{CartSnapshot, ElementId, ExclusivityGroup, OverlayHandle, OverlayId, OverlayState};
use crate::resources::{FocusTrapHandle, ResourceManager, ScrollLockToken};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    CartPanel,
    NavigationMenu,
    SearchPanel,
    Dropdown,
}

/// Ways a user can dismiss an open overlay without an explicit close control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dismissal {
    OutsideClick,
    Escape,
    TriggerReclick,
}

/// The parts of an overlay's behavior that differ between widgets.
pub trait OverlayVariant {
    fn kind(&self) -> OverlayKind;

    fn exclusivity_group(&self) -> ExclusivityGroup {
        ExclusivityGroup::Independent
    }

    fn locks_scroll(&self) -> bool {
        true
    }

    fn traps_focus(&self) -> bool {
        true
    }

    fn dismisses_on(&self, dismissal: Dismissal) -> bool;

    /// Element to focus on open instead of the container's first focusable.
    fn initial_focus(&self) -> Option<ElementId> {
        None
    }

    /// Whether Escape hands focus back to the trigger.
    fn focus_trigger_on_escape(&self) -> bool {
        false
    }

    fn opens_on_hover(&self) -> bool {
        false
    }

    /// Whether a viewport resize to `width` closes the overlay.
    fn closes_on_resize(&self, _width: u32) -> bool {
        false
    }

    /// Latest cart content, for overlays that render the cart.
    fn content(&self) -> Option<Arc<CartSnapshot>> {
        None
    }
}

/// One overlay widget and the resources it currently holds.
pub struct OverlayComponent {
    handle: OverlayHandle,
    trigger: ElementId,
    container: ElementId,
    state: OverlayState,
    animated: bool,
    lock: Option<ScrollLockToken>,
    trap: Option<FocusTrapHandle>,
    variant: Box<dyn OverlayVariant>,
}

impl OverlayComponent {
    pub fn new(
        id: impl Into<OverlayId>,
        trigger: impl Into<ElementId>,
        container: impl Into<ElementId>,
        variant: impl OverlayVariant + 'static,
    ) -> Self {
        let handle = OverlayHandle::new(id, variant.exclusivity_group(), variant.traps_focus());
        Self {
            handle,
            trigger: trigger.into(),
            container: container.into(),
            state: OverlayState::Closed,
            animated: false,
            lock: None,
            trap: None,
            variant: Box::new(variant),
        }
    }

    /// Holds the overlay in `Opening`/`Closing` until
    /// [`finish_transition`](Self::finish_transition) runs.
    pub fn animated(mut self) -> Self {
        self.animated = true;
        self
    }

    pub fn id(&self) -> &OverlayId {
        &self.handle.id
    }

    pub fn handle(&self) -> &OverlayHandle {
        &self.handle
    }

    pub fn trigger(&self) -> &ElementId {
        &self.trigger
    }

    pub fn container(&self) -> &ElementId {
        &self.container
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    pub fn kind(&self) -> OverlayKind {
        self.variant.kind()
    }

    pub fn variant(&self) -> &dyn OverlayVariant {
        self.variant.as_ref()
    }

    /// Opens the overlay. Returns `false` if it was already open.
    ///
    /// Exclusivity is the caller's job (see [`OverlayHost::open`]). If a
    /// resource cannot be acquired, everything acquired so far is released and
    /// the overlay stays closed.
    pub fn open(&mut self, manager: &mut ResourceManager) -> Result<bool, OverlayError> {
        match self.state {
            OverlayState::Opening | OverlayState::Open => return Ok(false),
            // Still holding its lock and trap from before.
            OverlayState::Closing => {}
            OverlayState::Closed => self.acquire(manager)?,
        }
        manager.set_hidden(&self.container, false);
        manager.set_expanded(&self.trigger, true);
        manager.mark_open(&self.handle.id, true);
        self.state = if self.animated {
            OverlayState::Opening
        } else {
            OverlayState::Open
        };
        debug!(overlay = %self.handle.id, state = ?self.state, "Overlay opened");
        Ok(true)
    }

    /// Closes the overlay. Returns `false` if it was not open.
    pub fn close(&mut self, manager: &mut ResourceManager) -> bool {
        if !self.state.is_open() {
            return false;
        }
        manager.set_hidden(&self.container, true);
        manager.set_expanded(&self.trigger, false);
        manager.mark_open(&self.handle.id, false);
        if self.animated {
            self.state = OverlayState::Closing;
        } else {
            self.release(manager);
        }
        debug!(overlay = %self.handle.id, state = ?self.state, "Overlay closed");
        true
    }

    pub fn toggle(&mut self, manager: &mut ResourceManager) -> Result<bool, OverlayError> {
        if self.is_open() {
            Ok(self.close(manager))
        } else {
            self.open(manager)
        }
    }

    /// Completes a pending open or close animation.
    pub fn finish_transition(&mut self, manager: &mut ResourceManager) {
        match self.state {
            OverlayState::Opening => self.state = OverlayState::Open,
            OverlayState::Closing => self.release(manager),
            OverlayState::Open | OverlayState::Closed => {}
        }
    }

    /// Closes without waiting for any animation.
    pub fn close_now(&mut self, manager: &mut ResourceManager) {
        self.close(manager);
        if self.state == OverlayState::Closing {
            self.release(manager);
        }
    }

    pub(crate) fn focus_trigger(&self, manager: &mut ResourceManager) {
        manager.focus_element(&self.trigger);
    }

    fn acquire(&mut self, manager: &mut ResourceManager) -> Result<(), OverlayError> {
        if self.variant.locks_scroll() {
            self.lock = Some(manager.acquire_scroll_lock());
        }
        if self.handle.is_focus_trapped {
            match manager.enter_focus_trap_at(&self.container, self.variant.initial_focus()) {
                Ok(trap) => self.trap = Some(trap),
                Err(error) => {
                    warn!(overlay = %self.handle.id, %error, "Open aborted");
                    if let Some(token) = self.lock.take() {
                        manager.release_scroll_lock(token);
                    }
                    return Err(error.into());
                }
            }
        }
        Ok(())
    }

    fn release(&mut self, manager: &mut ResourceManager) {
        if let Some(trap) = self.trap.take() {
            manager.exit_focus_trap(trap);
        }
        if let Some(token) = self.lock.take() {
            manager.release_scroll_lock(token);
        }
        self.state = OverlayState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{Document, MemoryDocument};

    fn page() -> MemoryDocument {
        let doc = MemoryDocument::new();
        let menu = ElementId::from("menu");
        doc.add_focusable("menu-toggle", None)
            .add_element("menu", None)
            .add_focusable("menu-close", Some(&menu))
            .add_focusable("menu-link", Some(&menu));
        doc
    }

    fn menu() -> OverlayComponent {
        OverlayComponent::new("nav", "menu-toggle", "menu", NavigationMenu::new(1024))
    }

    #[test]
    fn open_and_close_hold_resources_for_the_whole_lifetime() {
        let doc = page();
        let mut manager = ResourceManager::new(doc.clone());
        let mut nav = menu();
        manager.register(nav.handle().clone());

        assert!(nav.open(&mut manager).unwrap());
        assert!(!nav.open(&mut manager).unwrap());
        assert_eq!(manager.scroll_lock_depth(), 1);
        assert_eq!(manager.focus_trap_depth(), 1);
        assert!(doc.is_expanded(&"menu-toggle".into()));
        assert_eq!(doc.focused(), Some("menu-close".into()));

        assert!(nav.close(&mut manager));
        assert!(!nav.close(&mut manager));
        assert_eq!(manager.scroll_lock_depth(), 0);
        assert_eq!(manager.focus_trap_depth(), 0);
        assert!(doc.is_hidden(&"menu".into()));
    }

    #[test]
    fn animated_close_releases_on_finish() {
        let doc = page();
        let mut manager = ResourceManager::new(doc.clone());
        let mut nav = menu().animated();
        manager.register(nav.handle().clone());

        nav.open(&mut manager).unwrap();
        assert_eq!(nav.state(), OverlayState::Opening);
        nav.finish_transition(&mut manager);
        assert_eq!(nav.state(), OverlayState::Open);

        nav.close(&mut manager);
        assert_eq!(nav.state(), OverlayState::Closing);
        assert!(doc.is_scroll_blocked());

        // Reopening mid-close reuses the held lock.
        nav.open(&mut manager).unwrap();
        assert_eq!(manager.scroll_lock_depth(), 1);

        nav.close(&mut manager);
        nav.finish_transition(&mut manager);
        assert_eq!(nav.state(), OverlayState::Closed);
        assert!(!doc.is_scroll_blocked());
    }

    #[test]
    fn failed_open_releases_the_scroll_lock() {
        let doc = MemoryDocument::new();
        doc.add_focusable("menu-toggle", None);
        let mut manager = ResourceManager::new(doc.clone());
        let mut nav = menu();
        manager.register(nav.handle().clone());

        let result = nav.open(&mut manager);
        assert!(matches!(result, Err(OverlayError::Resource(_))));
        assert_eq!(nav.state(), OverlayState::Closed);
        assert_eq!(manager.scroll_lock_depth(), 0);
        assert!(!doc.is_scroll_blocked());
        assert!(doc.active_element().is_none());
    }
}
