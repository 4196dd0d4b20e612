//! # Overlay Host
//!
//! Owns every [`OverlayComponent`] on the page and the [`ResourceManager`] they
//! share, and routes all user input through one entry point,
//! [`OverlayHost::dispatch`].
//!
//! Triggers are declared in a table (`element → overlay, action`) instead of
//! being wired up per widget. Clicks that hit no trigger count as outside
//! clicks for the open overlays above the click.

use super::{Dismissal, OverlayComponent, OverlayError, OverlayKind};
use crate::model::{CartSnapshot, ElementId, OverlayId};
use crate::resources::ResourceManager;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerAction {
    Toggle,
    Open,
    Close,
}

#[derive(Debug, Clone)]
struct Trigger {
    element: ElementId,
    overlay: OverlayId,
    action: TriggerAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Tab,
    Enter,
    Other,
}

/// Page input, as delivered by the delegated event listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Click { target: ElementId },
    KeyDown { key: Key, shift: bool },
    PointerEnter { target: ElementId },
    /// `to` is where the pointer went, if it is still over the page.
    PointerLeave { target: ElementId, to: Option<ElementId> },
    Resize { width: u32 },
}

/// What a dispatched event changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub opened: Vec<OverlayId>,
    pub closed: Vec<OverlayId>,
    /// The browser's default action for the event must be suppressed.
    pub prevent_default: bool,
}

pub struct OverlayHost {
    manager: ResourceManager,
    overlays: BTreeMap<OverlayId, OverlayComponent>,
    triggers: Vec<Trigger>,
    /// Open overlays, most recently opened last.
    open_order: Vec<OverlayId>,
}

impl OverlayHost {
    pub fn new(manager: ResourceManager) -> Self {
        Self {
            manager,
            overlays: BTreeMap::new(),
            triggers: Vec::new(),
            open_order: Vec::new(),
        }
    }

    /// Registers an overlay; its trigger toggles it.
    pub fn add(&mut self, component: OverlayComponent) {
        let id = component.id().clone();
        self.manager.register(component.handle().clone());
        self.triggers.push(Trigger {
            element: component.trigger().clone(),
            overlay: id.clone(),
            action: TriggerAction::Toggle,
        });
        info!(overlay = %id, kind = ?component.kind(), "Overlay added");
        self.overlays.insert(id, component);
    }

    /// Adds a row to the trigger table (close buttons, secondary openers).
    pub fn bind(&mut self, element: impl Into<ElementId>, overlay: impl Into<OverlayId>, action: TriggerAction) {
        self.triggers.push(Trigger {
            element: element.into(),
            overlay: overlay.into(),
            action,
        });
    }

    pub fn manager(&self) -> &ResourceManager {
        &self.manager
    }

    pub fn is_open(&self, id: &OverlayId) -> bool {
        self.overlays.get(id).is_some_and(OverlayComponent::is_open)
    }

    pub fn kind_of(&self, id: &OverlayId) -> Option<OverlayKind> {
        self.overlays.get(id).map(OverlayComponent::kind)
    }

    pub fn component(&self, id: &OverlayId) -> Option<&OverlayComponent> {
        self.overlays.get(id)
    }

    /// Cart content rendered by `id`, if it renders any.
    pub fn content(&self, id: &OverlayId) -> Option<Arc<CartSnapshot>> {
        self.overlays.get(id).and_then(|c| c.variant().content())
    }

    /// Open overlays, most recently opened last.
    pub fn open_overlays(&self) -> &[OverlayId] {
        &self.open_order
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Opens `id`, closing open siblings in its exclusivity group first.
    pub fn open(&mut self, id: &OverlayId) -> Result<DispatchOutcome, OverlayError> {
        let mut outcome = DispatchOutcome::default();
        self.open_into(id, &mut outcome)?;
        Ok(outcome)
    }

    pub fn close(&mut self, id: &OverlayId) -> Result<DispatchOutcome, OverlayError> {
        if !self.overlays.contains_key(id) {
            return Err(OverlayError::UnknownOverlay(id.clone()));
        }
        let mut outcome = DispatchOutcome::default();
        self.close_into(id, &mut outcome);
        Ok(outcome)
    }

    pub fn toggle(&mut self, id: &OverlayId) -> Result<DispatchOutcome, OverlayError> {
        if self.is_open(id) {
            self.close(id)
        } else {
            self.open(id)
        }
    }

    /// Completes every pending open/close animation.
    pub fn finish_transitions(&mut self) {
        for component in self.overlays.values_mut() {
            component.finish_transition(&mut self.manager);
        }
    }

    // =========================================================================
    // Delegated dispatch
    // =========================================================================

    pub fn dispatch(&mut self, event: UiEvent) -> Result<DispatchOutcome, OverlayError> {
        debug!(?event, "Dispatch");
        let mut outcome = DispatchOutcome::default();
        match event {
            UiEvent::Click { target } => self.on_click(&target, &mut outcome)?,
            UiEvent::KeyDown { key: Key::Escape, .. } => self.on_escape(&mut outcome),
            UiEvent::KeyDown { key: Key::Tab, shift } => {
                outcome.prevent_default = self.manager.handle_tab(shift);
            }
            UiEvent::KeyDown { .. } => {}
            UiEvent::PointerEnter { target } => {
                for id in self.hover_overlays_under(&target) {
                    if !self.is_open(&id) {
                        self.open_into(&id, &mut outcome)?;
                    }
                }
            }
            UiEvent::PointerLeave { target, to } => {
                for id in self.hover_overlays_under(&target) {
                    let still_over = to
                        .as_ref()
                        .is_some_and(|to| self.region_contains(&id, to));
                    if !still_over {
                        self.close_into(&id, &mut outcome);
                    }
                }
            }
            UiEvent::Resize { width } => {
                let to_close: Vec<OverlayId> = self
                    .open_order
                    .iter()
                    .filter(|id| {
                        self.overlays
                            .get(*id)
                            .is_some_and(|c| c.variant().closes_on_resize(width))
                    })
                    .cloned()
                    .collect();
                for id in to_close {
                    self.close_into(&id, &mut outcome);
                }
            }
        }
        Ok(outcome)
    }

    fn on_click(&mut self, target: &ElementId, outcome: &mut DispatchOutcome) -> Result<(), OverlayError> {
        let document = self.manager.document();
        let hit = self
            .triggers
            .iter()
            .rev()
            .find(|t| document.contains(&t.element, target))
            .cloned();

        if let Some(trigger) = hit {
            outcome.prevent_default = true;
            let open = self.is_open(&trigger.overlay);
            match trigger.action {
                TriggerAction::Open => self.open_into(&trigger.overlay, outcome)?,
                TriggerAction::Close => self.close_into(&trigger.overlay, outcome),
                TriggerAction::Toggle if !open => self.open_into(&trigger.overlay, outcome)?,
                TriggerAction::Toggle => {
                    if self.dismisses(&trigger.overlay, Dismissal::TriggerReclick) {
                        self.close_into(&trigger.overlay, outcome);
                    }
                }
            }
            return Ok(());
        }

        // Outside click: close open overlays from the top down until one
        // contains the click.
        for id in self.open_order.clone().iter().rev() {
            if self.region_contains(id, target) {
                break;
            }
            if self.dismisses(id, Dismissal::OutsideClick) {
                self.close_into(id, outcome);
            }
        }
        Ok(())
    }

    fn on_escape(&mut self, outcome: &mut DispatchOutcome) {
        let top = self
            .open_order
            .iter()
            .rev()
            .find(|id| self.dismisses(id, Dismissal::Escape))
            .cloned();
        let Some(id) = top else {
            return;
        };
        self.close_into(&id, outcome);
        outcome.prevent_default = true;
        if let Some(component) = self.overlays.get(&id) {
            if component.variant().focus_trigger_on_escape() {
                component.focus_trigger(&mut self.manager);
            }
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Closes everything immediately, ignoring animations.
    pub fn teardown(&mut self) {
        for id in std::mem::take(&mut self.open_order).iter().rev() {
            if let Some(component) = self.overlays.get_mut(id) {
                component.close_now(&mut self.manager);
            }
        }
        // Overlays still mid-close are not in the open order.
        for component in self.overlays.values_mut() {
            component.close_now(&mut self.manager);
            component.finish_transition(&mut self.manager);
        }
        info!("Overlays torn down");
    }

    /// Re-activates the page after it was restored from cache: tears down,
    /// starts a new resource generation and registers every overlay again.
    pub fn reinitialize(&mut self) {
        self.teardown();
        let locks = self.manager.scroll_lock_depth();
        let traps = self.manager.focus_trap_depth();
        if locks != 0 || traps != 0 {
            warn!(locks, traps, "Resources outstanding after teardown");
        }
        self.manager.reset();
        for component in self.overlays.values() {
            self.manager.register(component.handle().clone());
        }
        info!(generation = self.manager.generation(), "Overlays reinitialized");
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn open_into(&mut self, id: &OverlayId, outcome: &mut DispatchOutcome) -> Result<(), OverlayError> {
        let group = self
            .overlays
            .get(id)
            .ok_or_else(|| OverlayError::UnknownOverlay(id.clone()))?
            .handle()
            .exclusivity_group
            .clone();
        for sibling in self.manager.request_exclusive(id, &group)? {
            self.close_into(&sibling, outcome);
        }
        let component = self
            .overlays
            .get_mut(id)
            .ok_or_else(|| OverlayError::UnknownOverlay(id.clone()))?;
        if component.open(&mut self.manager)? {
            self.open_order.retain(|open| open != id);
            self.open_order.push(id.clone());
            outcome.opened.push(id.clone());
        }
        Ok(())
    }

    fn close_into(&mut self, id: &OverlayId, outcome: &mut DispatchOutcome) {
        let Some(component) = self.overlays.get_mut(id) else {
            return;
        };
        if component.close(&mut self.manager) {
            self.open_order.retain(|open| open != id);
            outcome.closed.push(id.clone());
        }
    }

    fn dismisses(&self, id: &OverlayId, dismissal: Dismissal) -> bool {
        self.overlays
            .get(id)
            .is_some_and(|c| c.variant().dismisses_on(dismissal))
    }

    /// Whether `element` is inside the overlay's trigger or container.
    fn region_contains(&self, id: &OverlayId, element: &ElementId) -> bool {
        let document = self.manager.document();
        self.overlays.get(id).is_some_and(|c| {
            document.contains(c.trigger(), element) || document.contains(c.container(), element)
        })
    }

    fn hover_overlays_under(&self, element: &ElementId) -> Vec<OverlayId> {
        self.overlays
            .values()
            .filter(|c| c.variant().opens_on_hover())
            .filter(|c| self.region_contains(c.id(), element))
            .map(|c| c.id().clone())
            .collect()
    }
}
