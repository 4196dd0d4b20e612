//! The four overlay widgets.

use super::{Dismissal, OverlayKind, OverlayVariant};
use crate::model::{CartSnapshot, ElementId, ExclusivityGroup};
use std::sync::Arc;
use tokio::sync::watch;

/// Slide-out cart summary. Renders whatever the broadcaster last published.
pub struct CartPanel {
    content: watch::Receiver<Arc<CartSnapshot>>,
}

impl CartPanel {
    pub fn new(content: watch::Receiver<Arc<CartSnapshot>>) -> Self {
        Self { content }
    }
}

impl OverlayVariant for CartPanel {
    fn kind(&self) -> OverlayKind {
        OverlayKind::CartPanel
    }

    fn dismisses_on(&self, dismissal: Dismissal) -> bool {
        match dismissal {
            Dismissal::OutsideClick | Dismissal::Escape | Dismissal::TriggerReclick => true,
        }
    }

    fn content(&self) -> Option<Arc<CartSnapshot>> {
        Some(self.content.borrow().clone())
    }
}

/// Mobile navigation drawer. Irrelevant once the viewport reaches the
/// desktop layout, so it closes itself on resize past the breakpoint.
pub struct NavigationMenu {
    desktop_breakpoint: u32,
}

impl NavigationMenu {
    pub fn new(desktop_breakpoint: u32) -> Self {
        Self { desktop_breakpoint }
    }
}

impl OverlayVariant for NavigationMenu {
    fn kind(&self) -> OverlayKind {
        OverlayKind::NavigationMenu
    }

    /// Outside clicks leave the drawer open.
    fn dismisses_on(&self, dismissal: Dismissal) -> bool {
        match dismissal {
            Dismissal::Escape | Dismissal::TriggerReclick => true,
            Dismissal::OutsideClick => false,
        }
    }

    fn closes_on_resize(&self, width: u32) -> bool {
        width >= self.desktop_breakpoint
    }
}

/// Search drawer. Focus starts in the query input.
pub struct SearchPanel {
    input: ElementId,
}

impl SearchPanel {
    pub fn new(input: impl Into<ElementId>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

impl OverlayVariant for SearchPanel {
    fn kind(&self) -> OverlayKind {
        OverlayKind::SearchPanel
    }

    /// The trigger only opens the panel; it closes on Escape or its own
    /// close control.
    fn dismisses_on(&self, dismissal: Dismissal) -> bool {
        match dismissal {
            Dismissal::Escape => true,
            Dismissal::OutsideClick | Dismissal::TriggerReclick => false,
        }
    }

    fn initial_focus(&self) -> Option<ElementId> {
        Some(self.input.clone())
    }
}

/// Header menu dropdown. Does not lock scroll or trap focus; siblings in the
/// same group close each other.
pub struct Dropdown {
    group: String,
    hover: bool,
}

impl Dropdown {
    /// A click-only dropdown in `group`.
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            hover: false,
        }
    }

    /// Also opens while the pointer is over the trigger or the menu.
    pub fn on_hover(mut self) -> Self {
        self.hover = true;
        self
    }
}

impl OverlayVariant for Dropdown {
    fn kind(&self) -> OverlayKind {
        OverlayKind::Dropdown
    }

    fn exclusivity_group(&self) -> ExclusivityGroup {
        ExclusivityGroup::exclusive(self.group.clone())
    }

    fn locks_scroll(&self) -> bool {
        false
    }

    fn traps_focus(&self) -> bool {
        false
    }

    fn dismisses_on(&self, dismissal: Dismissal) -> bool {
        match dismissal {
            Dismissal::OutsideClick | Dismissal::Escape | Dismissal::TriggerReclick => true,
        }
    }

    fn focus_trigger_on_escape(&self) -> bool {
        true
    }

    fn opens_on_hover(&self) -> bool {
        self.hover
    }
}
