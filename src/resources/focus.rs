//! Focus containment stack.
//!
//! Only the top trap handles Tab. Traps underneath are suspended; they become
//! active again as soon as every trap above them has exited.

use super::document::Document;
use crate::model::ElementId;

/// Capability returned by entering a focus trap. Hand it back to exit.
#[must_use = "a focus trap stays active until its handle is passed to exit_focus_trap"]
#[derive(Debug, PartialEq, Eq)]
pub struct FocusTrapHandle {
    pub(crate) id: u64,
    pub(crate) generation: u64,
}

#[derive(Debug)]
struct FocusTrap {
    id: u64,
    container: ElementId,
    focusables: Vec<ElementId>,
    restore_to: Option<ElementId>,
}

#[derive(Debug, Default)]
pub(crate) struct FocusStack {
    traps: Vec<FocusTrap>,
    next_id: u64,
}

impl FocusStack {
    pub(crate) fn depth(&self) -> usize {
        self.traps.len()
    }

    pub(crate) fn active_container(&self) -> Option<&ElementId> {
        self.traps.last().map(|trap| &trap.container)
    }

    /// Pushes a trap and moves focus into it. Returns the new trap id.
    pub(crate) fn push(
        &mut self,
        doc: &mut dyn Document,
        container: ElementId,
        focusables: Vec<ElementId>,
        initial: Option<ElementId>,
    ) -> u64 {
        self.next_id += 1;
        let restore_to = doc.active_element();
        let target = initial
            .or_else(|| focusables.first().cloned())
            .unwrap_or_else(|| container.clone());
        doc.focus(&target);
        self.traps.push(FocusTrap {
            id: self.next_id,
            container,
            focusables,
            restore_to,
        });
        self.next_id
    }

    /// Removes a trap. Returns `false` if no trap with `id` is on the stack.
    pub(crate) fn remove(&mut self, doc: &mut dyn Document, id: u64) -> bool {
        let Some(pos) = self.traps.iter().position(|trap| trap.id == id) else {
            return false;
        };
        let removed = self.traps.remove(pos);
        if pos < self.traps.len() {
            // A suspended trap exited underneath an active one. The trap above
            // must not hand focus back into a region that is going away.
            self.traps[pos].restore_to = removed.restore_to;
            return true;
        }
        match removed.restore_to {
            Some(element) => doc.focus(&element),
            None => {
                if let Some(next) = self.traps.last() {
                    let target = next.focusables.first().unwrap_or(&next.container);
                    doc.focus(target);
                }
            }
        }
        true
    }

    /// Key handler of the active trap. Returns `true` when focus was redirected
    /// and the browser's default Tab movement must be suppressed.
    pub(crate) fn handle_tab(&self, doc: &mut dyn Document, backward: bool) -> bool {
        let Some(trap) = self.traps.last() else {
            return false;
        };
        let (Some(first), Some(last)) = (trap.focusables.first(), trap.focusables.last()) else {
            doc.focus(&trap.container);
            return true;
        };
        let active = doc.active_element();
        let inside = active
            .as_ref()
            .is_some_and(|element| trap.focusables.contains(element));

        let redirect = if !inside {
            Some(if backward { last } else { first })
        } else if backward && active.as_ref() == Some(first) {
            Some(last)
        } else if !backward && active.as_ref() == Some(last) {
            Some(first)
        } else {
            None
        };

        match redirect {
            Some(target) => {
                doc.focus(target);
                true
            }
            None => false,
        }
    }

    /// Drops every trap without restoring focus. Returns how many were dropped.
    pub(crate) fn clear(&mut self) -> usize {
        let dropped = self.traps.len();
        self.traps.clear();
        dropped
    }
}
