//! # Page Abstraction
//!
//! The resource manager never touches a concrete DOM. It talks to a [`Document`],
//! which a browser binding implements over real elements. [`MemoryDocument`] is an
//! in-process implementation used by the demo binary and the tests; clones share
//! the same page state, so a test can keep one clone for inspection while the
//! manager owns another.

use crate::model::ElementId;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The page operations the overlay layer needs.
pub trait Document {
    /// Applies or removes the page-level scroll-blocking effect.
    fn set_scroll_blocked(&mut self, blocked: bool);

    /// Focusable descendants of `container` in tab order, or `None` if the
    /// container does not exist.
    fn focusable_within(&self, container: &ElementId) -> Option<Vec<ElementId>>;

    /// Whether `target` is `container` or one of its descendants.
    fn contains(&self, container: &ElementId, target: &ElementId) -> bool;

    fn active_element(&self) -> Option<ElementId>;

    fn focus(&mut self, element: &ElementId);

    /// Hides or exposes a region to assistive traversal.
    fn set_hidden(&mut self, element: &ElementId, hidden: bool);

    /// Reflects the open state on a trigger (`aria-expanded`).
    fn set_expanded(&mut self, trigger: &ElementId, expanded: bool);
}

#[derive(Debug, Default)]
struct PageState {
    parents: HashMap<ElementId, ElementId>,
    children: HashMap<ElementId, Vec<ElementId>>,
    focusable: BTreeSet<ElementId>,
    active: Option<ElementId>,
    scroll_blocked: bool,
    scroll_block_writes: usize,
    hidden: BTreeSet<ElementId>,
    expanded: BTreeSet<ElementId>,
}

impl PageState {
    fn collect_focusable(&self, element: &ElementId, out: &mut Vec<ElementId>) {
        for child in self.children.get(element).into_iter().flatten() {
            if self.focusable.contains(child) {
                out.push(child.clone());
            }
            self.collect_focusable(child, out);
        }
    }
}

/// An in-memory page tree.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocument {
    state: Arc<Mutex<PageState>>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a non-focusable element (a container or plain region).
    pub fn add_element(&self, id: impl Into<ElementId>, parent: Option<&ElementId>) -> &Self {
        self.insert(id.into(), parent, false);
        self
    }

    /// Adds a focusable control (button, link, input).
    pub fn add_focusable(&self, id: impl Into<ElementId>, parent: Option<&ElementId>) -> &Self {
        self.insert(id.into(), parent, true);
        self
    }

    fn insert(&self, id: ElementId, parent: Option<&ElementId>, focusable: bool) {
        let mut state = self.state();
        if let Some(parent) = parent {
            state.parents.insert(id.clone(), parent.clone());
            state.children.entry(parent.clone()).or_default().push(id.clone());
        }
        state.children.entry(id.clone()).or_default();
        if focusable {
            state.focusable.insert(id);
        }
    }

    pub fn is_scroll_blocked(&self) -> bool {
        self.state().scroll_blocked
    }

    /// How many times the scroll-blocking effect was written.
    pub fn scroll_block_writes(&self) -> usize {
        self.state().scroll_block_writes
    }

    pub fn focused(&self) -> Option<ElementId> {
        self.state().active.clone()
    }

    pub fn is_hidden(&self, id: &ElementId) -> bool {
        self.state().hidden.contains(id)
    }

    pub fn is_expanded(&self, id: &ElementId) -> bool {
        self.state().expanded.contains(id)
    }
}

impl Document for MemoryDocument {
    fn set_scroll_blocked(&mut self, blocked: bool) {
        let mut state = self.state();
        state.scroll_blocked = blocked;
        state.scroll_block_writes += 1;
    }

    fn focusable_within(&self, container: &ElementId) -> Option<Vec<ElementId>> {
        let state = self.state();
        if !state.children.contains_key(container) {
            return None;
        }
        let mut out = Vec::new();
        state.collect_focusable(container, &mut out);
        Some(out)
    }

    fn contains(&self, container: &ElementId, target: &ElementId) -> bool {
        let state = self.state();
        let mut current = Some(target);
        while let Some(element) = current {
            if element == container {
                return true;
            }
            current = state.parents.get(element);
        }
        false
    }

    fn active_element(&self) -> Option<ElementId> {
        self.state().active.clone()
    }

    fn focus(&mut self, element: &ElementId) {
        self.state().active = Some(element.clone());
    }

    fn set_hidden(&mut self, element: &ElementId, hidden: bool) {
        let mut state = self.state();
        if hidden {
            state.hidden.insert(element.clone());
        } else {
            state.hidden.remove(element);
        }
    }

    fn set_expanded(&mut self, trigger: &ElementId, expanded: bool) {
        let mut state = self.state();
        if expanded {
            state.expanded.insert(trigger.clone());
        } else {
            state.expanded.remove(trigger);
        }
    }
}
