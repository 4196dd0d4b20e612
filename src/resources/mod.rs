//! # Overlay Resource Manager
//!
//! Every overlay on the page competes for the same three things: the page's
//! scroll, keyboard focus, and (for sibling menus) the right to be the only one
//! open. The [`ResourceManager`] is the single writer of all three.
//!
//! ## Scroll lock
//!
//! The lock is reference counted. Each overlay acquires its own
//! [`ScrollLockToken`]; the page is only unblocked when the last outstanding
//! token comes back. Tokens are not `Clone`, so releasing one moves it into the
//! manager and a second release of the same token does not compile. Tokens from
//! an earlier generation (before [`ResourceManager::reset`]) are still rejected
//! at runtime.
//!
//! ## Focus traps
//!
//! Traps nest. See [`focus`] for the stack semantics.
//!
//! ## Misuse
//!
//! Releasing something the manager does not know about panics in debug builds
//! and is logged and ignored in release builds.

pub mod document;
pub mod error;
pub mod focus;

pub use document::{Document, MemoryDocument};
pub use error::{ResourceError, ResourceMisuseError};
pub use focus::FocusTrapHandle;

use crate::model::{ElementId, ExclusivityGroup, OverlayHandle, OverlayId};
use focus::FocusStack;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Capability proving one outstanding hold on the page scroll lock.
#[must_use = "the page stays scroll-locked until the token is released"]
#[derive(Debug, PartialEq, Eq)]
pub struct ScrollLockToken {
    id: u64,
    generation: u64,
}

#[derive(Debug)]
struct Registration {
    handle: OverlayHandle,
    open: bool,
}

/// Arbitrates scroll locking, focus containment and exclusivity for all overlays.
pub struct ResourceManager {
    document: Box<dyn Document>,
    generation: u64,
    next_token: u64,
    outstanding: BTreeSet<u64>,
    focus: FocusStack,
    overlays: BTreeMap<OverlayId, Registration>,
}

impl ResourceManager {
    pub fn new(document: impl Document + 'static) -> Self {
        Self {
            document: Box::new(document),
            generation: 1,
            next_token: 0,
            outstanding: BTreeSet::new(),
            focus: FocusStack::default(),
            overlays: BTreeMap::new(),
        }
    }

    // =========================================================================
    // Scroll lock
    // =========================================================================

    pub fn acquire_scroll_lock(&mut self) -> ScrollLockToken {
        self.next_token += 1;
        self.outstanding.insert(self.next_token);
        if self.outstanding.len() == 1 {
            self.document.set_scroll_blocked(true);
            debug!("Scroll blocked");
        }
        debug!(token = self.next_token, depth = self.outstanding.len(), "Scroll lock acquired");
        ScrollLockToken {
            id: self.next_token,
            generation: self.generation,
        }
    }

    pub fn release_scroll_lock(&mut self, token: ScrollLockToken) {
        if token.generation != self.generation || !self.outstanding.remove(&token.id) {
            misuse(ResourceMisuseError::UnknownScrollLock {
                token: token.id,
                generation: token.generation,
            });
            return;
        }
        debug!(token = token.id, depth = self.outstanding.len(), "Scroll lock released");
        if self.outstanding.is_empty() {
            self.document.set_scroll_blocked(false);
            debug!("Scroll unblocked");
        }
    }

    /// Number of outstanding scroll lock tokens.
    pub fn scroll_lock_depth(&self) -> usize {
        self.outstanding.len()
    }

    // =========================================================================
    // Focus traps
    // =========================================================================

    /// Traps focus inside `container`, focusing its first focusable element.
    pub fn enter_focus_trap(
        &mut self,
        container: &ElementId,
    ) -> Result<FocusTrapHandle, ResourceError> {
        self.enter_focus_trap_at(container, None)
    }

    /// Like [`enter_focus_trap`](Self::enter_focus_trap), but lets the caller
    /// choose the initially focused element (a search input, for instance).
    pub fn enter_focus_trap_at(
        &mut self,
        container: &ElementId,
        initial: Option<ElementId>,
    ) -> Result<FocusTrapHandle, ResourceError> {
        let focusables = self
            .document
            .focusable_within(container)
            .ok_or_else(|| ResourceError::MissingContainer(container.clone()))?;
        let initial = initial.filter(|element| self.document.contains(container, element));
        let id = self
            .focus
            .push(self.document.as_mut(), container.clone(), focusables, initial);
        debug!(%container, trap = id, depth = self.focus.depth(), "Focus trap entered");
        Ok(FocusTrapHandle {
            id,
            generation: self.generation,
        })
    }

    pub fn exit_focus_trap(&mut self, handle: FocusTrapHandle) {
        if handle.generation != self.generation
            || !self.focus.remove(self.document.as_mut(), handle.id)
        {
            misuse(ResourceMisuseError::UnknownFocusTrap {
                trap: handle.id,
                generation: handle.generation,
            });
            return;
        }
        debug!(trap = handle.id, depth = self.focus.depth(), "Focus trap exited");
    }

    /// Runs the active trap's Tab handler. Returns `true` if the default action
    /// must be prevented.
    pub fn handle_tab(&mut self, backward: bool) -> bool {
        self.focus.handle_tab(self.document.as_mut(), backward)
    }

    pub fn focus_trap_depth(&self) -> usize {
        self.focus.depth()
    }

    /// Container of the trap currently handling Tab.
    pub fn active_focus_trap(&self) -> Option<&ElementId> {
        self.focus.active_container()
    }

    // =========================================================================
    // Registration & exclusivity
    // =========================================================================

    /// Registers (or re-registers) an overlay. Re-registering keeps its open flag.
    pub fn register(&mut self, handle: OverlayHandle) {
        debug!(overlay = %handle.id, group = ?handle.exclusivity_group, "Overlay registered");
        let open = self
            .overlays
            .get(&handle.id)
            .is_some_and(|registration| registration.open);
        self.overlays
            .insert(handle.id.clone(), Registration { handle, open });
    }

    pub fn is_registered(&self, id: &OverlayId) -> bool {
        self.overlays.contains_key(id)
    }

    /// Returns the open overlays that must close before `id` may open.
    ///
    /// `independent` overlays never displace anything.
    pub fn request_exclusive(
        &self,
        id: &OverlayId,
        group: &ExclusivityGroup,
    ) -> Result<Vec<OverlayId>, ResourceError> {
        if !self.overlays.contains_key(id) {
            return Err(ResourceError::UnknownOverlay(id.clone()));
        }
        if *group == ExclusivityGroup::Independent {
            return Ok(Vec::new());
        }
        Ok(self
            .overlays
            .values()
            .filter(|r| r.open && r.handle.id != *id && r.handle.exclusivity_group == *group)
            .map(|r| r.handle.id.clone())
            .collect())
    }

    pub(crate) fn mark_open(&mut self, id: &OverlayId, open: bool) {
        if let Some(registration) = self.overlays.get_mut(id) {
            registration.open = open;
        }
    }

    // =========================================================================
    // Page passthroughs
    // =========================================================================

    /// Read-only view of the page.
    pub fn document(&self) -> &dyn Document {
        self.document.as_ref()
    }

    pub(crate) fn focus_element(&mut self, element: &ElementId) {
        self.document.focus(element);
    }

    pub(crate) fn set_hidden(&mut self, element: &ElementId, hidden: bool) {
        self.document.set_hidden(element, hidden);
    }

    pub(crate) fn set_expanded(&mut self, trigger: &ElementId, expanded: bool) {
        self.document.set_expanded(trigger, expanded);
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Starts a new generation: forgets registrations and invalidates every
    /// token and trap handle issued so far.
    ///
    /// Anything still outstanding at this point leaked from its owner; it is
    /// force-released so the page cannot stay locked.
    pub fn reset(&mut self) {
        let leaked_locks = self.outstanding.len();
        let leaked_traps = self.focus.clear();
        if leaked_locks > 0 || leaked_traps > 0 {
            warn!(leaked_locks, leaked_traps, "Resources still held at reset");
        }
        if leaked_locks > 0 {
            self.outstanding.clear();
            self.document.set_scroll_blocked(false);
        }
        self.overlays.clear();
        self.generation += 1;
        info!(generation = self.generation, "Resource manager reset");
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

fn misuse(error: ResourceMisuseError) {
    if cfg!(debug_assertions) {
        panic!("resource misuse: {error}");
    }
    warn!(%error, "Ignoring resource misuse");
}
