use std::fmt::Display;

/// Identifier an overlay registers under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverlayId(pub String);

impl From<&str> for OverlayId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Display for OverlayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a page element (trigger, container, focusable control).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub String);

impl From<&str> for ElementId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ElementId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether opening an overlay closes its siblings.
///
/// Exclusive groups are named: overlays only close open siblings that share
/// the same name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExclusivityGroup {
    Independent,
    ExclusiveWithSiblings(String),
}

impl ExclusivityGroup {
    pub fn exclusive(name: impl Into<String>) -> Self {
        Self::ExclusiveWithSiblings(name.into())
    }
}

/// Registration record an overlay hands to the resource manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayHandle {
    pub id: OverlayId,
    pub exclusivity_group: ExclusivityGroup,
    pub is_focus_trapped: bool,
}

impl OverlayHandle {
    pub fn new(id: impl Into<OverlayId>, group: ExclusivityGroup, is_focus_trapped: bool) -> Self {
        Self {
            id: id.into(),
            exclusivity_group: group,
            is_focus_trapped,
        }
    }
}

/// Per-overlay lifecycle.
///
/// `Opening` and `Closing` only exist so a transition animation can finish;
/// resources are held from entering `Opening` until entering `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    Closed,
    Opening,
    Open,
    Closing,
}

impl OverlayState {
    /// `true` while the overlay is shown or on its way to being shown.
    pub fn is_open(self) -> bool {
        matches!(self, OverlayState::Opening | OverlayState::Open)
    }
}
