use crate::model::OverlayId;
use crate::resources::ResourceError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OverlayError {
    #[error("Overlay not found: {0}")]
    UnknownOverlay(OverlayId),

    /// Opening failed while acquiring a resource. Nothing stays held.
    #[error(transparent)]
    Resource(#[from] ResourceError),
}
