//! Error types for the cart engine.

use crate::model::LineKey;
use crate::remote::RemoteError;
use thiserror::Error;

/// Errors a [`CartClient`](crate::clients::CartClient) call can return.
///
/// Failures of a quantity change are not among them: those are reconciled
/// inside the engine and show up as a line error in the snapshot.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CartError {
    /// The engine has shut down and no longer accepts requests.
    #[error("Cart engine closed")]
    EngineClosed,

    /// The engine dropped the request without answering.
    #[error("Cart engine dropped the request")]
    EngineDropped,

    /// An edit asked for a positive quantity on a line the cart never had.
    #[error("Line not in cart: {0}")]
    UnknownLine(LineKey),

    /// An add or refresh failed at the remote.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}
