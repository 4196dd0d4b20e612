//! Messages into the cart engine.

use super::CartError;
use crate::model::{CartSnapshot, LineKey, ProductRef, QuantityChange, RemoteCart};
use crate::remote::RemoteError;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Type alias for the one-shot response channel used by the engine.
pub type Response<T> = oneshot::Sender<Result<T, CartError>>;

/// Requests from a [`CartClient`](crate::clients::CartClient).
///
/// Every request is answered with the snapshot as it stands once the request
/// has been taken into account. For `ChangeQuantity` that is the optimistic
/// snapshot, available before the remote has seen anything.
#[derive(Debug)]
pub enum CartRequest {
    ChangeQuantity {
        key: LineKey,
        change: QuantityChange,
        respond_to: Response<Arc<CartSnapshot>>,
    },
    AddItem {
        product: ProductRef,
        quantity: u32,
        respond_to: Response<Arc<CartSnapshot>>,
    },
    Refresh {
        respond_to: Response<Arc<CartSnapshot>>,
    },
    Snapshot {
        respond_to: Response<Arc<CartSnapshot>>,
    },
}

/// Things that happen to the engine while it waits: timers and settled calls.
#[derive(Debug)]
pub(crate) enum EngineEvent {
    DebounceElapsed {
        key: LineKey,
        seq: u64,
    },
    ChangeSettled {
        key: LineKey,
        seq: u64,
        ordinal: u64,
        result: Result<RemoteCart, RemoteError>,
    },
    FetchSettled {
        ordinal: u64,
        result: Result<RemoteCart, RemoteError>,
        respond_to: Response<Arc<CartSnapshot>>,
    },
    ErrorExpired {
        key: LineKey,
        seq: u64,
    },
}
