//! # Test Doubles for the Remote Cart
//!
//! Two styles, for two kinds of test:
//!
//! | | [`create_mock_service`] | [`MockCartService`] |
//! |---|---|---|
//! | **Responses** | Sent by the test, whenever it likes | Queued up front |
//! | **Ordering** | Any (reply to seq 3 before seq 2) | Call order |
//! | **Timeouts** | Just never reply | Not expressible |
//! | **Use Case** | Reconciliation races | Straight-line flows |
//!
//! ## Channel-backed
//!
//! ```rust,ignore
//! let (service, mut calls) = create_mock_service();
//! // ... drive the engine ...
//! let (key, quantity, respond_to) = expect_change(&mut calls).await.unwrap();
//! respond_to.send(Ok(cart)).unwrap();
//! ```
//!
//! ## Fluent
//!
//! ```rust,ignore
//! let mock = MockCartService::new();
//! mock.expect_change("abc", 4).return_ok(cart);
//! // ... drive the engine with mock.service() ...
//! mock.verify();
//! ```

use super::{CartService, RemoteError};
use crate::model::{LineKey, ProductRef, RemoteCart};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot};

/// Where a test sends the remote's reply.
pub type Responder = oneshot::Sender<Result<RemoteCart, RemoteError>>;

/// A call the engine made to the remote, waiting for the test to answer it.
#[derive(Debug)]
pub enum RemoteCall {
    CurrentCart {
        respond_to: Responder,
    },
    ChangeLine {
        key: LineKey,
        quantity: u32,
        respond_to: Responder,
    },
    AddLine {
        product: ProductRef,
        quantity: u32,
        respond_to: Responder,
    },
}

// =============================================================================
// CHANNEL-BACKED MOCK
// =============================================================================

/// Forwards every call to a channel the test reads from.
#[derive(Debug, Clone)]
pub struct ChannelCartService {
    sender: mpsc::UnboundedSender<RemoteCall>,
}

impl ChannelCartService {
    async fn call(
        &self,
        build: impl FnOnce(Responder) -> RemoteCall,
    ) -> Result<RemoteCart, RemoteError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(build(respond_to))
            .map_err(|_| RemoteError::Transport("mock receiver closed".to_string()))?;
        response
            .await
            .map_err(|_| RemoteError::Transport("mock responder dropped".to_string()))?
    }
}

#[async_trait]
impl CartService for ChannelCartService {
    async fn current_cart(&self) -> Result<RemoteCart, RemoteError> {
        self.call(|respond_to| RemoteCall::CurrentCart { respond_to })
            .await
    }

    async fn change_line(&self, key: &LineKey, quantity: u32) -> Result<RemoteCart, RemoteError> {
        let key = key.clone();
        self.call(|respond_to| RemoteCall::ChangeLine {
            key,
            quantity,
            respond_to,
        })
        .await
    }

    async fn add_line(&self, product: &ProductRef, quantity: u32) -> Result<RemoteCart, RemoteError> {
        let product = product.clone();
        self.call(|respond_to| RemoteCall::AddLine {
            product,
            quantity,
            respond_to,
        })
        .await
    }
}

/// Creates a mock service and the receiver on which its calls arrive.
///
/// Dropping a [`Responder`] without answering makes the call fail with a
/// transport error; holding it unanswered lets the engine's timeout fire.
pub fn create_mock_service() -> (Arc<ChannelCartService>, mpsc::UnboundedReceiver<RemoteCall>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Arc::new(ChannelCartService { sender }), receiver)
}

/// Helper to verify that the next call is a line change.
pub async fn expect_change(
    receiver: &mut mpsc::UnboundedReceiver<RemoteCall>,
) -> Option<(LineKey, u32, Responder)> {
    match receiver.recv().await {
        Some(RemoteCall::ChangeLine {
            key,
            quantity,
            respond_to,
        }) => Some((key, quantity, respond_to)),
        _ => None,
    }
}

/// Helper to verify that the next call is a cart fetch.
pub async fn expect_fetch(receiver: &mut mpsc::UnboundedReceiver<RemoteCall>) -> Option<Responder> {
    match receiver.recv().await {
        Some(RemoteCall::CurrentCart { respond_to }) => Some(respond_to),
        _ => None,
    }
}

/// Helper to verify that the next call is an add.
pub async fn expect_add(
    receiver: &mut mpsc::UnboundedReceiver<RemoteCall>,
) -> Option<(ProductRef, u32, Responder)> {
    match receiver.recv().await {
        Some(RemoteCall::AddLine {
            product,
            quantity,
            respond_to,
        }) => Some((product, quantity, respond_to)),
        _ => None,
    }
}

// =============================================================================
// EXPECTATION BUILDER API
// =============================================================================

#[derive(Debug)]
enum Expectation {
    CurrentCart {
        response: Result<RemoteCart, RemoteError>,
    },
    Change {
        key: LineKey,
        quantity: u32,
        response: Result<RemoteCart, RemoteError>,
    },
    Add {
        product: ProductRef,
        quantity: u32,
        response: Result<RemoteCart, RemoteError>,
    },
}

type Expectations = Arc<Mutex<VecDeque<Expectation>>>;

fn lock(expectations: &Expectations) -> MutexGuard<'_, VecDeque<Expectation>> {
    expectations.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A remote that answers from a queue of expectations, in call order.
#[derive(Debug, Clone, Default)]
pub struct MockCartService {
    expectations: Expectations,
}

impl MockCartService {
    pub fn new() -> Self {
        Self::default()
    }

    /// The service to hand to the engine.
    pub fn service(&self) -> Arc<dyn CartService> {
        Arc::new(self.clone())
    }

    pub fn expect_current_cart(&self) -> ExpectationBuilder {
        ExpectationBuilder {
            kind: Pending::CurrentCart,
            expectations: self.expectations.clone(),
        }
    }

    pub fn expect_change(&self, key: impl Into<LineKey>, quantity: u32) -> ExpectationBuilder {
        ExpectationBuilder {
            kind: Pending::Change(key.into(), quantity),
            expectations: self.expectations.clone(),
        }
    }

    pub fn expect_add(&self, product: impl Into<ProductRef>, quantity: u32) -> ExpectationBuilder {
        ExpectationBuilder {
            kind: Pending::Add(product.into(), quantity),
            expectations: self.expectations.clone(),
        }
    }

    /// Panics unless every expectation was consumed.
    pub fn verify(&self) {
        let remaining = lock(&self.expectations).len();
        if remaining != 0 {
            panic!("Not all expectations were met. {remaining} remaining");
        }
    }

    fn next(&self) -> Option<Expectation> {
        lock(&self.expectations).pop_front()
    }
}

#[async_trait]
impl CartService for MockCartService {
    async fn current_cart(&self) -> Result<RemoteCart, RemoteError> {
        match self.next() {
            Some(Expectation::CurrentCart { response }) => response,
            other => panic!("Unexpected current_cart call, expected {other:?}"),
        }
    }

    async fn change_line(&self, key: &LineKey, quantity: u32) -> Result<RemoteCart, RemoteError> {
        match self.next() {
            Some(Expectation::Change {
                key: expected_key,
                quantity: expected_quantity,
                response,
            }) if &expected_key == key && expected_quantity == quantity => response,
            other => panic!("Unexpected change_line({key}, {quantity}), expected {other:?}"),
        }
    }

    async fn add_line(&self, product: &ProductRef, quantity: u32) -> Result<RemoteCart, RemoteError> {
        match self.next() {
            Some(Expectation::Add {
                product: expected_product,
                quantity: expected_quantity,
                response,
            }) if &expected_product == product && expected_quantity == quantity => response,
            other => panic!("Unexpected add_line({product}, {quantity}), expected {other:?}"),
        }
    }
}

#[derive(Debug)]
enum Pending {
    CurrentCart,
    Change(LineKey, u32),
    Add(ProductRef, u32),
}

/// Completes an expectation with its response.
pub struct ExpectationBuilder {
    kind: Pending,
    expectations: Expectations,
}

impl ExpectationBuilder {
    pub fn return_ok(self, cart: RemoteCart) {
        self.push(Ok(cart));
    }

    pub fn return_err(self, error: RemoteError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<RemoteCart, RemoteError>) {
        let expectation = match self.kind {
            Pending::CurrentCart => Expectation::CurrentCart { response },
            Pending::Change(key, quantity) => Expectation::Change {
                key,
                quantity,
                response,
            },
            Pending::Add(product, quantity) => Expectation::Add {
                product,
                quantity,
                response,
            },
        };
        lock(&self.expectations).push_back(expectation);
    }
}
