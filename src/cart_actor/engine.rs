//! # Cart Reconciliation Engine
//!
//! The engine is an actor: it owns every piece of cart state and processes
//! client requests and its own events one at a time, so nothing in here needs
//! a lock.
//!
//! # Architecture Note
//! Handlers never await. Remote calls and timers run in spawned tasks that
//! report back through the engine's own event channel, so a slow remote never
//! delays an optimistic update.
//!
//! ## State
//!
//! - `confirmed`: the last authoritative value of every line.
//! - per-line `LineState`: the sequence counter, the highest applied sequence,
//!   the pending optimistic edit, and the error flag.
//!
//! The displayed snapshot is always `confirmed` with pending targets laid on
//! top. Every rebuild gets a fresh version and goes to the broadcaster.
//!
//! ## Ordering
//!
//! Per line, a response is applied only if its sequence number is not below
//! the highest one already applied. Because the remote returns the whole cart,
//! a response also carries values for lines it was not about; those are taken
//! only if no later-dispatched call has already set them. Every dispatch gets
//! a global ordinal for that comparison.

use super::messages::{CartRequest, EngineEvent, Response};
use super::CartError;
use crate::broadcast::CartBroadcaster;
use crate::clients::CartClient;
use crate::lifecycle::CartConfig;
use crate::model::{CartLineItem, CartSnapshot, LineKey, PendingEdit, QuantityChange, RemoteCart};
use crate::remote::{CartService, RemoteError};
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Dependencies injected when the engine starts.
pub struct CartContext {
    pub service: Arc<dyn CartService>,
    pub broadcaster: CartBroadcaster,
}

#[derive(Debug, Clone)]
struct LineError {
    seq: u64,
    message: String,
}

#[derive(Debug, Default)]
struct LineState {
    next_seq: u64,
    last_applied_seq: u64,
    pending: Option<PendingEdit>,
    /// Sent and not yet settled.
    in_flight: BTreeSet<u64>,
    error: Option<LineError>,
}

impl LineState {
    /// Nothing left that could still change the line.
    fn is_idle(&self) -> bool {
        self.pending.is_none() && self.in_flight.is_empty() && self.error.is_none()
    }
}

pub struct CartEngine {
    receiver: mpsc::Receiver<CartRequest>,
    events: mpsc::UnboundedReceiver<EngineEvent>,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    settings: CartConfig,
    confirmed: Vec<CartLineItem>,
    /// Ordinal of the response that last set each line in `confirmed`.
    origin: BTreeMap<LineKey, u64>,
    /// Metadata of lines seen since the engine was last idle, for prices and
    /// limits of lines the remote has dropped.
    catalog: BTreeMap<LineKey, CartLineItem>,
    lines: BTreeMap<LineKey, LineState>,
    next_ordinal: u64,
    /// Remote calls sent and not yet settled.
    outstanding: usize,
    version: u64,
    current: Arc<CartSnapshot>,
}

impl CartEngine {
    /// Creates the engine and its client. Nothing runs until
    /// [`run`](Self::run) is spawned.
    pub fn new(config: &CartConfig) -> (Self, CartClient) {
        let (sender, receiver) = mpsc::channel(config.channel_capacity);
        let (events_tx, events) = mpsc::unbounded_channel();
        let engine = Self {
            receiver,
            events,
            events_tx,
            settings: config.clone(),
            confirmed: Vec::new(),
            origin: BTreeMap::new(),
            catalog: BTreeMap::new(),
            lines: BTreeMap::new(),
            next_ordinal: 0,
            outstanding: 0,
            version: 0,
            current: Arc::new(CartSnapshot::default()),
        };
        (engine, CartClient::new(sender))
    }

    /// Processes requests until every client is dropped, then sends any edit
    /// still waiting for its debounce and waits for the remote to settle.
    pub async fn run(mut self, mut context: CartContext) {
        info!(
            debounce_ms = self.settings.debounce_ms,
            max_quantity = self.settings.max_quantity,
            "Cart engine started"
        );

        loop {
            tokio::select! {
                request = self.receiver.recv() => match request {
                    Some(request) => self.handle_request(request, &mut context),
                    None => {
                        self.flush(&mut context).await;
                        break;
                    }
                },
                Some(event) = self.events.recv() => self.handle_event(event, &mut context),
            }
        }

        info!(
            lines = self.current.items.len(),
            version = self.version,
            "Cart engine shutdown"
        );
    }

    /// Dispatches every undispatched edit now and drains their results.
    async fn flush(&mut self, context: &mut CartContext) {
        let unsent: Vec<(LineKey, u64)> = self
            .lines
            .iter()
            .filter_map(|(key, state)| {
                let pending = state.pending.as_ref()?;
                let seq = pending.sequence_number;
                (!state.in_flight.contains(&seq)).then(|| (key.clone(), seq))
            })
            .collect();
        if !unsent.is_empty() {
            info!(edits = unsent.len(), "Flushing edits before shutdown");
        }
        for (key, seq) in unsent {
            self.dispatch(key, seq, context);
        }
        while self.outstanding > 0 {
            match self.events.recv().await {
                Some(event) => self.handle_event(event, context),
                None => break,
            }
        }
    }

    // =========================================================================
    // Requests
    // =========================================================================

    fn handle_request(&mut self, request: CartRequest, context: &mut CartContext) {
        match request {
            CartRequest::ChangeQuantity {
                key,
                change,
                respond_to,
            } => {
                debug!(%key, ?change, "ChangeQuantity");
                let result = self.change_quantity(key, change, context);
                let _ = respond_to.send(result);
            }
            CartRequest::AddItem {
                product,
                quantity,
                respond_to,
            } => {
                debug!(%product, quantity, "AddItem");
                if quantity == 0 {
                    let _ = respond_to.send(Ok(self.current.clone()));
                    return;
                }
                let service = context.service.clone();
                self.fetch(respond_to, async move { service.add_line(&product, quantity).await });
            }
            CartRequest::Refresh { respond_to } => {
                debug!("Refresh");
                let service = context.service.clone();
                self.fetch(respond_to, async move { service.current_cart().await });
            }
            CartRequest::Snapshot { respond_to } => {
                let _ = respond_to.send(Ok(self.current.clone()));
            }
        }
    }

    fn change_quantity(
        &mut self,
        key: LineKey,
        change: QuantityChange,
        context: &mut CartContext,
    ) -> Result<Arc<CartSnapshot>, CartError> {
        let displayed = self.current.quantity_of(&key);
        let Some(line) = self.catalog.get(&key) else {
            // Removing a line that is not there is already done.
            if change.target(displayed, self.settings.max_quantity) == 0 {
                return Ok(self.current.clone());
            }
            warn!(%key, "Change for a line the cart never had");
            return Err(CartError::UnknownLine(key));
        };

        let target = change.target(displayed, line.max_allowed(self.settings.max_quantity));
        if target == displayed {
            debug!(%key, target, "Already at target");
            return Ok(self.current.clone());
        }

        let state = self.lines.entry(key.clone()).or_default();
        state.next_seq += 1;
        let seq = state.next_seq;
        state.pending = Some(PendingEdit {
            key: key.clone(),
            target_quantity: target,
            sequence_number: seq,
            issued_at: Instant::now(),
        });
        state.error = None;
        debug!(%key, seq, target, "Optimistic update");

        self.schedule(
            self.settings.debounce(),
            EngineEvent::DebounceElapsed { key, seq },
        );
        Ok(self.rebuild(context))
    }

    /// Sends a whole-cart call (add, refresh) and answers `respond_to` once it
    /// settles.
    fn fetch<F>(&mut self, respond_to: Response<Arc<CartSnapshot>>, call: F)
    where
        F: Future<Output = Result<RemoteCart, RemoteError>> + Send + 'static,
    {
        let ordinal = self.next_ordinal();
        self.outstanding += 1;
        let limit = self.settings.request_timeout();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = with_timeout(limit, call).await;
            let _ = events.send(EngineEvent::FetchSettled {
                ordinal,
                result,
                respond_to,
            });
        });
    }

    // =========================================================================
    // Events
    // =========================================================================

    fn handle_event(&mut self, event: EngineEvent, context: &mut CartContext) {
        match event {
            EngineEvent::DebounceElapsed { key, seq } => self.dispatch(key, seq, context),
            EngineEvent::ChangeSettled {
                key,
                seq,
                ordinal,
                result,
            } => self.settle_change(key, seq, ordinal, result, context),
            EngineEvent::FetchSettled {
                ordinal,
                result,
                respond_to,
            } => {
                self.outstanding -= 1;
                match result {
                    Ok(cart) => {
                        self.merge(cart, ordinal, None);
                        let snapshot = self.rebuild(context);
                        info!(version = snapshot.version, count = snapshot.item_count, "Cart fetched");
                        let _ = respond_to.send(Ok(snapshot));
                    }
                    Err(error) => {
                        warn!(%error, "Cart fetch failed");
                        let _ = respond_to.send(Err(error.into()));
                    }
                }
            }
            EngineEvent::ErrorExpired { key, seq } => {
                let expired = self
                    .lines
                    .get_mut(&key)
                    .filter(|state| state.error.as_ref().is_some_and(|e| e.seq == seq));
                if let Some(state) = expired {
                    state.error = None;
                    debug!(%key, seq, "Line error cleared");
                    self.rebuild(context);
                }
            }
        }
        self.prune();
    }

    /// Sends the pending edit for `key` if `seq` is still the latest one.
    fn dispatch(&mut self, key: LineKey, seq: u64, context: &mut CartContext) {
        let ordinal = self.next_ordinal + 1;
        let Some(state) = self.lines.get_mut(&key) else {
            return;
        };
        let Some(pending) = state.pending.as_ref().filter(|p| p.sequence_number == seq) else {
            debug!(%key, seq, "Debounce superseded");
            return;
        };
        if state.in_flight.contains(&seq) {
            // Already flushed.
            return;
        }
        let target = pending.target_quantity;
        let waited_ms = pending.issued_at.elapsed().as_millis() as u64;

        if state.in_flight.is_empty() && quantity_in(&self.confirmed, &key) == target {
            // Edited back to the confirmed value before anything was sent.
            state.pending = None;
            state.last_applied_seq = seq;
            debug!(%key, seq, target, "Nothing to send");
            return;
        }

        state.in_flight.insert(seq);
        self.next_ordinal = ordinal;
        self.outstanding += 1;
        info!(%key, seq, target, waited_ms, "Dispatching change");

        let service = context.service.clone();
        let events = self.events_tx.clone();
        let limit = self.settings.request_timeout();
        tokio::spawn(async move {
            let result = with_timeout(limit, service.change_line(&key, target)).await;
            let _ = events.send(EngineEvent::ChangeSettled {
                key,
                seq,
                ordinal,
                result,
            });
        });
    }

    fn settle_change(
        &mut self,
        key: LineKey,
        seq: u64,
        ordinal: u64,
        result: Result<RemoteCart, RemoteError>,
        context: &mut CartContext,
    ) {
        self.outstanding -= 1;
        let Some(state) = self.lines.get_mut(&key) else {
            return;
        };
        state.in_flight.remove(&seq);
        if seq < state.last_applied_seq {
            debug!(%key, seq, last_applied = state.last_applied_seq, "Stale response discarded");
            return;
        }

        match result {
            Ok(cart) => {
                state.last_applied_seq = seq;
                if state.pending.as_ref().is_some_and(|p| p.sequence_number <= seq) {
                    state.pending = None;
                }
                if state.error.as_ref().is_some_and(|e| e.seq <= seq) {
                    state.error = None;
                }
                info!(%key, seq, "Change confirmed");
                self.merge(cart, ordinal, Some(&key));
                // Fetches sent before this confirmation arrived may have been
                // answered before the remote committed it.
                self.origin.insert(key, self.next_ordinal);
                self.rebuild(context);
            }
            Err(error) => {
                if state.pending.as_ref().is_some_and(|p| p.sequence_number > seq) {
                    debug!(%key, seq, %error, "Superseded change failed");
                    return;
                }
                if let RemoteError::Malformed(detail) = &error {
                    warn!(%key, seq, %detail, "Malformed cart response");
                }
                warn!(%key, seq, %error, "Change failed, reverting");
                state.pending = None;
                state.last_applied_seq = seq;
                state.error = Some(LineError {
                    seq,
                    message: error.user_message(),
                });
                self.schedule(
                    self.settings.error_flash(),
                    EngineEvent::ErrorExpired { key, seq },
                );
                self.rebuild(context);
            }
        }
    }

    // =========================================================================
    // State
    // =========================================================================

    /// Folds a full remote cart into `confirmed`.
    ///
    /// `responding` is the line the call was about; it is always taken. Every
    /// other line is taken only if this response was dispatched after the one
    /// that last set it.
    fn merge(&mut self, cart: RemoteCart, ordinal: u64, responding: Option<&LineKey>) {
        let takes = |origin: &BTreeMap<LineKey, u64>, key: &LineKey| {
            responding == Some(key) || ordinal > origin.get(key).copied().unwrap_or(0)
        };

        let previous_lines = std::mem::take(&mut self.confirmed);
        let previous_order: Vec<LineKey> = previous_lines.iter().map(|l| l.key.clone()).collect();
        let mut previous: BTreeMap<LineKey, CartLineItem> = previous_lines
            .into_iter()
            .map(|line| (line.key.clone(), line))
            .collect();
        let mut seen = BTreeSet::new();
        let mut merged = Vec::with_capacity(cart.items.len());

        for item in cart.items {
            seen.insert(item.key.clone());
            if takes(&self.origin, &item.key) {
                self.origin.insert(item.key.clone(), ordinal);
                self.catalog.insert(item.key.clone(), item.clone());
                previous.remove(&item.key);
                if item.quantity > 0 {
                    merged.push(item);
                }
            } else {
                self.catalog.entry(item.key.clone()).or_insert_with(|| item.clone());
                if let Some(kept) = previous.remove(&item.key) {
                    merged.push(kept);
                }
            }
        }

        // Lines the response no longer lists.
        for key in previous_order {
            if seen.contains(&key) {
                continue;
            }
            let Some(line) = previous.remove(&key) else {
                continue;
            };
            if takes(&self.origin, &key) {
                self.origin.insert(key, ordinal);
            } else {
                merged.push(line);
            }
        }

        if let Some(key) = responding {
            self.origin.insert(key.clone(), ordinal);
        }
        self.confirmed = merged;
    }

    /// Forgets lines that left the cart and have nothing pending. Only while no
    /// call is outstanding, since a late response could otherwise bring one
    /// back.
    fn prune(&mut self) {
        if self.outstanding > 0 {
            return;
        }
        let present: BTreeSet<LineKey> = self.confirmed.iter().map(|l| l.key.clone()).collect();
        self.lines
            .retain(|key, state| present.contains(key) || !state.is_idle());
        let lines = &self.lines;
        let keep = |key: &LineKey| present.contains(key) || lines.contains_key(key);
        self.catalog.retain(|key, _| keep(key));
        self.origin.retain(|key, _| keep(key));
    }

    /// Recomputes the displayed snapshot and publishes it.
    fn rebuild(&mut self, context: &mut CartContext) -> Arc<CartSnapshot> {
        let pending_target = |key: &LineKey| {
            self.lines
                .get(key)
                .and_then(|state| state.pending.as_ref())
                .map(|pending| pending.target_quantity)
        };

        let mut items: Vec<CartLineItem> = self
            .confirmed
            .iter()
            .map(|line| {
                let mut line = line.clone();
                if let Some(target) = pending_target(&line.key) {
                    line.quantity = target;
                }
                line
            })
            .collect();

        // Lines brought back by an edit after the remote dropped them.
        for (key, state) in &self.lines {
            let Some(pending) = &state.pending else {
                continue;
            };
            if pending.target_quantity == 0 || self.confirmed.iter().any(|l| &l.key == key) {
                continue;
            }
            if let Some(meta) = self.catalog.get(key) {
                let mut line = meta.clone();
                line.quantity = pending.target_quantity;
                items.push(line);
            }
        }

        let errors = self
            .lines
            .iter()
            .filter_map(|(key, state)| {
                state
                    .error
                    .as_ref()
                    .map(|error| (key.clone(), error.message.clone()))
            })
            .collect();

        self.version += 1;
        let snapshot = Arc::new(CartSnapshot::from_items(items, self.version, errors));
        self.current = snapshot.clone();
        context.broadcaster.publish(snapshot.clone());
        snapshot
    }

    fn next_ordinal(&mut self) -> u64 {
        self.next_ordinal += 1;
        self.next_ordinal
    }

    fn schedule(&self, delay: Duration, event: EngineEvent) {
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(event);
        });
    }
}

fn quantity_in(lines: &[CartLineItem], key: &LineKey) -> u32 {
    lines
        .iter()
        .find(|line| &line.key == key)
        .map_or(0, |line| line.quantity)
}

async fn with_timeout(
    limit: Duration,
    call: impl Future<Output = Result<RemoteCart, RemoteError>>,
) -> Result<RemoteCart, RemoteError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(RemoteError::Timeout {
            after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart(lines: &[(&str, u32)]) -> RemoteCart {
        RemoteCart::new(
            lines
                .iter()
                .map(|(key, quantity)| CartLineItem::new(*key, *key, *quantity, 1000))
                .collect(),
        )
    }

    #[test]
    fn older_response_keeps_newer_values_for_other_lines() {
        let (mut engine, _client) = CartEngine::new(&CartConfig::default());

        engine.merge(cart(&[("a", 1), ("b", 1)]), 1, None);
        // Dispatched third, arrives first: b went to 5.
        engine.merge(cart(&[("a", 1), ("b", 5)]), 3, Some(&"b".into()));
        // Dispatched second, about a. Still reports the old b.
        engine.merge(cart(&[("a", 2), ("b", 1)]), 2, Some(&"a".into()));

        assert_eq!(quantity_in(&engine.confirmed, &"a".into()), 2);
        assert_eq!(quantity_in(&engine.confirmed, &"b".into()), 5);
    }

    #[test]
    fn removal_is_taken_from_newer_responses_only() {
        let (mut engine, _client) = CartEngine::new(&CartConfig::default());

        engine.merge(cart(&[("a", 1), ("b", 1)]), 1, None);
        engine.merge(cart(&[("a", 1)]), 3, Some(&"b".into()));
        engine.merge(cart(&[("a", 1), ("b", 1)]), 2, None);

        assert_eq!(engine.confirmed.len(), 1);
        assert_eq!(quantity_in(&engine.confirmed, &"b".into()), 0);
        // Metadata survives for lines that are gone.
        assert!(engine.catalog.contains_key(&"b".into()));
    }

    #[test]
    fn idle_engine_forgets_lines_that_left_the_cart() {
        let (mut engine, _client) = CartEngine::new(&CartConfig::default());
        engine.merge(cart(&[("a", 1), ("b", 1), ("c", 1)]), 1, None);
        for key in ["a", "b", "c"] {
            engine.lines.insert(key.into(), LineState::default());
        }
        // c still has an edit waiting for its debounce.
        engine.lines.entry("c".into()).or_default().pending = Some(PendingEdit {
            key: "c".into(),
            target_quantity: 2,
            sequence_number: 1,
            issued_at: Instant::now(),
        });
        engine.merge(cart(&[("a", 1)]), 2, None);

        engine.outstanding = 1;
        engine.prune();
        assert!(engine.catalog.contains_key(&"b".into()));

        engine.outstanding = 0;
        engine.prune();
        assert!(!engine.lines.contains_key(&"b".into()));
        assert!(!engine.catalog.contains_key(&"b".into()));
        assert!(!engine.origin.contains_key(&"b".into()));
        assert!(engine.lines.contains_key(&"c".into()));
        assert!(engine.catalog.contains_key(&"c".into()));
        assert!(engine.lines.contains_key(&"a".into()));
    }
}
