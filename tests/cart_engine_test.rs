//! Cart engine tests against a mocked remote.
//!
//! Time is paused: sleeps advance the clock instantly once every task is idle,
//! so debounce, timeout and error-flash intervals are exact.

use std::sync::Arc;
use std::time::Duration;
use storefront_overlay::broadcast::{CartBroadcaster, CountBadge};
use storefront_overlay::cart_actor::{self, CartContext, CartError};
use storefront_overlay::clients::CartClient;
use storefront_overlay::lifecycle::CartConfig;
use storefront_overlay::model::{CartLineItem, RemoteCart};
use storefront_overlay::remote::mock::{
    create_mock_service, expect_change, expect_fetch, MockCartService, RemoteCall,
};
use storefront_overlay::remote::{CartService, RemoteError, TRANSPORT_MESSAGE};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::Instant;

fn cart(lines: &[(&str, u32)]) -> RemoteCart {
    RemoteCart::new(
        lines
            .iter()
            .map(|(key, quantity)| CartLineItem::new(*key, *key, *quantity, 1000))
            .collect(),
    )
}

/// Lets the engine drain its queue.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

struct Harness {
    client: CartClient,
    calls: UnboundedReceiver<RemoteCall>,
    badge: CountBadge,
    engine: JoinHandle<()>,
}

fn spawn_engine(service: Arc<dyn CartService>) -> (CartClient, CountBadge, JoinHandle<()>) {
    let mut broadcaster = CartBroadcaster::new();
    let badge = CountBadge::new();
    broadcaster.register_display(badge.clone());
    let (engine, client) = cart_actor::new(&CartConfig::default());
    let handle = tokio::spawn(engine.run(CartContext {
        service,
        broadcaster,
    }));
    (client, badge, handle)
}

/// Starts an engine on the channel mock and seeds it with `lines`.
async fn seeded(lines: &[(&str, u32)]) -> Harness {
    let (service, mut calls) = create_mock_service();
    let (client, badge, engine) = spawn_engine(service);

    let refresh = {
        let client = client.clone();
        tokio::spawn(async move { client.refresh().await })
    };
    let respond_to = expect_fetch(&mut calls).await.unwrap();
    respond_to.send(Ok(cart(lines))).unwrap();
    refresh.await.unwrap().unwrap();

    Harness {
        client,
        calls,
        badge,
        engine,
    }
}

#[tokio::test(start_paused = true)]
async fn rapid_increments_collapse_into_one_request() {
    let mut h = seeded(&[("abc", 1)]).await;

    let mut displayed = Vec::new();
    for _ in 0..3 {
        let snapshot = h.client.request_quantity_change("abc", 1).await.unwrap();
        displayed.push(snapshot.quantity_of(&"abc".into()));
        tokio::time::sleep(Duration::from_millis(40)).await;
    }
    assert_eq!(displayed, vec![2, 3, 4]);
    assert_eq!(h.badge.count(), 4);

    let last_edit = Instant::now() - Duration::from_millis(40);
    let (key, quantity, respond_to) = expect_change(&mut h.calls).await.unwrap();
    assert_eq!(key, "abc".into());
    assert_eq!(quantity, 4);
    assert!(Instant::now() - last_edit >= Duration::from_millis(250));

    respond_to.send(Ok(cart(&[("abc", 4)]))).unwrap();
    settle().await;

    let snapshot = h.client.snapshot().await.unwrap();
    assert_eq!(snapshot.quantity_of(&"abc".into()), 4);
    assert!(snapshot.errors.is_empty());
    assert!(h.calls.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn newer_response_wins_when_older_arrives_late() {
    let mut h = seeded(&[("abc", 1)]).await;

    h.client.request_quantity_change("abc", 1).await.unwrap();
    let (_, first_qty, first) = expect_change(&mut h.calls).await.unwrap();
    h.client.request_quantity_change("abc", 1).await.unwrap();
    let (_, second_qty, second) = expect_change(&mut h.calls).await.unwrap();
    assert_eq!((first_qty, second_qty), (2, 3));

    second.send(Ok(cart(&[("abc", 3)]))).unwrap();
    settle().await;
    first.send(Ok(cart(&[("abc", 2)]))).unwrap();
    settle().await;

    let snapshot = h.client.snapshot().await.unwrap();
    assert_eq!(snapshot.quantity_of(&"abc".into()), 3);
    assert_eq!(h.badge.count(), 3);
}

#[tokio::test(start_paused = true)]
async fn newer_response_wins_when_older_arrives_first() {
    let mut h = seeded(&[("abc", 1)]).await;

    h.client.request_quantity_change("abc", 1).await.unwrap();
    let (_, _, first) = expect_change(&mut h.calls).await.unwrap();
    h.client.request_quantity_change("abc", 1).await.unwrap();
    let (_, _, second) = expect_change(&mut h.calls).await.unwrap();

    first.send(Ok(cart(&[("abc", 2)]))).unwrap();
    settle().await;
    // The newer edit is still pending, so the display stays on it.
    let snapshot = h.client.snapshot().await.unwrap();
    assert_eq!(snapshot.quantity_of(&"abc".into()), 3);

    second.send(Ok(cart(&[("abc", 3)]))).unwrap();
    settle().await;
    let snapshot = h.client.snapshot().await.unwrap();
    assert_eq!(snapshot.quantity_of(&"abc".into()), 3);
}

#[tokio::test(start_paused = true)]
async fn transport_failure_reverts_and_flashes_an_error() {
    let mut h = seeded(&[("xyz", 2), ("abc", 1)]).await;

    let optimistic = h.client.remove_item("xyz".into()).await.unwrap();
    assert_eq!(optimistic.quantity_of(&"xyz".into()), 0);
    assert_eq!(h.badge.count(), 1);

    let (_, quantity, respond_to) = expect_change(&mut h.calls).await.unwrap();
    assert_eq!(quantity, 0);
    respond_to
        .send(Err(RemoteError::Transport("connection reset".into())))
        .unwrap();
    settle().await;

    let snapshot = h.client.snapshot().await.unwrap();
    assert_eq!(snapshot.quantity_of(&"xyz".into()), 2);
    assert_eq!(snapshot.error_for(&"xyz".into()), Some(TRANSPORT_MESSAGE));
    assert_eq!(h.badge.count(), 3);

    tokio::time::sleep(Duration::from_millis(1400)).await;
    let snapshot = h.client.snapshot().await.unwrap();
    assert!(snapshot.error_for(&"xyz".into()).is_some());

    tokio::time::sleep(Duration::from_millis(200)).await;
    let snapshot = h.client.snapshot().await.unwrap();
    assert!(snapshot.error_for(&"xyz".into()).is_none());
    assert_eq!(snapshot.quantity_of(&"xyz".into()), 2);

    // Never retried.
    assert!(h.calls.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn unanswered_change_times_out_and_reverts() {
    let mut h = seeded(&[("abc", 1)]).await;

    h.client.request_quantity_change("abc", 1).await.unwrap();
    let (_, _, _unanswered) = expect_change(&mut h.calls).await.unwrap();

    tokio::time::sleep(Duration::from_secs(11)).await;
    let snapshot = h.client.snapshot().await.unwrap();
    assert_eq!(snapshot.quantity_of(&"abc".into()), 1);
    assert_eq!(snapshot.error_for(&"abc".into()), Some(TRANSPORT_MESSAGE));
}

#[tokio::test(start_paused = true)]
async fn rejection_reason_is_shown_to_the_user() {
    let mut h = seeded(&[("abc", 1)]).await;

    h.client.set_quantity("abc".into(), 8).await.unwrap();
    let (_, _, respond_to) = expect_change(&mut h.calls).await.unwrap();
    respond_to
        .send(Err(RemoteError::Rejected {
            reason: Some("Only 3 left in stock".into()),
        }))
        .unwrap();
    settle().await;

    let snapshot = h.client.snapshot().await.unwrap();
    assert_eq!(snapshot.quantity_of(&"abc".into()), 1);
    assert_eq!(snapshot.error_for(&"abc".into()), Some("Only 3 left in stock"));
}

#[tokio::test(start_paused = true)]
async fn failure_of_a_superseded_request_is_ignored() {
    let mut h = seeded(&[("abc", 1)]).await;

    h.client.request_quantity_change("abc", 1).await.unwrap();
    let (_, _, first) = expect_change(&mut h.calls).await.unwrap();
    h.client.request_quantity_change("abc", 1).await.unwrap();

    first
        .send(Err(RemoteError::Transport("connection reset".into())))
        .unwrap();
    settle().await;
    let snapshot = h.client.snapshot().await.unwrap();
    assert_eq!(snapshot.quantity_of(&"abc".into()), 3);
    assert!(snapshot.errors.is_empty());

    let (_, quantity, second) = expect_change(&mut h.calls).await.unwrap();
    assert_eq!(quantity, 3);
    second.send(Ok(cart(&[("abc", 3)]))).unwrap();
    settle().await;
    assert_eq!(h.badge.count(), 3);
}

#[tokio::test(start_paused = true)]
async fn removing_an_absent_line_sends_nothing() {
    let mut h = seeded(&[("abc", 1)]).await;

    let snapshot = h.client.remove_item("missing".into()).await.unwrap();
    assert_eq!(snapshot.item_count, 1);

    h.client.remove_item("abc".into()).await.unwrap();
    let (_, quantity, respond_to) = expect_change(&mut h.calls).await.unwrap();
    assert_eq!(quantity, 0);
    respond_to.send(Ok(cart(&[]))).unwrap();
    settle().await;

    let before = h.client.snapshot().await.unwrap();
    let after = h.client.remove_item("abc".into()).await.unwrap();
    assert_eq!(before.version, after.version);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(h.calls.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn editing_back_to_the_confirmed_value_sends_nothing() {
    let mut h = seeded(&[("abc", 1)]).await;

    h.client.request_quantity_change("abc", 1).await.unwrap();
    let snapshot = h.client.request_quantity_change("abc", -1).await.unwrap();
    assert_eq!(snapshot.quantity_of(&"abc".into()), 1);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(h.calls.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn quantities_are_clamped() {
    let mut h = seeded(&[("abc", 1)]).await;

    let snapshot = h.client.set_quantity("abc".into(), 500).await.unwrap();
    assert_eq!(snapshot.quantity_of(&"abc".into()), 99);
    let (_, quantity, respond_to) = expect_change(&mut h.calls).await.unwrap();
    assert_eq!(quantity, 99);
    respond_to.send(Ok(cart(&[("abc", 99)]))).unwrap();
    settle().await;

    let snapshot = h.client.request_quantity_change("abc", 1).await.unwrap();
    assert_eq!(snapshot.quantity_of(&"abc".into()), 99);
}

#[tokio::test(start_paused = true)]
async fn remote_line_limit_overrides_the_default() {
    let (service, mut calls) = create_mock_service();
    let (client, _badge, _engine) = spawn_engine(service);

    let refresh = {
        let client = client.clone();
        tokio::spawn(async move { client.refresh().await })
    };
    let mut limited = cart(&[("abc", 1)]);
    limited.items[0].max_quantity = Some(5);
    expect_fetch(&mut calls).await.unwrap().send(Ok(limited)).unwrap();
    refresh.await.unwrap().unwrap();

    let snapshot = client.request_quantity_change("abc", 10).await.unwrap();
    assert_eq!(snapshot.quantity_of(&"abc".into()), 5);
}

#[tokio::test(start_paused = true)]
async fn positive_change_to_an_unknown_line_is_refused() {
    let h = seeded(&[("abc", 1)]).await;
    let result = h.client.request_quantity_change("nope", 1).await;
    assert_eq!(result, Err(CartError::UnknownLine("nope".into())));
}

#[tokio::test(start_paused = true)]
async fn refresh_keeps_unsent_edits() {
    let mut h = seeded(&[("abc", 1)]).await;

    h.client.request_quantity_change("abc", 1).await.unwrap();
    let refresh = {
        let client = h.client.clone();
        tokio::spawn(async move { client.refresh().await })
    };
    let respond_to = expect_fetch(&mut h.calls).await.unwrap();
    respond_to
        .send(Ok(cart(&[("abc", 1), ("def", 2)])))
        .unwrap();

    let snapshot = refresh.await.unwrap().unwrap();
    assert_eq!(snapshot.quantity_of(&"abc".into()), 2);
    assert_eq!(snapshot.quantity_of(&"def".into()), 2);
    assert_eq!(snapshot.item_count, 4);

    let (_, quantity, _) = expect_change(&mut h.calls).await.unwrap();
    assert_eq!(quantity, 2);
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_is_reported_to_the_caller() {
    let mut h = seeded(&[("abc", 1)]).await;

    let refresh = {
        let client = h.client.clone();
        tokio::spawn(async move { client.refresh().await })
    };
    let respond_to = expect_fetch(&mut h.calls).await.unwrap();
    respond_to
        .send(Err(RemoteError::Malformed("expected `items`".into())))
        .unwrap();

    let result = refresh.await.unwrap();
    assert!(matches!(result, Err(CartError::Remote(RemoteError::Malformed(_)))));
    let snapshot = h.client.snapshot().await.unwrap();
    assert_eq!(snapshot.quantity_of(&"abc".into()), 1);
}

#[tokio::test(start_paused = true)]
async fn snapshot_versions_strictly_increase() {
    let mut h = seeded(&[("abc", 1), ("def", 1)]).await;

    let mut versions = vec![h.client.snapshot().await.unwrap().version];
    for _ in 0..3 {
        versions.push(h.client.request_quantity_change("abc", 1).await.unwrap().version);
    }
    let (_, _, respond_to) = expect_change(&mut h.calls).await.unwrap();
    respond_to.send(Ok(cart(&[("abc", 4), ("def", 1)]))).unwrap();
    settle().await;
    versions.push(h.client.snapshot().await.unwrap().version);

    assert!(versions.windows(2).all(|pair| pair[0] < pair[1]), "{versions:?}");
}

#[tokio::test]
async fn add_item_applies_the_returned_cart() {
    let mock = MockCartService::new();
    mock.expect_current_cart().return_ok(cart(&[]));
    mock.expect_add("tee", 2).return_ok(cart(&[("tee", 2)]));

    let (client, badge, engine) = spawn_engine(mock.service());
    client.refresh().await.unwrap();
    let snapshot = client.add_item("tee".into(), 2).await.unwrap();

    assert_eq!(snapshot.item_count, 2);
    assert_eq!(badge.count(), 2);
    assert!(badge.is_visible());
    mock.verify();

    drop(client);
    engine.await.unwrap();
}

#[tokio::test]
async fn rejected_add_is_reported_to_the_caller() {
    let mock = MockCartService::new();
    mock.expect_add("tee", 20).return_err(RemoteError::Rejected {
        reason: Some("You can only add 5 of this item to your cart.".into()),
    });

    let (client, badge, _engine) = spawn_engine(mock.service());
    let result = client.add_item("tee".into(), 20).await;

    assert!(matches!(result, Err(CartError::Remote(RemoteError::Rejected { .. }))));
    assert_eq!(badge.count(), 0);
    mock.verify();
}

#[tokio::test]
async fn engine_stops_when_clients_are_dropped() {
    let h = seeded(&[]).await;
    let spare = h.client.clone();
    drop(h.client);
    assert!(spare.snapshot().await.is_ok());
    drop(spare);
    h.engine.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn refresh_answered_before_a_confirmation_cannot_roll_it_back() {
    let mut h = seeded(&[("abc", 1)]).await;

    h.client.request_quantity_change("abc", 3).await.unwrap();
    let (_, quantity, change) = expect_change(&mut h.calls).await.unwrap();
    assert_eq!(quantity, 4);

    // The panel opens while the change is in flight.
    let refresh = {
        let client = h.client.clone();
        tokio::spawn(async move { client.refresh().await })
    };
    let fetch = expect_fetch(&mut h.calls).await.unwrap();

    change.send(Ok(cart(&[("abc", 4)]))).unwrap();
    settle().await;
    assert_eq!(h.badge.count(), 4);

    // The remote read the cart before it committed the change.
    fetch.send(Ok(cart(&[("abc", 1)]))).unwrap();
    let snapshot = refresh.await.unwrap().unwrap();
    assert_eq!(snapshot.quantity_of(&"abc".into()), 4);
    assert_eq!(h.badge.count(), 4);

    // A later refresh is authoritative again.
    let refresh = {
        let client = h.client.clone();
        tokio::spawn(async move { client.refresh().await })
    };
    expect_fetch(&mut h.calls)
        .await
        .unwrap()
        .send(Ok(cart(&[("abc", 5)])))
        .unwrap();
    let snapshot = refresh.await.unwrap().unwrap();
    assert_eq!(snapshot.quantity_of(&"abc".into()), 5);
}

#[tokio::test(start_paused = true)]
async fn edits_waiting_for_debounce_are_sent_on_shutdown() {
    let mut h = seeded(&[("abc", 1)]).await;

    h.client.request_quantity_change("abc", 1).await.unwrap();
    let dropped_at = Instant::now();
    drop(h.client);

    let (key, quantity, respond_to) = expect_change(&mut h.calls).await.unwrap();
    assert_eq!((key, quantity), ("abc".into(), 2));
    assert!(Instant::now() - dropped_at < Duration::from_millis(250));
    respond_to.send(Ok(cart(&[("abc", 2)]))).unwrap();

    h.engine.await.unwrap();
    assert_eq!(h.badge.count(), 2);
    // The debounce timer firing later does not send it twice.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(h.calls.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn removed_line_is_forgotten_once_settled() {
    let mut h = seeded(&[("abc", 1), ("def", 1)]).await;

    h.client.remove_item("def".into()).await.unwrap();
    let (_, _, respond_to) = expect_change(&mut h.calls).await.unwrap();
    respond_to.send(Ok(cart(&[("abc", 1)]))).unwrap();
    settle().await;

    // Nothing is known about the line any more.
    let result = h.client.request_quantity_change("def", 1).await;
    assert_eq!(result, Err(CartError::UnknownLine("def".into())));
    let snapshot = h.client.remove_item("def".into()).await.unwrap();
    assert_eq!(snapshot.item_count, 1);
}
