//! DebounceScheduler tests.

use std::sync::Arc;
use std::time::Duration;

use cart_sync::sync::scheduler::{WriteFn, WriteFuture};
use cart_sync::sync::{DebounceScheduler, DebounceScope, PendingWrite};
use cart_sync::NewCartItem;
use parking_lot::Mutex;

use super::mocks::*;

fn recorder() -> (Arc<Mutex<Vec<PendingWrite>>>, Arc<WriteFn>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    let send: Arc<WriteFn> = Arc::new(move |write: PendingWrite| -> WriteFuture {
        let sink = sink.clone();
        Box::pin(async move {
            sink.lock().push(write);
        })
    });
    (log, send)
}

fn write(id: &str, quantity: u32, rollback_to: u32) -> PendingWrite {
    PendingWrite {
        product_id: id.to_string(),
        merchant_id: "m1".to_string(),
        quantity,
        version: u64::from(quantity),
        rollback_to,
    }
}

fn scheduler(scope: DebounceScope) -> (Arc<Mutex<Vec<PendingWrite>>>, DebounceScheduler) {
    let (log, send) = recorder();
    (log, DebounceScheduler::new(Duration::from_millis(1000), scope, send))
}

// ============================================================================
// Coalescing
// ============================================================================

#[tokio::test(start_paused = true)]
async fn burst_produces_one_write_with_final_quantity() {
    let (log, sched) = scheduler(DebounceScope::PerLine);

    for (i, qty) in [2, 3, 4, 5, 6].into_iter().enumerate() {
        sched.schedule(write("p1", qty, if i == 0 { 1 } else { qty - 1 }));
        sleep_ms(100).await;
    }
    assert!(log.lock().is_empty());

    sleep_ms(1000).await;

    let sent = log.lock().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].quantity, 6);
    assert_eq!(sent[0].rollback_to, 1, "rollback comes from the first call of the burst");
}

#[tokio::test(start_paused = true)]
async fn each_call_restarts_the_window() {
    let (log, sched) = scheduler(DebounceScope::PerLine);

    sched.schedule(write("p1", 2, 1));
    sleep_ms(900).await;
    sched.schedule(write("p1", 3, 2));
    sleep_ms(900).await;
    assert!(log.lock().is_empty());

    sleep_ms(200).await;
    assert_eq!(log.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn separate_bursts_send_separately() {
    let (log, sched) = scheduler(DebounceScope::PerLine);

    sched.schedule(write("p1", 2, 1));
    sleep_ms(1500).await;
    sched.schedule(write("p1", 3, 2));
    sleep_ms(1500).await;

    let sent: Vec<(u32, u32)> = log.lock().iter().map(|w| (w.quantity, w.rollback_to)).collect();
    assert_eq!(sent, vec![(2, 1), (3, 2)]);
}

// ============================================================================
// Scope
// ============================================================================

#[tokio::test(start_paused = true)]
async fn per_line_scope_keeps_writes_for_other_products() {
    let (log, sched) = scheduler(DebounceScope::PerLine);

    sched.schedule(write("p1", 2, 1));
    sched.schedule(write("p2", 5, 1));
    assert_eq!(sched.pending_count(), 2);
    sleep_ms(1100).await;

    let mut ids: Vec<String> = log.lock().iter().map(|w| w.product_id.clone()).collect();
    ids.sort();
    assert_eq!(ids, vec!["p1", "p2"]);
}

#[tokio::test(start_paused = true)]
async fn whole_cart_scope_drops_write_for_other_product() {
    let (log, sched) = scheduler(DebounceScope::WholeCart);

    sched.schedule(write("p1", 2, 1));
    sched.schedule(write("p2", 5, 4));
    assert_eq!(sched.pending_count(), 1);
    sleep_ms(1100).await;

    let sent = log.lock().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].product_id, "p2");
    assert_eq!(sent[0].rollback_to, 4);
}

// ============================================================================
// Cancel / flush / dispose
// ============================================================================

#[tokio::test(start_paused = true)]
async fn cancel_only_targets_matching_product() {
    let (log, sched) = scheduler(DebounceScope::WholeCart);

    sched.schedule(write("p1", 2, 1));
    assert!(!sched.cancel("p2"));
    assert!(sched.pending("p1").is_some());
    assert!(sched.cancel("p1"));
    sleep_ms(2000).await;

    assert!(log.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn flush_sends_immediately() {
    let (log, sched) = scheduler(DebounceScope::PerLine);

    sched.schedule(write("p1", 2, 1));
    sched.schedule(write("p2", 3, 1));
    assert_eq!(sched.flush().await, 2);
    assert_eq!(log.lock().len(), 2);
    assert_eq!(sched.pending_count(), 0);

    sleep_ms(2000).await;
    assert_eq!(log.lock().len(), 2, "timers must not fire after a flush");
}

#[tokio::test(start_paused = true)]
async fn dispose_cancels_and_rejects_new_writes() {
    let (log, sched) = scheduler(DebounceScope::PerLine);

    sched.schedule(write("p1", 2, 1));
    sched.dispose();
    sched.schedule(write("p1", 3, 2));
    sleep_ms(2000).await;

    assert!(log.lock().is_empty());
    assert_eq!(sched.pending_count(), 0);
}

// ============================================================================
// Through the cart
// ============================================================================

#[tokio::test(start_paused = true)]
async fn five_rapid_updates_send_one_upsert() {
    let remote = Arc::new(MockRemote::new());
    let cart = make_cart(remote.clone(), Arc::new(MockProducts::new()));
    cart.add_item(NewCartItem::new("p1", "m1", "Widget", 10.0, 1))
        .await
        .unwrap();
    remote.clear_calls();

    for qty in 2..=6 {
        cart.update_quantity("p1", qty).await;
        sleep_ms(50).await;
    }
    assert!(remote.upserts().is_empty());

    sleep_ms(1000).await;
    assert_eq!(remote.upserts(), vec![remote_line("p1", 6)]);
}

#[tokio::test(start_paused = true)]
async fn whole_cart_scope_loses_interleaved_edit() {
    let remote = Arc::new(MockRemote::new());
    let cart = make_cart_with_scope(
        remote.clone(),
        Arc::new(MockProducts::new()),
        DebounceScope::WholeCart,
    );
    for id in ["a", "b"] {
        cart.add_item(NewCartItem::new(id, "m1", id, 1.0, 1)).await.unwrap();
    }
    remote.clear_calls();

    cart.update_quantity("a", 4).await;
    cart.update_quantity("b", 2).await;
    sleep_ms(1500).await;

    assert_eq!(remote.upserts(), vec![remote_line("b", 2)]);
    assert_eq!(cart.line("a").unwrap().quantity, 4);
}
