use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cart_sync::store::{Listeners, Unsubscribe};
use parking_lot::Mutex;

#[test]
fn notifies_every_listener_in_registration_order() {
    let listeners: Listeners<u32> = Listeners::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    for tag in ["a", "b"] {
        let log = log.clone();
        let _ = listeners.subscribe(move |v: &u32| log.lock().push(format!("{tag}{v}")));
    }
    listeners.notify(&1);
    listeners.notify(&2);

    assert_eq!(*log.lock(), vec!["a1", "b1", "a2", "b2"]);
}

#[test]
fn unsubscribe_stops_delivery() {
    let listeners: Listeners<u32> = Listeners::new();
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    let unsubscribe = listeners.subscribe(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });

    listeners.notify(&1);
    unsubscribe();
    listeners.notify(&2);

    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(listeners.is_empty());
}

#[test]
fn unsubscribe_only_removes_its_own_listener() {
    let listeners: Listeners<u32> = Listeners::new();
    let first = listeners.subscribe(|_| {});
    let _second = listeners.subscribe(|_| {});
    assert_eq!(listeners.len(), 2);

    first();

    assert_eq!(listeners.len(), 1);
}

#[test]
fn listener_removed_during_delivery_still_gets_current_event() {
    let listeners: Arc<Listeners<u32>> = Arc::new(Listeners::new());
    let slot: Arc<Mutex<Option<Unsubscribe>>> = Arc::new(Mutex::new(None));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let remover_slot = slot.clone();
    let _ = listeners.subscribe(move |_| {
        if let Some(unsubscribe) = remover_slot.lock().take() {
            unsubscribe();
        }
    });
    let sink = seen.clone();
    *slot.lock() = Some(listeners.subscribe(move |v: &u32| sink.lock().push(*v)));

    listeners.notify(&1);
    listeners.notify(&2);

    assert_eq!(*seen.lock(), vec![1]);
}

#[test]
fn listener_added_during_delivery_sees_only_later_events() {
    let listeners: Arc<Listeners<u32>> = Arc::new(Listeners::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let added = Arc::new(AtomicUsize::new(0));

    let registry = Arc::downgrade(&listeners);
    let sink = seen.clone();
    let flag = added.clone();
    let _ = listeners.subscribe(move |_| {
        if flag.fetch_add(1, Ordering::SeqCst) == 0 {
            if let Some(listeners) = registry.upgrade() {
                let sink = sink.clone();
                let _ = listeners.subscribe(move |v: &u32| sink.lock().push(*v));
            }
        }
    });

    listeners.notify(&1);
    listeners.notify(&2);

    assert_eq!(*seen.lock(), vec![2]);
}

#[test]
fn panicking_listener_does_not_stop_the_others() {
    let listeners: Listeners<u32> = Listeners::new();
    let count = Arc::new(AtomicUsize::new(0));

    let _ = listeners.subscribe(|_| panic!("listener failure"));
    let c = count.clone();
    let _ = listeners.subscribe(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });

    listeners.notify(&7);

    assert_eq!(count.load(Ordering::SeqCst), 1);
}
