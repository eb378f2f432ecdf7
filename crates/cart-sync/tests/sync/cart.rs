//! ShoppingCart façade tests: persistence, hydration, selection, events.

use std::sync::Arc;

use cart_sync::storage::{load_cart, MemoryStorage};
use cart_sync::{CartEvent, CartLine, CartOptions, NewCartItem, ShoppingCart};
use parking_lot::Mutex;

use super::mocks::*;

fn cart_with_storage(storage: Arc<MemoryStorage>) -> ShoppingCart {
    ShoppingCart::new(CartOptions::new(
        Arc::new(MockRemote::new()),
        Arc::new(MockProducts::new()),
        storage,
    ))
}

fn line(id: &str, price: f64, quantity: u32, selected: bool) -> CartLine {
    CartLine {
        product_id: id.to_string(),
        merchant_id: "m1".to_string(),
        name: format!("Product {id}"),
        price,
        quantity,
        selected,
        description: None,
        images: None,
    }
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn mutations_are_persisted() {
    let storage = Arc::new(MemoryStorage::new());
    let cart = cart_with_storage(storage.clone());

    cart.add_item(NewCartItem::new("p1", "m1", "Widget", 10.0, 2))
        .await
        .unwrap();
    cart.add_item(NewCartItem::new("p2", "m1", "Gadget", 5.0, 1))
        .await
        .unwrap();
    cart.flush_persistence().await;

    assert_eq!(load_cart(storage.as_ref(), "cart").unwrap(), cart.lines());
}

#[tokio::test]
async fn persisted_json_uses_camel_case() {
    let storage = Arc::new(MemoryStorage::new());
    let cart = cart_with_storage(storage.clone());

    cart.add_item(NewCartItem::new("p1", "m1", "Widget", 10.0, 2))
        .await
        .unwrap();
    cart.flush_persistence().await;

    let json = cart_sync::storage::PersistenceAdapter::get(storage.as_ref(), "cart")
        .unwrap()
        .unwrap();
    assert!(json.contains("\"productId\":\"p1\""));
    assert!(json.contains("\"merchantId\":\"m1\""));
}

#[tokio::test]
async fn burst_of_edits_collapses_writes() {
    let seed = serde_json::to_string(&vec![line("p1", 1.0, 1, true)]).unwrap();
    let storage = Arc::new(MemoryStorage::new().with_value("cart", seed));
    let cart = cart_with_storage(storage.clone());
    for _ in 0..20 {
        cart.toggle_item_selection("p1");
    }
    cart.flush_persistence().await;

    assert_eq!(storage.write_count(), 1);
    assert_eq!(load_cart(storage.as_ref(), "cart").unwrap(), cart.lines());
}

#[tokio::test]
async fn clearing_removes_the_snapshot() {
    let storage = Arc::new(MemoryStorage::new());
    let cart = cart_with_storage(storage.clone());
    cart.add_item(NewCartItem::new("p1", "m1", "Widget", 10.0, 2))
        .await
        .unwrap();
    cart.flush_persistence().await;

    cart.clear_local();
    cart.flush_persistence().await;

    let stored = cart_sync::storage::PersistenceAdapter::get(storage.as_ref(), "cart").unwrap();
    assert_eq!(stored, None);
}

#[tokio::test]
async fn custom_storage_key_is_used() {
    let storage = Arc::new(MemoryStorage::new());
    let mut options = CartOptions::new(
        Arc::new(MockRemote::new()),
        Arc::new(MockProducts::new()),
        storage.clone(),
    );
    options.storage_key = Some("user-42-cart".to_string());
    let cart = ShoppingCart::new(options);

    cart.add_item(NewCartItem::new("p1", "m1", "Widget", 10.0, 2))
        .await
        .unwrap();
    cart.flush_persistence().await;

    assert!(load_cart(storage.as_ref(), "cart").unwrap().is_empty());
    assert_eq!(load_cart(storage.as_ref(), "user-42-cart").unwrap().len(), 1);
}

#[tokio::test]
async fn failing_storage_does_not_break_mutations() {
    let storage = Arc::new(MemoryStorage::new());
    storage.fail_writes(true);
    let cart = cart_with_storage(storage.clone());

    cart.add_item(NewCartItem::new("p1", "m1", "Widget", 10.0, 2))
        .await
        .unwrap();
    cart.flush_persistence().await;

    assert_eq!(cart.lines().len(), 1);
    assert_eq!(storage.write_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_snapshot_matches_state_after_concurrent_edits() {
    let saved: Vec<CartLine> = (0..4)
        .map(|i| line(&format!("p{i}"), 1.0, 1, true))
        .collect();
    let storage =
        Arc::new(MemoryStorage::new().with_value("cart", serde_json::to_string(&saved).unwrap()));
    let cart = cart_with_storage(storage.clone());

    std::thread::scope(|scope| {
        for i in 0..4 {
            let cart = &cart;
            scope.spawn(move || {
                let id = format!("p{i}");
                for round in 0..257 {
                    cart.toggle_item_selection(&id);
                    if round % 16 == 0 {
                        cart.select_all_items();
                    }
                }
            });
        }
    });
    cart.flush_persistence().await;

    assert_eq!(load_cart(storage.as_ref(), "cart").unwrap(), cart.lines());
}

// ============================================================================
// Hydration
// ============================================================================

#[tokio::test]
async fn hydrates_from_existing_snapshot() {
    let saved = vec![line("p1", 10.0, 2, true), line("p2", 5.0, 3, false)];
    let json = serde_json::to_string(&saved).unwrap();
    let storage = Arc::new(MemoryStorage::new().with_value("cart", json));

    let cart = cart_with_storage(storage.clone());

    assert_eq!(cart.lines(), saved);
    assert_eq!(cart.total_price(), 35.0);
    assert_eq!(storage.write_count(), 0, "hydration does not write back");
}

#[tokio::test]
async fn corrupt_snapshot_starts_empty() {
    let storage = Arc::new(MemoryStorage::new().with_value("cart", "[{\"productId\":"));

    let cart = cart_with_storage(storage);

    assert!(cart.lines().is_empty());
    assert_eq!(cart.total_items(), 0);
}

// ============================================================================
// Aggregates and selection
// ============================================================================

#[tokio::test]
async fn selected_totals_follow_selection() {
    let saved = vec![line("p1", 10.0, 2, true), line("p2", 5.0, 3, true)];
    let storage =
        Arc::new(MemoryStorage::new().with_value("cart", serde_json::to_string(&saved).unwrap()));
    let cart = cart_with_storage(storage);

    assert_eq!(cart.selected_total_price(), 35.0);
    assert_eq!(cart.selected_items_count(), 5);

    assert!(!cart.toggle_item_selection("p2"));
    assert_eq!(cart.selected_total_price(), 20.0);
    assert_eq!(cart.selected_items_count(), 2);
    assert_eq!(cart.total_price(), 35.0);
    assert_eq!(cart.total_items(), 5);

    cart.unselect_all_items();
    assert_eq!(cart.selected_total_price(), 0.0);
    cart.select_all_items();
    assert_eq!(cart.selected_items_count(), 5);
}

#[tokio::test]
async fn subscribers_see_mutations_in_order() {
    let cart = cart_with_storage(Arc::new(MemoryStorage::new()));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let unsubscribe = cart.subscribe(move |event| sink.lock().push(event.clone()));

    cart.add_item(NewCartItem::new("p1", "m1", "Widget", 10.0, 1))
        .await
        .unwrap();
    cart.remove_item("p1").await;
    unsubscribe();
    cart.add_item(NewCartItem::new("p2", "m1", "Gadget", 1.0, 1))
        .await
        .unwrap();

    assert_eq!(
        seen.lock().clone(),
        vec![
            CartEvent::Added {
                product_id: "p1".into()
            },
            CartEvent::Removed {
                product_id: "p1".into()
            },
        ]
    );
}

#[tokio::test]
async fn dropping_the_cart_releases_the_store() {
    let cart = cart_with_storage(Arc::new(MemoryStorage::new()));
    let store = Arc::clone(cart.store());
    assert!(Arc::strong_count(&store) > 1);

    drop(cart);

    assert_eq!(Arc::strong_count(&store), 1);
}
