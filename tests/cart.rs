mod common;

use bookstore_orders::domain::value_objects::Money;
use bookstore_orders::BookstoreError;
use common::Harness;
use uuid::Uuid;

#[tokio::test]
async fn test_adding_twice_merges_into_one_line() {
    let h = Harness::new().await;
    let customer = h.customer("Trần Thị B").await;
    let book = h.book("Nhà Giả Kim", 79_000, 10).await;

    h.services.cart.add_item(customer, book.id, 2).await.unwrap();
    let cart = h.services.cart.add_item(customer, book.id, 3).await.unwrap();

    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.quantity_of(book.id), Some(5));
    assert_eq!(cart.subtotal, Money::vnd(395_000));
}

#[tokio::test]
async fn test_merge_beyond_stock_reports_what_is_already_in_cart() {
    let h = Harness::new().await;
    let customer = h.customer("Trần Thị B").await;
    let book = h.book("Sapiens", 189_000, 10).await;

    h.services.cart.add_item(customer, book.id, 5).await.unwrap();
    let err = h.services.cart.add_item(customer, book.id, 6).await.unwrap_err();

    assert!(matches!(err, BookstoreError::InsufficientStock { available: 10, in_cart: 5, .. }));
    let cart = h.services.cart.get_cart(customer).await.unwrap();
    assert_eq!(cart.quantity_of(book.id), Some(5));
}

#[tokio::test]
async fn test_out_of_stock_and_hidden_products_are_rejected() {
    let h = Harness::new().await;
    let customer = h.customer("Lê Văn C").await;
    let sold_out = h.book("Harry Potter", 120_000, 0).await;
    let mut hidden = bookstore_orders::domain::aggregates::Product::create("Draft", Money::vnd(10_000), 5);
    hidden.is_visible = false;
    let hidden = h.store.insert_product(hidden).await;

    let err = h.services.cart.add_item(customer, sold_out.id, 1).await.unwrap_err();
    assert!(matches!(err, BookstoreError::OutOfStock { .. }));

    let err = h.services.cart.add_item(customer, hidden.id, 1).await.unwrap_err();
    assert!(matches!(err, BookstoreError::ProductNotFound(id) if id == hidden.id));

    let err = h.services.cart.add_item(customer, Uuid::now_v7(), 1).await.unwrap_err();
    assert!(matches!(err, BookstoreError::ProductNotFound(_)));
}

#[tokio::test]
async fn test_unknown_customer_is_rejected() {
    let h = Harness::new().await;
    let book = h.book("Nhà Giả Kim", 79_000, 10).await;

    let err = h.services.cart.add_item(Uuid::now_v7(), book.id, 1).await.unwrap_err();
    assert!(matches!(err, BookstoreError::CustomerNotFound(_)));
    assert!(matches!(h.services.cart.get_cart(Uuid::now_v7()).await, Err(BookstoreError::CustomerNotFound(_))));
}

#[tokio::test]
async fn test_update_quantity_rules() {
    let h = Harness::new().await;
    let customer = h.customer("Phạm D").await;
    let book = h.book("Đắc Nhân Tâm", 86_000, 3).await;
    h.services.cart.add_item(customer, book.id, 1).await.unwrap();

    // stock is not re-checked on update; checkout catches it
    let cart = h.services.cart.update_item_quantity(customer, book.id, 7).await.unwrap();
    assert_eq!(cart.quantity_of(book.id), Some(7));

    let err = h.services.cart.update_item_quantity(customer, book.id, 0).await.unwrap_err();
    assert!(matches!(err, BookstoreError::InvalidQuantity(0)));

    let other = Uuid::now_v7();
    let err = h.services.cart.update_item_quantity(customer, other, 2).await.unwrap_err();
    assert!(matches!(err, BookstoreError::ItemNotInCart(id) if id == other));
}

#[tokio::test]
async fn test_remove_is_idempotent() {
    let h = Harness::new().await;
    let customer = h.customer("Hoàng E").await;
    let a = h.book("Nhà Giả Kim", 79_000, 10).await;
    let b = h.book("Sapiens", 189_000, 10).await;
    h.services.cart.add_item(customer, a.id, 1).await.unwrap();
    h.services.cart.add_item(customer, b.id, 1).await.unwrap();

    let first = h.services.cart.remove_item(customer, a.id).await.unwrap();
    let second = h.services.cart.remove_item(customer, a.id).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.quantity_of(b.id), Some(1));
}

#[tokio::test]
async fn test_cart_view_uses_live_catalog() {
    let h = Harness::new().await;
    let customer = h.customer("Vũ F").await;
    let kept = h.book("Nhà Giả Kim", 79_000, 10).await;
    let deleted = h.book("Out of print", 50_000, 10).await;
    h.services.cart.add_item(customer, kept.id, 2).await.unwrap();
    h.services.cart.add_item(customer, deleted.id, 1).await.unwrap();

    h.store.remove_product(deleted.id).await;
    let mut repriced = kept.clone();
    repriced.price = Money::vnd(70_000);
    h.store.insert_product(repriced).await;

    let cart = h.services.cart.get_cart(customer).await.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].item.price, Money::vnd(79_000));
    assert_eq!(cart.items[0].product.price, Money::vnd(70_000));
    assert_eq!(cart.subtotal, Money::vnd(140_000));
}

#[tokio::test]
async fn test_clear_empties_cart() {
    let h = Harness::new().await;
    let customer = h.customer("Đỗ G").await;
    let book = h.book("Nhà Giả Kim", 79_000, 10).await;
    h.services.cart.add_item(customer, book.id, 4).await.unwrap();

    h.services.cart.clear(customer).await.unwrap();

    let cart = h.services.cart.get_cart(customer).await.unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(cart.subtotal, Money::ZERO);
}
