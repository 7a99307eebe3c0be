//! In-process store behind a single async lock.
//!
//! Each trait method takes the lock once, so guarded writes are atomic with
//! respect to every other operation on the store.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CartStore, CatalogStore, CommitOutcome, CustomerStore, OrderStore, VoucherStore};
use crate::domain::aggregates::{Cart, Customer, FulfillmentStatus, Order, Product, Voucher, VoucherKind};
use crate::domain::value_objects::{Money, VoucherCode};
use crate::{BookstoreError, Result};

#[derive(Debug, Default)]
struct State {
    customers: HashMap<Uuid, Customer>,
    products: HashMap<Uuid, Product>,
    carts: HashMap<Uuid, Cart>,
    vouchers: HashMap<Uuid, Voucher>,
    orders: HashMap<Uuid, Order>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub async fn insert_customer(&self, customer: Customer) -> Customer {
        self.state.write().await.customers.insert(customer.id, customer.clone());
        customer
    }

    pub async fn insert_product(&self, product: Product) -> Product {
        self.state.write().await.products.insert(product.id, product.clone());
        product
    }

    /// Catalog-side stock adjustment.
    pub async fn set_stock(&self, product_id: Uuid, count_in_stock: u32) -> Result<()> {
        let mut state = self.state.write().await;
        let product = state.products.get_mut(&product_id).ok_or(BookstoreError::ProductNotFound(product_id))?;
        product.count_in_stock = count_in_stock;
        product.updated_at = Utc::now();
        Ok(())
    }

    /// Catalog-side deletion. Carts keep their lines until read.
    pub async fn remove_product(&self, product_id: Uuid) -> Option<Product> {
        self.state.write().await.products.remove(&product_id)
    }

    /// A small catalog with one admin, one customer and two vouchers.
    pub async fn with_demo_data() -> Self {
        let store = Self::new();
        let admin = store.insert_customer(Customer::admin("Admin", "admin@bookstore.com")).await;
        let customer = store.insert_customer(Customer::new("Nguyễn Văn A", "user1@example.com")).await;
        for (name, price, stock) in [
            ("Nhà Giả Kim", 79_000, 50),
            ("Đắc Nhân Tâm", 86_000, 40),
            ("Sapiens: Lược Sử Loài Người", 189_000, 20),
            ("Harry Potter và Hòn Đá Phù Thủy", 120_000, 0),
        ] {
            store.insert_product(Product::create(name, Money::vnd(price), stock)).await;
        }
        let end = Utc::now() + Duration::days(30);
        let vouchers = [
            VoucherCode::new("SALE10").map(|c| Voucher::create(c, VoucherKind::Percent, 10, end).with_min_order(Money::vnd(100_000))),
            VoucherCode::new("FREESHIP").map(|c| Voucher::create(c, VoucherKind::Shipping, 30_000, end)),
        ];
        for voucher in vouchers.into_iter().flatten() {
            if let Err(e) = store.insert_voucher(&voucher).await {
                tracing::warn!(code = %voucher.code, error = %e, "skipping demo voucher");
            }
        }
        tracing::info!(admin_id = %admin.id, customer_id = %customer.id, "seeded in-memory demo data");
        store
    }
}

fn newest_first<T>(mut items: Vec<T>, created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    items.sort_by_key(|item| std::cmp::Reverse(created_at(item)));
    items
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn products(&self, ids: &[Uuid]) -> Result<Vec<Product>> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.products.get(id).cloned()).collect())
    }
}

#[async_trait]
impl CustomerStore for MemoryStore {
    async fn customer(&self, id: Uuid) -> Result<Option<Customer>> {
        Ok(self.state.read().await.customers.get(&id).cloned())
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn load_cart(&self, customer_id: Uuid) -> Result<Cart> {
        let state = self.state.read().await;
        Ok(state.carts.get(&customer_id).cloned().unwrap_or_else(|| Cart::for_customer(customer_id)))
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        self.state.write().await.carts.insert(cart.customer_id(), cart.clone());
        Ok(())
    }
}

#[async_trait]
impl VoucherStore for MemoryStore {
    async fn voucher(&self, id: Uuid) -> Result<Option<Voucher>> {
        Ok(self.state.read().await.vouchers.get(&id).cloned())
    }

    async fn voucher_by_code(&self, code: &VoucherCode) -> Result<Option<Voucher>> {
        Ok(self.state.read().await.vouchers.values().find(|v| &v.code == code).cloned())
    }

    async fn vouchers(&self) -> Result<Vec<Voucher>> {
        let all: Vec<Voucher> = self.state.read().await.vouchers.values().cloned().collect();
        Ok(newest_first(all, |v: &Voucher| v.created_at))
    }

    async fn listed_vouchers(&self, now: DateTime<Utc>) -> Result<Vec<Voucher>> {
        let listed: Vec<Voucher> = self.state.read().await.vouchers.values().filter(|v| v.is_listed(now)).cloned().collect();
        Ok(newest_first(listed, |v: &Voucher| v.created_at))
    }

    async fn insert_voucher(&self, voucher: &Voucher) -> Result<Voucher> {
        let mut state = self.state.write().await;
        if state.vouchers.values().any(|v| v.code == voucher.code) {
            return Err(BookstoreError::DuplicateCode(voucher.code.to_string()));
        }
        state.vouchers.insert(voucher.id, voucher.clone());
        Ok(voucher.clone())
    }

    async fn update_voucher(&self, voucher: &Voucher) -> Result<Voucher> {
        let mut state = self.state.write().await;
        if state.vouchers.values().any(|v| v.code == voucher.code && v.id != voucher.id) {
            return Err(BookstoreError::DuplicateCode(voucher.code.to_string()));
        }
        let slot = state.vouchers.get_mut(&voucher.id).ok_or(BookstoreError::VoucherIdNotFound(voucher.id))?;
        // used_count is owned by redeem_voucher and never written here
        let used_count = slot.used_count;
        if voucher.max_uses < used_count {
            return Err(BookstoreError::Validation("max uses is below the redemptions already made".into()));
        }
        *slot = Voucher { used_count, ..voucher.clone() };
        Ok(slot.clone())
    }

    async fn delete_voucher(&self, id: Uuid) -> Result<bool> {
        Ok(self.state.write().await.vouchers.remove(&id).is_some())
    }

    async fn redeem_voucher(&self, id: Uuid) -> Result<Voucher> {
        let mut state = self.state.write().await;
        let voucher = state.vouchers.get_mut(&id).ok_or(BookstoreError::VoucherIdNotFound(id))?;
        voucher.redeem()?;
        Ok(voucher.clone())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn commit_order(&self, order: &Order) -> Result<CommitOutcome> {
        let mut state = self.state.write().await;
        if let Some(key) = order.idempotency_key() {
            let existing = state
                .orders
                .values()
                .find(|o| o.customer_id == order.customer_id && o.idempotency_key() == Some(key));
            if let Some(existing) = existing {
                return Ok(CommitOutcome::Duplicate(existing.clone()));
            }
        }

        // check every line before touching any stock
        for line in order.items() {
            let product = state.products.get(&line.product_id).ok_or(BookstoreError::ProductNotFound(line.product_id))?;
            if product.count_in_stock < line.quantity {
                return Err(BookstoreError::InsufficientStock {
                    product_id: product.id,
                    name: product.name.clone(),
                    available: product.count_in_stock,
                    in_cart: line.quantity,
                });
            }
        }
        for line in order.items() {
            if let Some(product) = state.products.get_mut(&line.product_id) {
                product.remove_inventory(line.quantity);
            }
        }

        let mut stored = order.clone();
        stored.events.clear();
        state.orders.insert(stored.id, stored.clone());
        Ok(CommitOutcome::Created(stored))
    }

    async fn order(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn order_by_idempotency_key(&self, customer_id: Uuid, key: &str) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.values().find(|o| o.customer_id == customer_id && o.idempotency_key() == Some(key)).cloned())
    }

    async fn orders(&self, customer_id: Option<Uuid>, search: Option<&str>) -> Result<Vec<Order>> {
        let needle = search.map(str::to_lowercase);
        let state = self.state.read().await;
        let matching: Vec<Order> = state
            .orders
            .values()
            .filter(|o| customer_id.map_or(true, |c| o.customer_id == c))
            .filter(|o| needle.as_deref().map_or(true, |n| o.id.to_string().contains(n)))
            .cloned()
            .collect();
        Ok(newest_first(matching, |o: &Order| o.created_at))
    }

    async fn update_fulfillment(&self, id: Uuid, status: FulfillmentStatus, now: DateTime<Utc>) -> Result<Order> {
        let mut state = self.state.write().await;
        let stored = state.orders.get_mut(&id).ok_or(BookstoreError::OrderNotFound(id))?;
        stored.set_status(status, now);
        stored.events.clear();
        Ok(stored.clone())
    }

    async fn update_payment(&self, id: Uuid, is_paid: bool, now: DateTime<Utc>) -> Result<Order> {
        let mut state = self.state.write().await;
        let stored = state.orders.get_mut(&id).ok_or(BookstoreError::OrderNotFound(id))?;
        stored.set_paid(is_paid, now);
        stored.events.clear();
        Ok(stored.clone())
    }

    async fn delete_order(&self, id: Uuid) -> Result<bool> {
        Ok(self.state.write().await.orders.remove(&id).is_some())
    }
}
