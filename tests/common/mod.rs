#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use bookstore_orders::config::PricingConfig;
use bookstore_orders::domain::aggregates::{Customer, PaymentMethod, Product, Requester, ShippingAddress, Voucher, VoucherKind};
use bookstore_orders::domain::value_objects::{Money, VoucherCode};
use bookstore_orders::publisher::RecordingPublisher;
use bookstore_orders::services::{CreateOrderRequest, Services};
use bookstore_orders::store::{MemoryStore, VoucherStore};

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub events: Arc<RecordingPublisher>,
    pub services: Services,
    pub admin: Requester,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_pricing(PricingConfig::default()).await
    }

    pub async fn with_pricing(pricing: PricingConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let events = Arc::new(RecordingPublisher::default());
        let admin = store.insert_customer(Customer::admin("Admin", "admin@bookstore.com")).await;
        let services = Services::new(store.clone(), events.clone(), pricing);
        Self { store, events, services, admin: Requester::from(&admin) }
    }

    pub async fn customer(&self, name: &str) -> Uuid {
        let email = format!("{}@example.com", name.to_lowercase().replace(' ', "."));
        self.store.insert_customer(Customer::new(name, email)).await.id
    }

    pub async fn book(&self, name: &str, price: i64, stock: u32) -> Product {
        self.store.insert_product(Product::create(name, Money::vnd(price), stock)).await
    }

    pub async fn voucher(&self, voucher: Voucher) -> Voucher {
        self.store.insert_voucher(&voucher).await.unwrap()
    }

    pub async fn stock_of(&self, product_id: Uuid) -> u32 {
        use bookstore_orders::store::CatalogStore;
        self.store.product(product_id).await.unwrap().unwrap().count_in_stock
    }

    pub async fn used_count(&self, voucher_id: Uuid) -> u32 {
        self.store.voucher(voucher_id).await.unwrap().unwrap().used_count()
    }
}

pub fn week_long(code: &str, kind: VoucherKind, discount: i64) -> Voucher {
    Voucher::create(VoucherCode::new(code).unwrap(), kind, discount, Utc::now() + Duration::days(7))
        .starting_at(Utc::now() - Duration::days(1))
}

pub fn address() -> ShippingAddress {
    ShippingAddress { address: "12 Lý Thường Kiệt".into(), city: "Hà Nội".into(), phone: "0901234567".into() }
}

pub fn checkout(payment_method: PaymentMethod) -> CreateOrderRequest {
    CreateOrderRequest {
        shipping_address: address(),
        payment_method,
        total_price: None,
        voucher_code: None,
        discount_amount: None,
        bank_transfer_info: None,
        idempotency_key: None,
    }
}

pub fn checkout_with_voucher(code: &str) -> CreateOrderRequest {
    CreateOrderRequest { voucher_code: Some(code.to_string()), ..checkout(PaymentMethod::Cod) }
}
