//! Persistence ports and their implementations.
//!
//! Every write that more than one caller can race on (voucher usage, product
//! stock and the order status facets) is exposed as a single guarded or
//! column-scoped operation so that implementations can perform it atomically.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::aggregates::{Cart, Customer, FulfillmentStatus, Order, Product, Voucher};
use crate::domain::value_objects::VoucherCode;
use crate::Result;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn product(&self, id: Uuid) -> Result<Option<Product>>;
    async fn products(&self, ids: &[Uuid]) -> Result<Vec<Product>>;
}

#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn customer(&self, id: Uuid) -> Result<Option<Customer>>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// Returns an empty cart when the customer has never added anything.
    async fn load_cart(&self, customer_id: Uuid) -> Result<Cart>;
    async fn save_cart(&self, cart: &Cart) -> Result<()>;
}

#[async_trait]
pub trait VoucherStore: Send + Sync {
    async fn voucher(&self, id: Uuid) -> Result<Option<Voucher>>;
    async fn voucher_by_code(&self, code: &VoucherCode) -> Result<Option<Voucher>>;
    /// All vouchers, newest first.
    async fn vouchers(&self) -> Result<Vec<Voucher>>;
    /// Active vouchers whose end date is not before `now`, newest first.
    async fn listed_vouchers(&self, now: DateTime<Utc>) -> Result<Vec<Voucher>>;
    /// Fails with `DuplicateCode` when the code is taken.
    async fn insert_voucher(&self, voucher: &Voucher) -> Result<Voucher>;
    /// Fails with `DuplicateCode` when the new code belongs to another voucher.
    async fn update_voucher(&self, voucher: &Voucher) -> Result<Voucher>;
    async fn delete_voucher(&self, id: Uuid) -> Result<bool>;
    /// Increments the used count only while it is below the cap, as one atomic write.
    async fn redeem_voucher(&self, id: Uuid) -> Result<Voucher>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Decrements stock for every line (guarded by `stock >= quantity`) and
    /// inserts the order, all or nothing.
    async fn commit_order(&self, order: &Order) -> Result<CommitOutcome>;
    async fn order(&self, id: Uuid) -> Result<Option<Order>>;
    async fn order_by_idempotency_key(&self, customer_id: Uuid, key: &str) -> Result<Option<Order>>;
    /// Newest first. `search` matches a case-insensitive substring of the order id.
    async fn orders(&self, customer_id: Option<Uuid>, search: Option<&str>) -> Result<Vec<Order>>;
    /// Writes the fulfillment columns only. Entering `Delivered` stamps the
    /// delivery marker; no status clears it.
    async fn update_fulfillment(&self, id: Uuid, status: FulfillmentStatus, now: DateTime<Utc>) -> Result<Order>;
    /// Writes the payment columns only.
    async fn update_payment(&self, id: Uuid, is_paid: bool, now: DateTime<Utc>) -> Result<Order>;
    async fn delete_order(&self, id: Uuid) -> Result<bool>;
}

/// Result of the checkout commit point.
#[derive(Debug)]
pub enum CommitOutcome {
    Created(Order),
    /// An order with the same idempotency key already exists; nothing was written.
    Duplicate(Order),
}

pub trait Store: CatalogStore + CustomerStore + CartStore + VoucherStore + OrderStore {}

impl<T> Store for T where T: CatalogStore + CustomerStore + CartStore + VoucherStore + OrderStore {}
