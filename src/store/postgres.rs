//! PostgreSQL store.
//!
//! Voucher redemption and stock decrement are conditional `UPDATE`s whose
//! guard lives in the `WHERE` clause, so concurrent checkouts can never push
//! `used_count` past `max_uses` or `count_in_stock` below zero.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use super::{CartStore, CatalogStore, CommitOutcome, CustomerStore, OrderStore, VoucherStore};
use crate::domain::aggregates::{
    BankTransferInfo, Cart, CartItem, Customer, FulfillmentStatus, Order, OrderLine, Product, ShippingAddress, Voucher,
};
use crate::domain::value_objects::{Money, VoucherCode};
use crate::{BookstoreError, Result};

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
    pub fn pool(&self) -> &PgPool { &self.pool }
}

const UNIQUE_VIOLATION: &str = "23505";

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e.as_database_error().and_then(|d| d.code()), Some(code) if code == UNIQUE_VIOLATION)
}

fn to_u32(value: i32, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| BookstoreError::StorageError(format!("negative {column}: {value}")))
}

fn to_i32(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| BookstoreError::Validation(format!("quantity too large: {value}")))
}

// =============================================================================
// Rows
// =============================================================================

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid, name: String, image: Option<String>, price: i64, count_in_stock: i32,
    is_visible: bool, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = BookstoreError;
    fn try_from(r: ProductRow) -> Result<Self> {
        Ok(Product {
            id: r.id, name: r.name, image: r.image, price: Money::vnd(r.price),
            count_in_stock: to_u32(r.count_in_stock, "count_in_stock")?, is_visible: r.is_visible,
            created_at: r.created_at, updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CustomerRow { id: Uuid, name: String, email: String, is_admin: bool }

#[derive(sqlx::FromRow)]
struct CartItemRow {
    product_id: Uuid, name: String, image: Option<String>, price: i64, quantity: i32, added_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct VoucherRow {
    id: Uuid, code: String, description: String, kind: String, discount: i64, min_order: i64,
    max_uses: i32, used_count: i32, start_date: DateTime<Utc>, end_date: DateTime<Utc>,
    is_active: bool, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl TryFrom<VoucherRow> for Voucher {
    type Error = BookstoreError;
    fn try_from(r: VoucherRow) -> Result<Self> {
        Ok(Voucher {
            id: r.id, code: VoucherCode::new(&r.code)?, description: r.description, kind: r.kind.parse()?,
            discount: r.discount, min_order: Money::vnd(r.min_order), max_uses: to_u32(r.max_uses, "max_uses")?,
            used_count: to_u32(r.used_count, "used_count")?, start_date: r.start_date, end_date: r.end_date,
            is_active: r.is_active, created_at: r.created_at, updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid, customer_id: Uuid, items: Json<Vec<OrderLine>>, shipping_address: Json<ShippingAddress>,
    payment_method: String, subtotal: i64, shipping_fee: i64, discount_amount: i64, total_price: i64,
    voucher_code: Option<String>, bank_transfer_info: Option<Json<BankTransferInfo>>, is_paid: bool, paid_at: Option<DateTime<Utc>>, order_status: String,
    is_delivered: bool, delivered_at: Option<DateTime<Utc>>, idempotency_key: Option<String>,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = BookstoreError;
    fn try_from(r: OrderRow) -> Result<Self> {
        Ok(Order {
            id: r.id, customer_id: r.customer_id, items: r.items.0, shipping_address: r.shipping_address.0,
            payment_method: r.payment_method.parse()?, subtotal: Money::vnd(r.subtotal),
            shipping_fee: Money::vnd(r.shipping_fee), discount_amount: Money::vnd(r.discount_amount),
            total_price: Money::vnd(r.total_price), voucher_code: r.voucher_code.map(VoucherCode::new).transpose()?,
            bank_transfer_info: r.bank_transfer_info.map(|b| b.0), is_paid: r.is_paid, paid_at: r.paid_at, order_status: r.order_status.parse()?,
            is_delivered: r.is_delivered, delivered_at: r.delivered_at, idempotency_key: r.idempotency_key,
            created_at: r.created_at, updated_at: r.updated_at, events: vec![],
        })
    }
}

fn hydrate<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = BookstoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// =============================================================================
// Ports
// =============================================================================

#[async_trait]
impl CatalogStore for PgStore {
    async fn product(&self, id: Uuid) -> Result<Option<Product>> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await?
            .map(Product::try_from).transpose()
    }

    async fn products(&self, ids: &[Uuid]) -> Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = ANY($1)")
            .bind(ids).fetch_all(&self.pool).await?;
        hydrate(rows)
    }
}

#[async_trait]
impl CustomerStore for PgStore {
    async fn customer(&self, id: Uuid) -> Result<Option<Customer>> {
        let row = sqlx::query_as::<_, CustomerRow>("SELECT id, name, email, is_admin FROM customers WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(|r| Customer { id: r.id, name: r.name, email: r.email, is_admin: r.is_admin }))
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn load_cart(&self, customer_id: Uuid) -> Result<Cart> {
        let updated_at: Option<(DateTime<Utc>,)> = sqlx::query_as("SELECT updated_at FROM carts WHERE customer_id = $1")
            .bind(customer_id).fetch_optional(&self.pool).await?;
        let Some((updated_at,)) = updated_at else { return Ok(Cart::for_customer(customer_id)) };
        let rows = sqlx::query_as::<_, CartItemRow>(
            "SELECT product_id, name, image, price, quantity, added_at FROM cart_items WHERE customer_id = $1 ORDER BY added_at, product_id")
            .bind(customer_id).fetch_all(&self.pool).await?;
        let items = rows
            .into_iter()
            .map(|r| -> Result<CartItem> {
                Ok(CartItem {
                    product_id: r.product_id, name: r.name, image: r.image, price: Money::vnd(r.price),
                    quantity: to_u32(r.quantity, "quantity")?, added_at: r.added_at,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Cart { customer_id, items, updated_at })
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO carts (customer_id, updated_at) VALUES ($1, $2) ON CONFLICT (customer_id) DO UPDATE SET updated_at = EXCLUDED.updated_at")
            .bind(cart.customer_id()).bind(cart.updated_at()).execute(&mut *tx).await?;
        // lines are written one by one so a save never blanks lines it did not touch
        let kept: Vec<Uuid> = cart.items().iter().map(|i| i.product_id).collect();
        sqlx::query("DELETE FROM cart_items WHERE customer_id = $1 AND product_id <> ALL($2)")
            .bind(cart.customer_id()).bind(&kept).execute(&mut *tx).await?;
        for item in cart.items() {
            sqlx::query("INSERT INTO cart_items (customer_id, product_id, name, image, price, quantity, added_at) VALUES ($1, $2, $3, $4, $5, $6, $7) ON CONFLICT (customer_id, product_id) DO UPDATE SET name = EXCLUDED.name, image = EXCLUDED.image, price = EXCLUDED.price, quantity = EXCLUDED.quantity")
                .bind(cart.customer_id()).bind(item.product_id).bind(&item.name).bind(&item.image)
                .bind(item.price.amount()).bind(to_i32(item.quantity)?).bind(item.added_at)
                .execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl VoucherStore for PgStore {
    async fn voucher(&self, id: Uuid) -> Result<Option<Voucher>> {
        sqlx::query_as::<_, VoucherRow>("SELECT * FROM vouchers WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await?
            .map(Voucher::try_from).transpose()
    }

    async fn voucher_by_code(&self, code: &VoucherCode) -> Result<Option<Voucher>> {
        sqlx::query_as::<_, VoucherRow>("SELECT * FROM vouchers WHERE code = $1")
            .bind(code.as_str()).fetch_optional(&self.pool).await?
            .map(Voucher::try_from).transpose()
    }

    async fn vouchers(&self) -> Result<Vec<Voucher>> {
        let rows = sqlx::query_as::<_, VoucherRow>("SELECT * FROM vouchers ORDER BY created_at DESC")
            .fetch_all(&self.pool).await?;
        hydrate(rows)
    }

    async fn listed_vouchers(&self, now: DateTime<Utc>) -> Result<Vec<Voucher>> {
        let rows = sqlx::query_as::<_, VoucherRow>("SELECT * FROM vouchers WHERE is_active AND end_date >= $1 ORDER BY created_at DESC")
            .bind(now).fetch_all(&self.pool).await?;
        hydrate(rows)
    }

    async fn insert_voucher(&self, v: &Voucher) -> Result<Voucher> {
        let row = sqlx::query_as::<_, VoucherRow>("INSERT INTO vouchers (id, code, description, kind, discount, min_order, max_uses, used_count, start_date, end_date, is_active, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) ON CONFLICT (code) DO NOTHING RETURNING *")
            .bind(v.id).bind(v.code.as_str()).bind(&v.description).bind(v.kind.as_str()).bind(v.discount)
            .bind(v.min_order.amount()).bind(to_i32(v.max_uses)?).bind(to_i32(v.used_count)?)
            .bind(v.start_date).bind(v.end_date).bind(v.is_active).bind(v.created_at).bind(v.updated_at)
            .fetch_optional(&self.pool).await?
            .ok_or_else(|| BookstoreError::DuplicateCode(v.code.to_string()))?;
        Voucher::try_from(row)
    }

    async fn update_voucher(&self, v: &Voucher) -> Result<Voucher> {
        // used_count is owned by redeem_voucher and never written here
        let row = sqlx::query_as::<_, VoucherRow>("UPDATE vouchers SET code = $2, description = $3, kind = $4, discount = $5, min_order = $6, max_uses = $7, start_date = $8, end_date = $9, is_active = $10, updated_at = $11 WHERE id = $1 AND used_count <= $7 RETURNING *")
            .bind(v.id).bind(v.code.as_str()).bind(&v.description).bind(v.kind.as_str()).bind(v.discount)
            .bind(v.min_order.amount()).bind(to_i32(v.max_uses)?).bind(v.start_date).bind(v.end_date)
            .bind(v.is_active).bind(v.updated_at)
            .fetch_optional(&self.pool).await
            .map_err(|e| if is_unique_violation(&e) { BookstoreError::DuplicateCode(v.code.to_string()) } else { e.into() })?;
        if let Some(row) = row {
            return Voucher::try_from(row);
        }
        match self.voucher(v.id).await? {
            Some(_) => Err(BookstoreError::Validation("max uses is below the redemptions already made".into())),
            None => Err(BookstoreError::VoucherIdNotFound(v.id)),
        }
    }

    async fn delete_voucher(&self, id: Uuid) -> Result<bool> {
        let done = sqlx::query("DELETE FROM vouchers WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }

    async fn redeem_voucher(&self, id: Uuid) -> Result<Voucher> {
        let row = sqlx::query_as::<_, VoucherRow>("UPDATE vouchers SET used_count = used_count + 1, updated_at = NOW() WHERE id = $1 AND used_count < max_uses RETURNING *")
            .bind(id).fetch_optional(&self.pool).await?;
        match row {
            Some(row) => Voucher::try_from(row),
            None => match self.voucher(id).await? {
                Some(v) => Err(BookstoreError::VoucherExhausted(v.code.to_string())),
                None => Err(BookstoreError::VoucherIdNotFound(id)),
            },
        }
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn commit_order(&self, order: &Order) -> Result<CommitOutcome> {
        let mut tx = self.pool.begin().await?;
        for line in order.items() {
            let qty = to_i32(line.quantity)?;
            let done = sqlx::query("UPDATE products SET count_in_stock = count_in_stock - $2, updated_at = NOW() WHERE id = $1 AND count_in_stock >= $2")
                .bind(line.product_id).bind(qty).execute(&mut *tx).await?;
            if done.rows_affected() == 0 {
                let current: Option<(String, i32)> = sqlx::query_as("SELECT name, count_in_stock FROM products WHERE id = $1")
                    .bind(line.product_id).fetch_optional(&mut *tx).await?;
                // dropping tx rolls back the lines already decremented
                return Err(match current {
                    Some((name, available)) => BookstoreError::InsufficientStock {
                        product_id: line.product_id, name, available: to_u32(available, "count_in_stock")?, in_cart: line.quantity,
                    },
                    None => BookstoreError::ProductNotFound(line.product_id),
                });
            }
        }

        let inserted = sqlx::query("INSERT INTO orders (id, customer_id, items, shipping_address, payment_method, subtotal, shipping_fee, discount_amount, total_price, voucher_code, bank_transfer_info, is_paid, paid_at, order_status, is_delivered, delivered_at, idempotency_key, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)")
            .bind(order.id).bind(order.customer_id).bind(Json(&order.items)).bind(Json(&order.shipping_address))
            .bind(order.payment_method.as_str()).bind(order.subtotal.amount()).bind(order.shipping_fee.amount())
            .bind(order.discount_amount.amount()).bind(order.total_price.amount())
            .bind(order.voucher_code.as_ref().map(VoucherCode::as_str)).bind(order.bank_transfer_info.as_ref().map(Json))
            .bind(order.is_paid).bind(order.paid_at)
            .bind(order.order_status.as_str()).bind(order.is_delivered).bind(order.delivered_at)
            .bind(&order.idempotency_key).bind(order.created_at).bind(order.updated_at)
            .execute(&mut *tx).await;

        match inserted {
            Ok(_) => {
                tx.commit().await?;
                let mut stored = order.clone();
                stored.events.clear();
                Ok(CommitOutcome::Created(stored))
            }
            Err(e) if is_unique_violation(&e) => {
                tx.rollback().await?;
                let key = order.idempotency_key().unwrap_or_default();
                let existing = self
                    .order_by_idempotency_key(order.customer_id, key)
                    .await?
                    .ok_or_else(|| BookstoreError::StorageError(format!("order {} conflicts with an unknown row", order.id)))?;
                Ok(CommitOutcome::Duplicate(existing))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn order(&self, id: Uuid) -> Result<Option<Order>> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await?
            .map(Order::try_from).transpose()
    }

    async fn order_by_idempotency_key(&self, customer_id: Uuid, key: &str) -> Result<Option<Order>> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE customer_id = $1 AND idempotency_key = $2")
            .bind(customer_id).bind(key).fetch_optional(&self.pool).await?
            .map(Order::try_from).transpose()
    }

    async fn orders(&self, customer_id: Option<Uuid>, search: Option<&str>) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE ($1::uuid IS NULL OR customer_id = $1) AND ($2::text IS NULL OR strpos(id::text, lower($2)) > 0) ORDER BY created_at DESC")
            .bind(customer_id).bind(search).fetch_all(&self.pool).await?;
        hydrate(rows)
    }

    async fn update_fulfillment(&self, id: Uuid, status: FulfillmentStatus, now: DateTime<Utc>) -> Result<Order> {
        // payment columns are left to update_payment
        sqlx::query_as::<_, OrderRow>("UPDATE orders SET order_status = $2, is_delivered = is_delivered OR $2 = 'Delivered', delivered_at = CASE WHEN $2 = 'Delivered' THEN $3 ELSE delivered_at END, updated_at = $3 WHERE id = $1 RETURNING *")
            .bind(id).bind(status.as_str()).bind(now)
            .fetch_optional(&self.pool).await?
            .ok_or(BookstoreError::OrderNotFound(id))
            .and_then(Order::try_from)
    }

    async fn update_payment(&self, id: Uuid, is_paid: bool, now: DateTime<Utc>) -> Result<Order> {
        sqlx::query_as::<_, OrderRow>("UPDATE orders SET is_paid = $2, paid_at = CASE WHEN $2 THEN $3 END, updated_at = $3 WHERE id = $1 RETURNING *")
            .bind(id).bind(is_paid).bind(now)
            .fetch_optional(&self.pool).await?
            .ok_or(BookstoreError::OrderNotFound(id))
            .and_then(Order::try_from)
    }

    async fn delete_order(&self, id: Uuid) -> Result<bool> {
        let done = sqlx::query("DELETE FROM orders WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }
}
