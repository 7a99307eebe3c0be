//! Order engine: checkout and the admin-driven order state machine.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::config::PricingConfig;
use crate::domain::aggregates::{
    BankTransferInfo, FulfillmentStatus, Order, OrderLine, OrderTotals, PaymentMethod, PlacedOrder, Requester,
    ShippingAddress,
};
use crate::domain::events::OrderEvent;
use crate::domain::value_objects::Money;
use crate::publisher::EventPublisher;
use crate::services::{CartService, VoucherLedger};
use crate::store::{CartStore, CatalogStore, CommitOutcome, CustomerStore, OrderStore, Store};
use crate::{BookstoreError, Result};

/// Checkout request. `total_price` and `discount_amount` are client-computed and advisory.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[validate]
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub total_price: Option<i64>,
    pub voucher_code: Option<String>,
    pub discount_amount: Option<i64>,
    /// Kept on the order for bank payments only.
    #[validate]
    pub bank_transfer_info: Option<BankTransferInfo>,
    #[validate(length(min = 1, max = 128))]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub order_status: FulfillmentStatus,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentRequest {
    pub is_paid: bool,
}

#[derive(Clone)]
pub struct OrderEngine {
    store: Arc<dyn Store>,
    ledger: VoucherLedger,
    carts: CartService,
    publisher: Arc<dyn EventPublisher>,
    pricing: PricingConfig,
}

impl OrderEngine {
    pub fn new(
        store: Arc<dyn Store>,
        ledger: VoucherLedger,
        carts: CartService,
        publisher: Arc<dyn EventPublisher>,
        pricing: PricingConfig,
    ) -> Self {
        Self { store, ledger, carts, publisher, pricing }
    }

    /// Turns the customer's cart into an order.
    ///
    /// Every check runs before the commit point, which decrements stock and
    /// writes the order atomically. Voucher redemption, clearing the cart and
    /// publishing happen afterwards and are logged rather than propagated when
    /// they fail: the committed order stands regardless.
    #[instrument(skip(self, request), fields(payment = request.payment_method.as_str()))]
    pub async fn create_order(&self, customer_id: Uuid, request: CreateOrderRequest) -> Result<Order> {
        request.validate()?;
        if self.store.customer(customer_id).await?.is_none() {
            return Err(BookstoreError::CustomerNotFound(customer_id));
        }
        if let Some(key) = request.idempotency_key.as_deref() {
            if let Some(existing) = self.store.order_by_idempotency_key(customer_id, key).await? {
                info!(order_id = %existing.id(), "checkout retried with a known idempotency key");
                return Ok(existing);
            }
        }

        let cart = self.store.load_cart(customer_id).await?;
        if cart.is_empty() {
            return Err(BookstoreError::EmptyCart);
        }

        let ids: Vec<Uuid> = cart.items().iter().map(|i| i.product_id).collect();
        let products: HashMap<_, _> = self.store.products(&ids).await?.into_iter().map(|p| (p.id, p)).collect();
        let mut lines = Vec::with_capacity(cart.item_count());
        for item in cart.items() {
            let Some(product) = products.get(&item.product_id) else {
                warn!(product_id = %item.product_id, "dropping cart line for a deleted product");
                continue;
            };
            // hidden products cannot be bought, matching add_item
            if !product.is_visible {
                return Err(BookstoreError::ProductNotFound(product.id));
            }
            if !product.is_in_stock() {
                return Err(BookstoreError::OutOfStock { product_id: product.id, name: product.name.clone() });
            }
            if item.quantity > product.count_in_stock {
                return Err(BookstoreError::InsufficientStock {
                    product_id: product.id,
                    name: product.name.clone(),
                    available: product.count_in_stock,
                    in_cart: item.quantity,
                });
            }
            lines.push(OrderLine {
                product_id: product.id,
                name: product.name.clone(),
                image: product.image.clone().or_else(|| item.image.clone()),
                price: product.price,
                quantity: item.quantity,
            });
        }
        if lines.is_empty() {
            return Err(BookstoreError::EmptyCart);
        }

        let subtotal: Money = lines.iter().map(OrderLine::line_total).sum();
        let voucher = match request.voucher_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => Some(self.ledger.validate_and_price(code, subtotal).await?),
            None => None,
        };
        let quote = voucher.as_ref().map(|(_, quote)| quote);
        let totals = OrderTotals::compute(subtotal, self.pricing.shipping_fee_for(subtotal), quote);
        reconcile_client_claims(&request, &totals);

        let mut order = Order::place(
            PlacedOrder {
                customer_id,
                items: lines,
                shipping_address: request.shipping_address,
                payment_method: request.payment_method,
                totals,
                voucher_code: quote.map(|q| q.code.clone()),
                bank_transfer_info: request.bank_transfer_info,
                idempotency_key: request.idempotency_key,
            },
            Utc::now(),
        );
        let events = order.take_events();
        let order = match self.store.commit_order(&order).await? {
            CommitOutcome::Created(order) => order,
            CommitOutcome::Duplicate(existing) => {
                info!(order_id = %existing.id(), "concurrent checkout with the same idempotency key");
                return Ok(existing);
            }
        };
        info!(order_id = %order.id(), %customer_id, total = %order.total_price(), "order placed");

        if let Some((voucher, _)) = &voucher {
            if let Err(e) = self.ledger.redeem(voucher.id()).await {
                warn!(order_id = %order.id(), code = %voucher.code(), error = %e, "voucher redemption failed after order commit");
            }
        }
        if let Err(e) = self.carts.empty(customer_id).await {
            warn!(order_id = %order.id(), error = %e, "clearing cart failed after order commit");
        }
        self.publish(events).await;
        Ok(order)
    }

    pub async fn get_order(&self, requester: &Requester, order_id: Uuid) -> Result<Order> {
        let order = self.load(order_id).await?;
        if !order.is_visible_to(requester) {
            return Err(BookstoreError::Unauthorized);
        }
        Ok(order)
    }

    pub async fn my_orders(&self, customer_id: Uuid) -> Result<Vec<Order>> {
        self.store.orders(Some(customer_id), None).await
    }

    pub async fn list_orders(&self, requester: &Requester, search: Option<&str>) -> Result<Vec<Order>> {
        requester.require_admin()?;
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        self.store.orders(None, search).await
    }

    #[instrument(skip(self, requester))]
    pub async fn update_status(&self, requester: &Requester, order_id: Uuid, status: FulfillmentStatus) -> Result<Order> {
        requester.require_admin()?;
        let updated = self.store.update_fulfillment(order_id, status, Utc::now()).await?;
        let mut events = Vec::with_capacity(2);
        if status == FulfillmentStatus::Delivered {
            events.push(OrderEvent::Delivered { order_id });
        }
        events.push(OrderEvent::StatusChanged { order_id, status });
        self.publish(events).await;
        info!(%order_id, status = status.as_str(), "order status updated");
        Ok(updated)
    }

    pub async fn mark_delivered(&self, requester: &Requester, order_id: Uuid) -> Result<Order> {
        self.update_status(requester, order_id, FulfillmentStatus::Delivered).await
    }

    #[instrument(skip(self, requester))]
    pub async fn update_payment_status(&self, requester: &Requester, order_id: Uuid, is_paid: bool) -> Result<Order> {
        requester.require_admin()?;
        let updated = self.store.update_payment(order_id, is_paid, Utc::now()).await?;
        self.publish(vec![OrderEvent::PaymentChanged { order_id, is_paid }]).await;
        info!(%order_id, is_paid, "payment status updated");
        Ok(updated)
    }

    #[instrument(skip(self, requester))]
    pub async fn delete_order(&self, requester: &Requester, order_id: Uuid) -> Result<()> {
        requester.require_admin()?;
        if !self.store.delete_order(order_id).await? {
            return Err(BookstoreError::OrderNotFound(order_id));
        }
        info!(%order_id, "order deleted");
        self.publish(vec![OrderEvent::Deleted { order_id }]).await;
        Ok(())
    }

    async fn load(&self, order_id: Uuid) -> Result<Order> {
        self.store.order(order_id).await?.ok_or(BookstoreError::OrderNotFound(order_id))
    }

    async fn publish(&self, events: Vec<OrderEvent>) {
        for event in events {
            if let Err(e) = self.publisher.publish(&event).await {
                warn!(order_id = %event.order_id(), event = event.name(), error = %e, "event publish failed");
            }
        }
    }
}

fn reconcile_client_claims(request: &CreateOrderRequest, totals: &OrderTotals) {
    if let Some(claimed) = request.total_price.map(Money::vnd) {
        // clients may send either the item subtotal or the final amount
        if claimed != totals.total_price && claimed != totals.subtotal {
            warn!(%claimed, computed = %totals.total_price, "client total differs from computed total");
        }
    }
    if let Some(claimed) = request.discount_amount.map(Money::vnd) {
        if claimed != totals.discount_amount {
            warn!(%claimed, computed = %totals.discount_amount, "client discount differs from computed discount");
        }
    }
}
