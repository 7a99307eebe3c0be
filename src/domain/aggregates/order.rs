//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::domain::aggregates::{Requester, VoucherKind, VoucherQuote};
use crate::domain::events::OrderEvent;
use crate::domain::value_objects::{Money, VoucherCode};
use crate::BookstoreError;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub(crate) id: Uuid,
    pub(crate) customer_id: Uuid,
    pub(crate) items: Vec<OrderLine>,
    pub(crate) shipping_address: ShippingAddress,
    pub(crate) payment_method: PaymentMethod,
    pub(crate) subtotal: Money,
    pub(crate) shipping_fee: Money,
    pub(crate) discount_amount: Money,
    pub(crate) total_price: Money,
    pub(crate) voucher_code: Option<VoucherCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) bank_transfer_info: Option<BankTransferInfo>,
    pub(crate) is_paid: bool,
    pub(crate) paid_at: Option<DateTime<Utc>>,
    pub(crate) order_status: FulfillmentStatus,
    pub(crate) is_delivered: bool,
    pub(crate) delivered_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) idempotency_key: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<OrderEvent>,
}

/// Line copied out of the cart at checkout, priced at the live product price.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub price: Money,
    pub quantity: u32,
}

impl OrderLine {
    pub fn line_total(&self) -> Money { self.price.multiply(self.quantity) }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ShippingAddress {
    #[validate(length(min = 1, message = "address is required"))]
    pub address: String,
    #[validate(length(min = 1, message = "city is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "phone is required"), custom = "phone_fits")]
    pub phone: String,
}

const MAX_PHONE_LEN: usize = 20;

fn phone_fits(phone: &str) -> Result<(), ValidationError> {
    if phone.chars().count() <= MAX_PHONE_LEN {
        return Ok(());
    }
    let mut e = ValidationError::new("length");
    e.message = Some(format!("phone is too long (max {MAX_PHONE_LEN} characters)").into());
    Err(e)
}

/// Transfer details the customer entered when paying by bank. Shown to
/// admins when reconciling payments.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct BankTransferInfo {
    #[validate(length(max = 100))]
    pub bank_name: String,
    #[validate(length(max = 34))]
    pub account_number: String,
    #[validate(length(max = 100))]
    pub account_holder: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Cash on delivery.
    #[serde(rename = "COD")]
    Cod,
    /// Bank transfer, confirmed by the customer before the order is submitted.
    #[serde(rename = "BANK")]
    Bank,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Cod => "COD", Self::Bank => "BANK" }
    }
}

impl FromStr for PaymentMethod {
    type Err = BookstoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COD" => Ok(Self::Cod),
            "BANK" => Ok(Self::Bank),
            other => Err(BookstoreError::Validation(format!("unknown payment method: {other}"))),
        }
    }
}

/// Shipping progress. Admins may move between any two states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FulfillmentStatus {
    #[default]
    Processing,
    Confirmed,
    Shipping,
    Delivered,
    Cancelled,
}

impl FulfillmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "Processing",
            Self::Confirmed => "Confirmed",
            Self::Shipping => "Shipping",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl FromStr for FulfillmentStatus {
    type Err = BookstoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Processing" => Ok(Self::Processing),
            "Confirmed" => Ok(Self::Confirmed),
            "Shipping" => Ok(Self::Shipping),
            "Delivered" => Ok(Self::Delivered),
            "Cancelled" => Ok(Self::Cancelled),
            other => Err(BookstoreError::Validation(format!("unknown order status: {other}"))),
        }
    }
}

/// Money breakdown of an order, computed once at checkout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub shipping_fee: Money,
    pub discount_amount: Money,
    pub total_price: Money,
}

impl OrderTotals {
    /// `total = max(0, subtotal + shipping - discount)`. A shipping waiver never exceeds the fee.
    pub fn compute(subtotal: Money, shipping_fee: Money, quote: Option<&VoucherQuote>) -> Self {
        let discount_amount = match quote {
            None => Money::ZERO,
            Some(q) if q.kind == VoucherKind::Shipping => q.discount_amount.min(shipping_fee),
            Some(q) => q.discount_amount,
        };
        let total_price = subtotal.add(shipping_fee).saturating_sub(discount_amount);
        Self { subtotal, shipping_fee, discount_amount, total_price }
    }
}

/// Everything needed to place an order once checkout validation has passed.
#[derive(Clone, Debug)]
pub struct PlacedOrder {
    pub customer_id: Uuid,
    pub items: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub totals: OrderTotals,
    pub voucher_code: Option<VoucherCode>,
    pub bank_transfer_info: Option<BankTransferInfo>,
    pub idempotency_key: Option<String>,
}

impl Order {
    pub fn place(placed: PlacedOrder, now: DateTime<Utc>) -> Self {
        let id = Uuid::now_v7();
        // bank transfers are confirmed by the customer before submitting
        let is_paid = placed.payment_method == PaymentMethod::Bank;
        // transfer details only mean something for bank payments
        let bank_transfer_info = placed.bank_transfer_info.filter(|_| is_paid);
        let mut order = Self {
            id,
            customer_id: placed.customer_id,
            items: placed.items,
            shipping_address: placed.shipping_address,
            payment_method: placed.payment_method,
            subtotal: placed.totals.subtotal,
            shipping_fee: placed.totals.shipping_fee,
            discount_amount: placed.totals.discount_amount,
            total_price: placed.totals.total_price,
            voucher_code: placed.voucher_code,
            bank_transfer_info,
            is_paid,
            paid_at: is_paid.then_some(now),
            order_status: FulfillmentStatus::Processing,
            is_delivered: false,
            delivered_at: None,
            idempotency_key: placed.idempotency_key,
            created_at: now,
            updated_at: now,
            events: vec![],
        };
        order.raise_event(OrderEvent::Placed {
            order_id: id,
            customer_id: order.customer_id,
            total_price: order.total_price,
            voucher_code: order.voucher_code.as_ref().map(|c| c.to_string()),
        });
        order
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn customer_id(&self) -> Uuid { self.customer_id }
    pub fn items(&self) -> &[OrderLine] { &self.items }
    pub fn shipping_address(&self) -> &ShippingAddress { &self.shipping_address }
    pub fn payment_method(&self) -> PaymentMethod { self.payment_method }
    pub fn subtotal(&self) -> Money { self.subtotal }
    pub fn shipping_fee(&self) -> Money { self.shipping_fee }
    pub fn discount_amount(&self) -> Money { self.discount_amount }
    pub fn total_price(&self) -> Money { self.total_price }
    pub fn voucher_code(&self) -> Option<&VoucherCode> { self.voucher_code.as_ref() }
    pub fn bank_transfer_info(&self) -> Option<&BankTransferInfo> { self.bank_transfer_info.as_ref() }
    pub fn is_paid(&self) -> bool { self.is_paid }
    pub fn paid_at(&self) -> Option<DateTime<Utc>> { self.paid_at }
    pub fn status(&self) -> FulfillmentStatus { self.order_status }
    pub fn is_delivered(&self) -> bool { self.is_delivered }
    pub fn delivered_at(&self) -> Option<DateTime<Utc>> { self.delivered_at }
    pub fn idempotency_key(&self) -> Option<&str> { self.idempotency_key.as_deref() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    pub fn is_visible_to(&self, requester: &Requester) -> bool {
        requester.is_admin || requester.customer_id == self.customer_id
    }

    /// Entering `Delivered` stamps the delivery marker. No status clears it.
    pub fn set_status(&mut self, status: FulfillmentStatus, now: DateTime<Utc>) {
        self.order_status = status;
        if status == FulfillmentStatus::Delivered {
            self.is_delivered = true;
            self.delivered_at = Some(now);
            self.raise_event(OrderEvent::Delivered { order_id: self.id });
        }
        self.raise_event(OrderEvent::StatusChanged { order_id: self.id, status });
        self.touch(now);
    }

    pub fn set_paid(&mut self, is_paid: bool, now: DateTime<Utc>) {
        self.is_paid = is_paid;
        self.paid_at = is_paid.then_some(now);
        self.raise_event(OrderEvent::PaymentChanged { order_id: self.id, is_paid });
        self.touch(now);
    }

    pub fn take_events(&mut self) -> Vec<OrderEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: OrderEvent) { self.events.push(e); }
    fn touch(&mut self, now: DateTime<Utc>) { self.updated_at = now; }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placed(method: PaymentMethod) -> PlacedOrder {
        let items = vec![OrderLine { product_id: Uuid::now_v7(), name: "Sapiens".into(), image: None, price: Money::vnd(189_000), quantity: 1 }];
        PlacedOrder {
            customer_id: Uuid::now_v7(),
            items,
            shipping_address: ShippingAddress { address: "1 Lê Lợi".into(), city: "Hà Nội".into(), phone: "0901234567".into() },
            payment_method: method,
            totals: OrderTotals::compute(Money::vnd(189_000), Money::vnd(30_000), None),
            voucher_code: None,
            bank_transfer_info: Some(BankTransferInfo {
                bank_name: "Vietcombank".into(),
                account_number: "0071000123456".into(),
                account_holder: "NGUYEN VAN A".into(),
            }),
            idempotency_key: None,
        }
    }

    #[test]
    fn test_payment_fields_at_creation() {
        let now = Utc::now();
        let bank = Order::place(placed(PaymentMethod::Bank), now);
        assert!(bank.is_paid());
        assert_eq!(bank.paid_at(), Some(now));
        let cod = Order::place(placed(PaymentMethod::Cod), now);
        assert!(!cod.is_paid());
        assert_eq!(cod.paid_at(), None);
        assert_eq!(cod.total_price(), Money::vnd(219_000));
    }

    #[test]
    fn test_transfer_details_kept_for_bank_only() {
        let bank = Order::place(placed(PaymentMethod::Bank), Utc::now());
        assert_eq!(bank.bank_transfer_info().map(|b| b.bank_name.as_str()), Some("Vietcombank"));
        let cod = Order::place(placed(PaymentMethod::Cod), Utc::now());
        assert_eq!(cod.bank_transfer_info(), None);
        assert!(serde_json::to_value(&cod).unwrap().get("bankTransferInfo").is_none());
    }

    #[test]
    fn test_phone_messages() {
        let address = |phone: &str| ShippingAddress { address: "1 Lê Lợi".into(), city: "Hà Nội".into(), phone: phone.into() };
        assert!(address("0901234567").validate().is_ok());
        let missing = address("").validate().unwrap_err().to_string();
        assert!(missing.contains("phone is required"));
        let long = address("0901234567 ext. 123456").validate().unwrap_err().to_string();
        assert!(long.contains("phone is too long"));
        assert!(!long.contains("required"));
    }

    #[test]
    fn test_order_workflow() {
        let mut order = Order::place(placed(PaymentMethod::Cod), Utc::now());
        let total = order.total_price();
        order.set_status(FulfillmentStatus::Delivered, Utc::now());
        assert!(order.is_delivered());
        assert!(order.delivered_at().is_some());
        order.set_status(FulfillmentStatus::Processing, Utc::now());
        assert!(order.is_delivered()); // never cleared
        order.set_paid(true, Utc::now());
        assert!(order.paid_at().is_some());
        order.set_paid(false, Utc::now());
        assert_eq!(order.paid_at(), None);
        assert_eq!(order.total_price(), total);
        assert!(matches!(order.take_events().first(), Some(OrderEvent::Placed { .. })));
    }

    #[test]
    fn test_totals() {
        let quote = |kind, amount| VoucherQuote {
            voucher_id: Uuid::nil(), code: VoucherCode::new("X").unwrap(), kind, discount_amount: Money::vnd(amount),
        };
        let fee = Money::vnd(30_000);
        let shipping = OrderTotals::compute(Money::vnd(100_000), fee, Some(&quote(VoucherKind::Shipping, 50_000)));
        assert_eq!(shipping.discount_amount, fee);
        assert_eq!(shipping.total_price, Money::vnd(100_000));
        let fixed = OrderTotals::compute(Money::vnd(10_000), fee, Some(&quote(VoucherKind::Fixed, 80_000)));
        assert_eq!(fixed.total_price, Money::ZERO);
    }

    #[test]
    fn test_status_strings_round_trip() {
        for s in ["Processing", "Confirmed", "Shipping", "Delivered", "Cancelled"] {
            assert_eq!(s.parse::<FulfillmentStatus>().unwrap().as_str(), s);
        }
        assert!("Đã giao".parse::<FulfillmentStatus>().is_err());
    }
}
