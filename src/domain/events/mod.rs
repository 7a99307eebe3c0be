//! Domain events
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::FulfillmentStatus;
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, customer_id: Uuid, total_price: Money, voucher_code: Option<String> },
    StatusChanged { order_id: Uuid, status: FulfillmentStatus },
    PaymentChanged { order_id: Uuid, is_paid: bool },
    Delivered { order_id: Uuid },
    Deleted { order_id: Uuid },
}

impl OrderEvent {
    pub fn order_id(&self) -> Uuid {
        match self {
            Self::Placed { order_id, .. }
            | Self::StatusChanged { order_id, .. }
            | Self::PaymentChanged { order_id, .. }
            | Self::Delivered { order_id }
            | Self::Deleted { order_id } => *order_id,
        }
    }

    /// Last segment of the subject the event is published under.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Placed { .. } => "placed",
            Self::StatusChanged { .. } => "status_changed",
            Self::PaymentChanged { .. } => "payment_changed",
            Self::Delivered { .. } => "delivered",
            Self::Deleted { .. } => "deleted",
        }
    }
}
