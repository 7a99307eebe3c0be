//! Application services. Each operation loads what it needs from the store,
//! applies the domain rules and writes back.

pub mod cart;
pub mod orders;
pub mod vouchers;

use std::sync::Arc;

pub use cart::{CartItemRequest, CartService};
pub use orders::{CreateOrderRequest, OrderEngine, UpdatePaymentRequest, UpdateStatusRequest};
pub use vouchers::{AppliedVoucher, ApplyVoucherRequest, NewVoucher, VoucherLedger};

use crate::config::PricingConfig;
use crate::publisher::EventPublisher;
use crate::store::Store;

/// The three services wired to one store.
#[derive(Clone)]
pub struct Services {
    pub cart: CartService,
    pub vouchers: VoucherLedger,
    pub orders: OrderEngine,
}

impl Services {
    pub fn new(store: Arc<dyn Store>, publisher: Arc<dyn EventPublisher>, pricing: PricingConfig) -> Self {
        let cart = CartService::new(store.clone());
        let vouchers = VoucherLedger::new(store.clone());
        let orders = OrderEngine::new(store, vouchers.clone(), cart.clone(), publisher, pricing);
        Self { cart, vouchers, orders }
    }
}
