//! Aggregates module
pub mod cart;
pub mod customer;
pub mod order;
pub mod product;
pub mod voucher;

pub use cart::{Cart, CartItem, PopulatedCart, PopulatedCartItem};
pub use customer::{Customer, Requester};
pub use order::{
    BankTransferInfo, FulfillmentStatus, Order, OrderLine, OrderTotals, PaymentMethod, PlacedOrder, ShippingAddress,
};
pub use product::Product;
pub use voucher::{Voucher, VoucherKind, VoucherPatch, VoucherQuote};
