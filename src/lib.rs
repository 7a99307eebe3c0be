//! Bookstore order engine
//!
//! Cart, voucher ledger and order engine for a self-hosted online bookstore.
//!
//! ## Features
//! - Per-customer shopping cart with live stock checks
//! - Discount vouchers (fixed, percent, shipping waiver) with usage caps
//! - Checkout with frozen totals and guarded stock decrement
//! - Admin-driven payment and fulfillment status tracking
//! - PostgreSQL and in-memory persistence

pub mod api;
pub mod config;
pub mod domain;
pub mod publisher;
pub mod services;
pub mod store;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::Money;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum BookstoreError {
    #[error("Customer not found: {0}")]
    CustomerNotFound(Uuid),

    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("Voucher not found: {0}")]
    VoucherIdNotFound(Uuid),

    #[error("\"{name}\" is out of stock")]
    OutOfStock { product_id: Uuid, name: String },

    #[error("Only {available} of \"{name}\" left in stock ({in_cart} already in cart)")]
    InsufficientStock {
        product_id: Uuid,
        name: String,
        available: u32,
        in_cart: u32,
    },

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Product {0} is not in the cart")]
    ItemNotInCart(Uuid),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(u32),

    #[error("Voucher code {0} does not exist")]
    VoucherNotFound(String),

    #[error("Voucher {0} has been disabled")]
    VoucherDisabled(String),

    #[error("Voucher {code} is not valid until {starts_at}")]
    VoucherNotYetValid { code: String, starts_at: DateTime<Utc> },

    #[error("Voucher {code} expired at {ended_at}")]
    VoucherExpired { code: String, ended_at: DateTime<Utc> },

    #[error("Voucher {0} has no redemptions left")]
    VoucherExhausted(String),

    #[error("Orders must be at least {minimum} to use voucher {code}")]
    MinimumOrderNotMet { code: String, minimum: Money },

    #[error("Voucher code {0} already exists")]
    DuplicateCode(String),

    #[error("Not allowed to access this resource")]
    Unauthorized,

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

/// How a caller should treat a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    Validation,
    Authorization,
    Conflict,
    Server,
}

impl BookstoreError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::CustomerNotFound(_)
            | Self::ProductNotFound(_)
            | Self::OrderNotFound(_)
            | Self::VoucherIdNotFound(_)
            | Self::VoucherNotFound(_) => ErrorClass::NotFound,
            Self::OutOfStock { .. }
            | Self::InsufficientStock { .. }
            | Self::EmptyCart
            | Self::ItemNotInCart(_)
            | Self::InvalidQuantity(_)
            | Self::VoucherDisabled(_)
            | Self::VoucherNotYetValid { .. }
            | Self::VoucherExpired { .. }
            | Self::VoucherExhausted(_)
            | Self::MinimumOrderNotMet { .. }
            | Self::Validation(_) => ErrorClass::Validation,
            Self::DuplicateCode(_) => ErrorClass::Conflict,
            Self::Unauthorized => ErrorClass::Authorization,
            Self::Config(_) | Self::StorageError(_) => ErrorClass::Server,
        }
    }
}

impl From<sqlx::Error> for BookstoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::StorageError(e.to_string())
    }
}

impl From<validator::ValidationErrors> for BookstoreError {
    fn from(e: validator::ValidationErrors) -> Self {
        Self::Validation(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BookstoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(BookstoreError::EmptyCart.class(), ErrorClass::Validation);
        assert_eq!(BookstoreError::VoucherNotFound("X".into()).class(), ErrorClass::NotFound);
        assert_eq!(BookstoreError::Unauthorized.class(), ErrorClass::Authorization);
        assert_eq!(BookstoreError::DuplicateCode("X".into()).class(), ErrorClass::Conflict);
        assert_eq!(BookstoreError::StorageError("down".into()).class(), ErrorClass::Server);
    }

    #[test]
    fn test_insufficient_stock_names_remaining_count() {
        let e = BookstoreError::InsufficientStock {
            product_id: Uuid::nil(),
            name: "Sapiens".into(),
            available: 10,
            in_cart: 2,
        };
        assert_eq!(e.to_string(), "Only 10 of \"Sapiens\" left in stock (2 already in cart)");
    }
}
