//! Voucher Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::value_objects::{Money, VoucherCode};
use crate::{BookstoreError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoucherKind {
    /// Flat amount off the order.
    Fixed,
    /// Percentage of the subtotal.
    Percent,
    /// Waiver of up to `discount` of the shipping fee.
    Shipping,
}

impl VoucherKind {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Fixed => "fixed", Self::Percent => "percent", Self::Shipping => "shipping" }
    }
}

impl FromStr for VoucherKind {
    type Err = BookstoreError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fixed" => Ok(Self::Fixed),
            "percent" => Ok(Self::Percent),
            "shipping" => Ok(Self::Shipping),
            other => Err(BookstoreError::Validation(format!("unknown voucher kind: {other}"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Voucher {
    pub(crate) id: Uuid,
    pub(crate) code: VoucherCode,
    pub(crate) description: String,
    #[serde(rename = "type")]
    pub(crate) kind: VoucherKind,
    pub(crate) discount: i64,
    pub(crate) min_order: Money,
    pub(crate) max_uses: u32,
    pub(crate) used_count: u32,
    pub(crate) start_date: DateTime<Utc>,
    pub(crate) end_date: DateTime<Utc>,
    pub(crate) is_active: bool,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

/// Result of pricing a voucher against a subtotal. Carries no usage side effect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoucherQuote {
    pub voucher_id: Uuid,
    pub code: VoucherCode,
    pub kind: VoucherKind,
    pub discount_amount: Money,
}

/// Partial admin update. Absent fields keep their current value.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherPatch {
    pub code: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<VoucherKind>,
    pub discount: Option<i64>,
    pub min_order: Option<i64>,
    pub max_uses: Option<u32>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

impl Voucher {
    pub const DEFAULT_MAX_USES: u32 = 100;

    /// Active voucher valid from now until `end_date`, with no minimum and the default cap.
    pub fn create(code: VoucherCode, kind: VoucherKind, discount: i64, end_date: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), code, description: String::new(), kind, discount,
            min_order: Money::ZERO, max_uses: Self::DEFAULT_MAX_USES, used_count: 0,
            start_date: now, end_date, is_active: true, created_at: now, updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self { self.description = description.into(); self }
    pub fn with_min_order(mut self, min_order: Money) -> Self { self.min_order = min_order; self }
    pub fn with_max_uses(mut self, max_uses: u32) -> Self { self.max_uses = max_uses; self }
    pub fn starting_at(mut self, start_date: DateTime<Utc>) -> Self { self.start_date = start_date; self }

    pub fn id(&self) -> Uuid { self.id }
    pub fn code(&self) -> &VoucherCode { &self.code }
    pub fn description(&self) -> &str { &self.description }
    pub fn kind(&self) -> VoucherKind { self.kind }
    pub fn discount(&self) -> i64 { self.discount }
    pub fn min_order(&self) -> Money { self.min_order }
    pub fn max_uses(&self) -> u32 { self.max_uses }
    pub fn used_count(&self) -> u32 { self.used_count }
    pub fn start_date(&self) -> DateTime<Utc> { self.start_date }
    pub fn end_date(&self) -> DateTime<Utc> { self.end_date }
    pub fn is_active(&self) -> bool { self.is_active }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn is_exhausted(&self) -> bool { self.used_count >= self.max_uses }

    /// Whether the voucher belongs in the customer-facing offers listing.
    pub fn is_listed(&self, now: DateTime<Utc>) -> bool { self.is_active && self.end_date >= now }

    /// Structural rules every stored voucher satisfies.
    pub fn validate(&self) -> Result<()> {
        if self.discount < 0 {
            return Err(BookstoreError::Validation("discount must not be negative".into()));
        }
        if self.kind == VoucherKind::Percent && self.discount > 100 {
            return Err(BookstoreError::Validation("percent discount must be at most 100".into()));
        }
        if self.min_order.is_negative() {
            return Err(BookstoreError::Validation("minimum order must not be negative".into()));
        }
        if self.end_date < self.start_date {
            return Err(BookstoreError::Validation("end date precedes start date".into()));
        }
        if self.used_count > self.max_uses {
            return Err(BookstoreError::Validation(format!(
                "max uses {} is below the {} redemptions already made", self.max_uses, self.used_count
            )));
        }
        Ok(())
    }

    /// Checks, in order: disabled, not yet started, expired, exhausted, minimum order.
    pub fn check_eligibility(&self, now: DateTime<Utc>, subtotal: Money) -> Result<()> {
        let code = || self.code.to_string();
        if !self.is_active {
            return Err(BookstoreError::VoucherDisabled(code()));
        }
        if now < self.start_date {
            return Err(BookstoreError::VoucherNotYetValid { code: code(), starts_at: self.start_date });
        }
        if now > self.end_date {
            return Err(BookstoreError::VoucherExpired { code: code(), ended_at: self.end_date });
        }
        if self.is_exhausted() {
            return Err(BookstoreError::VoucherExhausted(code()));
        }
        if subtotal < self.min_order {
            return Err(BookstoreError::MinimumOrderNotMet { code: code(), minimum: self.min_order });
        }
        Ok(())
    }

    /// Discount granted on `subtotal`. Shipping waivers are capped by the fee at checkout.
    pub fn discount_for(&self, subtotal: Money) -> Money {
        match self.kind {
            VoucherKind::Fixed | VoucherKind::Shipping => Money::vnd(self.discount),
            VoucherKind::Percent => subtotal.percent(self.discount),
        }
    }

    pub fn quote(&self, now: DateTime<Utc>, subtotal: Money) -> Result<VoucherQuote> {
        self.check_eligibility(now, subtotal)?;
        Ok(VoucherQuote {
            voucher_id: self.id,
            code: self.code.clone(),
            kind: self.kind,
            discount_amount: self.discount_for(subtotal),
        })
    }

    /// Guarded increment of the used count. Callers hold the voucher exclusively.
    pub fn redeem(&mut self) -> Result<()> {
        if self.is_exhausted() {
            return Err(BookstoreError::VoucherExhausted(self.code.to_string()));
        }
        self.used_count += 1;
        self.touch();
        Ok(())
    }

    pub fn toggle_active(&mut self) -> bool {
        self.is_active = !self.is_active;
        self.touch();
        self.is_active
    }

    pub fn apply_patch(&mut self, patch: VoucherPatch) -> Result<()> {
        let mut next = self.clone();
        if let Some(code) = patch.code { next.code = VoucherCode::new(code)?; }
        if let Some(description) = patch.description { next.description = description; }
        if let Some(kind) = patch.kind { next.kind = kind; }
        if let Some(discount) = patch.discount { next.discount = discount; }
        if let Some(min_order) = patch.min_order { next.min_order = Money::vnd(min_order); }
        if let Some(max_uses) = patch.max_uses { next.max_uses = max_uses; }
        if let Some(start_date) = patch.start_date { next.start_date = start_date; }
        if let Some(end_date) = patch.end_date { next.end_date = end_date; }
        if let Some(is_active) = patch.is_active { next.is_active = is_active; }
        next.validate()?;
        next.touch();
        *self = next;
        Ok(())
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}
