//! Voucher ledger: eligibility, pricing, redemption and admin maintenance.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::{Requester, Voucher, VoucherKind, VoucherPatch, VoucherQuote};
use crate::domain::value_objects::{Money, VoucherCode};
use crate::store::{Store, VoucherStore};
use crate::{BookstoreError, Result};

/// Admin payload for a new voucher. Unset fields take the ledger defaults.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewVoucher {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: VoucherKind,
    #[validate(range(min = 0))]
    pub discount: i64,
    #[validate(range(min = 0))]
    pub min_order: Option<i64>,
    pub max_uses: Option<u32>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApplyVoucherRequest {
    #[validate(length(min = 1, message = "code is required"))]
    pub code: String,
    #[validate(range(min = 0))]
    pub order_total: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedVoucher {
    pub voucher: Voucher,
    pub discount_amount: Money,
    pub message: String,
}

#[derive(Clone)]
pub struct VoucherLedger {
    store: Arc<dyn Store>,
}

impl VoucherLedger {
    pub fn new(store: Arc<dyn Store>) -> Self { Self { store } }

    /// Vouchers a customer can currently see, newest first.
    pub async fn lookup_active(&self) -> Result<Vec<Voucher>> {
        self.store.listed_vouchers(Utc::now()).await
    }

    /// Prices `code` against `order_subtotal` without consuming a redemption.
    #[instrument(skip(self))]
    pub async fn validate_and_price(&self, code: &str, order_subtotal: Money) -> Result<(Voucher, VoucherQuote)> {
        let lookup_code = VoucherCode::new(code).map_err(|_| BookstoreError::VoucherNotFound(code.trim().to_uppercase()))?;
        let voucher = self
            .store
            .voucher_by_code(&lookup_code)
            .await?
            .ok_or_else(|| BookstoreError::VoucherNotFound(lookup_code.to_string()))?;
        let quote = voucher.quote(Utc::now(), order_subtotal)?;
        Ok((voucher, quote))
    }

    /// The customer-facing apply check.
    pub async fn apply(&self, request: &ApplyVoucherRequest) -> Result<AppliedVoucher> {
        request.validate()?;
        let (voucher, quote) = self.validate_and_price(&request.code, Money::vnd(request.order_total)).await?;
        Ok(AppliedVoucher {
            message: format!("Voucher {} applied", quote.code),
            discount_amount: quote.discount_amount,
            voucher,
        })
    }

    /// Consumes one redemption slot. Only called once an order is committed.
    #[instrument(skip(self))]
    pub async fn redeem(&self, voucher_id: Uuid) -> Result<Voucher> {
        let voucher = self.store.redeem_voucher(voucher_id).await?;
        info!(code = %voucher.code(), used = voucher.used_count(), max = voucher.max_uses(), "voucher redeemed");
        Ok(voucher)
    }

    pub async fn list_all(&self, requester: &Requester) -> Result<Vec<Voucher>> {
        requester.require_admin()?;
        self.store.vouchers().await
    }

    #[instrument(skip(self, requester, new), fields(code = %new.code))]
    pub async fn create(&self, requester: &Requester, new: NewVoucher) -> Result<Voucher> {
        requester.require_admin()?;
        new.validate()?;
        let mut voucher = Voucher::create(VoucherCode::new(&new.code)?, new.kind, new.discount, new.end_date)
            .with_description(new.description)
            .with_min_order(Money::vnd(new.min_order.unwrap_or(0)))
            .with_max_uses(new.max_uses.unwrap_or(Voucher::DEFAULT_MAX_USES));
        if let Some(start) = new.start_date {
            voucher = voucher.starting_at(start);
        }
        voucher.validate()?;
        let created = self.store.insert_voucher(&voucher).await?;
        info!(id = %created.id(), "voucher created");
        Ok(created)
    }

    #[instrument(skip(self, requester, patch))]
    pub async fn update(&self, requester: &Requester, id: Uuid, patch: VoucherPatch) -> Result<Voucher> {
        requester.require_admin()?;
        let mut voucher = self.load(id).await?;
        voucher.apply_patch(patch)?;
        let updated = self.store.update_voucher(&voucher).await?;
        info!(code = %updated.code(), "voucher updated");
        Ok(updated)
    }

    #[instrument(skip(self, requester))]
    pub async fn toggle_active(&self, requester: &Requester, id: Uuid) -> Result<Voucher> {
        requester.require_admin()?;
        let mut voucher = self.load(id).await?;
        let active = voucher.toggle_active();
        let updated = self.store.update_voucher(&voucher).await?;
        info!(code = %updated.code(), active, "voucher visibility toggled");
        Ok(updated)
    }

    #[instrument(skip(self, requester))]
    pub async fn delete(&self, requester: &Requester, id: Uuid) -> Result<()> {
        requester.require_admin()?;
        if !self.store.delete_voucher(id).await? {
            return Err(BookstoreError::VoucherIdNotFound(id));
        }
        info!(%id, "voucher deleted");
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Voucher> {
        self.store.voucher(id).await?.ok_or(BookstoreError::VoucherIdNotFound(id))
    }
}
