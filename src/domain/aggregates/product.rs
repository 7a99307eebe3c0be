//! Product record owned by the catalog. Only stock is written from here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::Money;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub price: Money,
    pub count_in_stock: u32,
    pub is_visible: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn create(name: impl Into<String>, price: Money, count_in_stock: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), name: name.into(), image: None, price, count_in_stock,
            is_visible: true, created_at: now, updated_at: now,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self { self.image = Some(image.into()); self }

    pub fn is_in_stock(&self) -> bool { self.count_in_stock > 0 }

    /// Guarded decrement: stock is left untouched when it cannot cover `qty`.
    pub fn remove_inventory(&mut self, qty: u32) -> Option<u32> {
        let remaining = self.count_in_stock.checked_sub(qty)?;
        self.count_in_stock = remaining;
        self.updated_at = Utc::now();
        Some(remaining)
    }
}
