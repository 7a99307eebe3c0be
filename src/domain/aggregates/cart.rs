//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::aggregates::Product;
use crate::domain::value_objects::Money;
use crate::{BookstoreError, Result};

/// One cart per customer, keyed by the customer id. Created implicitly on first add.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub(crate) customer_id: Uuid,
    pub(crate) items: Vec<CartItem>,
    pub(crate) updated_at: DateTime<Utc>,
}

/// A line in the cart. Name, image and price are snapshots taken when the product was added.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub price: Money,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    fn snapshot(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id, name: product.name.clone(), image: product.image.clone(),
            price: product.price, quantity, added_at: Utc::now(),
        }
    }

    pub fn line_total(&self) -> Money { self.price.multiply(self.quantity) }
}

impl Cart {
    pub fn for_customer(customer_id: Uuid) -> Self {
        Self { customer_id, items: vec![], updated_at: Utc::now() }
    }

    pub fn customer_id(&self) -> Uuid { self.customer_id }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn item_count(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    pub fn item(&self, product_id: Uuid) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    /// Adds `quantity` units of `product`, merging with an existing line.
    ///
    /// The merged total must fit in the product's current stock.
    pub fn add_item(&mut self, product: &Product, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return Err(BookstoreError::InvalidQuantity(quantity));
        }
        if !product.is_in_stock() {
            return Err(BookstoreError::OutOfStock { product_id: product.id, name: product.name.clone() });
        }
        let available = product.count_in_stock;
        let insufficient = |in_cart: u32| BookstoreError::InsufficientStock {
            product_id: product.id,
            name: product.name.clone(),
            available,
            in_cart,
        };

        match self.items.iter_mut().find(|i| i.product_id == product.id) {
            Some(existing) => {
                let total = existing.quantity.saturating_add(quantity);
                if total > available {
                    return Err(insufficient(existing.quantity));
                }
                existing.quantity = total;
            }
            None => {
                if quantity > available {
                    return Err(insufficient(0));
                }
                self.items.push(CartItem::snapshot(product, quantity));
            }
        }
        self.touch();
        Ok(())
    }

    /// Overwrites the quantity of an existing line. Stock is not re-checked here.
    pub fn update_quantity(&mut self, product_id: Uuid, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return Err(BookstoreError::InvalidQuantity(quantity));
        }
        let item = self
            .items
            .iter_mut()
            .find(|i| i.product_id == product_id)
            .ok_or(BookstoreError::ItemNotInCart(product_id))?;
        item.quantity = quantity;
        self.touch();
        Ok(())
    }

    /// Returns whether a line was removed. Removing an absent product is not an error.
    pub fn remove_item(&mut self, product_id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        let removed = self.items.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    pub fn clear(&mut self) { self.items.clear(); self.touch(); }

    /// Resolves every line against the live catalog, skipping lines whose product is gone.
    pub fn populate(&self, products: &HashMap<Uuid, Product>) -> PopulatedCart {
        let items: Vec<PopulatedCartItem> = self
            .items
            .iter()
            .filter_map(|item| {
                products.get(&item.product_id).map(|product| PopulatedCartItem { item: item.clone(), product: product.clone() })
            })
            .collect();
        let subtotal = items.iter().map(|i| i.product.price.multiply(i.item.quantity)).sum();
        PopulatedCart { customer_id: self.customer_id, items, subtotal }
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

/// Cart as shown to the customer: each line joined with its current product record.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulatedCart {
    pub customer_id: Uuid,
    pub items: Vec<PopulatedCartItem>,
    pub subtotal: Money,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulatedCartItem {
    #[serde(flatten)]
    pub item: CartItem,
    pub product: Product,
}

impl PopulatedCart {
    pub fn quantity_of(&self, product_id: Uuid) -> Option<u32> {
        self.items.iter().find(|i| i.item.product_id == product_id).map(|i| i.item.quantity)
    }
}
