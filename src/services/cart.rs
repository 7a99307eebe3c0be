//! Cart operations for a single customer.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::{Cart, PopulatedCart};
use crate::store::{CartStore, CatalogStore, CustomerStore, Store};
use crate::{BookstoreError, Result};

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CartItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: u32,
}

#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn Store>,
}

impl CartService {
    pub fn new(store: Arc<dyn Store>) -> Self { Self { store } }

    #[instrument(skip(self))]
    pub async fn add_item(&self, customer_id: Uuid, product_id: Uuid, quantity: u32) -> Result<PopulatedCart> {
        if quantity == 0 {
            return Err(BookstoreError::InvalidQuantity(quantity));
        }
        self.ensure_customer(customer_id).await?;
        let product = self
            .store
            .product(product_id)
            .await?
            .filter(|p| p.is_visible)
            .ok_or(BookstoreError::ProductNotFound(product_id))?;

        let mut cart = self.store.load_cart(customer_id).await?;
        cart.add_item(&product, quantity)?;
        self.store.save_cart(&cart).await?;
        debug!(%customer_id, %product_id, quantity, "added to cart");
        self.populate(&cart).await
    }

    #[instrument(skip(self))]
    pub async fn update_item_quantity(&self, customer_id: Uuid, product_id: Uuid, quantity: u32) -> Result<PopulatedCart> {
        self.ensure_customer(customer_id).await?;
        let mut cart = self.store.load_cart(customer_id).await?;
        cart.update_quantity(product_id, quantity)?;
        self.store.save_cart(&cart).await?;
        debug!(%customer_id, %product_id, quantity, "cart quantity updated");
        self.populate(&cart).await
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, customer_id: Uuid, product_id: Uuid) -> Result<PopulatedCart> {
        self.ensure_customer(customer_id).await?;
        let mut cart = self.store.load_cart(customer_id).await?;
        if cart.remove_item(product_id) {
            self.store.save_cart(&cart).await?;
            debug!(%customer_id, %product_id, "removed from cart");
        }
        self.populate(&cart).await
    }

    #[instrument(skip(self))]
    pub async fn clear(&self, customer_id: Uuid) -> Result<()> {
        self.ensure_customer(customer_id).await?;
        self.empty(customer_id).await
    }

    pub async fn get_cart(&self, customer_id: Uuid) -> Result<PopulatedCart> {
        self.ensure_customer(customer_id).await?;
        let cart = self.store.load_cart(customer_id).await?;
        self.populate(&cart).await
    }

    /// Empties the cart without checking the customer. Used after checkout.
    pub(crate) async fn empty(&self, customer_id: Uuid) -> Result<()> {
        let mut cart = self.store.load_cart(customer_id).await?;
        cart.clear();
        self.store.save_cart(&cart).await
    }

    async fn ensure_customer(&self, customer_id: Uuid) -> Result<()> {
        match self.store.customer(customer_id).await? {
            Some(_) => Ok(()),
            None => Err(BookstoreError::CustomerNotFound(customer_id)),
        }
    }

    async fn populate(&self, cart: &Cart) -> Result<PopulatedCart> {
        let ids: Vec<Uuid> = cart.items().iter().map(|i| i.product_id).collect();
        let products: HashMap<_, _> = self.store.products(&ids).await?.into_iter().map(|p| (p.id, p)).collect();
        let view = cart.populate(&products);
        if view.items.len() < cart.item_count() {
            debug!(customer_id = %cart.customer_id(), skipped = cart.item_count() - view.items.len(), "cart lines reference deleted products");
        }
        Ok(view)
    }
}
