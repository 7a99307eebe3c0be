//! Customer account as seen by the order engine: identity and role only.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
}

impl Customer {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self { id: Uuid::now_v7(), name: name.into(), email: email.into(), is_admin: false }
    }

    pub fn admin(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self { is_admin: true, ..Self::new(name, email) }
    }
}

/// The authenticated caller of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Requester {
    pub customer_id: Uuid,
    pub is_admin: bool,
}

impl Requester {
    pub fn customer(customer_id: Uuid) -> Self { Self { customer_id, is_admin: false } }
    pub fn admin(customer_id: Uuid) -> Self { Self { customer_id, is_admin: true } }

    pub fn require_admin(&self) -> crate::Result<()> {
        if self.is_admin { Ok(()) } else { Err(crate::BookstoreError::Unauthorized) }
    }
}

impl From<&Customer> for Requester {
    fn from(c: &Customer) -> Self { Self { customer_id: c.id, is_admin: c.is_admin } }
}
