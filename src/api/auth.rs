//! Caller identity, as forwarded by the authentication gateway in front of this service.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::domain::aggregates::Requester;
use crate::BookstoreError;

pub const CUSTOMER_ID_HEADER: &str = "x-customer-id";
pub const ROLE_HEADER: &str = "x-customer-role";
pub const ADMIN_ROLE: &str = "admin";

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Requester {
    type Rejection = BookstoreError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| parts.headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim);
        let customer_id = header(CUSTOMER_ID_HEADER)
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or(BookstoreError::Unauthorized)?;
        let is_admin = header(ROLE_HEADER).is_some_and(|role| role.eq_ignore_ascii_case(ADMIN_ROLE));
        Ok(Requester { customer_id, is_admin })
    }
}
