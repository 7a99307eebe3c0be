//! HTTP surface over the services.

mod auth;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;
use validator::Validate;

pub use auth::{ADMIN_ROLE, CUSTOMER_ID_HEADER, ROLE_HEADER};

use crate::domain::aggregates::{Order, PopulatedCart, Requester, Voucher, VoucherPatch};
use crate::services::{
    AppliedVoucher, ApplyVoucherRequest, CartItemRequest, CreateOrderRequest, NewVoucher, Services,
    UpdatePaymentRequest, UpdateStatusRequest,
};
use crate::{BookstoreError, ErrorClass};

#[derive(Clone)]
pub struct AppState {
    pub services: Services,
}

impl AppState {
    pub fn new(services: Services) -> Self { Self { services } }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({"status": "healthy", "service": "bookstore-orders"})) }))
        .route("/api/v1/cart", get(get_cart).post(add_to_cart).put(update_cart_item).delete(clear_cart))
        .route("/api/v1/cart/:product_id", delete(remove_from_cart))
        .route("/api/v1/orders", get(list_orders).post(create_order))
        .route("/api/v1/orders/mine", get(my_orders))
        .route("/api/v1/orders/:id", get(get_order).delete(delete_order))
        .route("/api/v1/orders/:id/status", put(update_order_status))
        .route("/api/v1/orders/:id/payment", put(update_payment_status))
        .route("/api/v1/orders/:id/deliver", put(mark_delivered))
        .route("/api/v1/vouchers", get(active_vouchers).post(create_voucher))
        .route("/api/v1/vouchers/apply", post(apply_voucher))
        .route("/api/v1/vouchers/admin", get(all_vouchers))
        .route("/api/v1/vouchers/:id", put(update_voucher).delete(delete_voucher))
        .route("/api/v1/vouchers/:id/toggle", patch(toggle_voucher))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(state)
}

impl IntoResponse for BookstoreError {
    fn into_response(self) -> Response {
        let status = match self.class() {
            ErrorClass::NotFound => StatusCode::NOT_FOUND,
            ErrorClass::Validation => StatusCode::BAD_REQUEST,
            ErrorClass::Authorization => StatusCode::UNAUTHORIZED,
            ErrorClass::Conflict => StatusCode::CONFLICT,
            ErrorClass::Server => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, BookstoreError>;

// =============================================================================
// Cart
// =============================================================================

async fn get_cart(State(s): State<AppState>, who: Requester) -> ApiResult<Json<PopulatedCart>> {
    Ok(Json(s.services.cart.get_cart(who.customer_id).await?))
}

async fn add_to_cart(State(s): State<AppState>, who: Requester, Json(r): Json<CartItemRequest>) -> ApiResult<(StatusCode, Json<PopulatedCart>)> {
    r.validate()?;
    let cart = s.services.cart.add_item(who.customer_id, r.product_id, r.quantity).await?;
    Ok((StatusCode::CREATED, Json(cart)))
}

async fn update_cart_item(State(s): State<AppState>, who: Requester, Json(r): Json<CartItemRequest>) -> ApiResult<Json<PopulatedCart>> {
    r.validate()?;
    Ok(Json(s.services.cart.update_item_quantity(who.customer_id, r.product_id, r.quantity).await?))
}

async fn remove_from_cart(State(s): State<AppState>, who: Requester, Path(product_id): Path<Uuid>) -> ApiResult<Json<PopulatedCart>> {
    Ok(Json(s.services.cart.remove_item(who.customer_id, product_id).await?))
}

async fn clear_cart(State(s): State<AppState>, who: Requester) -> ApiResult<StatusCode> {
    s.services.cart.clear(who.customer_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct OrderSearch {
    pub search: Option<String>,
}

async fn create_order(State(s): State<AppState>, who: Requester, Json(r): Json<CreateOrderRequest>) -> ApiResult<(StatusCode, Json<Order>)> {
    let order = s.services.orders.create_order(who.customer_id, r).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn list_orders(State(s): State<AppState>, who: Requester, Query(q): Query<OrderSearch>) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(s.services.orders.list_orders(&who, q.search.as_deref()).await?))
}

async fn my_orders(State(s): State<AppState>, who: Requester) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(s.services.orders.my_orders(who.customer_id).await?))
}

async fn get_order(State(s): State<AppState>, who: Requester, Path(id): Path<Uuid>) -> ApiResult<Json<Order>> {
    Ok(Json(s.services.orders.get_order(&who, id).await?))
}

async fn update_order_status(State(s): State<AppState>, who: Requester, Path(id): Path<Uuid>, Json(r): Json<UpdateStatusRequest>) -> ApiResult<Json<Order>> {
    Ok(Json(s.services.orders.update_status(&who, id, r.order_status).await?))
}

async fn update_payment_status(State(s): State<AppState>, who: Requester, Path(id): Path<Uuid>, Json(r): Json<UpdatePaymentRequest>) -> ApiResult<Json<Order>> {
    Ok(Json(s.services.orders.update_payment_status(&who, id, r.is_paid).await?))
}

async fn mark_delivered(State(s): State<AppState>, who: Requester, Path(id): Path<Uuid>) -> ApiResult<Json<Order>> {
    Ok(Json(s.services.orders.mark_delivered(&who, id).await?))
}

async fn delete_order(State(s): State<AppState>, who: Requester, Path(id): Path<Uuid>) -> ApiResult<Json<serde_json::Value>> {
    s.services.orders.delete_order(&who, id).await?;
    Ok(Json(json!({ "message": "Order deleted" })))
}

// =============================================================================
// Vouchers
// =============================================================================

async fn active_vouchers(State(s): State<AppState>) -> ApiResult<Json<Vec<Voucher>>> {
    Ok(Json(s.services.vouchers.lookup_active().await?))
}

async fn apply_voucher(State(s): State<AppState>, _who: Requester, Json(r): Json<ApplyVoucherRequest>) -> ApiResult<Json<AppliedVoucher>> {
    Ok(Json(s.services.vouchers.apply(&r).await?))
}

async fn all_vouchers(State(s): State<AppState>, who: Requester) -> ApiResult<Json<Vec<Voucher>>> {
    Ok(Json(s.services.vouchers.list_all(&who).await?))
}

async fn create_voucher(State(s): State<AppState>, who: Requester, Json(r): Json<NewVoucher>) -> ApiResult<(StatusCode, Json<Voucher>)> {
    let voucher = s.services.vouchers.create(&who, r).await?;
    Ok((StatusCode::CREATED, Json(voucher)))
}

async fn update_voucher(State(s): State<AppState>, who: Requester, Path(id): Path<Uuid>, Json(r): Json<VoucherPatch>) -> ApiResult<Json<Voucher>> {
    Ok(Json(s.services.vouchers.update(&who, id, r).await?))
}

async fn toggle_voucher(State(s): State<AppState>, who: Requester, Path(id): Path<Uuid>) -> ApiResult<Json<Voucher>> {
    Ok(Json(s.services.vouchers.toggle_active(&who, id).await?))
}

async fn delete_voucher(State(s): State<AppState>, who: Requester, Path(id): Path<Uuid>) -> ApiResult<Json<serde_json::Value>> {
    s.services.vouchers.delete(&who, id).await?;
    Ok(Json(json!({ "message": "Voucher deleted" })))
}
