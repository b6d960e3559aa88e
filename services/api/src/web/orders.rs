//! services/api/src/web/orders.rs
//!
//! Order endpoints: checkout persistence, order history, and the admin
//! ship/deliver transitions. Payment state changes arrive separately via
//! the payment webhook.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::middleware::AuthUser;
use crate::web::state::AppState;
use storefront_core::domain::{Address, LineItem, Order, OrderStatus, Role};
use storefront_core::ports::{NewOrder, OrderFilter, PortError};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub total: f64,
    pub shipping_address: Option<Address>,
    /// The payment processor's intent id, confirmed client-side before the
    /// order record is posted.
    #[serde(alias = "paymentIntentId")]
    pub payment_intent_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListOrdersParams {
    #[serde(alias = "userId")]
    pub user_id: Option<Uuid>,
    pub status: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<Order>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateOrderRequest {
    /// Target status: `shipped` or `delivered`.
    pub status: String,
    pub tracking: Option<String>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Create an order from the checkout flow. The declared total is stored as
/// given; nothing recomputes it against the line items.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Order created in pending state", body = Order),
        (status = 400, description = "Missing items, total or address"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn create_order_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if req.items.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Items are required".to_string()));
    }
    if req.total <= 0.0 {
        return Err((
            StatusCode::BAD_REQUEST,
            "Valid total is required".to_string(),
        ));
    }
    let Some(shipping_address) = req.shipping_address else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Shipping address is required".to_string(),
        ));
    };

    let order = state
        .store
        .create_order(NewOrder {
            user_id: auth.user_id,
            items: req.items,
            total: req.total,
            shipping_address,
            payment_ref: req.payment_intent_id,
        })
        .await
        .map_err(|e| {
            error!("Create order error: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create order".to_string(),
            )
        })?;

    // Confirmation is best-effort; the order stands either way.
    if let Ok(user) = state.store.get_user(auth.user_id).await {
        let _ = state.notifier.order_confirmation(&user, &order).await;
    }

    Ok(Json(order))
}

/// List orders, newest first. Customers see their own; admins may filter by
/// user and status.
#[utoipa::path(
    get,
    path = "/orders",
    params(
        ("user_id" = Option<Uuid>, Query, description = "Admin-only filter by user"),
        ("status" = Option<String>, Query, description = "Filter by order status"),
        ("limit" = Option<u32>, Query, description = "Maximum rows returned")
    ),
    responses(
        (status = 200, description = "Matching orders", body = OrderListResponse),
        (status = 400, description = "Unknown status filter"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn list_orders_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<ListOrdersParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let status = match params.status.as_deref() {
        Some(s) => Some(
            OrderStatus::parse(s)
                .ok_or_else(|| (StatusCode::BAD_REQUEST, "Invalid status".to_string()))?,
        ),
        None => None,
    };

    // Non-admin users can only see their own orders.
    let user_id = if auth.role == Role::Admin {
        params.user_id
    } else {
        Some(auth.user_id)
    };

    let orders = state
        .store
        .list_orders(&OrderFilter {
            user_id,
            status,
            limit: params.limit.unwrap_or(50).clamp(1, 200),
        })
        .await
        .map_err(|e| {
            error!("Orders API error: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        })?;

    Ok(Json(OrderListResponse { orders }))
}

/// Fetch one order. Owner or admin only.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "The order", body = Order),
        (status = 401, description = "Not the owner"),
        (status = 404, description = "Order not found")
    )
)]
pub async fn get_order_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let order = state.store.get_order(id).await.map_err(|e| match e {
        PortError::NotFound(_) => (StatusCode::NOT_FOUND, "Order not found".to_string()),
        e => {
            error!("Orders API error: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    })?;

    if order.user_id != auth.user_id && auth.role != Role::Admin {
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized".to_string()));
    }

    Ok(Json(order))
}

/// Admin transition to `shipped` (with optional tracking) or `delivered`.
#[utoipa::path(
    patch,
    path = "/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Order updated", body = Order),
        (status = 400, description = "Invalid transition"),
        (status = 401, description = "Not an admin"),
        (status = 404, description = "Order not found")
    )
)]
pub async fn update_order_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateOrderRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if auth.role != Role::Admin {
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized".to_string()));
    }

    // Payment outcomes belong to the webhook; admins only move fulfilment
    // forward.
    let status = match OrderStatus::parse(&req.status) {
        Some(s @ (OrderStatus::Shipped | OrderStatus::Delivered)) => s,
        _ => return Err((StatusCode::BAD_REQUEST, "Invalid status".to_string())),
    };

    let order = state
        .store
        .set_order_status(id, status, req.tracking)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => (StatusCode::NOT_FOUND, "Order not found".to_string()),
            PortError::Invalid(msg) => (StatusCode::BAD_REQUEST, msg),
            e => {
                error!("Order update error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to update order".to_string(),
                )
            }
        })?;

    if let Ok(user) = state.store.get_user(order.user_id).await {
        let _ = state.notifier.shipping_update(&user, &order).await;
    }

    Ok(Json(order))
}
