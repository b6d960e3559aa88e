//! services/api/src/web/wishlist.rs
//!
//! Wishlist endpoints: resolved listing and membership toggle.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::middleware::AuthUser;
use crate::web::state::AppState;
use storefront_core::domain::Product;
use storefront_core::ports::PortError;

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// The denormalized slice of a product shown in wishlist views.
#[derive(Serialize, ToSchema)]
pub struct WishlistItem {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub price: f64,
    pub images: Vec<String>,
    pub stock: i32,
}

impl From<Product> for WishlistItem {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            title: product.title,
            slug: product.slug,
            price: product.price,
            images: product.images,
            stock: product.stock,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct WishlistResponse {
    pub wishlist: Vec<WishlistItem>,
}

#[derive(Deserialize, ToSchema)]
pub struct ToggleWishlistRequest {
    #[serde(alias = "productId")]
    pub product_id: Uuid,
}

#[derive(Serialize, ToSchema)]
pub struct ToggleWishlistResponse {
    pub wishlist: Vec<Uuid>,
    pub message: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Fetch the caller's wishlist, resolved to product summaries.
#[utoipa::path(
    get,
    path = "/wishlist",
    responses(
        (status = 200, description = "The wishlist", body = WishlistResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_wishlist_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = state.store.get_user(auth.user_id).await.map_err(|e| match e {
        PortError::NotFound(_) => (StatusCode::NOT_FOUND, "User not found".to_string()),
        e => {
            error!("Wishlist GET error: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch wishlist".to_string(),
            )
        }
    })?;

    // Resolve concurrently; ids whose product has since been deleted are
    // skipped rather than surfaced as holes.
    let lookups = join_all(
        user.wishlist
            .iter()
            .map(|product_id| state.store.get_product(*product_id)),
    )
    .await;
    let wishlist: Vec<WishlistItem> = lookups
        .into_iter()
        .filter_map(|result| result.ok())
        .map(WishlistItem::from)
        .collect();

    Ok(Json(WishlistResponse { wishlist }))
}

/// Toggle a product in the caller's wishlist.
#[utoipa::path(
    post,
    path = "/wishlist",
    request_body = ToggleWishlistRequest,
    responses(
        (status = 200, description = "Wishlist updated", body = ToggleWishlistResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Product or user not found")
    )
)]
pub async fn toggle_wishlist_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<ToggleWishlistRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // Verify the product exists before touching the wishlist.
    state
        .store
        .get_product(req.product_id)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => (StatusCode::NOT_FOUND, "Product not found".to_string()),
            e => {
                error!("Wishlist POST error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to update wishlist".to_string(),
                )
            }
        })?;

    let change = state
        .store
        .toggle_wishlist(auth.user_id, req.product_id)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => (StatusCode::NOT_FOUND, "User not found".to_string()),
            e => {
                error!("Wishlist POST error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to update wishlist".to_string(),
                )
            }
        })?;

    Ok(Json(ToggleWishlistResponse {
        wishlist: change.wishlist,
        message: if change.added {
            "Product added to wishlist".to_string()
        } else {
            "Product removed from wishlist".to_string()
        },
    }))
}
