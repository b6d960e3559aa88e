//! services/api/src/web/reviews.rs
//!
//! Review endpoints: the public approved-review listing, review submission,
//! helpfulness voting, and admin moderation.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::middleware::AuthUser;
use crate::web::state::AppState;
use storefront_core::domain::{Review, ReviewStatus, Role};
use storefront_core::ports::{NewReview, Pagination, PortError, ReviewFilter, ReviewSort};

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// A review as surfaced to clients: voter-id sets are collapsed into counts
/// plus the derived helpfulness score.
#[derive(Serialize, ToSchema)]
pub struct ReviewResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub rating: u8,
    pub title: String,
    pub content: String,
    pub images: Vec<String>,
    pub status: ReviewStatus,
    pub purchase_verified: bool,
    pub helpful_count: usize,
    pub not_helpful_count: usize,
    pub helpfulness_score: f64,
    pub created_at: DateTime<Utc>,
}

impl From<Review> for ReviewResponse {
    fn from(review: Review) -> Self {
        let helpfulness_score = review.helpfulness_score();
        Self {
            id: review.id,
            product_id: review.product_id,
            user_id: review.user_id,
            rating: review.rating,
            title: review.title,
            content: review.content,
            images: review.images,
            status: review.status,
            purchase_verified: review.purchase_verified,
            helpful_count: review.helpful.len(),
            not_helpful_count: review.not_helpful.len(),
            helpfulness_score,
            created_at: review.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListReviewsParams {
    #[serde(alias = "productId")]
    pub product_id: Option<Uuid>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// newest | oldest | rating-high | rating-low
    pub sort: Option<String>,
    pub rating: Option<u8>,
    pub verified: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct ReviewListResponse {
    pub reviews: Vec<ReviewResponse>,
    pub pagination: Pagination,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateReviewRequest {
    #[serde(alias = "productId")]
    pub product_id: Uuid,
    pub rating: u8,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CreateReviewResponse {
    pub review: ReviewResponse,
    pub message: String,
}

#[derive(Deserialize, ToSchema)]
pub struct VoteRequest {
    pub helpful: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct VoteResponse {
    pub message: String,
    pub helpful_count: usize,
    pub not_helpful_count: usize,
    pub helpfulness_score: f64,
}

#[derive(Deserialize, ToSchema)]
pub struct ModerateReviewRequest {
    /// `approved` or `rejected`.
    pub status: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// List approved reviews for a product.
#[utoipa::path(
    get,
    path = "/reviews",
    params(
        ("product_id" = Uuid, Query, description = "Product to list reviews for"),
        ("page" = Option<u32>, Query, description = "1-based page number"),
        ("limit" = Option<u32>, Query, description = "Page size"),
        ("sort" = Option<String>, Query, description = "newest | oldest | rating-high | rating-low"),
        ("rating" = Option<u8>, Query, description = "Only reviews with this star rating"),
        ("verified" = Option<bool>, Query, description = "Only purchase-verified reviews")
    ),
    responses(
        (status = 200, description = "One page of approved reviews", body = ReviewListResponse),
        (status = 400, description = "Missing or invalid product id")
    )
)]
pub async fn list_reviews_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListReviewsParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let Some(product_id) = params.product_id else {
        return Err((StatusCode::BAD_REQUEST, "Invalid product ID".to_string()));
    };

    let page = state
        .store
        .list_reviews(&ReviewFilter {
            product_id,
            rating: params.rating,
            verified_only: params.verified.unwrap_or(false),
            sort: params
                .sort
                .as_deref()
                .map(ReviewSort::parse)
                .unwrap_or_default(),
            page: params.page.unwrap_or(1).max(1),
            limit: params.limit.unwrap_or(10).clamp(1, 100),
        })
        .await
        .map_err(|e| {
            error!("Reviews GET error: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch reviews".to_string(),
            )
        })?;

    Ok(Json(ReviewListResponse {
        reviews: page.items.into_iter().map(ReviewResponse::from).collect(),
        pagination: page.pagination,
    }))
}

/// Submit a review. Stored as pending until an admin approves it.
#[utoipa::path(
    post,
    path = "/reviews",
    request_body = CreateReviewRequest,
    responses(
        (status = 200, description = "Review submitted, pending approval", body = CreateReviewResponse),
        (status = 400, description = "Invalid payload or duplicate review"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn create_review_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateReviewRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !(1..=5).contains(&req.rating) {
        return Err((StatusCode::BAD_REQUEST, "Invalid rating".to_string()));
    }
    if req.title.trim().is_empty() || req.content.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Title and content are required".to_string(),
        ));
    }

    // TODO: verify the purchase by checking the user's delivered orders for
    // this product before setting purchase_verified.
    let review = state
        .store
        .create_review(NewReview {
            product_id: req.product_id,
            user_id: auth.user_id,
            rating: req.rating,
            title: req.title.trim().to_string(),
            content: req.content.trim().to_string(),
            images: req.images,
            purchase_verified: false,
        })
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => (
                StatusCode::BAD_REQUEST,
                "User or product not found".to_string(),
            ),
            PortError::Conflict(msg) => (StatusCode::BAD_REQUEST, msg),
            e => {
                error!("Reviews POST error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to submit review".to_string(),
                )
            }
        })?;

    // Notification is best-effort.
    if let (Ok(user), Ok(product)) = (
        state.store.get_user(auth.user_id).await,
        state.store.get_product(review.product_id).await,
    ) {
        let _ = state
            .notifier
            .review_submitted(&user, &review, &product)
            .await;
    }

    Ok(Json(CreateReviewResponse {
        review: ReviewResponse::from(review),
        message: "Review submitted successfully and is pending approval".to_string(),
    }))
}

/// Vote a review helpful or not helpful. Idempotent per voter.
#[utoipa::path(
    post,
    path = "/reviews/{id}/helpful",
    params(("id" = Uuid, Path, description = "Review id")),
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Vote recorded", body = VoteResponse),
        (status = 400, description = "Missing helpful flag"),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Review not found")
    )
)]
pub async fn vote_review_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<VoteRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let Some(helpful) = req.helpful else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Invalid helpful parameter".to_string(),
        ));
    };

    let review = state
        .store
        .set_review_vote(id, auth.user_id, helpful)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => (StatusCode::NOT_FOUND, "Review not found".to_string()),
            e => {
                error!("Review helpful POST error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to update review helpfulness".to_string(),
                )
            }
        })?;

    Ok(Json(VoteResponse {
        message: format!(
            "Review marked as {}",
            if helpful { "helpful" } else { "not helpful" }
        ),
        helpful_count: review.helpful.len(),
        not_helpful_count: review.not_helpful.len(),
        helpfulness_score: review.helpfulness_score(),
    }))
}

/// Moderate a review. Admin only; approval feeds the product's displayed
/// average.
#[utoipa::path(
    patch,
    path = "/reviews/{id}/status",
    params(("id" = Uuid, Path, description = "Review id")),
    request_body = ModerateReviewRequest,
    responses(
        (status = 200, description = "Review moderated", body = ReviewResponse),
        (status = 400, description = "Invalid status"),
        (status = 401, description = "Not an admin"),
        (status = 404, description = "Review not found")
    )
)]
pub async fn moderate_review_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<ModerateReviewRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if auth.role != Role::Admin {
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized".to_string()));
    }

    let status = match ReviewStatus::parse(&req.status) {
        Some(s @ (ReviewStatus::Approved | ReviewStatus::Rejected)) => s,
        _ => return Err((StatusCode::BAD_REQUEST, "Invalid status".to_string())),
    };

    let review = state
        .store
        .set_review_status(id, status)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => (StatusCode::NOT_FOUND, "Review not found".to_string()),
            e => {
                error!("Review moderation error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to moderate review".to_string(),
                )
            }
        })?;

    Ok(Json(ReviewResponse::from(review)))
}
