//! crates/storefront_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the storefront's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like databases
//! or mail delivery.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{
    Address, LineItem, NotificationPreferences, Order, OrderStatus, Product, Review, ReviewStatus,
    Role, User, UserCredentials, Variant,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid input: {0}")]
    Invalid(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Query and Command Types
//=========================================================================================

/// Sort keys accepted by the catalog listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
    /// Currently an alias for `Newest`; kept so clients sending it keep
    /// working.
    Popularity,
}

impl SortKey {
    pub fn parse(s: &str) -> Self {
        match s {
            "price-low" => SortKey::PriceAsc,
            "price-high" => SortKey::PriceDesc,
            "name" => SortKey::Name,
            "popularity" => SortKey::Popularity,
            _ => SortKey::Newest,
        }
    }
}

/// A catalog page request: pagination, sort, and filters.
#[derive(Debug, Clone)]
pub struct ProductQuery {
    pub page: u32,
    pub limit: u32,
    pub sort: SortKey,
    pub min_price: f64,
    pub max_price: f64,
    /// Matched against product tags.
    pub category: Option<String>,
    pub featured: bool,
    /// Case-insensitive substring match on title and description.
    pub search: Option<String>,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 12,
            sort: SortKey::Newest,
            min_price: 0.0,
            max_price: 999_999.0,
            category: None,
            featured: false,
            search: None,
        }
    }
}

/// Pagination metadata returned alongside every listing page.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_count: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn compute(page: u32, limit: u32, total_count: u64) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            (total_count as f64 / f64::from(limit)).ceil() as u32
        };
        Self {
            current_page: page,
            total_pages,
            total_count,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

/// One page of listing results.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// Input for creating a product. The slug is derived by the caller before
/// the store is asked to persist it.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub currency: String,
    pub images: Vec<String>,
    pub model_urls: Vec<String>,
    pub variants: Vec<Variant>,
    pub stock: i32,
    pub tags: Vec<String>,
    pub featured: bool,
}

/// Partial product update. `None` fields are left untouched; `slug` is set
/// by the caller whenever the title changes.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub images: Option<Vec<String>>,
    pub model_urls: Option<Vec<String>>,
    pub variants: Option<Vec<Variant>>,
    pub stock: Option<i32>,
    pub tags: Option<Vec<String>>,
    pub featured: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub preferences: NotificationPreferences,
}

/// Result of a wishlist toggle.
#[derive(Debug, Clone)]
pub struct WishlistChange {
    pub wishlist: Vec<Uuid>,
    /// True when the product was added, false when it was removed.
    pub added: bool,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub items: Vec<LineItem>,
    /// Declared by the client; stored as given.
    pub total: f64,
    pub shipping_address: Address,
    pub payment_ref: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
    pub limit: u32,
}

/// A payment-processor callback outcome, applied to the order matching the
/// stored payment reference.
#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    Succeeded { paid_at: DateTime<Utc> },
    Failed { error: String },
    Canceled,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub rating: u8,
    pub title: String,
    pub content: String,
    pub images: Vec<String>,
    pub purchase_verified: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub enum ReviewSort {
    #[default]
    Newest,
    Oldest,
    RatingHigh,
    RatingLow,
}

impl ReviewSort {
    pub fn parse(s: &str) -> Self {
        match s {
            "oldest" => ReviewSort::Oldest,
            "rating-high" => ReviewSort::RatingHigh,
            "rating-low" => ReviewSort::RatingLow,
            _ => ReviewSort::Newest,
        }
    }
}

/// Filter for the public review listing. Only approved reviews are returned.
#[derive(Debug, Clone)]
pub struct ReviewFilter {
    pub product_id: Uuid,
    pub rating: Option<u8>,
    pub verified_only: bool,
    pub sort: ReviewSort,
    pub page: u32,
    pub limit: u32,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The persistence contract for every storefront entity. Implemented by the
/// PostgreSQL adapter and by the in-memory mock store used in development.
#[async_trait]
pub trait StorefrontStore: Send + Sync {
    // --- Catalog ---
    async fn list_products(&self, query: &ProductQuery) -> PortResult<Page<Product>>;

    async fn get_product(&self, id: Uuid) -> PortResult<Product>;

    async fn get_product_by_slug(&self, slug: &str) -> PortResult<Product>;

    /// Fails with `Conflict` when a product with the same slug exists.
    async fn create_product(&self, new: NewProduct) -> PortResult<Product>;

    async fn update_product(&self, id: Uuid, patch: ProductPatch) -> PortResult<Product>;

    async fn delete_product(&self, id: Uuid) -> PortResult<()>;

    // --- Accounts ---
    /// Fails with `Conflict` when the email is already registered.
    async fn create_user(&self, new: NewUser) -> PortResult<User>;

    async fn get_user(&self, id: Uuid) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    /// Adds the product to the user's wishlist, or removes it if present.
    async fn toggle_wishlist(&self, user_id: Uuid, product_id: Uuid) -> PortResult<WishlistChange>;

    // --- Orders ---
    async fn create_order(&self, new: NewOrder) -> PortResult<Order>;

    /// Newest-first, bounded by `filter.limit`.
    async fn list_orders(&self, filter: &OrderFilter) -> PortResult<Vec<Order>>;

    async fn get_order(&self, id: Uuid) -> PortResult<Order>;

    /// Admin transition (`shipped` / `delivered`), with optional tracking
    /// code. Validated against the order lifecycle.
    async fn set_order_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        tracking: Option<String>,
    ) -> PortResult<Order>;

    /// Applies a payment outcome to the order holding `payment_ref`. The
    /// write is a blind status overwrite; `Ok(None)` means no order matched
    /// and the outcome was dropped.
    async fn apply_payment_outcome(
        &self,
        payment_ref: &str,
        outcome: PaymentOutcome,
    ) -> PortResult<Option<Order>>;

    // --- Reviews ---
    /// Stores the review as `pending` and updates the product's review
    /// aggregate (total, per-star distribution, approved-only average).
    /// Fails with `Conflict` when the user already reviewed the product.
    async fn create_review(&self, new: NewReview) -> PortResult<Review>;

    async fn list_reviews(&self, filter: &ReviewFilter) -> PortResult<Page<Review>>;

    async fn get_review(&self, id: Uuid) -> PortResult<Review>;

    /// Records a helpfulness vote. The voter is removed from both sets
    /// before being added to the chosen one, so repeat votes are idempotent.
    async fn set_review_vote(
        &self,
        review_id: Uuid,
        voter: Uuid,
        helpful: bool,
    ) -> PortResult<Review>;

    /// Moderates a review and recomputes the product's approved-only
    /// average.
    async fn set_review_status(&self, review_id: Uuid, status: ReviewStatus)
        -> PortResult<Review>;
}

/// Outbound user notifications. Delivery failures are the adapter's problem;
/// callers treat these as fire-and-forget.
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn order_confirmation(&self, user: &User, order: &Order) -> PortResult<()>;

    async fn review_submitted(
        &self,
        user: &User,
        review: &Review,
        product: &Product,
    ) -> PortResult<()>;

    async fn shipping_update(&self, user: &User, order: &Order) -> PortResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_metadata_matches_counts() {
        let p = Pagination::compute(2, 10, 35);
        assert_eq!(p.current_page, 2);
        assert_eq!(p.total_pages, 4);
        assert_eq!(p.total_count, 35);
        assert!(p.has_next);
        assert!(p.has_prev);
    }

    #[test]
    fn pagination_first_and_last_page_flags() {
        let first = Pagination::compute(1, 12, 24);
        assert!(first.has_next);
        assert!(!first.has_prev);

        let last = Pagination::compute(2, 12, 24);
        assert!(!last.has_next);
        assert!(last.has_prev);

        let empty = Pagination::compute(1, 12, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
        assert!(!empty.has_prev);
    }

    #[test]
    fn sort_key_parse_falls_back_to_newest() {
        assert_eq!(SortKey::parse("price-low"), SortKey::PriceAsc);
        assert_eq!(SortKey::parse("price-high"), SortKey::PriceDesc);
        assert_eq!(SortKey::parse("name"), SortKey::Name);
        assert_eq!(SortKey::parse("popularity"), SortKey::Popularity);
        assert_eq!(SortKey::parse("garbage"), SortKey::Newest);
    }
}
