//! crates/storefront_core/src/domain.rs
//!
//! Defines the pure, core data structures for the storefront.
//! These structs are independent of any database or HTTP framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A purchasable catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    /// URL-safe identifier, derived deterministically from the title.
    pub slug: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub currency: String,
    /// Ordered list of image URLs. Never empty for a stored product.
    pub images: Vec<String>,
    /// Ordered list of 3D asset URLs (`.glb` / `.gltf`).
    pub model_urls: Vec<String>,
    pub variants: Vec<Variant>,
    pub stock: i32,
    pub tags: Vec<String>,
    pub featured: bool,
    pub review_stats: ReviewStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A named option on a product ("Color" / "Crimson"), with optional
/// price/stock/asset overrides.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Variant {
    pub name: String,
    pub value: String,
    pub price: Option<f64>,
    pub stock: Option<i32>,
    pub model_url: Option<String>,
}

/// Review aggregate stored on the product record.
///
/// `total` and `distribution` count every submitted review; `average` is
/// recomputed from approved reviews only.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ReviewStats {
    pub total: u32,
    pub average: f64,
    /// Per-star counters, index 0 holding one-star reviews.
    #[schema(value_type = Vec<u32>)]
    pub distribution: [u32; 5],
}

impl ReviewStats {
    /// Records a newly submitted review's star rating in the counters.
    /// Ratings outside 1..=5 are ignored; callers validate before storing.
    pub fn record(&mut self, rating: u8) {
        if (1..=5).contains(&rating) {
            self.total += 1;
            self.distribution[rating as usize - 1] += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    PaymentFailed,
    Canceled,
    Shipped,
    Delivered,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::PaymentFailed => "payment_failed",
            OrderStatus::Canceled => "canceled",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "paid" => Some(OrderStatus::Paid),
            "payment_failed" => Some(OrderStatus::PaymentFailed),
            "canceled" => Some(OrderStatus::Canceled),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            _ => None,
        }
    }

    /// The admin-facing lifecycle: `pending -> paid -> shipped -> delivered`,
    /// with payment outcomes branching off `pending`. The payment webhook
    /// overwrites status without consulting this table.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Paid)
                | (Pending, PaymentFailed)
                | (Pending, Canceled)
                | (Paid, Shipped)
                | (Shipped, Delivered)
        )
    }
}

/// A (product, variant, quantity, unit price) tuple within an order.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LineItem {
    pub product_id: Uuid,
    pub variant: Option<VariantChoice>,
    pub quantity: u32,
    /// Unit price at the time the item was added to the cart.
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VariantChoice {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Address {
    pub name: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<LineItem>,
    /// Accepted from the client as declared; not recomputed server-side.
    pub total: f64,
    pub status: OrderStatus,
    pub shipping_address: Address,
    /// External payment-intent id, set at checkout and matched by the
    /// payment webhook.
    pub payment_ref: Option<String>,
    pub payment_error: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub tracking: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Sum of line-item subtotals. Reported for reconciliation; the stored
    /// `total` is the client's declared figure and may differ.
    pub fn items_subtotal(&self) -> f64 {
        self.items
            .iter()
            .map(|i| i.price * f64::from(i.quantity))
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer" => Some(Role::Customer),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

// Represents an account - used throughout the app. Never carries the
// credential hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub addresses: Vec<Address>,
    /// Product ids the user has wishlisted.
    pub wishlist: Vec<Uuid>,
    pub preferences: NotificationPreferences,
    pub created_at: DateTime<Utc>,
}

// Only used internally for login/signup - contains sensitive data.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NotificationPreferences {
    pub order_updates: bool,
    pub promotions: bool,
    pub new_arrivals: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            order_updates: true,
            promotions: true,
            new_arrivals: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReviewStatus::Pending),
            "approved" => Some(ReviewStatus::Approved),
            "rejected" => Some(ReviewStatus::Rejected),
            _ => None,
        }
    }
}

/// A customer review of a product. One review per (user, product) pair.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Review {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    /// 1 through 5 stars.
    pub rating: u8,
    pub title: String,
    pub content: String,
    pub images: Vec<String>,
    pub status: ReviewStatus,
    /// Ids of users who voted the review helpful. Each voter appears in at
    /// most one of the two sets.
    pub helpful: Vec<Uuid>,
    pub not_helpful: Vec<Uuid>,
    pub purchase_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    /// Percentage of "helpful" votes among all votes cast, 0.0 when no
    /// votes exist.
    pub fn helpfulness_score(&self) -> f64 {
        let total = self.helpful.len() + self.not_helpful.len();
        if total == 0 {
            return 0.0;
        }
        self.helpful.len() as f64 / total as f64 * 100.0
    }
}

/// Derives a product slug from its title: lowercased, every run of
/// non-alphanumeric characters collapsed to a single hyphen, leading and
/// trailing hyphens stripped.
pub fn slug_from_title(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_is_lowercased_and_hyphen_joined() {
        assert_eq!(slug_from_title("Test Cap"), "test-cap");
        assert_eq!(slug_from_title("Opium Snapback"), "opium-snapback");
    }

    #[test]
    fn slug_strips_punctuation_and_edge_hyphens() {
        assert_eq!(slug_from_title("  Aura: Bucket Hat!  "), "aura-bucket-hat");
        assert_eq!(slug_from_title("Tee (v2) -- Red"), "tee-v2-red");
        assert_eq!(slug_from_title("!!!"), "");
    }

    #[test]
    fn order_lifecycle_transitions() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Paid));
        assert!(Pending.can_transition_to(PaymentFailed));
        assert!(Pending.can_transition_to(Canceled));
        assert!(Paid.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));

        assert!(!Pending.can_transition_to(Shipped));
        assert!(!Paid.can_transition_to(Delivered));
        assert!(!Delivered.can_transition_to(Shipped));
        assert!(!Canceled.can_transition_to(Paid));
    }

    #[test]
    fn helpfulness_score_with_no_votes_is_zero() {
        let review = sample_review(&[], &[]);
        assert_eq!(review.helpfulness_score(), 0.0);
    }

    #[test]
    fn helpfulness_score_is_a_percentage() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let review = sample_review(&[a, b, c], &[Uuid::new_v4()]);
        assert_eq!(review.helpfulness_score(), 75.0);
    }

    #[test]
    fn review_stats_record_tracks_distribution() {
        let mut stats = ReviewStats::default();
        stats.record(5);
        stats.record(5);
        stats.record(1);
        stats.record(0); // out of range, ignored
        assert_eq!(stats.total, 3);
        assert_eq!(stats.distribution, [1, 0, 0, 0, 2]);
    }

    #[test]
    fn items_subtotal_sums_quantity_times_price() {
        let order = Order {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            items: vec![
                LineItem {
                    product_id: Uuid::new_v4(),
                    variant: None,
                    quantity: 2,
                    price: 10.0,
                },
                LineItem {
                    product_id: Uuid::new_v4(),
                    variant: None,
                    quantity: 1,
                    price: 5.5,
                },
            ],
            total: 999.0,
            status: OrderStatus::Pending,
            shipping_address: sample_address(),
            payment_ref: None,
            payment_error: None,
            paid_at: None,
            tracking: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(order.items_subtotal(), 25.5);
        // The declared total is stored untouched even when it disagrees.
        assert_eq!(order.total, 999.0);
    }

    fn sample_address() -> Address {
        Address {
            name: "Jo Carter".to_string(),
            street: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            zip_code: "62701".to_string(),
            country: "US".to_string(),
        }
    }

    fn sample_review(helpful: &[Uuid], not_helpful: &[Uuid]) -> Review {
        Review {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            rating: 4,
            title: "Solid".to_string(),
            content: "Holds up well.".to_string(),
            images: vec![],
            status: ReviewStatus::Approved,
            helpful: helpful.to_vec(),
            not_helpful: not_helpful.to_vec(),
            purchase_verified: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
