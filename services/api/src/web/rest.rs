//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification. Individual handlers
//! live in their own modules and are referenced here.

use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        crate::web::products::list_products_handler,
        crate::web::products::get_product_handler,
        crate::web::products::create_product_handler,
        crate::web::products::update_product_handler,
        crate::web::products::delete_product_handler,
        crate::web::orders::create_order_handler,
        crate::web::orders::list_orders_handler,
        crate::web::orders::get_order_handler,
        crate::web::orders::update_order_handler,
        crate::web::reviews::list_reviews_handler,
        crate::web::reviews::create_review_handler,
        crate::web::reviews::vote_review_handler,
        crate::web::reviews::moderate_review_handler,
        crate::web::wishlist::get_wishlist_handler,
        crate::web::wishlist::toggle_wishlist_handler,
        crate::web::upload::upload_handler,
        crate::web::webhook::payment_webhook_handler,
    ),
    components(
        schemas(
            storefront_core::domain::Product,
            storefront_core::domain::Variant,
            storefront_core::domain::ReviewStats,
            storefront_core::domain::Order,
            storefront_core::domain::OrderStatus,
            storefront_core::domain::LineItem,
            storefront_core::domain::VariantChoice,
            storefront_core::domain::Address,
            storefront_core::domain::User,
            storefront_core::domain::Role,
            storefront_core::domain::NotificationPreferences,
            storefront_core::domain::ReviewStatus,
            storefront_core::ports::Pagination,
            crate::web::auth::SignupRequest,
            crate::web::auth::LoginRequest,
            crate::web::auth::AuthResponse,
            crate::web::products::ProductListResponse,
            crate::web::products::CreateProductRequest,
            crate::web::products::UpdateProductRequest,
            crate::web::orders::CreateOrderRequest,
            crate::web::orders::OrderListResponse,
            crate::web::orders::UpdateOrderRequest,
            crate::web::reviews::ReviewResponse,
            crate::web::reviews::ReviewListResponse,
            crate::web::reviews::CreateReviewRequest,
            crate::web::reviews::CreateReviewResponse,
            crate::web::reviews::VoteRequest,
            crate::web::reviews::VoteResponse,
            crate::web::reviews::ModerateReviewRequest,
            crate::web::wishlist::WishlistItem,
            crate::web::wishlist::WishlistResponse,
            crate::web::wishlist::ToggleWishlistRequest,
            crate::web::wishlist::ToggleWishlistResponse,
            crate::web::upload::UploadResponse,
            crate::web::webhook::WebhookAck,
        )
    ),
    tags(
        (name = "Storefront API", description = "API endpoints for the storefront: catalog, orders, reviews, wishlists and accounts.")
    )
)]
pub struct ApiDoc;
