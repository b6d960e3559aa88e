pub mod auth;
pub mod middleware;
pub mod orders;
pub mod products;
pub mod rest;
pub mod reviews;
pub mod session;
pub mod state;
pub mod upload;
pub mod webhook;
pub mod wishlist;

pub use middleware::{require_auth, AuthUser};
pub use rest::ApiDoc;
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;

/// Builds the application router: public routes, auth-protected routes, and
/// the shared body limit. CORS, Swagger UI and static asset serving are
/// layered on by the binary; tests drive this router directly.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/products", get(products::list_products_handler))
        .route("/products/{id_or_slug}", get(products::get_product_handler))
        .route("/reviews", get(reviews::list_reviews_handler))
        .route("/webhooks/payment", post(webhook::payment_webhook_handler));

    // Protected routes (auth required; admin checks live in the handlers)
    let protected_routes = Router::new()
        .route("/products", post(products::create_product_handler))
        .route(
            "/products/{id_or_slug}",
            put(products::update_product_handler).delete(products::delete_product_handler),
        )
        .route(
            "/orders",
            get(orders::list_orders_handler).post(orders::create_order_handler),
        )
        .route(
            "/orders/{id}",
            get(orders::get_order_handler).patch(orders::update_order_handler),
        )
        .route("/reviews", post(reviews::create_review_handler))
        .route("/reviews/{id}/helpful", post(reviews::vote_review_handler))
        .route("/reviews/{id}/status", patch(reviews::moderate_review_handler))
        .route(
            "/wishlist",
            get(wishlist::get_wishlist_handler).post(wishlist::toggle_wishlist_handler),
        )
        .route("/upload", post(upload::upload_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .with_state(state)
}
