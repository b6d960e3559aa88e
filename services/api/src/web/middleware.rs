//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::web::session;
use crate::web::state::AppState;
use storefront_core::domain::Role;

/// The authenticated caller, inserted into request extensions by
/// `require_auth`. Role checks stay in the handlers that need them.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

/// Middleware that validates the signed session cookie.
///
/// If valid, inserts an `AuthUser` into request extensions for handlers to use.
/// If invalid, expired, or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Extract cookie header
    let cookie_header = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 2. Parse session token from cookie
    let token = session::token_from_cookie_header(cookie_header)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 3. Verify the signature and expiry
    let claims = session::verify(&state.config.session_secret, token)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 4. Insert the caller into request extensions
    req.extensions_mut().insert(AuthUser {
        user_id: claims.user_id,
        role: claims.role,
    });

    // 5. Continue to the handler
    Ok(next.run(req).await)
}
