//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use storefront_core::ports::{NotificationService, StorefrontStore};

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StorefrontStore>,
    pub notifier: Arc<dyn NotificationService>,
    pub config: Arc<Config>,
}
