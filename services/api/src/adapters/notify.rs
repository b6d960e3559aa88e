//! services/api/src/adapters/notify.rs
//!
//! This module contains the adapter for outbound user notifications. It
//! implements the `NotificationService` port from the `core` crate by
//! writing structured log lines; template rendering and SMTP delivery live
//! outside this service.

use async_trait::async_trait;
use tracing::info;

use storefront_core::domain::{Order, Product, Review, User};
use storefront_core::ports::{NotificationService, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `NotificationService` port via `tracing`.
#[derive(Clone, Default)]
pub struct TracingNotifier;

impl TracingNotifier {
    /// Creates a new `TracingNotifier`.
    pub fn new() -> Self {
        Self
    }
}

//=========================================================================================
// `NotificationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl NotificationService for TracingNotifier {
    async fn order_confirmation(&self, user: &User, order: &Order) -> PortResult<()> {
        if !user.preferences.order_updates {
            return Ok(());
        }
        info!(
            email = %user.email,
            order_id = %order.id,
            total = order.total,
            "notification: order confirmation"
        );
        Ok(())
    }

    async fn review_submitted(
        &self,
        user: &User,
        review: &Review,
        product: &Product,
    ) -> PortResult<()> {
        info!(
            email = %user.email,
            review_id = %review.id,
            product = %product.slug,
            "notification: review submitted, pending approval"
        );
        Ok(())
    }

    async fn shipping_update(&self, user: &User, order: &Order) -> PortResult<()> {
        if !user.preferences.order_updates {
            return Ok(());
        }
        info!(
            email = %user.email,
            order_id = %order.id,
            status = order.status.as_str(),
            tracking = order.tracking.as_deref().unwrap_or("-"),
            "notification: shipping update"
        );
        Ok(())
    }
}
