pub mod domain;
pub mod ports;

pub use domain::{
    Address, LineItem, NotificationPreferences, Order, OrderStatus, Product, Review, ReviewStats,
    ReviewStatus, Role, User, UserCredentials, Variant, VariantChoice,
};
pub use ports::{
    NotificationService, Page, Pagination, PortError, PortResult, ProductQuery, SortKey,
    StorefrontStore,
};
