//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `StorefrontStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use storefront_core::domain::{
    Address, LineItem, NotificationPreferences, Order, OrderStatus, Product, Review, ReviewStats,
    ReviewStatus, Role, User, UserCredentials, Variant,
};
use storefront_core::ports::{
    NewOrder, NewProduct, NewReview, NewUser, OrderFilter, Page, Pagination, PaymentOutcome,
    PortError, PortResult, ProductPatch, ProductQuery, ReviewFilter, ReviewSort, SortKey,
    StorefrontStore, WishlistChange,
};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `StorefrontStore` port.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Recomputes a product's displayed average from approved reviews.
    async fn refresh_product_average(&self, product_id: Uuid) -> PortResult<()> {
        sqlx::query(
            "UPDATE products SET review_average = COALESCE( \
                 (SELECT AVG(rating)::float8 FROM reviews \
                  WHERE product_id = $1 AND status = 'approved'), 0), \
                 updated_at = now() \
             WHERE id = $1",
        )
        .bind(product_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const PRODUCT_COLUMNS: &str = "id, slug, title, description, price, currency, images, \
     model_urls, variants, stock, tags, featured, review_total, review_average, \
     review_d1, review_d2, review_d3, review_d4, review_d5, created_at, updated_at";

#[derive(FromRow)]
struct ProductRecord {
    id: Uuid,
    slug: String,
    title: String,
    description: String,
    price: f64,
    currency: String,
    images: Vec<String>,
    model_urls: Vec<String>,
    variants: Json<Vec<Variant>>,
    stock: i32,
    tags: Vec<String>,
    featured: bool,
    review_total: i32,
    review_average: f64,
    review_d1: i32,
    review_d2: i32,
    review_d3: i32,
    review_d4: i32,
    review_d5: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductRecord {
    fn to_domain(self) -> Product {
        Product {
            id: self.id,
            slug: self.slug,
            title: self.title,
            description: self.description,
            price: self.price,
            currency: self.currency,
            images: self.images,
            model_urls: self.model_urls,
            variants: self.variants.0,
            stock: self.stock,
            tags: self.tags,
            featured: self.featured,
            review_stats: ReviewStats {
                total: self.review_total.max(0) as u32,
                average: self.review_average,
                distribution: [
                    self.review_d1.max(0) as u32,
                    self.review_d2.max(0) as u32,
                    self.review_d3.max(0) as u32,
                    self.review_d4.max(0) as u32,
                    self.review_d5.max(0) as u32,
                ],
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    name: String,
    email: String,
    role: String,
    addresses: Json<Vec<Address>>,
    wishlist: Vec<Uuid>,
    preferences: Json<NotificationPreferences>,
    created_at: DateTime<Utc>,
}

impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            name: self.name,
            email: self.email,
            role: Role::parse(&self.role).unwrap_or(Role::Customer),
            addresses: self.addresses.0,
            wishlist: self.wishlist,
            preferences: self.preferences.0,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    email: String,
    password_hash: String,
    role: String,
}

#[derive(FromRow)]
struct OrderRecord {
    id: Uuid,
    user_id: Uuid,
    items: Json<Vec<LineItem>>,
    total: f64,
    status: String,
    shipping_address: Json<Address>,
    payment_ref: Option<String>,
    payment_error: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    tracking: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRecord {
    fn to_domain(self) -> Order {
        Order {
            id: self.id,
            user_id: self.user_id,
            items: self.items.0,
            total: self.total,
            status: OrderStatus::parse(&self.status).unwrap_or(OrderStatus::Pending),
            shipping_address: self.shipping_address.0,
            payment_ref: self.payment_ref,
            payment_error: self.payment_error,
            paid_at: self.paid_at,
            tracking: self.tracking,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ReviewRecord {
    id: Uuid,
    product_id: Uuid,
    user_id: Uuid,
    rating: i16,
    title: String,
    content: String,
    images: Vec<String>,
    status: String,
    helpful: Vec<Uuid>,
    not_helpful: Vec<Uuid>,
    purchase_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ReviewRecord {
    fn to_domain(self) -> Review {
        Review {
            id: self.id,
            product_id: self.product_id,
            user_id: self.user_id,
            rating: self.rating.clamp(1, 5) as u8,
            title: self.title,
            content: self.content,
            images: self.images,
            status: ReviewStatus::parse(&self.status).unwrap_or(ReviewStatus::Pending),
            helpful: self.helpful,
            not_helpful: self.not_helpful,
            purchase_verified: self.purchase_verified,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

//=========================================================================================
// Query Fragments
//=========================================================================================

/// Appends the catalog filter conditions shared by the page and count
/// queries.
fn push_product_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &ProductQuery) {
    qb.push(" WHERE price >= ");
    qb.push_bind(query.min_price);
    qb.push(" AND price <= ");
    qb.push_bind(query.max_price);
    if let Some(category) = &query.category {
        qb.push(" AND ");
        qb.push_bind(category.clone());
        qb.push(" = ANY(tags)");
    }
    if query.featured {
        qb.push(" AND featured = TRUE");
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        qb.push(" AND (title ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR description ILIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }
}

fn product_order_clause(sort: SortKey) -> &'static str {
    match sort {
        // "popularity" has no sales signal behind it yet; it orders like
        // newest.
        SortKey::Newest | SortKey::Popularity => " ORDER BY created_at DESC",
        SortKey::PriceAsc => " ORDER BY price ASC",
        SortKey::PriceDesc => " ORDER BY price DESC",
        SortKey::Name => " ORDER BY title ASC",
    }
}

fn review_order_clause(sort: ReviewSort) -> &'static str {
    match sort {
        ReviewSort::Newest => " ORDER BY created_at DESC",
        ReviewSort::Oldest => " ORDER BY created_at ASC",
        ReviewSort::RatingHigh => " ORDER BY rating DESC, created_at DESC",
        ReviewSort::RatingLow => " ORDER BY rating ASC, created_at DESC",
    }
}

//=========================================================================================
// `StorefrontStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl StorefrontStore for PgStore {
    async fn list_products(&self, query: &ProductQuery) -> PortResult<Page<Product>> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM products");
        push_product_filters(&mut count_qb, query);
        let total_count: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;

        let mut qb =
            QueryBuilder::new(format!("SELECT {} FROM products", PRODUCT_COLUMNS));
        push_product_filters(&mut qb, query);
        qb.push(product_order_clause(query.sort));
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(query.limit));
        qb.push(" OFFSET ");
        qb.push_bind(i64::from(query.page.saturating_sub(1)) * i64::from(query.limit));

        let records: Vec<ProductRecord> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        Ok(Page {
            items: records.into_iter().map(ProductRecord::to_domain).collect(),
            pagination: Pagination::compute(query.page, query.limit, total_count.max(0) as u64),
        })
    }

    async fn get_product(&self, id: Uuid) -> PortResult<Product> {
        let record: Option<ProductRecord> = sqlx::query_as(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record
            .map(ProductRecord::to_domain)
            .ok_or_else(|| PortError::NotFound(format!("Product {} not found", id)))
    }

    async fn get_product_by_slug(&self, slug: &str) -> PortResult<Product> {
        let record: Option<ProductRecord> = sqlx::query_as(&format!(
            "SELECT {} FROM products WHERE slug = $1",
            PRODUCT_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record
            .map(ProductRecord::to_domain)
            .ok_or_else(|| PortError::NotFound(format!("Product '{}' not found", slug)))
    }

    async fn create_product(&self, new: NewProduct) -> PortResult<Product> {
        let record: ProductRecord = sqlx::query_as(&format!(
            "INSERT INTO products \
                 (id, slug, title, description, price, currency, images, model_urls, \
                  variants, stock, tags, featured) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {}",
            PRODUCT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new.slug)
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.price)
        .bind(&new.currency)
        .bind(&new.images)
        .bind(&new.model_urls)
        .bind(Json(&new.variants))
        .bind(new.stock)
        .bind(&new.tags)
        .bind(new.featured)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::Conflict(format!("Product with slug '{}' already exists", new.slug))
            } else {
                unexpected(e)
            }
        })?;
        Ok(record.to_domain())
    }

    async fn update_product(&self, id: Uuid, patch: ProductPatch) -> PortResult<Product> {
        let record: Option<ProductRecord> = sqlx::query_as(&format!(
            "UPDATE products SET \
                 slug = COALESCE($2, slug), \
                 title = COALESCE($3, title), \
                 description = COALESCE($4, description), \
                 price = COALESCE($5, price), \
                 currency = COALESCE($6, currency), \
                 images = COALESCE($7, images), \
                 model_urls = COALESCE($8, model_urls), \
                 variants = COALESCE($9, variants), \
                 stock = COALESCE($10, stock), \
                 tags = COALESCE($11, tags), \
                 featured = COALESCE($12, featured), \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {}",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .bind(patch.slug.clone())
        .bind(patch.title)
        .bind(patch.description)
        .bind(patch.price)
        .bind(patch.currency)
        .bind(patch.images)
        .bind(patch.model_urls)
        .bind(patch.variants.map(Json))
        .bind(patch.stock)
        .bind(patch.tags)
        .bind(patch.featured)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::Conflict(format!(
                    "Product with slug '{}' already exists",
                    patch.slug.as_deref().unwrap_or_default()
                ))
            } else {
                unexpected(e)
            }
        })?;
        record
            .map(ProductRecord::to_domain)
            .ok_or_else(|| PortError::NotFound(format!("Product {} not found", id)))
    }

    async fn delete_product(&self, id: Uuid) -> PortResult<()> {
        let deleted: Option<(Uuid,)> =
            sqlx::query_as("DELETE FROM products WHERE id = $1 RETURNING id")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(unexpected)?;
        deleted
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("Product {} not found", id)))
    }

    async fn create_user(&self, new: NewUser) -> PortResult<User> {
        let email = new.email.to_lowercase();
        let record: UserRecord = sqlx::query_as(
            "INSERT INTO users (id, name, email, password_hash, role, preferences) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, name, email, role, addresses, wishlist, preferences, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&email)
        .bind(&new.password_hash)
        .bind(new.role.as_str())
        .bind(Json(&new.preferences))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::Conflict(format!("Email '{}' is already registered", email))
            } else {
                unexpected(e)
            }
        })?;
        Ok(record.to_domain())
    }

    async fn get_user(&self, id: Uuid) -> PortResult<User> {
        let record: Option<UserRecord> = sqlx::query_as(
            "SELECT id, name, email, role, addresses, wishlist, preferences, created_at \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record
            .map(UserRecord::to_domain)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", id)))
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record: Option<CredentialsRecord> = sqlx::query_as(
            "SELECT id, email, password_hash, role FROM users WHERE email = $1",
        )
        .bind(email.to_lowercase())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record
            .map(|r| UserCredentials {
                user_id: r.id,
                email: r.email,
                password_hash: r.password_hash,
                role: Role::parse(&r.role).unwrap_or(Role::Customer),
            })
            .ok_or_else(|| PortError::NotFound(format!("User '{}' not found", email)))
    }

    async fn toggle_wishlist(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> PortResult<WishlistChange> {
        // Read-modify-write without row locking; concurrency control is the
        // database driver's problem, not this layer's.
        let current: Option<(Vec<Uuid>,)> =
            sqlx::query_as("SELECT wishlist FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(unexpected)?;
        let (mut wishlist,) = current
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;

        let added = match wishlist.iter().position(|id| *id == product_id) {
            Some(index) => {
                wishlist.remove(index);
                false
            }
            None => {
                wishlist.push(product_id);
                true
            }
        };

        sqlx::query("UPDATE users SET wishlist = $2 WHERE id = $1")
            .bind(user_id)
            .bind(&wishlist)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        Ok(WishlistChange { wishlist, added })
    }

    async fn create_order(&self, new: NewOrder) -> PortResult<Order> {
        let record: OrderRecord = sqlx::query_as(
            "INSERT INTO orders (id, user_id, items, total, status, shipping_address, payment_ref) \
             VALUES ($1, $2, $3, $4, 'pending', $5, $6) \
             RETURNING id, user_id, items, total, status, shipping_address, payment_ref, \
                       payment_error, paid_at, tracking, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(Json(&new.items))
        .bind(new.total)
        .bind(Json(&new.shipping_address))
        .bind(&new.payment_ref)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> PortResult<Vec<Order>> {
        let mut qb = QueryBuilder::new(
            "SELECT id, user_id, items, total, status, shipping_address, payment_ref, \
             payment_error, paid_at, tracking, created_at, updated_at FROM orders WHERE TRUE",
        );
        if let Some(user_id) = filter.user_id {
            qb.push(" AND user_id = ");
            qb.push_bind(user_id);
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ");
            qb.push_bind(status.as_str());
        }
        qb.push(" ORDER BY created_at DESC LIMIT ");
        qb.push_bind(i64::from(if filter.limit == 0 { 50 } else { filter.limit }));

        let records: Vec<OrderRecord> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(OrderRecord::to_domain).collect())
    }

    async fn get_order(&self, id: Uuid) -> PortResult<Order> {
        let record: Option<OrderRecord> = sqlx::query_as(
            "SELECT id, user_id, items, total, status, shipping_address, payment_ref, \
             payment_error, paid_at, tracking, created_at, updated_at \
             FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record
            .map(OrderRecord::to_domain)
            .ok_or_else(|| PortError::NotFound(format!("Order {} not found", id)))
    }

    async fn set_order_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        tracking: Option<String>,
    ) -> PortResult<Order> {
        let current = self.get_order(id).await?;
        if !current.status.can_transition_to(status) {
            return Err(PortError::Invalid(format!(
                "Cannot transition order from {} to {}",
                current.status.as_str(),
                status.as_str()
            )));
        }

        let record: OrderRecord = sqlx::query_as(
            "UPDATE orders SET status = $2, tracking = COALESCE($3, tracking), \
             updated_at = now() WHERE id = $1 \
             RETURNING id, user_id, items, total, status, shipping_address, payment_ref, \
                       payment_error, paid_at, tracking, created_at, updated_at",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(tracking)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn apply_payment_outcome(
        &self,
        payment_ref: &str,
        outcome: PaymentOutcome,
    ) -> PortResult<Option<Order>> {
        // Blind overwrite keyed on the stored payment reference; a replayed
        // callback reapplies the same state.
        let returning = "RETURNING id, user_id, items, total, status, shipping_address, \
                         payment_ref, payment_error, paid_at, tracking, created_at, updated_at";
        let record: Option<OrderRecord> = match outcome {
            PaymentOutcome::Succeeded { paid_at } => {
                sqlx::query_as(&format!(
                    "UPDATE orders SET status = 'paid', paid_at = $2, payment_error = NULL, \
                     updated_at = now() WHERE payment_ref = $1 {}",
                    returning
                ))
                .bind(payment_ref)
                .bind(paid_at)
                .fetch_optional(&self.pool)
                .await
            }
            PaymentOutcome::Failed { error } => {
                sqlx::query_as(&format!(
                    "UPDATE orders SET status = 'payment_failed', payment_error = $2, \
                     updated_at = now() WHERE payment_ref = $1 {}",
                    returning
                ))
                .bind(payment_ref)
                .bind(error)
                .fetch_optional(&self.pool)
                .await
            }
            PaymentOutcome::Canceled => {
                sqlx::query_as(&format!(
                    "UPDATE orders SET status = 'canceled', updated_at = now() \
                     WHERE payment_ref = $1 {}",
                    returning
                ))
                .bind(payment_ref)
                .fetch_optional(&self.pool)
                .await
            }
        }
        .map_err(unexpected)?;
        Ok(record.map(OrderRecord::to_domain))
    }

    async fn create_review(&self, new: NewReview) -> PortResult<Review> {
        // The product must exist before anything is written.
        self.get_product(new.product_id).await?;

        let record: ReviewRecord = sqlx::query_as(
            "INSERT INTO reviews \
                 (id, product_id, user_id, rating, title, content, images, purchase_verified) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING id, product_id, user_id, rating, title, content, images, status, \
                       helpful, not_helpful, purchase_verified, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(new.product_id)
        .bind(new.user_id)
        .bind(i16::from(new.rating))
        .bind(&new.title)
        .bind(&new.content)
        .bind(&new.images)
        .bind(new.purchase_verified)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::Conflict("You have already reviewed this product".to_string())
            } else {
                unexpected(e)
            }
        })?;

        // Aggregate update; the two statements are not transactional with
        // the insert above.
        let column = format!("review_d{}", new.rating.clamp(1, 5));
        sqlx::query(&format!(
            "UPDATE products SET review_total = review_total + 1, \
             {column} = {column} + 1, updated_at = now() WHERE id = $1"
        ))
        .bind(new.product_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        self.refresh_product_average(new.product_id).await?;

        Ok(record.to_domain())
    }

    async fn list_reviews(&self, filter: &ReviewFilter) -> PortResult<Page<Review>> {
        let push_filters = |qb: &mut QueryBuilder<'_, Postgres>| {
            qb.push(" WHERE product_id = ");
            qb.push_bind(filter.product_id);
            qb.push(" AND status = 'approved'");
            if let Some(rating) = filter.rating {
                qb.push(" AND rating = ");
                qb.push_bind(i16::from(rating));
            }
            if filter.verified_only {
                qb.push(" AND purchase_verified = TRUE");
            }
        };

        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM reviews");
        push_filters(&mut count_qb);
        let total_count: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;

        let mut qb = QueryBuilder::new(
            "SELECT id, product_id, user_id, rating, title, content, images, status, \
             helpful, not_helpful, purchase_verified, created_at, updated_at FROM reviews",
        );
        push_filters(&mut qb);
        qb.push(review_order_clause(filter.sort));
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(filter.limit));
        qb.push(" OFFSET ");
        qb.push_bind(i64::from(filter.page.saturating_sub(1)) * i64::from(filter.limit));

        let records: Vec<ReviewRecord> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        Ok(Page {
            items: records.into_iter().map(ReviewRecord::to_domain).collect(),
            pagination: Pagination::compute(filter.page, filter.limit, total_count.max(0) as u64),
        })
    }

    async fn get_review(&self, id: Uuid) -> PortResult<Review> {
        let record: Option<ReviewRecord> = sqlx::query_as(
            "SELECT id, product_id, user_id, rating, title, content, images, status, \
             helpful, not_helpful, purchase_verified, created_at, updated_at \
             FROM reviews WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record
            .map(ReviewRecord::to_domain)
            .ok_or_else(|| PortError::NotFound(format!("Review {} not found", id)))
    }

    async fn set_review_vote(
        &self,
        review_id: Uuid,
        voter: Uuid,
        helpful: bool,
    ) -> PortResult<Review> {
        let review = self.get_review(review_id).await?;

        // Remove-then-add keeps repeat votes idempotent and lets a voter
        // switch sides.
        let mut helpful_set: Vec<Uuid> =
            review.helpful.into_iter().filter(|id| *id != voter).collect();
        let mut not_helpful_set: Vec<Uuid> = review
            .not_helpful
            .into_iter()
            .filter(|id| *id != voter)
            .collect();
        if helpful {
            helpful_set.push(voter);
        } else {
            not_helpful_set.push(voter);
        }

        let record: ReviewRecord = sqlx::query_as(
            "UPDATE reviews SET helpful = $2, not_helpful = $3, updated_at = now() \
             WHERE id = $1 \
             RETURNING id, product_id, user_id, rating, title, content, images, status, \
                       helpful, not_helpful, purchase_verified, created_at, updated_at",
        )
        .bind(review_id)
        .bind(&helpful_set)
        .bind(&not_helpful_set)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn set_review_status(
        &self,
        review_id: Uuid,
        status: ReviewStatus,
    ) -> PortResult<Review> {
        let record: Option<ReviewRecord> = sqlx::query_as(
            "UPDATE reviews SET status = $2, updated_at = now() WHERE id = $1 \
             RETURNING id, product_id, user_id, rating, title, content, images, status, \
                       helpful, not_helpful, purchase_verified, created_at, updated_at",
        )
        .bind(review_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        let review = record
            .map(ReviewRecord::to_domain)
            .ok_or_else(|| PortError::NotFound(format!("Review {} not found", review_id)))?;

        self.refresh_product_average(review.product_id).await?;
        Ok(review)
    }
}
