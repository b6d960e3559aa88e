//! services/api/src/adapters/mock_db.rs
//!
//! The in-memory mock store, used when no `DATABASE_URL` is configured. It
//! implements the `StorefrontStore` port over per-entity document
//! collections so local development needs no running database.
//!
//! The query surface is deliberately small: flat field equality plus a
//! numeric range on `price` and set-membership on `tags`. Sorting is a
//! comparator applied after full materialization of matches. Nothing is
//! persisted across restarts, and multi-document writes (e.g. review
//! creation plus product-aggregate update) are not transactional.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use storefront_core::domain::{
    NotificationPreferences, Order, OrderStatus, Product, Review, ReviewStats, ReviewStatus, Role,
    User, UserCredentials, Variant,
};
use storefront_core::ports::{
    NewOrder, NewProduct, NewReview, NewUser, OrderFilter, Page, Pagination, PaymentOutcome,
    PortError, PortResult, ProductPatch, ProductQuery, ReviewFilter, ReviewSort, SortKey,
    StorefrontStore, WishlistChange,
};

//=========================================================================================
// Filtering and Sorting Primitives
//=========================================================================================

/// The filter language the mock store understands: flat equality on named
/// fields, an inclusive numeric range on `price`, and membership of a single
/// tag in the `tags` array. Not a general query language.
#[derive(Debug, Clone, Default)]
struct Filter {
    eq: Vec<(&'static str, Value)>,
    price_range: Option<(f64, f64)>,
    tag: Option<String>,
}

impl Filter {
    fn eq(mut self, field: &'static str, value: Value) -> Self {
        self.eq.push((field, value));
        self
    }

    fn price_between(mut self, min: f64, max: f64) -> Self {
        self.price_range = Some((min, max));
        self
    }

    fn with_tag(mut self, tag: Option<String>) -> Self {
        self.tag = tag;
        self
    }

    fn matches(&self, doc: &Value) -> bool {
        for (field, expected) in &self.eq {
            if doc.get(field) != Some(expected) {
                return false;
            }
        }
        if let Some((min, max)) = self.price_range {
            match doc.get("price").and_then(Value::as_f64) {
                Some(price) if price >= min && price <= max => {}
                _ => return false,
            }
        }
        if let Some(tag) = &self.tag {
            let has_tag = doc
                .get("tags")
                .and_then(Value::as_array)
                .is_some_and(|tags| tags.iter().any(|t| t.as_str() == Some(tag)));
            if !has_tag {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy)]
enum SortDir {
    Asc,
    Desc,
}

type SortSpec = [(&'static str, SortDir)];

/// Field-wise comparison over JSON values: numbers numerically, strings
/// lexicographically (RFC 3339 timestamps sort correctly this way),
/// anything else compares equal.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

fn sort_docs(docs: &mut [Value], spec: &SortSpec) {
    docs.sort_by(|a, b| {
        for (field, dir) in spec {
            let av = a.get(field).unwrap_or(&Value::Null);
            let bv = b.get(field).unwrap_or(&Value::Null);
            let ord = match dir {
                SortDir::Asc => compare_values(av, bv),
                SortDir::Desc => compare_values(bv, av),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

//=========================================================================================
// Generic Document Collection
//=========================================================================================

struct CollectionInner {
    docs: HashMap<Uuid, Value>,
    /// Monotonic id counter, scoped to this collection.
    last_id: u64,
}

/// One entity type's documents, keyed by id. Ids are allocated from a
/// per-collection counter and rendered as deterministic UUIDs; externally
/// supplied counter-shaped ids are parsed back so the counter stays ahead
/// of them.
struct MemCollection<T> {
    inner: RwLock<CollectionInner>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> MemCollection<T> {
    fn new() -> Self {
        Self {
            inner: RwLock::new(CollectionInner {
                docs: HashMap::new(),
                last_id: 0,
            }),
            _marker: PhantomData,
        }
    }

    /// Next counter-derived id for this collection.
    fn allocate_id(&self) -> Uuid {
        let mut inner = self.inner.write().expect("mock store lock poisoned");
        inner.last_id += 1;
        Uuid::from_u128(u128::from(inner.last_id))
    }

    fn insert(&self, id: Uuid, doc: &T) {
        let value = serde_json::to_value(doc).expect("domain types serialize to JSON");
        let mut inner = self.inner.write().expect("mock store lock poisoned");
        // Fallback parse of externally supplied ids: counter-shaped ids
        // advance the counter so later allocations never collide.
        let raw = id.as_u128();
        if raw <= u128::from(u64::MAX) {
            inner.last_id = inner.last_id.max(raw as u64);
        }
        inner.docs.insert(id, value);
    }

    fn find_by_id(&self, id: Uuid) -> Option<T> {
        let inner = self.inner.read().expect("mock store lock poisoned");
        inner
            .docs
            .get(&id)
            .map(|doc| serde_json::from_value(doc.clone()).expect("stored doc deserializes"))
    }

    fn find_one(&self, filter: &Filter) -> Option<T> {
        let inner = self.inner.read().expect("mock store lock poisoned");
        inner
            .docs
            .values()
            .find(|doc| filter.matches(doc))
            .map(|doc| serde_json::from_value(doc.clone()).expect("stored doc deserializes"))
    }

    /// Materializes every match, sorts, then applies skip/limit.
    fn find(&self, filter: &Filter, sort: &SortSpec, skip: usize, limit: usize) -> Vec<T> {
        let inner = self.inner.read().expect("mock store lock poisoned");
        let mut matches: Vec<Value> = inner
            .docs
            .values()
            .filter(|doc| filter.matches(doc))
            .cloned()
            .collect();
        drop(inner);

        sort_docs(&mut matches, sort);
        matches
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|doc| serde_json::from_value(doc).expect("stored doc deserializes"))
            .collect()
    }

    fn count(&self, filter: &Filter) -> u64 {
        let inner = self.inner.read().expect("mock store lock poisoned");
        inner.docs.values().filter(|doc| filter.matches(doc)).count() as u64
    }

    /// Read-modify-write on a single document. Returns `None` when the id
    /// is unknown.
    fn update_by_id(&self, id: Uuid, apply: impl FnOnce(&mut T)) -> Option<T> {
        let mut inner = self.inner.write().expect("mock store lock poisoned");
        let doc = inner.docs.get(&id)?;
        let mut typed: T =
            serde_json::from_value(doc.clone()).expect("stored doc deserializes");
        apply(&mut typed);
        let value = serde_json::to_value(&typed).expect("domain types serialize to JSON");
        inner.docs.insert(id, value);
        Some(typed)
    }

    fn delete_by_id(&self, id: Uuid) -> bool {
        let mut inner = self.inner.write().expect("mock store lock poisoned");
        inner.docs.remove(&id).is_some()
    }
}

//=========================================================================================
// Stored User Shape
//=========================================================================================

/// The user document as stored: the public account fields plus the
/// credential hash, which never leaves this module except via
/// `UserCredentials`.
#[derive(serde::Serialize, serde::Deserialize)]
struct StoredUser {
    #[serde(flatten)]
    user: User,
    password_hash: String,
}

//=========================================================================================
// The Mock Store
//=========================================================================================

/// In-memory implementation of the `StorefrontStore` port.
pub struct MemStore {
    products: MemCollection<Product>,
    users: MemCollection<StoredUser>,
    orders: MemCollection<Order>,
    reviews: MemCollection<Review>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            products: MemCollection::new(),
            users: MemCollection::new(),
            orders: MemCollection::new(),
            reviews: MemCollection::new(),
        }
    }

    /// Seeds the demo catalog used for local development.
    pub fn seed_demo_catalog(&self) {
        for (title, description, price, tags, stock) in [
            (
                "Crimson Cap",
                "Premium streetwear cap with dark crimson accents and embossed logo.",
                89.99,
                vec!["streetwear", "premium", "caps", "limited"],
                55,
            ),
            (
                "Shadow Beanie",
                "Ultra-soft merino wool beanie with minimal branding.",
                64.99,
                vec!["streetwear", "beanies", "merino", "minimal"],
                75,
            ),
            (
                "Opium Snapback",
                "Signature snapback with metallic thread details and premium materials.",
                124.99,
                vec!["streetwear", "premium", "snapback", "signature", "limited"],
                35,
            ),
            (
                "Aura Bucket Hat",
                "Reversible bucket hat with gradient fade and water-resistant coating.",
                79.99,
                vec!["streetwear", "bucket", "gradient", "reversible"],
                60,
            ),
        ] {
            let slug = storefront_core::domain::slug_from_title(title);
            let id = self.products.allocate_id();
            let now = Utc::now();
            let product = Product {
                id,
                slug: slug.clone(),
                title: title.to_string(),
                description: description.to_string(),
                price,
                currency: "USD".to_string(),
                images: vec![
                    format!("https://assets.example.com/images/{slug}-1.jpg"),
                    format!("https://assets.example.com/images/{slug}-2.jpg"),
                ],
                model_urls: vec![format!("https://assets.example.com/models/{slug}.glb")],
                variants: vec![Variant {
                    name: "Color".to_string(),
                    value: "Black".to_string(),
                    price: Some(price),
                    stock: Some(stock / 2),
                    model_url: None,
                }],
                stock,
                tags: tags.into_iter().map(str::to_string).collect(),
                featured: false,
                review_stats: ReviewStats::default(),
                created_at: now,
                updated_at: now,
            };
            self.products.insert(id, &product);
        }
    }

    /// Seeds an admin account, skipped when the email is already taken.
    pub fn seed_admin(&self, email: &str, password_hash: &str) {
        let email = email.to_lowercase();
        let existing = self
            .users
            .find_one(&Filter::default().eq("email", json!(email)));
        if existing.is_some() {
            return;
        }
        let id = self.users.allocate_id();
        let stored = StoredUser {
            user: User {
                id,
                name: "Admin".to_string(),
                email,
                role: Role::Admin,
                addresses: vec![],
                wishlist: vec![],
                preferences: NotificationPreferences::default(),
                created_at: Utc::now(),
            },
            password_hash: password_hash.to_string(),
        };
        self.users.insert(id, &stored);
    }

    /// Average rating over a product's approved reviews, 0.0 when none.
    fn approved_average(&self, product_id: Uuid) -> f64 {
        let approved: Vec<Review> = self.reviews.find(
            &Filter::default()
                .eq("product_id", json!(product_id))
                .eq("status", json!(ReviewStatus::Approved)),
            &[],
            0,
            usize::MAX,
        );
        if approved.is_empty() {
            return 0.0;
        }
        approved.iter().map(|r| f64::from(r.rating)).sum::<f64>() / approved.len() as f64
    }

    fn refresh_product_average(&self, product_id: Uuid) {
        let average = self.approved_average(product_id);
        self.products.update_by_id(product_id, |p| {
            p.review_stats.average = average;
            p.updated_at = Utc::now();
        });
    }
}

fn product_sort_spec(sort: SortKey) -> &'static SortSpec {
    match sort {
        // "popularity" has no sales signal behind it yet; it orders like
        // newest.
        SortKey::Newest | SortKey::Popularity => &[("created_at", SortDir::Desc)],
        SortKey::PriceAsc => &[("price", SortDir::Asc)],
        SortKey::PriceDesc => &[("price", SortDir::Desc)],
        SortKey::Name => &[("title", SortDir::Asc)],
    }
}

fn review_sort_spec(sort: ReviewSort) -> &'static SortSpec {
    match sort {
        ReviewSort::Newest => &[("created_at", SortDir::Desc)],
        ReviewSort::Oldest => &[("created_at", SortDir::Asc)],
        ReviewSort::RatingHigh => &[("rating", SortDir::Desc), ("created_at", SortDir::Desc)],
        ReviewSort::RatingLow => &[("rating", SortDir::Asc), ("created_at", SortDir::Desc)],
    }
}

#[async_trait]
impl StorefrontStore for MemStore {
    async fn list_products(&self, query: &ProductQuery) -> PortResult<Page<Product>> {
        let mut filter = Filter::default()
            .price_between(query.min_price, query.max_price)
            .with_tag(query.category.clone());
        if query.featured {
            filter = filter.eq("featured", json!(true));
        }

        // Substring search runs above the filter language; the collection
        // itself only knows equality, price range and tag membership.
        let mut matches = self
            .products
            .find(&filter, product_sort_spec(query.sort), 0, usize::MAX);
        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            matches.retain(|p| {
                p.title.to_lowercase().contains(&needle)
                    || p.description.to_lowercase().contains(&needle)
            });
        }

        let total_count = matches.len() as u64;
        let skip = (query.page.saturating_sub(1) as usize) * query.limit as usize;
        let items: Vec<Product> = matches
            .into_iter()
            .skip(skip)
            .take(query.limit as usize)
            .collect();

        Ok(Page {
            items,
            pagination: Pagination::compute(query.page, query.limit, total_count),
        })
    }

    async fn get_product(&self, id: Uuid) -> PortResult<Product> {
        self.products
            .find_by_id(id)
            .ok_or_else(|| PortError::NotFound(format!("Product {} not found", id)))
    }

    async fn get_product_by_slug(&self, slug: &str) -> PortResult<Product> {
        self.products
            .find_one(&Filter::default().eq("slug", json!(slug)))
            .ok_or_else(|| PortError::NotFound(format!("Product '{}' not found", slug)))
    }

    async fn create_product(&self, new: NewProduct) -> PortResult<Product> {
        let clash = self
            .products
            .find_one(&Filter::default().eq("slug", json!(new.slug)));
        if clash.is_some() {
            return Err(PortError::Conflict(format!(
                "Product with slug '{}' already exists",
                new.slug
            )));
        }

        let id = self.products.allocate_id();
        let now = Utc::now();
        let product = Product {
            id,
            slug: new.slug,
            title: new.title,
            description: new.description,
            price: new.price,
            currency: new.currency,
            images: new.images,
            model_urls: new.model_urls,
            variants: new.variants,
            stock: new.stock,
            tags: new.tags,
            featured: new.featured,
            review_stats: ReviewStats::default(),
            created_at: now,
            updated_at: now,
        };
        self.products.insert(id, &product);
        Ok(product)
    }

    async fn update_product(&self, id: Uuid, patch: ProductPatch) -> PortResult<Product> {
        if let Some(slug) = &patch.slug {
            let clash = self
                .products
                .find_one(&Filter::default().eq("slug", json!(slug)));
            if clash.is_some_and(|p| p.id != id) {
                return Err(PortError::Conflict(format!(
                    "Product with slug '{}' already exists",
                    slug
                )));
            }
        }

        self.products
            .update_by_id(id, |p| {
                if let Some(slug) = patch.slug {
                    p.slug = slug;
                }
                if let Some(title) = patch.title {
                    p.title = title;
                }
                if let Some(description) = patch.description {
                    p.description = description;
                }
                if let Some(price) = patch.price {
                    p.price = price;
                }
                if let Some(currency) = patch.currency {
                    p.currency = currency;
                }
                if let Some(images) = patch.images {
                    p.images = images;
                }
                if let Some(model_urls) = patch.model_urls {
                    p.model_urls = model_urls;
                }
                if let Some(variants) = patch.variants {
                    p.variants = variants;
                }
                if let Some(stock) = patch.stock {
                    p.stock = stock;
                }
                if let Some(tags) = patch.tags {
                    p.tags = tags;
                }
                if let Some(featured) = patch.featured {
                    p.featured = featured;
                }
                p.updated_at = Utc::now();
            })
            .ok_or_else(|| PortError::NotFound(format!("Product {} not found", id)))
    }

    async fn delete_product(&self, id: Uuid) -> PortResult<()> {
        if self.products.delete_by_id(id) {
            Ok(())
        } else {
            Err(PortError::NotFound(format!("Product {} not found", id)))
        }
    }

    async fn create_user(&self, new: NewUser) -> PortResult<User> {
        let email = new.email.to_lowercase();
        let clash = self
            .users
            .find_one(&Filter::default().eq("email", json!(email)));
        if clash.is_some() {
            return Err(PortError::Conflict(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        let id = self.users.allocate_id();
        let stored = StoredUser {
            user: User {
                id,
                name: new.name,
                email,
                role: new.role,
                addresses: vec![],
                wishlist: vec![],
                preferences: new.preferences,
                created_at: Utc::now(),
            },
            password_hash: new.password_hash,
        };
        self.users.insert(id, &stored);
        Ok(stored.user)
    }

    async fn get_user(&self, id: Uuid) -> PortResult<User> {
        self.users
            .find_by_id(id)
            .map(|stored| stored.user)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", id)))
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let email = email.to_lowercase();
        self.users
            .find_one(&Filter::default().eq("email", json!(email)))
            .map(|stored| UserCredentials {
                user_id: stored.user.id,
                email: stored.user.email,
                password_hash: stored.password_hash,
                role: stored.user.role,
            })
            .ok_or_else(|| PortError::NotFound(format!("User '{}' not found", email)))
    }

    async fn toggle_wishlist(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> PortResult<WishlistChange> {
        let mut added = false;
        let updated = self
            .users
            .update_by_id(user_id, |stored| {
                match stored.user.wishlist.iter().position(|id| *id == product_id) {
                    Some(index) => {
                        stored.user.wishlist.remove(index);
                    }
                    None => {
                        stored.user.wishlist.push(product_id);
                        added = true;
                    }
                }
            })
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        Ok(WishlistChange {
            wishlist: updated.user.wishlist,
            added,
        })
    }

    async fn create_order(&self, new: NewOrder) -> PortResult<Order> {
        let id = self.orders.allocate_id();
        let now = Utc::now();
        let order = Order {
            id,
            user_id: new.user_id,
            items: new.items,
            total: new.total,
            status: OrderStatus::Pending,
            shipping_address: new.shipping_address,
            payment_ref: new.payment_ref,
            payment_error: None,
            paid_at: None,
            tracking: None,
            created_at: now,
            updated_at: now,
        };
        self.orders.insert(id, &order);
        Ok(order)
    }

    async fn list_orders(&self, filter: &OrderFilter) -> PortResult<Vec<Order>> {
        let mut f = Filter::default();
        if let Some(user_id) = filter.user_id {
            f = f.eq("user_id", json!(user_id));
        }
        if let Some(status) = filter.status {
            f = f.eq("status", json!(status));
        }
        let limit = if filter.limit == 0 {
            usize::MAX
        } else {
            filter.limit as usize
        };
        Ok(self
            .orders
            .find(&f, &[("created_at", SortDir::Desc)], 0, limit))
    }

    async fn get_order(&self, id: Uuid) -> PortResult<Order> {
        self.orders
            .find_by_id(id)
            .ok_or_else(|| PortError::NotFound(format!("Order {} not found", id)))
    }

    async fn set_order_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        tracking: Option<String>,
    ) -> PortResult<Order> {
        let order = self
            .orders
            .find_by_id(id)
            .ok_or_else(|| PortError::NotFound(format!("Order {} not found", id)))?;
        if !order.status.can_transition_to(status) {
            return Err(PortError::Invalid(format!(
                "Cannot transition order from {} to {}",
                order.status.as_str(),
                status.as_str()
            )));
        }
        Ok(self
            .orders
            .update_by_id(id, |o| {
                o.status = status;
                if tracking.is_some() {
                    o.tracking = tracking;
                }
                o.updated_at = Utc::now();
            })
            .expect("order existed above"))
    }

    async fn apply_payment_outcome(
        &self,
        payment_ref: &str,
        outcome: PaymentOutcome,
    ) -> PortResult<Option<Order>> {
        let order = self
            .orders
            .find_one(&Filter::default().eq("payment_ref", json!(payment_ref)));
        let Some(order) = order else {
            return Ok(None);
        };
        // Blind overwrite: a replayed callback reapplies the same state.
        Ok(self.orders.update_by_id(order.id, |o| {
            match &outcome {
                PaymentOutcome::Succeeded { paid_at } => {
                    o.status = OrderStatus::Paid;
                    o.paid_at = Some(*paid_at);
                    o.payment_error = None;
                }
                PaymentOutcome::Failed { error } => {
                    o.status = OrderStatus::PaymentFailed;
                    o.payment_error = Some(error.clone());
                }
                PaymentOutcome::Canceled => {
                    o.status = OrderStatus::Canceled;
                }
            }
            o.updated_at = Utc::now();
        }))
    }

    async fn create_review(&self, new: NewReview) -> PortResult<Review> {
        if self.products.find_by_id(new.product_id).is_none() {
            return Err(PortError::NotFound(format!(
                "Product {} not found",
                new.product_id
            )));
        }
        let duplicate = self.reviews.find_one(
            &Filter::default()
                .eq("product_id", json!(new.product_id))
                .eq("user_id", json!(new.user_id)),
        );
        if duplicate.is_some() {
            return Err(PortError::Conflict(
                "You have already reviewed this product".to_string(),
            ));
        }

        let id = self.reviews.allocate_id();
        let now = Utc::now();
        let review = Review {
            id,
            product_id: new.product_id,
            user_id: new.user_id,
            rating: new.rating,
            title: new.title,
            content: new.content,
            images: new.images,
            status: ReviewStatus::Pending,
            helpful: vec![],
            not_helpful: vec![],
            purchase_verified: new.purchase_verified,
            created_at: now,
            updated_at: now,
        };
        self.reviews.insert(id, &review);

        // Aggregate update: every submission counts toward total and the
        // per-star distribution; the average only reflects approved reviews.
        let average = self.approved_average(new.product_id);
        self.products.update_by_id(new.product_id, |p| {
            p.review_stats.record(review.rating);
            p.review_stats.average = average;
            p.updated_at = Utc::now();
        });

        Ok(review)
    }

    async fn list_reviews(&self, filter: &ReviewFilter) -> PortResult<Page<Review>> {
        let mut f = Filter::default()
            .eq("product_id", json!(filter.product_id))
            .eq("status", json!(ReviewStatus::Approved));
        if let Some(rating) = filter.rating {
            f = f.eq("rating", json!(rating));
        }
        if filter.verified_only {
            f = f.eq("purchase_verified", json!(true));
        }

        let total_count = self.reviews.count(&f);
        let skip = (filter.page.saturating_sub(1) as usize) * filter.limit as usize;
        let items = self
            .reviews
            .find(&f, review_sort_spec(filter.sort), skip, filter.limit as usize);
        Ok(Page {
            items,
            pagination: Pagination::compute(filter.page, filter.limit, total_count),
        })
    }

    async fn get_review(&self, id: Uuid) -> PortResult<Review> {
        self.reviews
            .find_by_id(id)
            .ok_or_else(|| PortError::NotFound(format!("Review {} not found", id)))
    }

    async fn set_review_vote(
        &self,
        review_id: Uuid,
        voter: Uuid,
        helpful: bool,
    ) -> PortResult<Review> {
        self.reviews
            .update_by_id(review_id, |r| {
                // Remove-then-add keeps repeat votes idempotent and lets a
                // voter switch sides.
                r.helpful.retain(|id| *id != voter);
                r.not_helpful.retain(|id| *id != voter);
                if helpful {
                    r.helpful.push(voter);
                } else {
                    r.not_helpful.push(voter);
                }
                r.updated_at = Utc::now();
            })
            .ok_or_else(|| PortError::NotFound(format!("Review {} not found", review_id)))
    }

    async fn set_review_status(
        &self,
        review_id: Uuid,
        status: ReviewStatus,
    ) -> PortResult<Review> {
        let review = self
            .reviews
            .update_by_id(review_id, |r| {
                r.status = status;
                r.updated_at = Utc::now();
            })
            .ok_or_else(|| PortError::NotFound(format!("Review {} not found", review_id)))?;
        self.refresh_product_average(review.product_id);
        Ok(review)
    }
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::domain::{Address, LineItem};

    fn new_product(title: &str, price: f64, tags: &[&str]) -> NewProduct {
        NewProduct {
            slug: storefront_core::domain::slug_from_title(title),
            title: title.to_string(),
            description: "A test product.".to_string(),
            price,
            currency: "USD".to_string(),
            images: vec!["https://assets.example.com/a.jpg".to_string()],
            model_urls: vec![],
            variants: vec![],
            stock: 10,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            featured: false,
        }
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Test User".to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$stub".to_string(),
            role: Role::Customer,
            preferences: NotificationPreferences::default(),
        }
    }

    fn new_order(user_id: Uuid, product_id: Uuid, payment_ref: Option<&str>) -> NewOrder {
        NewOrder {
            user_id,
            items: vec![LineItem {
                product_id,
                variant: None,
                quantity: 1,
                price: 10.0,
            }],
            total: 10.0,
            shipping_address: Address {
                name: "Jo Carter".to_string(),
                street: "1 Main St".to_string(),
                city: "Springfield".to_string(),
                state: "IL".to_string(),
                zip_code: "62701".to_string(),
                country: "US".to_string(),
            },
            payment_ref: payment_ref.map(str::to_string),
        }
    }

    fn new_review(product_id: Uuid, user_id: Uuid, rating: u8) -> NewReview {
        NewReview {
            product_id,
            user_id,
            rating,
            title: "Review".to_string(),
            content: "Content".to_string(),
            images: vec![],
            purchase_verified: false,
        }
    }

    #[test]
    fn ids_are_monotonic_and_external_ids_advance_the_counter() {
        let col: MemCollection<serde_json::Value> = MemCollection::new();
        assert_eq!(col.allocate_id(), Uuid::from_u128(1));
        assert_eq!(col.allocate_id(), Uuid::from_u128(2));

        // Inserting a counter-shaped id from outside keeps later
        // allocations ahead of it.
        col.insert(Uuid::from_u128(41), &json!({"x": 1}));
        assert_eq!(col.allocate_id(), Uuid::from_u128(42));
    }

    #[test]
    fn filter_supports_equality_price_range_and_tags() {
        let doc = json!({
            "title": "Crimson Cap",
            "price": 89.99,
            "tags": ["caps", "premium"],
        });

        assert!(Filter::default()
            .eq("title", json!("Crimson Cap"))
            .matches(&doc));
        assert!(!Filter::default().eq("title", json!("Other")).matches(&doc));
        assert!(Filter::default().price_between(50.0, 100.0).matches(&doc));
        assert!(!Filter::default().price_between(100.0, 200.0).matches(&doc));
        assert!(Filter::default()
            .with_tag(Some("premium".to_string()))
            .matches(&doc));
        assert!(!Filter::default()
            .with_tag(Some("beanies".to_string()))
            .matches(&doc));
        // Missing fields never match an equality check.
        assert!(!Filter::default().eq("missing", json!(1)).matches(&doc));
    }

    #[tokio::test]
    async fn listing_sorts_and_paginates() {
        let store = MemStore::new();
        store.create_product(new_product("Cheap", 5.0, &[])).await.unwrap();
        store.create_product(new_product("Mid", 50.0, &[])).await.unwrap();
        store
            .create_product(new_product("Expensive", 500.0, &[]))
            .await
            .unwrap();

        let page = store
            .list_products(&ProductQuery {
                sort: SortKey::PriceAsc,
                limit: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.pagination.total_count, 3);
        assert_eq!(page.pagination.total_pages, 2);
        assert!(page.pagination.has_next);
        let titles: Vec<&str> = page.items.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Cheap", "Mid"]);

        let page2 = store
            .list_products(&ProductQuery {
                sort: SortKey::PriceAsc,
                page: 2,
                limit: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page2.items.len(), 1);
        assert_eq!(page2.items[0].title, "Expensive");
        assert!(page2.pagination.has_prev);
    }

    #[tokio::test]
    async fn inverted_price_bounds_return_an_empty_page() {
        let store = MemStore::new();
        store.create_product(new_product("Cap", 10.0, &[])).await.unwrap();

        let page = store
            .list_products(&ProductQuery {
                min_price: 1000.0,
                max_price: 1.0,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.pagination.total_count, 0);
    }

    #[tokio::test]
    async fn search_matches_title_and_description_substrings() {
        let store = MemStore::new();
        store.create_product(new_product("Crimson Cap", 10.0, &[])).await.unwrap();
        store.create_product(new_product("Beanie", 10.0, &[])).await.unwrap();

        let page = store
            .list_products(&ProductQuery {
                search: Some("crimson".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].title, "Crimson Cap");
    }

    #[tokio::test]
    async fn duplicate_slug_is_a_conflict() {
        let store = MemStore::new();
        store.create_product(new_product("Test Cap", 10.0, &[])).await.unwrap();
        let err = store
            .create_product(new_product("Test Cap", 12.0, &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Conflict(_)));
    }

    #[tokio::test]
    async fn wishlist_toggle_adds_then_removes() {
        let store = MemStore::new();
        let user = store.create_user(new_user("a@example.com")).await.unwrap();
        let product = store
            .create_product(new_product("Cap", 10.0, &[]))
            .await
            .unwrap();

        let change = store.toggle_wishlist(user.id, product.id).await.unwrap();
        assert!(change.added);
        assert_eq!(change.wishlist, vec![product.id]);

        let change = store.toggle_wishlist(user.id, product.id).await.unwrap();
        assert!(!change.added);
        assert!(change.wishlist.is_empty());
    }

    #[tokio::test]
    async fn payment_outcome_is_a_blind_overwrite_matched_by_ref() {
        let store = MemStore::new();
        let user = store.create_user(new_user("a@example.com")).await.unwrap();
        let product = store
            .create_product(new_product("Cap", 10.0, &[]))
            .await
            .unwrap();
        let order = store
            .create_order(new_order(user.id, product.id, Some("pi_123")))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);

        let updated = store
            .apply_payment_outcome(
                "pi_123",
                PaymentOutcome::Succeeded { paid_at: Utc::now() },
            )
            .await
            .unwrap()
            .expect("order matched");
        assert_eq!(updated.status, OrderStatus::Paid);
        assert!(updated.paid_at.is_some());

        // Replay reapplies the same state; no matching ref is dropped.
        let replayed = store
            .apply_payment_outcome(
                "pi_123",
                PaymentOutcome::Succeeded { paid_at: Utc::now() },
            )
            .await
            .unwrap()
            .expect("order matched");
        assert_eq!(replayed.status, OrderStatus::Paid);

        let missing = store
            .apply_payment_outcome(
                "pi_missing",
                PaymentOutcome::Succeeded { paid_at: Utc::now() },
            )
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn admin_transition_respects_the_lifecycle() {
        let store = MemStore::new();
        let user = store.create_user(new_user("a@example.com")).await.unwrap();
        let product = store
            .create_product(new_product("Cap", 10.0, &[]))
            .await
            .unwrap();
        let order = store
            .create_order(new_order(user.id, product.id, Some("pi_1")))
            .await
            .unwrap();

        // pending -> shipped skips paid and is rejected.
        let err = store
            .set_order_status(order.id, OrderStatus::Shipped, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Invalid(_)));

        store
            .apply_payment_outcome("pi_1", PaymentOutcome::Succeeded { paid_at: Utc::now() })
            .await
            .unwrap();
        let shipped = store
            .set_order_status(order.id, OrderStatus::Shipped, Some("TRACK-9".to_string()))
            .await
            .unwrap();
        assert_eq!(shipped.status, OrderStatus::Shipped);
        assert_eq!(shipped.tracking.as_deref(), Some("TRACK-9"));
    }

    #[tokio::test]
    async fn one_review_per_user_and_product() {
        let store = MemStore::new();
        let user = store.create_user(new_user("a@example.com")).await.unwrap();
        let product = store
            .create_product(new_product("Cap", 10.0, &[]))
            .await
            .unwrap();

        store
            .create_review(new_review(product.id, user.id, 5))
            .await
            .unwrap();
        let err = store
            .create_review(new_review(product.id, user.id, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Conflict(_)));
    }

    #[tokio::test]
    async fn pending_reviews_count_in_distribution_but_not_average() {
        let store = MemStore::new();
        let reviewer = store.create_user(new_user("a@example.com")).await.unwrap();
        let product = store
            .create_product(new_product("Cap", 10.0, &[]))
            .await
            .unwrap();

        let review = store
            .create_review(new_review(product.id, reviewer.id, 4))
            .await
            .unwrap();
        let product_after = store.get_product(product.id).await.unwrap();
        assert_eq!(product_after.review_stats.total, 1);
        assert_eq!(product_after.review_stats.distribution[3], 1);
        // Still pending: the displayed average must not move.
        assert_eq!(product_after.review_stats.average, 0.0);

        store
            .set_review_status(review.id, ReviewStatus::Approved)
            .await
            .unwrap();
        let product_approved = store.get_product(product.id).await.unwrap();
        assert_eq!(product_approved.review_stats.average, 4.0);

        // Listing only surfaces approved reviews.
        let page = store
            .list_reviews(&ReviewFilter {
                product_id: product.id,
                rating: None,
                verified_only: false,
                sort: ReviewSort::Newest,
                page: 1,
                limit: 10,
            })
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn helpfulness_votes_are_idempotent_per_user() {
        let store = MemStore::new();
        let reviewer = store.create_user(new_user("a@example.com")).await.unwrap();
        let voter = store.create_user(new_user("b@example.com")).await.unwrap();
        let product = store
            .create_product(new_product("Cap", 10.0, &[]))
            .await
            .unwrap();
        let review = store
            .create_review(new_review(product.id, reviewer.id, 5))
            .await
            .unwrap();

        let first = store.set_review_vote(review.id, voter.id, true).await.unwrap();
        assert_eq!(first.helpful, vec![voter.id]);

        // Voting helpful twice leaves the voter present exactly once.
        let second = store.set_review_vote(review.id, voter.id, true).await.unwrap();
        assert_eq!(second.helpful, vec![voter.id]);
        assert!(second.not_helpful.is_empty());

        // Switching sides moves the voter between the sets.
        let switched = store.set_review_vote(review.id, voter.id, false).await.unwrap();
        assert!(switched.helpful.is_empty());
        assert_eq!(switched.not_helpful, vec![voter.id]);
    }
}
