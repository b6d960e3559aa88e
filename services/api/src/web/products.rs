//! services/api/src/web/products.rs
//!
//! Catalog endpoints: the public listing/lookup and the admin
//! create/update/delete operations.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::middleware::AuthUser;
use crate::web::state::AppState;
use storefront_core::domain::{slug_from_title, Product, Role, Variant};
use storefront_core::ports::{
    NewProduct, Pagination, PortError, ProductPatch, ProductQuery, SortKey,
};

// Image URLs are stored as given (relative asset paths included); 3D model
// URLs must at least point at a GLB/GLTF file.
static MODEL_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(glb|gltf)$").expect("model URL pattern compiles"));

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// Catalog listing parameters. Aliases keep older storefront clients that
/// send camelCase working.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ListProductsParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(alias = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(alias = "minPrice")]
    pub min_price: Option<f64>,
    #[serde(alias = "maxPrice")]
    pub max_price: Option<f64>,
    pub category: Option<String>,
    pub featured: Option<bool>,
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ProductListResponse {
    pub products: Vec<Product>,
    pub pagination: Pagination,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub currency: Option<String>,
    pub images: Vec<String>,
    #[serde(default)]
    pub model_urls: Vec<String>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub featured: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateProductRequest {
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

//=========================================================================================
// Validation
//=========================================================================================

fn validate_asset_urls(model_urls: &[String]) -> Result<(), String> {
    if model_urls.iter().any(|url| !MODEL_URL_RE.is_match(url)) {
        return Err("Model URL must be a valid GLB/GLTF file URL".to_string());
    }
    Ok(())
}

fn validate_new_product(req: &CreateProductRequest) -> Result<(), String> {
    if req.title.trim().is_empty() {
        return Err("Product title is required".to_string());
    }
    if req.description.trim().is_empty() {
        return Err("Product description is required".to_string());
    }
    if req.price <= 0.0 {
        return Err("Valid product price is required".to_string());
    }
    if req.images.is_empty() {
        return Err("At least one product image is required".to_string());
    }
    if req.stock < 0 {
        return Err("Valid stock quantity is required".to_string());
    }
    validate_asset_urls(&req.model_urls)
}

fn require_admin(auth: &AuthUser) -> Result<(), (StatusCode, String)> {
    if auth.role != Role::Admin {
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized".to_string()));
    }
    Ok(())
}

//=========================================================================================
// Public Handlers
//=========================================================================================

/// List catalog products with filtering, sorting and pagination.
#[utoipa::path(
    get,
    path = "/products",
    params(
        ("page" = Option<u32>, Query, description = "1-based page number"),
        ("limit" = Option<u32>, Query, description = "Page size"),
        ("sort_by" = Option<String>, Query, description = "newest | price-low | price-high | name | popularity"),
        ("min_price" = Option<f64>, Query, description = "Inclusive lower price bound"),
        ("max_price" = Option<f64>, Query, description = "Inclusive upper price bound"),
        ("category" = Option<String>, Query, description = "Tag to filter by"),
        ("featured" = Option<bool>, Query, description = "Only featured products"),
        ("search" = Option<String>, Query, description = "Substring match on title/description")
    ),
    responses(
        (status = 200, description = "One page of products", body = ProductListResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_products_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListProductsParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let defaults = ProductQuery::default();
    let query = ProductQuery {
        page: params.page.unwrap_or(defaults.page).max(1),
        limit: params.limit.unwrap_or(defaults.limit).clamp(1, 100),
        sort: params
            .sort_by
            .as_deref()
            .map(SortKey::parse)
            .unwrap_or_default(),
        min_price: params.min_price.unwrap_or(defaults.min_price),
        max_price: params.max_price.unwrap_or(defaults.max_price),
        category: params.category.filter(|c| !c.is_empty()),
        featured: params.featured.unwrap_or(false),
        search: params.search,
    };

    let page = state.store.list_products(&query).await.map_err(|e| {
        error!("Error fetching products: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to fetch products".to_string(),
        )
    })?;

    Ok(Json(ProductListResponse {
        products: page.items,
        pagination: page.pagination,
    }))
}

/// Fetch a single product by id or slug.
#[utoipa::path(
    get,
    path = "/products/{id_or_slug}",
    params(("id_or_slug" = String, Path, description = "Product UUID or slug")),
    responses(
        (status = 200, description = "The product", body = Product),
        (status = 404, description = "Product not found")
    )
)]
pub async fn get_product_handler(
    State(state): State<Arc<AppState>>,
    Path(id_or_slug): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let result = match Uuid::parse_str(&id_or_slug) {
        Ok(id) => state.store.get_product(id).await,
        Err(_) => state.store.get_product_by_slug(&id_or_slug).await,
    };

    match result {
        Ok(product) => Ok(Json(product)),
        Err(PortError::NotFound(_)) => {
            Err((StatusCode::NOT_FOUND, "Product not found".to_string()))
        }
        Err(e) => {
            error!("Error fetching product: {:?}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch product".to_string(),
            ))
        }
    }
}

//=========================================================================================
// Admin Handlers
//=========================================================================================

/// Create a product. Admin only; the slug is derived from the title.
#[utoipa::path(
    post,
    path = "/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = Product),
        (status = 400, description = "Invalid payload or duplicate slug"),
        (status = 401, description = "Not an admin")
    )
)]
pub async fn create_product_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_admin(&auth)?;
    validate_new_product(&req).map_err(|msg| (StatusCode::BAD_REQUEST, msg))?;

    let slug = slug_from_title(&req.title);
    if slug.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Product title is required".to_string(),
        ));
    }

    let product = state
        .store
        .create_product(NewProduct {
            slug,
            title: req.title.trim().to_string(),
            description: req.description,
            price: req.price,
            currency: req.currency.unwrap_or_else(|| "USD".to_string()),
            images: req.images,
            model_urls: req.model_urls,
            variants: req.variants,
            stock: req.stock,
            tags: req.tags,
            featured: req.featured,
        })
        .await
        .map_err(|e| match e {
            PortError::Conflict(_) => (
                StatusCode::BAD_REQUEST,
                "Product with this slug already exists".to_string(),
            ),
            e => {
                error!("Error creating product: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to create product".to_string(),
                )
            }
        })?;

    Ok((StatusCode::CREATED, Json(product)))
}

/// Update a product. Admin only; the slug is re-derived when the title
/// changes.
#[utoipa::path(
    put,
    path = "/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = Product),
        (status = 400, description = "Invalid payload or duplicate slug"),
        (status = 401, description = "Not an admin"),
        (status = 404, description = "Product not found")
    )
)]
pub async fn update_product_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_admin(&auth)?;

    validate_asset_urls(req.model_urls.as_deref().unwrap_or(&[]))
        .map_err(|msg| (StatusCode::BAD_REQUEST, msg))?;

    let slug = match &req.title {
        Some(title) => {
            let slug = slug_from_title(title);
            if slug.is_empty() {
                return Err((
                    StatusCode::BAD_REQUEST,
                    "Product title is required".to_string(),
                ));
            }
            Some(slug)
        }
        None => None,
    };

    let product = state
        .store
        .update_product(
            id,
            ProductPatch {
                slug,
                title: req.title,
                description: req.description,
                price: req.price,
                currency: req.currency,
                images: req.images,
                model_urls: req.model_urls,
                variants: req.variants,
                stock: req.stock,
                tags: req.tags,
                featured: req.featured,
            },
        )
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => (StatusCode::NOT_FOUND, "Product not found".to_string()),
            PortError::Conflict(_) => (
                StatusCode::BAD_REQUEST,
                "Product with this slug already exists".to_string(),
            ),
            e => {
                error!("Error updating product: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to update product".to_string(),
                )
            }
        })?;

    Ok(Json(product))
}

/// Delete a product. Admin only.
#[utoipa::path(
    delete,
    path = "/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 401, description = "Not an admin"),
        (status = 404, description = "Product not found")
    )
)]
pub async fn delete_product_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_admin(&auth)?;

    state.store.delete_product(id).await.map_err(|e| match e {
        PortError::NotFound(_) => (StatusCode::NOT_FOUND, "Product not found".to_string()),
        e => {
            error!("Error deleting product: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to delete product".to_string(),
            )
        }
    })?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_url_validation() {
        assert!(validate_asset_urls(&[
            "https://assets.example.com/a.glb".to_string(),
            "/models/local.gltf".to_string(),
        ])
        .is_ok());

        assert_eq!(
            validate_asset_urls(&["https://assets.example.com/a.png".to_string()]).unwrap_err(),
            "Model URL must be a valid GLB/GLTF file URL"
        );
    }
}
