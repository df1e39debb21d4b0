//! Categories, products and stock.

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use kirana_core::{
    AdjustmentType, Category, CategoryType, Inventory, InventoryLine, ProductWithStock,
    StockAdjustment,
};
use kirana_db::{
    CategoryInput, LowStockFilter, LowStockSearch, LowStockSort, ProductFilter, ProductInput,
    ProductSearch, ProductSort, StockChange,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::middleware::tenant::Shop;
use crate::routes::{empty_as_none, Message};
use crate::state::SharedState;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/inventory/categories", get(list_categories).post(create_category))
        .route(
            "/inventory/categories/{id}",
            get(category_detail).put(update_category).delete(delete_category),
        )
        .route("/inventory/products", get(list_products).post(create_product))
        .route(
            "/inventory/products/{id}",
            get(product_detail).put(update_product).delete(delete_product),
        )
        .route("/inventory/stock", get(list_stock))
        .route("/inventory/stock/{product_id}", get(stock_detail))
        .route("/inventory/stock/{product_id}/adjust", post(adjust_stock))
        .route("/inventory/low-stock", get(low_stock))
}

// =============================================================================
// Categories
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CategoryQuery {
    pub category_type: Option<CategoryType>,
}

async fn list_categories(
    shop: Shop,
    Query(query): Query<CategoryQuery>,
) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(shop.db.categories().list(query.category_type).await?))
}

async fn create_category(
    shop: Shop,
    Json(input): Json<CategoryInput>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let category = shop.db.categories().create(&input).await?;
    info!(tenant = %shop.tenant.code, category = %category.name, "Category added");
    Ok((StatusCode::CREATED, Json(category)))
}

async fn category_detail(shop: Shop, Path(id): Path<i64>) -> Result<Json<Category>, ApiError> {
    Ok(Json(shop.db.categories().get(id).await?))
}

async fn update_category(
    shop: Shop,
    Path(id): Path<i64>,
    Json(input): Json<CategoryInput>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(shop.db.categories().update(id, &input).await?))
}

async fn delete_category(shop: Shop, Path(id): Path<i64>) -> Result<Json<Message>, ApiError> {
    shop.db.categories().delete(id).await?;
    Ok(Json(Message::new("Category deleted successfully.")))
}

// =============================================================================
// Products
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProductQuery {
    #[serde(deserialize_with = "empty_as_none")]
    pub q: Option<String>,
    pub filter_by: ProductSearch,
    pub category_type: Option<CategoryType>,
    pub sort_by: ProductSort,
}

impl From<ProductQuery> for ProductFilter {
    fn from(query: ProductQuery) -> Self {
        ProductFilter {
            query: query.q,
            filter_by: query.filter_by,
            category_type: query.category_type,
            sort_by: query.sort_by,
        }
    }
}

/// The add-product form: product fields plus opening stock.
#[derive(Debug, Deserialize)]
pub struct NewProduct {
    #[serde(flatten)]
    pub product: ProductInput,
    #[serde(default)]
    pub initial_quantity: i64,
}

async fn list_products(
    shop: Shop,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<ProductWithStock>>, ApiError> {
    Ok(Json(shop.db.products().list(&query.into()).await?))
}

async fn create_product(
    shop: Shop,
    Json(form): Json<NewProduct>,
) -> Result<(StatusCode, Json<ProductWithStock>), ApiError> {
    let product = shop
        .db
        .products()
        .create(&form.product, form.initial_quantity, shop.actor())
        .await?;
    info!(
        tenant = %shop.tenant.code,
        sku = %product.product.sku,
        quantity = product.quantity_in_stock,
        "Product added"
    );
    Ok((StatusCode::CREATED, Json(product)))
}

async fn product_detail(
    shop: Shop,
    Path(id): Path<i64>,
) -> Result<Json<ProductWithStock>, ApiError> {
    Ok(Json(shop.db.products().get(id).await?))
}

async fn update_product(
    shop: Shop,
    Path(id): Path<i64>,
    Json(input): Json<ProductInput>,
) -> Result<Json<ProductWithStock>, ApiError> {
    Ok(Json(shop.db.products().update(id, &input).await?))
}

async fn delete_product(shop: Shop, Path(id): Path<i64>) -> Result<Json<Message>, ApiError> {
    shop.db.products().delete(id).await?;
    info!(tenant = %shop.tenant.code, product_id = id, "Product deleted");
    Ok(Json(Message::new("Product deleted successfully.")))
}

// =============================================================================
// Stock
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StockQuery {
    #[serde(deserialize_with = "empty_as_none")]
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StockDetail {
    pub line: InventoryLine,
    pub adjustments: Vec<StockAdjustment>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStock {
    #[serde(default = "default_adjustment_type")]
    pub adjustment_type: AdjustmentType,
    /// Signed change to the stock level.
    pub quantity: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_adjustment_type() -> AdjustmentType {
    AdjustmentType::Adjustment
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LowStockQuery {
    #[serde(deserialize_with = "empty_as_none")]
    pub q: Option<String>,
    pub search_by: LowStockSearch,
    pub sort_by: LowStockSort,
}

impl From<LowStockQuery> for LowStockFilter {
    fn from(query: LowStockQuery) -> Self {
        LowStockFilter {
            query: query.q,
            search_by: query.search_by,
            sort_by: query.sort_by,
        }
    }
}

async fn list_stock(
    shop: Shop,
    Query(query): Query<StockQuery>,
) -> Result<Json<Vec<InventoryLine>>, ApiError> {
    Ok(Json(shop.db.inventory().list(query.q.as_deref()).await?))
}

async fn stock_detail(
    shop: Shop,
    Path(product_id): Path<i64>,
) -> Result<Json<StockDetail>, ApiError> {
    let inventory = shop.db.inventory();
    Ok(Json(StockDetail {
        line: inventory.line(product_id).await?,
        adjustments: inventory.adjustments(product_id).await?,
    }))
}

async fn adjust_stock(
    shop: Shop,
    Path(product_id): Path<i64>,
    Json(req): Json<AdjustStock>,
) -> Result<Json<Inventory>, ApiError> {
    let change = StockChange {
        adjustment_type: req.adjustment_type,
        quantity: req.quantity,
        notes: req.notes,
        adjusted_by: shop.actor(),
    };
    let inventory = shop.db.inventory().adjust(product_id, &change).await?;
    info!(
        tenant = %shop.tenant.code,
        product_id,
        change = change.quantity,
        stock = inventory.quantity_in_stock,
        "Stock adjusted"
    );
    Ok(Json(inventory))
}

async fn low_stock(
    shop: Shop,
    Query(query): Query<LowStockQuery>,
) -> Result<Json<Vec<InventoryLine>>, ApiError> {
    Ok(Json(shop.db.inventory().low_stock(&query.into()).await?))
}
