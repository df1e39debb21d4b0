//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - POS search (name, barcode or SKU substring)
//! - Filtered and sorted product listing
//! - CRUD with the initial inventory row
//!
//! ## Barcodes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every product gets a barcode, unique within the shop.                 │
//! │                                                                         │
//! │  entered barcode (or SKU when blank) ──► "NB-01"                        │
//! │      taken? ──► "NB-01(1)" ──► taken? ──► "NB-01(2)" ──► ...            │
//! │                                                                         │
//! │  On edit an unchanged barcode is kept as-is.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use kirana_core::validation::{validate_name, validate_price_paisa, validate_sku};
use kirana_core::{
    AdjustmentType, CategoryType, Money, ProductWithStock, ValidationError, DEFAULT_REORDER_LEVEL,
    DEFAULT_UNIT, POS_SEARCH_LIMIT, POS_SEARCH_MIN_CHARS,
};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::inventory::record_adjustment_in;
use crate::repository::{contains_pattern, non_blank, push_contains_any};

const PRODUCT_SELECT: &str = "SELECT p.id, p.sku, p.barcode, p.name, p.category_id, \
     p.description, p.supplier, p.book_name, p.book_class, p.book_publication, p.unit, \
     p.cost_price_paisa, p.selling_price_paisa, p.wholesale_price_paisa, p.reorder_level, \
     p.is_active, p.created_at, p.updated_at, \
     c.name AS category_name, COALESCE(i.quantity_in_stock, 0) AS quantity_in_stock \
     FROM products p \
     LEFT JOIN categories c ON c.id = p.category_id \
     LEFT JOIN inventory i ON i.product_id = p.id";

const SKU_TAKEN: &str = "SKU already exists. Please use a different SKU.";

// =============================================================================
// Inputs and Filters
// =============================================================================

/// Fields of a product form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProductInput {
    pub sku: String,
    pub name: String,
    /// Required on create.
    pub category_id: Option<i64>,
    pub barcode: Option<String>,
    pub description: Option<String>,
    pub supplier: Option<String>,
    pub book_name: Option<String>,
    pub book_class: Option<String>,
    pub book_publication: Option<String>,
    /// Defaults to `piece`.
    pub unit: Option<String>,
    pub cost_price_paisa: i64,
    pub selling_price_paisa: i64,
    pub wholesale_price_paisa: Option<i64>,
    /// Defaults to 10.
    pub reorder_level: Option<i64>,
}

/// Column matched by the product list search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSearch {
    #[default]
    Name,
    Sku,
    Barcode,
    Category,
    /// Exact selling price in rupees.
    Price,
    All,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    NameAsc,
    NameDesc,
    PriceAsc,
    PriceDesc,
    StockAsc,
    StockDesc,
    Newest,
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub query: Option<String>,
    pub filter_by: ProductSearch,
    pub category_type: Option<CategoryType>,
    pub sort_by: ProductSort,
}

/// A POS search hit.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PosProduct {
    pub id: i64,
    pub name: String,
    pub sku: String,
    pub barcode: Option<String>,
    pub price: Money,
    pub stock: i64,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = shop.products();
/// let hits = repo.search_pos("note").await?;
/// let product = repo.get(hits[0].id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Searches products for the POS screen.
    ///
    /// Fewer than two characters return nothing. Matches name, barcode or
    /// SKU anywhere, case-insensitively, at most ten hits.
    pub async fn search_pos(&self, query: &str) -> DbResult<Vec<PosProduct>> {
        let query = query.trim();
        if query.chars().count() < POS_SEARCH_MIN_CHARS {
            return Ok(Vec::new());
        }

        debug!(query = %query, "Searching products");

        let hits = sqlx::query_as::<_, PosProduct>(
            "SELECT p.id, p.name, p.sku, p.barcode, p.selling_price_paisa AS price, \
             COALESCE(i.quantity_in_stock, 0) AS stock \
             FROM products p LEFT JOIN inventory i ON i.product_id = p.id \
             WHERE p.name LIKE ?1 ESCAPE '\\' OR p.barcode LIKE ?1 ESCAPE '\\' \
             OR p.sku LIKE ?1 ESCAPE '\\' \
             ORDER BY p.name LIMIT ?2",
        )
        .bind(contains_pattern(query))
        .bind(POS_SEARCH_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = hits.len(), "Search returned products");
        Ok(hits)
    }

    pub async fn get(&self, id: i64) -> DbResult<ProductWithStock> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.id = ?1");
        sqlx::query_as::<_, ProductWithStock>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    pub async fn find_by_sku(&self, sku: &str) -> DbResult<Option<ProductWithStock>> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.sku = ?1");
        let product = sqlx::query_as::<_, ProductWithStock>(&sql)
            .bind(sku.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Lists products with the product list filters.
    pub async fn list(&self, filter: &ProductFilter) -> DbResult<Vec<ProductWithStock>> {
        let mut qb = QueryBuilder::<Sqlite>::new(PRODUCT_SELECT);
        qb.push(" WHERE 1 = 1");

        if let Some(kind) = filter.category_type {
            qb.push(" AND c.category_type = ").push_bind(kind);
        }

        if let Some(q) = non_blank(filter.query.as_deref()) {
            if filter.filter_by == ProductSearch::Price {
                match q.parse::<Money>() {
                    Ok(price) => {
                        qb.push(" AND p.selling_price_paisa = ").push_bind(price.paisa());
                    }
                    // Not a price: nothing can match
                    Err(_) => return Ok(Vec::new()),
                }
            } else {
                let columns: &[&str] = match filter.filter_by {
                    ProductSearch::Sku => &["p.sku"],
                    ProductSearch::Barcode => &["p.barcode"],
                    ProductSearch::Category => &["c.name"],
                    ProductSearch::All => &["p.name", "p.sku", "p.barcode", "c.name"],
                    ProductSearch::Name | ProductSearch::Price => &["p.name"],
                };
                push_contains_any(&mut qb, columns, &q);
            }
        }

        qb.push(match filter.sort_by {
            ProductSort::NameAsc => " ORDER BY p.name",
            ProductSort::NameDesc => " ORDER BY p.name DESC",
            ProductSort::PriceAsc => " ORDER BY p.selling_price_paisa, p.name",
            ProductSort::PriceDesc => " ORDER BY p.selling_price_paisa DESC, p.name",
            ProductSort::StockAsc => " ORDER BY quantity_in_stock, p.name",
            ProductSort::StockDesc => " ORDER BY quantity_in_stock DESC, p.name",
            ProductSort::Newest => " ORDER BY p.created_at DESC, p.id DESC",
        });

        let products = qb
            .build_query_as::<ProductWithStock>()
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// Adds a product and its inventory row.
    ///
    /// ## Errors
    /// - "Please select a category." / "Selected category is invalid."
    /// - "SKU already exists. Please use a different SKU."
    /// - validation errors for SKU, name and prices
    pub async fn create(
        &self,
        input: &ProductInput,
        initial_quantity: i64,
        created_by: Option<i64>,
    ) -> DbResult<ProductWithStock> {
        let category_id = input
            .category_id
            .ok_or_else(|| ValidationError::rule("Please select a category."))?;
        validate_input(input)?;
        let sku = input.sku.trim();

        let mut tx = self.pool.begin().await?;

        let category_exists: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE id = ?1")
                .bind(category_id)
                .fetch_one(&mut *tx)
                .await?;
        if category_exists == 0 {
            return Err(ValidationError::rule("Selected category is invalid.").into());
        }

        let base = non_blank(input.barcode.as_deref()).unwrap_or_else(|| sku.to_string());
        let barcode = unique_barcode_in(&mut tx, &base, None).await?;
        let now = Utc::now();

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO products (sku, barcode, name, category_id, description, supplier, \
             book_name, book_class, book_publication, unit, cost_price_paisa, \
             selling_price_paisa, wholesale_price_paisa, reorder_level, is_active, \
             created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, 1, ?15, ?15) \
             RETURNING id",
        )
        .bind(sku)
        .bind(&barcode)
        .bind(input.name.trim())
        .bind(category_id)
        .bind(non_blank(input.description.as_deref()))
        .bind(non_blank(input.supplier.as_deref()))
        .bind(non_blank(input.book_name.as_deref()))
        .bind(non_blank(input.book_class.as_deref()))
        .bind(non_blank(input.book_publication.as_deref()))
        .bind(non_blank(input.unit.as_deref()).unwrap_or_else(|| DEFAULT_UNIT.to_string()))
        .bind(input.cost_price_paisa)
        .bind(input.selling_price_paisa)
        .bind(input.wholesale_price_paisa)
        .bind(input.reorder_level.unwrap_or(DEFAULT_REORDER_LEVEL))
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(sku_taken)?;

        sqlx::query(
            "INSERT INTO inventory (product_id, quantity_in_stock, quantity_reserved, last_restocked_at, updated_at) \
             VALUES (?1, ?2, 0, ?3, ?4)",
        )
        .bind(id)
        .bind(initial_quantity)
        .bind((initial_quantity > 0).then_some(now))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if initial_quantity != 0 {
            record_adjustment_in(
                &mut tx,
                id,
                AdjustmentType::Purchase,
                initial_quantity,
                Some("Initial stock"),
                created_by,
                now,
            )
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(id, sku = %sku, barcode = %barcode, "Product created");
        self.get(id).await
    }

    /// Edits a product. A blank barcode falls back to the current barcode,
    /// then the SKU; a changed barcode is made unique.
    pub async fn update(&self, id: i64, input: &ProductInput) -> DbResult<ProductWithStock> {
        validate_input(input)?;
        let current = self.get(id).await?.product;
        let sku = input.sku.trim();

        let mut tx = self.pool.begin().await?;

        let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE sku = ?1 AND id <> ?2")
            .bind(sku)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if taken > 0 {
            return Err(ValidationError::rule(SKU_TAKEN).into());
        }

        if let Some(category_id) = input.category_id {
            let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE id = ?1")
                .bind(category_id)
                .fetch_one(&mut *tx)
                .await?;
            if exists == 0 {
                return Err(ValidationError::rule("Selected category is invalid.").into());
            }
        }

        let requested = non_blank(input.barcode.as_deref())
            .or_else(|| current.barcode.clone())
            .unwrap_or_else(|| sku.to_string());
        let barcode = if Some(&requested) == current.barcode.as_ref() {
            requested
        } else {
            unique_barcode_in(&mut tx, &requested, Some(id)).await?
        };

        sqlx::query(
            "UPDATE products SET sku = ?1, barcode = ?2, name = ?3, category_id = ?4, \
             description = ?5, supplier = ?6, book_name = ?7, book_class = ?8, \
             book_publication = ?9, unit = ?10, cost_price_paisa = ?11, \
             selling_price_paisa = ?12, wholesale_price_paisa = ?13, reorder_level = ?14, \
             updated_at = ?15 WHERE id = ?16",
        )
        .bind(sku)
        .bind(&barcode)
        .bind(input.name.trim())
        .bind(input.category_id.or(current.category_id))
        .bind(non_blank(input.description.as_deref()))
        .bind(non_blank(input.supplier.as_deref()))
        .bind(non_blank(input.book_name.as_deref()))
        .bind(non_blank(input.book_class.as_deref()))
        .bind(non_blank(input.book_publication.as_deref()))
        .bind(non_blank(input.unit.as_deref()).unwrap_or(current.unit))
        .bind(input.cost_price_paisa)
        .bind(input.selling_price_paisa)
        .bind(input.wholesale_price_paisa)
        .bind(input.reorder_level.unwrap_or(current.reorder_level))
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(sku_taken)?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        self.get(id).await
    }

    /// Deletes a product and its inventory.
    ///
    /// ## Errors
    /// `DbError::ForeignKeyViolation` when the product appears on a sale.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        debug!(id, "Product deleted");
        Ok(())
    }
}

fn validate_input(input: &ProductInput) -> DbResult<()> {
    validate_sku(&input.sku)?;
    validate_name("name", input.name.trim(), 200)?;
    validate_price_paisa("cost price", input.cost_price_paisa)?;
    validate_price_paisa("selling price", input.selling_price_paisa)?;
    if let Some(wholesale) = input.wholesale_price_paisa {
        validate_price_paisa("wholesale price", wholesale)?;
    }
    Ok(())
}

fn sku_taken(err: sqlx::Error) -> DbError {
    match DbError::from(err) {
        e if e.is_unique_violation_on("products.sku") => ValidationError::rule(SKU_TAKEN).into(),
        other => other,
    }
}

/// First free barcode among `base`, `base(1)`, `base(2)`, ...
async fn unique_barcode_in(
    conn: &mut SqliteConnection,
    base: &str,
    exclude_id: Option<i64>,
) -> DbResult<String> {
    let base = base.trim();
    let mut candidate = base.to_string();
    let mut counter = 1;

    loop {
        let taken: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE barcode = ?1 AND id <> COALESCE(?2, -1)",
        )
        .bind(&candidate)
        .bind(exclude_id)
        .fetch_one(&mut *conn)
        .await?;

        if taken == 0 {
            return Ok(candidate);
        }
        candidate = format!("{}({})", base, counter);
        counter += 1;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
