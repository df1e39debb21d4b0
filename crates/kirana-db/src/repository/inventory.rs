//! # Inventory Repository
//!
//! Stock levels and the stock adjustment log.
//!
//! ## Stock Changes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  manual adjust ─┐                                                       │
//! │  checkout ──────┼──► ensure_row_in ──► apply_delta_in ──► UPDATE        │
//! │  return/cancel ─┤    (INSERT OR IGNORE   quantity_in_stock =            │
//! │  delete sale ───┘     a zero row)        quantity_in_stock + delta      │
//! │                                                                         │
//! │  Deltas are relative, so two checkouts on the same product never       │
//! │  overwrite each other's decrement.                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use kirana_core::{AdjustmentType, Inventory, InventoryLine, StockAdjustment, ValidationError};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::{non_blank, push_contains_any};

const LINE_SELECT: &str = "SELECT p.id AS product_id, p.name AS product_name, p.sku, \
     c.name AS category_name, COALESCE(i.quantity_in_stock, 0) AS quantity_in_stock, \
     COALESCE(i.quantity_reserved, 0) AS quantity_reserved, p.reorder_level, \
     p.selling_price_paisa \
     FROM products p \
     LEFT JOIN categories c ON c.id = p.category_id \
     LEFT JOIN inventory i ON i.product_id = p.id";

const INVENTORY_COLUMNS: &str =
    "product_id, quantity_in_stock, quantity_reserved, last_restocked_at, updated_at";

/// A manual stock change.
#[derive(Debug, Clone)]
pub struct StockChange {
    pub adjustment_type: AdjustmentType,
    /// Signed; added to `quantity_in_stock`.
    pub quantity: i64,
    pub notes: Option<String>,
    pub adjusted_by: Option<i64>,
}

/// Column searched by the low stock report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LowStockSearch {
    #[default]
    Name,
    Sku,
    Barcode,
    Category,
    All,
}

/// Ordering of the low stock report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LowStockSort {
    #[default]
    StockAsc,
    StockDesc,
    ReorderAsc,
    ReorderDesc,
    Name,
}

/// Filter of the low stock report.
#[derive(Debug, Clone, Default)]
pub struct LowStockFilter {
    pub query: Option<String>,
    pub search_by: LowStockSearch,
    pub sort_by: LowStockSort,
}

#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Stock of every product, optionally filtered by name or SKU.
    pub async fn list(&self, query: Option<&str>) -> DbResult<Vec<InventoryLine>> {
        let mut qb = QueryBuilder::<Sqlite>::new(LINE_SELECT);
        qb.push(" WHERE 1 = 1");
        if let Some(q) = non_blank(query) {
            push_contains_any(&mut qb, &["p.name", "p.sku"], &q);
        }
        qb.push(" ORDER BY p.name");

        let lines = qb
            .build_query_as::<InventoryLine>()
            .fetch_all(&self.pool)
            .await?;
        Ok(lines)
    }

    /// Stock line of one product.
    pub async fn line(&self, product_id: i64) -> DbResult<InventoryLine> {
        let sql = format!("{LINE_SELECT} WHERE p.id = ?1");
        sqlx::query_as::<_, InventoryLine>(&sql)
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Product", product_id))
    }

    /// Raw inventory row, if one exists.
    pub async fn get(&self, product_id: i64) -> DbResult<Option<Inventory>> {
        let sql = format!("SELECT {INVENTORY_COLUMNS} FROM inventory WHERE product_id = ?1");
        let row = sqlx::query_as::<_, Inventory>(&sql)
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Adjustment history of a product, newest first.
    pub async fn adjustments(&self, product_id: i64) -> DbResult<Vec<StockAdjustment>> {
        let rows = sqlx::query_as::<_, StockAdjustment>(
            "SELECT id, product_id, adjustment_type, quantity, notes, adjusted_by, created_at \
             FROM stock_adjustments WHERE product_id = ?1 ORDER BY created_at DESC, id DESC",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Applies a manual stock change and logs it.
    ///
    /// ## Errors
    /// - "Adjustment quantity cannot be zero."
    /// - `DbError::NotFound` for an unknown product
    pub async fn adjust(&self, product_id: i64, change: &StockChange) -> DbResult<Inventory> {
        if change.quantity == 0 {
            return Err(ValidationError::rule("Adjustment quantity cannot be zero.").into());
        }

        let mut tx = self.pool.begin().await?;

        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_one(&mut *tx)
            .await?;
        if exists == 0 {
            return Err(DbError::not_found("Product", product_id));
        }

        let now = Utc::now();
        ensure_row_in(&mut tx, product_id, now).await?;
        apply_delta_in(&mut tx, product_id, change.quantity, now).await?;
        if change.adjustment_type == AdjustmentType::Purchase && change.quantity > 0 {
            sqlx::query("UPDATE inventory SET last_restocked_at = ?1 WHERE product_id = ?2")
                .bind(now)
                .bind(product_id)
                .execute(&mut *tx)
                .await?;
        }
        record_adjustment_in(
            &mut tx,
            product_id,
            change.adjustment_type,
            change.quantity,
            non_blank(change.notes.as_deref()).as_deref(),
            change.adjusted_by,
            now,
        )
        .await?;

        let sql = format!("SELECT {INVENTORY_COLUMNS} FROM inventory WHERE product_id = ?1");
        let inventory = sqlx::query_as::<_, Inventory>(&sql)
            .bind(product_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(
            product_id,
            delta = change.quantity,
            stock = inventory.quantity_in_stock,
            "Stock adjusted"
        );
        Ok(inventory)
    }

    /// Products at or below their reorder level.
    pub async fn low_stock(&self, filter: &LowStockFilter) -> DbResult<Vec<InventoryLine>> {
        let mut qb = QueryBuilder::<Sqlite>::new(LINE_SELECT);
        qb.push(" WHERE COALESCE(i.quantity_in_stock, 0) <= p.reorder_level");

        if let Some(q) = non_blank(filter.query.as_deref()) {
            let columns: &[&str] = match filter.search_by {
                LowStockSearch::Name => &["p.name"],
                LowStockSearch::Sku => &["p.sku"],
                LowStockSearch::Barcode => &["p.barcode"],
                LowStockSearch::Category => &["c.name"],
                LowStockSearch::All => &["p.name", "p.sku", "p.barcode", "c.name"],
            };
            push_contains_any(&mut qb, columns, &q);
        }

        qb.push(match filter.sort_by {
            LowStockSort::StockAsc => " ORDER BY quantity_in_stock, p.name",
            LowStockSort::StockDesc => " ORDER BY quantity_in_stock DESC, p.name",
            LowStockSort::ReorderAsc => " ORDER BY p.reorder_level, p.name",
            LowStockSort::ReorderDesc => " ORDER BY p.reorder_level DESC, p.name",
            LowStockSort::Name => " ORDER BY p.name",
        });

        let lines = qb
            .build_query_as::<InventoryLine>()
            .fetch_all(&self.pool)
            .await?;
        Ok(lines)
    }

    pub async fn low_stock_count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products p LEFT JOIN inventory i ON i.product_id = p.id \
             WHERE COALESCE(i.quantity_in_stock, 0) <= p.reorder_level",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Creates a zero inventory row for the product if none exists.
pub(crate) async fn ensure_row_in(
    conn: &mut SqliteConnection,
    product_id: i64,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO inventory (product_id, quantity_in_stock, quantity_reserved, updated_at) \
         VALUES (?1, 0, 0, ?2)",
    )
    .bind(product_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Adds `delta` to the stock and returns the new level.
pub(crate) async fn apply_delta_in(
    conn: &mut SqliteConnection,
    product_id: i64,
    delta: i64,
    now: DateTime<Utc>,
) -> DbResult<i64> {
    let stock: Option<i64> = sqlx::query_scalar(
        "UPDATE inventory SET quantity_in_stock = quantity_in_stock + ?1, updated_at = ?2 \
         WHERE product_id = ?3 RETURNING quantity_in_stock",
    )
    .bind(delta)
    .bind(now)
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;

    stock.ok_or_else(|| DbError::not_found("Inventory", product_id))
}

pub(crate) async fn record_adjustment_in(
    conn: &mut SqliteConnection,
    product_id: i64,
    adjustment_type: AdjustmentType,
    quantity: i64,
    notes: Option<&str>,
    adjusted_by: Option<i64>,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO stock_adjustments (product_id, adjustment_type, quantity, notes, adjusted_by, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(product_id)
    .bind(adjustment_type)
    .bind(quantity)
    .bind(notes)
    .bind(adjusted_by)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
