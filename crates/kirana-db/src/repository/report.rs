//! Shop reports: dashboard counters, sales totals and today's sales.
//!
//! Returned and cancelled sales never count towards sales totals.

use kirana_core::period::Period;
use kirana_core::{InventoryLine, Money, SaleSummary};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use crate::repository::inventory::{InventoryRepository, LowStockFilter};
use crate::repository::sale::{SaleFilter, SaleRepository, SaleSort};

/// Counters on the shop dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct ShopDashboard {
    pub total_products: i64,
    pub total_customers: i64,
    pub today_sales: Money,
    pub today_sale_count: i64,
    pub low_stock_count: i64,
}

/// Sales totals over a period.
#[derive(Debug, Clone, Serialize)]
pub struct SalesReport {
    pub total: Money,
    pub count: i64,
}

/// Today's sales with their sum.
#[derive(Debug, Clone, Serialize)]
pub struct TodaySales {
    pub sales: Vec<SaleSummary>,
    pub total: Money,
}

#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Dashboard counters; `today` is the shop-local day.
    pub async fn dashboard(&self, today: Period) -> DbResult<ShopDashboard> {
        let total_products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        let total_customers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.pool)
            .await?;
        let today_report = self.sales_report(today).await?;
        let low_stock_count = InventoryRepository::new(self.pool.clone())
            .low_stock_count()
            .await?;

        Ok(ShopDashboard {
            total_products,
            total_customers,
            today_sales: today_report.total,
            today_sale_count: today_report.count,
            low_stock_count,
        })
    }

    /// Sum and count of completed sales in `period`.
    pub async fn sales_report(&self, period: Period) -> DbResult<SalesReport> {
        let (total, count): (i64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(total_paisa), 0), COUNT(*) FROM sales \
             WHERE order_status = 'completed' AND created_at >= ?1 AND created_at < ?2",
        )
        .bind(period.start)
        .bind(period.end)
        .fetch_one(&self.pool)
        .await?;

        debug!(total, count, "Sales report computed");
        Ok(SalesReport {
            total: Money::from_paisa(total),
            count,
        })
    }

    /// Every sale of the day, newest first, with the completed total.
    pub async fn today_sales(&self, today: Period) -> DbResult<TodaySales> {
        let sales = SaleRepository::new(self.pool.clone())
            .list(&SaleFilter {
                period: Some(today),
                sort_by: SaleSort::Newest,
                ..Default::default()
            })
            .await?;
        let total = self.sales_report(today).await?.total;
        Ok(TodaySales { sales, total })
    }

    pub async fn low_stock(&self, filter: &LowStockFilter) -> DbResult<Vec<InventoryLine>> {
        InventoryRepository::new(self.pool.clone())
            .low_stock(filter)
            .await
    }
}
