//! Shop reports.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use kirana_core::period::Period;
use kirana_core::InventoryLine;
use kirana_db::{LowStockFilter, SalesReport, ShopDashboard, TodaySales};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::middleware::tenant::Shop;
use crate::routes::inventory::LowStockQuery;
use crate::state::SharedState;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/reports", get(dashboard))
        .route("/reports/dashboard", get(dashboard))
        .route("/reports/sales", get(sales_report))
        .route("/reports/today", get(today_sales))
        .route("/reports/low-stock", get(low_stock))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RangeQuery {
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct SalesReportResponse {
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    #[serde(flatten)]
    pub report: SalesReport,
}

async fn dashboard(
    State(state): State<SharedState>,
    shop: Shop,
) -> Result<Json<ShopDashboard>, ApiError> {
    let today = state.config.today(Utc::now());
    Ok(Json(shop.db.reports().dashboard(today).await?))
}

/// Completed sales between two local dates (both inclusive, either open).
async fn sales_report(
    State(state): State<SharedState>,
    shop: Shop,
    Query(range): Query<RangeQuery>,
) -> Result<Json<SalesReportResponse>, ApiError> {
    if let (Some(from), Some(to)) = (range.from_date, range.to_date) {
        if from > to {
            return Err(ApiError::validation("From date must not be after to date."));
        }
    }
    let period = Period::local_days(range.from_date, range.to_date, state.config.utc_offset_minutes);
    let report = shop.db.reports().sales_report(period).await?;
    Ok(Json(SalesReportResponse {
        from_date: range.from_date,
        to_date: range.to_date,
        report,
    }))
}

async fn today_sales(
    State(state): State<SharedState>,
    shop: Shop,
) -> Result<Json<TodaySales>, ApiError> {
    let today = state.config.today(Utc::now());
    Ok(Json(shop.db.reports().today_sales(today).await?))
}

async fn low_stock(
    shop: Shop,
    Query(query): Query<LowStockQuery>,
) -> Result<Json<Vec<InventoryLine>>, ApiError> {
    let filter = LowStockFilter::from(query);
    Ok(Json(shop.db.reports().low_stock(&filter).await?))
}
