//! # Sales Routes
//!
//! The POS screen, sales history and receipts.
//!
//! ## Checkout Request
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  POST /sales/api/create-sale                                            │
//! │  {                                                                      │
//! │    "customer_type": "regular" | "irregular",                            │
//! │    "customer_phone", "customer_name",              regular customers    │
//! │    "ir_customer_name", "ir_customer_phone", ...    irregular customers  │
//! │    "items": [{ "product_id", "quantity", "discount" }],                 │
//! │    "discount_percent", "payment_method", "paid_amount", "notes"         │
//! │  }                                                                      │
//! │                                                                         │
//! │  Prices and totals are computed here from the catalogue. Anything the   │
//! │  client sends besides quantities, discounts and the paid amount is      │
//! │  ignored.                                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The POS endpoints answer errors with `{"success": false, "error": "…"}`
//! so the screen can show the message as is.

use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::NaiveDate;
use kirana_core::period::Period;
use kirana_core::receipt::{Receipt, ReceiptCustomer};
use kirana_core::{CustomerType, Money, PaymentMethod, Role, Sale, SaleSummary};
use kirana_db::{
    verify_password, Checkout, CheckoutLine, PaymentEdit, PosProduct, SaleDetail, SaleFilter,
    SaleSearch, SaleSort,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::auth::Realm;
use crate::error::{ApiError, PosError};
use crate::middleware::tenant::Shop;
use crate::routes::{empty_as_none, Message};
use crate::state::SharedState;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sales/api/search-product", get(search_product))
        .route("/sales/api/get-customer", get(get_customer))
        .route("/sales/api/create-sale", post(create_sale))
        .route("/sales", get(list_sales))
        .route("/sales/returns", get(list_returns))
        .route("/sales/number/{sale_number}", get(sale_by_number))
        .route("/sales/{id}", get(sale_detail).delete(delete_sale))
        .route("/sales/{id}/return", post(return_sale))
        .route("/sales/{id}/cancel", post(cancel_sale))
        .route("/sales/{id}/payment", put(edit_payment))
        .route("/sales/{id}/receipt", get(receipt_json))
        .route("/sales/{id}/receipt.txt", get(receipt_text))
        .route("/sales/{id}/printed", post(mark_printed))
}

// =============================================================================
// POS
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct ProductHits {
    pub products: Vec<PosProduct>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PhoneQuery {
    pub phone: String,
}

#[derive(Debug, Serialize)]
pub struct CustomerLookup {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_credit: Option<Money>,
}

#[derive(Debug, Deserialize)]
pub struct CartItem {
    pub product_id: i64,
    pub quantity: i64,
    /// Line discount in percent.
    #[serde(default)]
    pub discount: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateSale {
    pub customer_type: CustomerType,
    pub customer_phone: Option<String>,
    pub customer_name: Option<String>,
    pub ir_customer_name: Option<String>,
    pub ir_customer_phone: Option<String>,
    pub ir_customer_address: Option<String>,
    pub items: Vec<CartItem>,
    pub discount_percent: f64,
    pub payment_method: PaymentMethod,
    /// A decimal amount, as a JSON number or string.
    pub paid_amount: Option<Value>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SaleCreated {
    pub success: bool,
    pub sale_number: String,
    pub receipt_number: String,
    pub message: String,
}

async fn search_product(
    shop: Shop,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ProductHits>, PosError> {
    let products = shop.db.products().search_pos(&query.q).await?;
    Ok(Json(ProductHits { products }))
}

async fn get_customer(
    shop: Shop,
    Query(query): Query<PhoneQuery>,
) -> Result<Json<CustomerLookup>, PosError> {
    let lookup = match shop.db.customers().find_by_any_phone(&query.phone).await? {
        Some(customer) => CustomerLookup {
            found: true,
            current_credit: Some(customer.credit()),
            name: Some(customer.customer_name),
            phone: Some(customer.phone_number),
        },
        None => CustomerLookup {
            found: false,
            name: None,
            phone: None,
            current_credit: None,
        },
    };
    Ok(Json(lookup))
}

async fn create_sale(
    State(state): State<SharedState>,
    shop: Shop,
    Json(req): Json<CreateSale>,
) -> Result<Json<SaleCreated>, PosError> {
    let lines = req
        .items
        .iter()
        .map(|item| {
            Ok(CheckoutLine {
                product_id: item.product_id,
                quantity: item.quantity,
                discount_bps: percent_to_bps(item.discount)?,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    let cart = Checkout {
        customer_type: req.customer_type,
        customer_phone: req.customer_phone,
        customer_name: req.customer_name,
        ir_customer_name: req.ir_customer_name,
        ir_customer_phone: req.ir_customer_phone,
        ir_customer_address: req.ir_customer_address,
        lines,
        discount_bps: percent_to_bps(req.discount_percent)?,
        payment_method: req.payment_method,
        paid: parse_paid(req.paid_amount.as_ref())?,
        notes: req.notes,
        cashier_id: shop.actor(),
    };

    let sale = shop
        .db
        .sales()
        .checkout(&cart, state.config.checkout_policy())
        .await?;
    info!(
        tenant = %shop.tenant.code,
        sale_number = %sale.sale_number,
        total = %sale.total(),
        status = sale.payment_status.as_str(),
        "Sale created"
    );

    Ok(Json(SaleCreated {
        success: true,
        sale_number: sale.sale_number,
        receipt_number: sale.receipt_number,
        message: "Sale created successfully".to_string(),
    }))
}

/// Converts a percentage such as `12.5` to basis points.
fn percent_to_bps(percent: f64) -> Result<u32, ApiError> {
    if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
        return Err(ApiError::validation(
            "Discount must be between 0 and 100 percent.",
        ));
    }
    Ok((percent * 100.0).round() as u32)
}

/// Reads the paid amount. Missing or blank means nothing was paid.
fn parse_paid(value: Option<&Value>) -> Result<Option<Money>, ApiError> {
    let text = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(_) => return Err(ApiError::validation("Enter a valid payment amount.")),
    };
    text.parse::<Money>()
        .map(Some)
        .map_err(|_| ApiError::validation("Enter a valid payment amount."))
}

// =============================================================================
// History
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SaleQuery {
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    #[serde(deserialize_with = "empty_as_none")]
    pub q: Option<String>,
    pub filter_by: SaleSearch,
    pub sort_by: SaleSort,
}

impl SaleQuery {
    fn filter(self, utc_offset_minutes: i32) -> SaleFilter {
        let period = (self.from_date.is_some() || self.to_date.is_some())
            .then(|| Period::local_days(self.from_date, self.to_date, utc_offset_minutes));
        SaleFilter {
            period,
            query: self.q,
            filter_by: self.filter_by,
            sort_by: self.sort_by,
        }
    }
}

async fn list_sales(
    State(state): State<SharedState>,
    shop: Shop,
    Query(query): Query<SaleQuery>,
) -> Result<Json<Vec<SaleSummary>>, ApiError> {
    let filter = query.filter(state.config.utc_offset_minutes);
    Ok(Json(shop.db.sales().list(&filter).await?))
}

/// Returned and cancelled sales.
async fn list_returns(
    State(state): State<SharedState>,
    shop: Shop,
    Query(query): Query<SaleQuery>,
) -> Result<Json<Vec<SaleSummary>>, ApiError> {
    let filter = query.filter(state.config.utc_offset_minutes);
    Ok(Json(shop.db.sales().returns(&filter).await?))
}

async fn sale_detail(shop: Shop, Path(id): Path<i64>) -> Result<Json<SaleDetail>, ApiError> {
    Ok(Json(shop.db.sales().detail(id).await?))
}

async fn sale_by_number(
    shop: Shop,
    Path(sale_number): Path<String>,
) -> Result<Json<SaleDetail>, ApiError> {
    let sale = shop.db.sales().get_by_number(&sale_number).await?;
    Ok(Json(shop.db.sales().detail(sale.id).await?))
}

// =============================================================================
// Changes to Recorded Sales
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct EditPayment {
    pub payment_method: PaymentMethod,
    pub paid_amount: Value,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeleteSale {
    pub admin_password: String,
}

async fn return_sale(shop: Shop, Path(id): Path<i64>) -> Result<Json<Sale>, ApiError> {
    let sale = shop.db.sales().return_sale(id, shop.actor()).await?;
    info!(tenant = %shop.tenant.code, sale_number = %sale.sale_number, "Sale returned");
    Ok(Json(sale))
}

async fn cancel_sale(shop: Shop, Path(id): Path<i64>) -> Result<Json<Sale>, ApiError> {
    let sale = shop.db.sales().cancel_sale(id, shop.actor()).await?;
    info!(tenant = %shop.tenant.code, sale_number = %sale.sale_number, "Sale cancelled");
    Ok(Json(sale))
}

async fn edit_payment(
    shop: Shop,
    Path(id): Path<i64>,
    Json(req): Json<EditPayment>,
) -> Result<Json<Sale>, ApiError> {
    let paid = parse_paid(Some(&req.paid_amount))?.unwrap_or_default();
    let edit = PaymentEdit {
        payment_method: req.payment_method,
        paid,
        notes: req.notes,
    };
    Ok(Json(shop.db.sales().edit_payment(id, &edit, shop.actor()).await?))
}

/// Only admins may delete, and only after re-entering their password.
///
/// ## Errors
/// - "Admin access is required to delete a sale."
/// - "Admin password is required to delete a sale."
/// - "Invalid admin password."
async fn delete_sale(
    State(state): State<SharedState>,
    shop: Shop,
    Path(id): Path<i64>,
    Json(req): Json<DeleteSale>,
) -> Result<Json<Message>, ApiError> {
    let session = &shop.session;
    if !matches!(session.role, Role::Superadmin | Role::TenantAdmin) {
        return Err(ApiError::forbidden("Admin access is required to delete a sale."));
    }
    if req.admin_password.is_empty() {
        return Err(ApiError::validation("Admin password is required to delete a sale."));
    }

    let admin = match (session.realm, session.superadmin_id) {
        (Realm::Tenant, None) => shop.db.users().get(session.sub).await?,
        (_, superadmin_id) => {
            let id = superadmin_id.unwrap_or(session.sub);
            state.platform.users().get(id).await?
        }
    };
    if !verify_password(&req.admin_password, &admin.password_hash) {
        warn!(tenant = %shop.tenant.code, user = %admin.username, sale_id = id, "Sale delete refused");
        return Err(ApiError::validation("Invalid admin password."));
    }

    let sale = shop.db.sales().get(id).await?;
    shop.db.sales().delete(id, shop.actor()).await?;
    Ok(Json(Message::new(format!(
        "Sale {} deleted successfully.",
        sale.sale_number
    ))))
}

// =============================================================================
// Receipts
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ReceiptResponse {
    pub currency_symbol: String,
    pub currency_code: String,
    pub receipt: Receipt,
}

async fn build_receipt(state: &SharedState, shop: &Shop, id: i64) -> Result<Receipt, ApiError> {
    let detail = shop.db.sales().detail(id).await?;
    let customer = match (&detail.customer, &detail.irregular_customer) {
        (Some(customer), _) => Some(ReceiptCustomer {
            name: customer.customer_name.clone(),
            address: customer.address.clone(),
            irregular: false,
        }),
        (None, Some(irregular)) => Some(ReceiptCustomer {
            name: irregular.customer_name.clone(),
            address: irregular.address.clone(),
            irregular: true,
        }),
        (None, None) => None,
    };

    Ok(Receipt::build(
        state.config.shop_info(&shop.tenant),
        &detail.sale,
        &detail.items,
        customer,
        state.config.vat_bps,
    ))
}

async fn receipt_json(
    State(state): State<SharedState>,
    shop: Shop,
    Path(id): Path<i64>,
) -> Result<Json<ReceiptResponse>, ApiError> {
    let receipt = build_receipt(&state, &shop, id).await?;
    Ok(Json(ReceiptResponse {
        currency_symbol: state.config.currency_symbol.clone(),
        currency_code: state.config.currency_code.clone(),
        receipt,
    }))
}

async fn receipt_text(
    State(state): State<SharedState>,
    shop: Shop,
    Path(id): Path<i64>,
) -> Result<([(axum::http::HeaderName, &'static str); 1], String), ApiError> {
    let receipt = build_receipt(&state, &shop, id).await?;
    Ok(([(CONTENT_TYPE, "text/plain; charset=utf-8")], receipt.render_text()))
}

async fn mark_printed(shop: Shop, Path(id): Path<i64>) -> Result<Json<Message>, ApiError> {
    shop.db.sales().mark_printed(id).await?;
    Ok(Json(Message::new("Receipt marked as printed.")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_percent_to_bps() {
        assert_eq!(percent_to_bps(0.0).unwrap(), 0);
        assert_eq!(percent_to_bps(12.5).unwrap(), 1250);
        assert_eq!(percent_to_bps(100.0).unwrap(), 10_000);
        assert!(percent_to_bps(-1.0).is_err());
        assert!(percent_to_bps(100.5).is_err());
        assert!(percent_to_bps(f64::NAN).is_err());
    }

    #[test]
    fn test_parse_paid() {
        assert_eq!(parse_paid(None).unwrap(), None);
        assert_eq!(parse_paid(Some(&json!(""))).unwrap(), None);
        assert_eq!(
            parse_paid(Some(&json!("150.50"))).unwrap(),
            Some(Money::from_paisa(15_050))
        );
        assert_eq!(parse_paid(Some(&json!(200))).unwrap(), Some(Money::from_paisa(20_000)));
        assert_eq!(
            parse_paid(Some(&json!(-5))).unwrap(),
            Some(Money::from_paisa(-500))
        );
        let err = parse_paid(Some(&json!("abc"))).unwrap_err();
        assert_eq!(err.message, "Enter a valid payment amount.");
        assert!(parse_paid(Some(&json!(true))).is_err());
    }
}
