//! Customers and store credit.
//!
//! Registered customers are addressed by phone number, the way the shop
//! counter knows them.

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use kirana_core::sale::parse_payment_amount;
use kirana_core::{CreditTransaction, Customer, IrregularCustomer, SaleSummary};
use kirana_db::{CustomerFilter, CustomerInput, CustomerListing, CustomerSearch, CustomerSort};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::middleware::tenant::Shop;
use crate::routes::{empty_as_none, Message};
use crate::state::SharedState;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/customers", get(list_customers).post(create_customer))
        .route("/customers/credit-records", get(credit_records))
        .route("/customers/irregular/{id}", get(irregular_detail))
        .route("/customers/payments/{id}", get(payment_receipt))
        .route(
            "/customers/{phone}",
            get(customer_detail).put(update_customer).delete(delete_customer),
        )
        .route("/customers/{phone}/credit", get(credit_history))
        .route("/customers/{phone}/pay", post(pay_credit))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CustomerQuery {
    #[serde(deserialize_with = "empty_as_none")]
    pub q: Option<String>,
    pub filter_by: CustomerSearch,
    pub sort_by: CustomerSort,
}

impl From<CustomerQuery> for CustomerFilter {
    fn from(query: CustomerQuery) -> Self {
        CustomerFilter {
            query: query.q,
            filter_by: query.filter_by,
            sort_by: query.sort_by,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CustomerDetail {
    pub customer: Customer,
    pub sales: Vec<SaleSummary>,
}

#[derive(Debug, Serialize)]
pub struct IrregularDetail {
    pub customer: IrregularCustomer,
    pub sales: Vec<SaleSummary>,
}

#[derive(Debug, Serialize)]
pub struct CreditHistory {
    pub customer: Customer,
    pub transactions: Vec<CreditTransaction>,
}

#[derive(Debug, Deserialize)]
pub struct CreditPayment {
    /// As typed at the counter, e.g. "250.50".
    pub amount: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentRecorded {
    pub message: String,
    pub transaction: CreditTransaction,
    pub customer: Customer,
}

#[derive(Debug, Serialize)]
pub struct PaymentReceipt {
    pub transaction: CreditTransaction,
    pub customer: Customer,
}

async fn list_customers(
    shop: Shop,
    Query(query): Query<CustomerQuery>,
) -> Result<Json<CustomerListing>, ApiError> {
    Ok(Json(shop.db.customers().list(&query.into()).await?))
}

/// Customers who currently owe the shop.
async fn credit_records(
    shop: Shop,
    Query(query): Query<CustomerQuery>,
) -> Result<Json<Vec<Customer>>, ApiError> {
    Ok(Json(shop.db.customers().with_credit(&query.into()).await?))
}

async fn create_customer(
    shop: Shop,
    Json(input): Json<CustomerInput>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    let customer = shop.db.customers().create(&input).await?;
    info!(tenant = %shop.tenant.code, customer_id = customer.id, "Customer added");
    Ok((StatusCode::CREATED, Json(customer)))
}

async fn customer_detail(
    shop: Shop,
    Path(phone): Path<String>,
) -> Result<Json<CustomerDetail>, ApiError> {
    let customer = shop.db.customers().get_by_phone(&phone).await?;
    let sales = shop.db.sales().list_for_customer(customer.id).await?;
    Ok(Json(CustomerDetail { customer, sales }))
}

async fn update_customer(
    shop: Shop,
    Path(phone): Path<String>,
    Json(input): Json<CustomerInput>,
) -> Result<Json<Customer>, ApiError> {
    Ok(Json(shop.db.customers().update_by_phone(&phone, &input).await?))
}

async fn delete_customer(
    shop: Shop,
    Path(phone): Path<String>,
) -> Result<Json<Message>, ApiError> {
    shop.db.customers().delete_by_phone(&phone).await?;
    Ok(Json(Message::new("Customer deleted successfully.")))
}

async fn irregular_detail(
    shop: Shop,
    Path(id): Path<i64>,
) -> Result<Json<IrregularDetail>, ApiError> {
    let customer = shop.db.customers().get_irregular(id).await?;
    let sales = shop.db.sales().list_for_irregular(id).await?;
    Ok(Json(IrregularDetail { customer, sales }))
}

async fn credit_history(
    shop: Shop,
    Path(phone): Path<String>,
) -> Result<Json<CreditHistory>, ApiError> {
    let customer = shop.db.customers().get_by_phone(&phone).await?;
    let transactions = shop.db.credit().history(customer.id).await?;
    Ok(Json(CreditHistory {
        customer,
        transactions,
    }))
}

async fn pay_credit(
    shop: Shop,
    Path(phone): Path<String>,
    Json(req): Json<CreditPayment>,
) -> Result<Json<PaymentRecorded>, ApiError> {
    let amount = parse_payment_amount(&req.amount)?;
    let customer = shop.db.customers().get_by_phone(&phone).await?;

    let transaction = shop
        .db
        .credit()
        .pay(customer.id, amount, req.description.as_deref(), shop.actor())
        .await?;
    info!(
        tenant = %shop.tenant.code,
        customer_id = customer.id,
        amount = %amount,
        "Credit payment recorded"
    );

    Ok(Json(PaymentRecorded {
        message: "Payment recorded successfully.".to_string(),
        customer: shop.db.customers().get(customer.id).await?,
        transaction,
    }))
}

async fn payment_receipt(
    shop: Shop,
    Path(id): Path<i64>,
) -> Result<Json<PaymentReceipt>, ApiError> {
    let transaction = shop.db.credit().get_payment(id).await?;
    let customer = shop.db.customers().get(transaction.customer_id).await?;
    Ok(Json(PaymentReceipt {
        transaction,
        customer,
    }))
}
