//! # Sale Repository
//!
//! Checkout and every later change to a recorded sale.
//!
//! ## Checkout Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     One SQLite transaction                              │
//! │                                                                         │
//! │  1. price lines from the catalogue ──► SaleTotals::compute              │
//! │  2. customer: irregular row, or regular get-or-create by phone          │
//! │  3. INSERT sale (placeholder numbers) ──► UPDATE SAL…/REC… from its id  │
//! │  4. per line: INSERT sale_item, decrement stock, log adjustment         │
//! │  5. unpaid balance with a customer ──► credit purchase entry            │
//! │                                                                         │
//! │  Any error drops the transaction: nothing of the sale is kept.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Later Changes
//! ```text
//! completed ──return──► returned    restock + reverse credit (total for
//!                                   credit sales, else total − paid)
//! completed ──cancel──► cancelled   same as return
//! any       ──edit────► (same)      payment fields; credit entry if owed
//! any       ──delete──► (gone)      if completed: restock, and reverse the
//!                                   total of a credit sale
//! ```

use chrono::{DateTime, Utc};
use kirana_core::period::Period;
use kirana_core::sale::{
    credit_reversal, credit_to_record, deletion_reversal, ensure_transition, receipt_number,
    sale_number, PricedLine, SaleTotals,
};
use kirana_core::{
    AdjustmentType, CoreError, Customer, CustomerType, IrregularCustomer, Money, OrderStatus,
    PaymentMethod, PaymentStatus, Sale, SaleItem, SaleSummary, TaxRate, IRREGULAR_CUSTOMER_NAME,
    WALK_IN_CUSTOMER_NAME,
};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::credit::{add_purchase_in, purchase_recorded_in, refund_in};
use crate::repository::customer::{create_irregular_in, get_or_create_in};
use crate::repository::inventory::{apply_delta_in, ensure_row_in, record_adjustment_in};
use crate::repository::{non_blank, push_contains_any};

const SALE_COLUMNS: &str = "id, sale_number, receipt_number, customer_id, irregular_customer_id, \
     customer_type, cashier_id, subtotal_paisa, discount_bps, discount_paisa, tax_paisa, \
     total_paisa, payment_method, paid_paisa, payment_status, order_status, notes, is_printed, \
     created_at, updated_at";

const SUMMARY_SELECT: &str = "SELECT s.id, s.sale_number, s.receipt_number, s.customer_id, \
     s.irregular_customer_id, s.customer_type, s.cashier_id, s.subtotal_paisa, s.discount_bps, \
     s.discount_paisa, s.tax_paisa, s.total_paisa, s.payment_method, s.paid_paisa, \
     s.payment_status, s.order_status, s.notes, s.is_printed, s.created_at, s.updated_at, \
     COALESCE(c.customer_name, ic.customer_name) AS customer_name, \
     COALESCE(c.phone_number, ic.phone_number) AS customer_phone \
     FROM sales s \
     LEFT JOIN customers c ON c.id = s.customer_id \
     LEFT JOIN irregular_customers ic ON ic.id = s.irregular_customer_id";

const ITEM_COLUMNS: &str = "id, sale_id, product_id, product_name, quantity, unit_price_paisa, \
     discount_bps, line_total_paisa";

// =============================================================================
// Inputs and Filters
// =============================================================================

/// One cart line as sent by the POS screen.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutLine {
    pub product_id: i64,
    pub quantity: i64,
    /// Line discount in basis points.
    pub discount_bps: u32,
}

/// A cart ready to be recorded.
///
/// Prices and totals are never taken from here; they come from the
/// catalogue at checkout time.
#[derive(Debug, Clone, Default)]
pub struct Checkout {
    pub customer_type: CustomerType,
    /// Regular customers: looked up or registered by this phone.
    pub customer_phone: Option<String>,
    pub customer_name: Option<String>,
    pub ir_customer_name: Option<String>,
    pub ir_customer_phone: Option<String>,
    pub ir_customer_address: Option<String>,
    pub lines: Vec<CheckoutLine>,
    /// Sale discount in basis points.
    pub discount_bps: u32,
    pub payment_method: PaymentMethod,
    /// Defaults to zero.
    pub paid: Option<Money>,
    pub notes: Option<String>,
    pub cashier_id: Option<i64>,
}

/// Shop-wide rules applied at checkout.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutPolicy {
    pub vat: TaxRate,
    /// When false, a checkout that would take stock below zero fails.
    pub allow_negative_stock: bool,
}

impl Default for CheckoutPolicy {
    fn default() -> Self {
        CheckoutPolicy {
            vat: TaxRate::default(),
            allow_negative_stock: true,
        }
    }
}

/// Column matched by the sales list search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleSearch {
    /// Regular or irregular customer name.
    #[default]
    CustomerName,
    Phone,
    SaleNumber,
    /// Exact total in rupees.
    Amount,
    PaymentStatus,
    OrderStatus,
    All,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleSort {
    #[default]
    Newest,
    CustomerAsc,
    CustomerDesc,
    Phone,
    AmountAsc,
    AmountDesc,
    SaleNumberAsc,
    SaleNumberDesc,
}

#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    pub period: Option<Period>,
    pub query: Option<String>,
    pub filter_by: SaleSearch,
    pub sort_by: SaleSort,
}

/// Editable payment fields of a recorded sale.
#[derive(Debug, Clone)]
pub struct PaymentEdit {
    pub payment_method: PaymentMethod,
    pub paid: Money,
    pub notes: Option<String>,
}

/// A sale with its lines and customer.
#[derive(Debug, Clone, Serialize)]
pub struct SaleDetail {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub customer: Option<Customer>,
    pub irregular_customer: Option<IrregularCustomer>,
}

struct CartLine {
    product_id: i64,
    sku: String,
    name: String,
    priced: PricedLine,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for sales.
///
/// ## Usage
/// ```rust,ignore
/// let sale = shop.sales().checkout(&cart, CheckoutPolicy::default()).await?;
/// let detail = shop.sales().detail(sale.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Records a sale atomically.
    ///
    /// ## Errors
    /// - [`CoreError::EmptySale`], [`CoreError::QuantityTooLarge`] and other
    ///   totals errors
    /// - [`CoreError::ProductNotFound`] for an unknown product id
    /// - [`CoreError::InsufficientStock`] when negative stock is disallowed
    /// - [`CoreError::InvalidPaymentAmount`] for a negative paid amount
    pub async fn checkout(&self, cart: &Checkout, policy: CheckoutPolicy) -> DbResult<Sale> {
        if cart.lines.is_empty() {
            return Err(CoreError::EmptySale.into());
        }
        let paid = cart.paid.unwrap_or_default();
        if paid.is_negative() {
            return Err(CoreError::InvalidPaymentAmount {
                reason: "Paid amount cannot be negative.".to_string(),
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let lines = price_lines_in(&mut tx, &cart.lines).await?;
        let priced: Vec<PricedLine> = lines.iter().map(|l| l.priced).collect();
        let totals = SaleTotals::compute(&priced, cart.discount_bps, policy.vat)?;

        let (customer_id, irregular_customer_id) = match cart.customer_type {
            CustomerType::Irregular => {
                let name = non_blank(cart.ir_customer_name.as_deref())
                    .unwrap_or_else(|| IRREGULAR_CUSTOMER_NAME.to_string());
                let id = create_irregular_in(
                    &mut tx,
                    &name,
                    non_blank(cart.ir_customer_phone.as_deref()).as_deref(),
                    non_blank(cart.ir_customer_address.as_deref()).as_deref(),
                    now,
                )
                .await?;
                (None, Some(id))
            }
            CustomerType::Regular => match non_blank(cart.customer_phone.as_deref()) {
                Some(phone) => {
                    let name = non_blank(cart.customer_name.as_deref())
                        .unwrap_or_else(|| WALK_IN_CUSTOMER_NAME.to_string());
                    let customer = get_or_create_in(&mut tx, &phone, &name, now).await?;
                    (Some(customer.id), None)
                }
                None => (None, None),
            },
        };

        let payment_status = PaymentStatus::from_amounts(totals.total, paid);
        let placeholder = Uuid::new_v4().to_string();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO sales (sale_number, receipt_number, customer_id, irregular_customer_id, \
             customer_type, cashier_id, subtotal_paisa, discount_bps, discount_paisa, tax_paisa, \
             total_paisa, payment_method, paid_paisa, payment_status, order_status, notes, \
             is_printed, created_at, updated_at) \
             VALUES (?1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 'completed', ?14, \
             0, ?15, ?15) RETURNING id",
        )
        .bind(&placeholder)
        .bind(customer_id)
        .bind(irregular_customer_id)
        .bind(cart.customer_type)
        .bind(cart.cashier_id)
        .bind(totals.subtotal.paisa())
        .bind(cart.discount_bps as i64)
        .bind(totals.discount.paisa())
        .bind(totals.tax.paisa())
        .bind(totals.total.paisa())
        .bind(cart.payment_method)
        .bind(paid.paisa())
        .bind(payment_status)
        .bind(non_blank(cart.notes.as_deref()))
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let sql = format!(
            "UPDATE sales SET sale_number = ?1, receipt_number = ?2 WHERE id = ?3 \
             RETURNING {SALE_COLUMNS}"
        );
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(sale_number(now, id))
            .bind(receipt_number(now, id))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        let stock_note = format!("Sale {}", sale.sale_number);
        for line in &lines {
            sqlx::query(
                "INSERT INTO sale_items (sale_id, product_id, product_name, quantity, \
                 unit_price_paisa, discount_bps, line_total_paisa) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .bind(sale.id)
            .bind(line.product_id)
            .bind(&line.name)
            .bind(line.priced.quantity)
            .bind(line.priced.unit_price.paisa())
            .bind(line.priced.discount_bps as i64)
            .bind(line.priced.line_total()?.paisa())
            .execute(&mut *tx)
            .await?;

            let quantity = line.priced.quantity;
            ensure_row_in(&mut tx, line.product_id, now).await?;
            let stock = apply_delta_in(&mut tx, line.product_id, -quantity, now).await?;
            if stock < 0 && !policy.allow_negative_stock {
                return Err(CoreError::InsufficientStock {
                    sku: line.sku.clone(),
                    available: stock + quantity,
                    requested: quantity,
                }
                .into());
            }
            record_adjustment_in(
                &mut tx,
                line.product_id,
                AdjustmentType::Sale,
                -quantity,
                Some(&stock_note),
                cart.cashier_id,
                now,
            )
            .await?;
        }

        if let Some(customer_id) = sale.customer_id {
            if let Some(owed) = credit_to_record(true, sale.due(), false) {
                add_purchase_in(&mut tx, customer_id, sale.id, owed, cart.cashier_id, now).await?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            sale_number = %sale.sale_number,
            total = sale.total_paisa,
            paid = sale.paid_paisa,
            lines = lines.len(),
            "Sale recorded"
        );
        Ok(sale)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get(&self, id: i64) -> DbResult<Sale> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");
        sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))
    }

    pub async fn get_by_number(&self, number: &str) -> DbResult<Sale> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE sale_number = ?1");
        sqlx::query_as::<_, Sale>(&sql)
            .bind(number.trim())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", number))
    }

    pub async fn items(&self, sale_id: i64) -> DbResult<Vec<SaleItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM sale_items WHERE sale_id = ?1 ORDER BY id");
        let items = sqlx::query_as::<_, SaleItem>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    pub async fn detail(&self, id: i64) -> DbResult<SaleDetail> {
        let sale = self.get(id).await?;
        let items = self.items(id).await?;

        let customer = match sale.customer_id {
            Some(customer_id) => sqlx::query_as::<_, Customer>(
                "SELECT id, phone_number, secondary_phone_number, customer_name, email, address, \
                 city, notes, current_credit_paisa, loyalty_points, registration_date, \
                 updated_date FROM customers WHERE id = ?1",
            )
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await?,
            None => None,
        };
        let irregular_customer = match sale.irregular_customer_id {
            Some(ir_id) => sqlx::query_as::<_, IrregularCustomer>(
                "SELECT id, customer_name, phone_number, address, created_at \
                 FROM irregular_customers WHERE id = ?1",
            )
            .bind(ir_id)
            .fetch_optional(&self.pool)
            .await?,
            None => None,
        };

        Ok(SaleDetail {
            sale,
            items,
            customer,
            irregular_customer,
        })
    }

    /// Lists sales with the sales list filters.
    pub async fn list(&self, filter: &SaleFilter) -> DbResult<Vec<SaleSummary>> {
        self.list_where(filter, None).await
    }

    /// Returned sales, with the same filters as [`list`](Self::list).
    pub async fn returns(&self, filter: &SaleFilter) -> DbResult<Vec<SaleSummary>> {
        self.list_where(filter, Some(OrderStatus::Returned)).await
    }

    async fn list_where(
        &self,
        filter: &SaleFilter,
        status: Option<OrderStatus>,
    ) -> DbResult<Vec<SaleSummary>> {
        let mut qb = QueryBuilder::<Sqlite>::new(SUMMARY_SELECT);
        qb.push(" WHERE 1 = 1");

        if let Some(status) = status {
            qb.push(" AND s.order_status = ").push_bind(status);
        }
        if let Some(period) = filter.period {
            qb.push(" AND s.created_at >= ")
                .push_bind(period.start)
                .push(" AND s.created_at < ")
                .push_bind(period.end);
        }

        if let Some(q) = non_blank(filter.query.as_deref()) {
            match filter.filter_by {
                SaleSearch::Amount => match q.parse::<Money>() {
                    Ok(amount) => {
                        qb.push(" AND s.total_paisa = ").push_bind(amount.paisa());
                    }
                    Err(_) => return Ok(Vec::new()),
                },
                SaleSearch::PaymentStatus => {
                    qb.push(" AND s.payment_status = ").push_bind(q.to_lowercase());
                }
                SaleSearch::OrderStatus => {
                    qb.push(" AND s.order_status = ").push_bind(q.to_lowercase());
                }
                SaleSearch::CustomerName => {
                    push_contains_any(&mut qb, &["c.customer_name", "ic.customer_name"], &q);
                }
                SaleSearch::Phone => {
                    push_contains_any(
                        &mut qb,
                        &["c.phone_number", "c.secondary_phone_number", "ic.phone_number"],
                        &q,
                    );
                }
                SaleSearch::SaleNumber => {
                    push_contains_any(&mut qb, &["s.sale_number", "s.receipt_number"], &q);
                }
                SaleSearch::All => {
                    push_contains_any(
                        &mut qb,
                        &[
                            "c.customer_name",
                            "ic.customer_name",
                            "c.phone_number",
                            "ic.phone_number",
                            "s.sale_number",
                            "s.receipt_number",
                        ],
                        &q,
                    );
                }
            }
        }

        qb.push(match filter.sort_by {
            SaleSort::Newest => " ORDER BY s.created_at DESC, s.id DESC",
            SaleSort::CustomerAsc => " ORDER BY customer_name COLLATE NOCASE, s.id DESC",
            SaleSort::CustomerDesc => " ORDER BY customer_name COLLATE NOCASE DESC, s.id DESC",
            SaleSort::Phone => " ORDER BY customer_phone, s.id DESC",
            SaleSort::AmountAsc => " ORDER BY s.total_paisa, s.id",
            SaleSort::AmountDesc => " ORDER BY s.total_paisa DESC, s.id DESC",
            SaleSort::SaleNumberAsc => " ORDER BY s.sale_number",
            SaleSort::SaleNumberDesc => " ORDER BY s.sale_number DESC",
        });

        let sales = qb
            .build_query_as::<SaleSummary>()
            .fetch_all(&self.pool)
            .await?;
        debug!(count = sales.len(), "Sales listed");
        Ok(sales)
    }

    /// Sales of a registered customer, newest first.
    pub async fn list_for_customer(&self, customer_id: i64) -> DbResult<Vec<SaleSummary>> {
        let sql = format!("{SUMMARY_SELECT} WHERE s.customer_id = ?1 ORDER BY s.created_at DESC, s.id DESC");
        let sales = sqlx::query_as::<_, SaleSummary>(&sql)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(sales)
    }

    /// Sales of an irregular customer, newest first.
    pub async fn list_for_irregular(&self, irregular_id: i64) -> DbResult<Vec<SaleSummary>> {
        let sql = format!(
            "{SUMMARY_SELECT} WHERE s.irregular_customer_id = ?1 ORDER BY s.created_at DESC, s.id DESC"
        );
        let sales = sqlx::query_as::<_, SaleSummary>(&sql)
            .bind(irregular_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(sales)
    }

    // =========================================================================
    // Changes
    // =========================================================================

    /// Marks a completed sale returned, restocking it and reversing credit.
    pub async fn return_sale(&self, id: i64, actor: Option<i64>) -> DbResult<Sale> {
        self.reverse(id, OrderStatus::Returned, actor).await
    }

    /// Marks a completed sale cancelled, restocking it and reversing credit.
    pub async fn cancel_sale(&self, id: i64, actor: Option<i64>) -> DbResult<Sale> {
        self.reverse(id, OrderStatus::Cancelled, actor).await
    }

    async fn reverse(&self, id: i64, target: OrderStatus, actor: Option<i64>) -> DbResult<Sale> {
        let mut tx = self.pool.begin().await?;
        let sale = sale_in(&mut tx, id).await?;
        ensure_transition(&sale, target)?;

        let now = Utc::now();
        let note = format!("Sale {} {}", sale.sale_number, target.as_str());
        undo_in(&mut tx, &sale, credit_reversal(&sale), &note, actor, now).await?;

        let sql = format!(
            "UPDATE sales SET order_status = ?1, updated_at = ?2 WHERE id = ?3 RETURNING {SALE_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Sale>(&sql)
            .bind(target)
            .bind(now)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(sale_number = %updated.sale_number, status = target.as_str(), "Sale reversed");
        Ok(updated)
    }

    /// Edits payment method, paid amount and notes, recomputing the status.
    ///
    /// A completed sale with a customer that now owes money gets its
    /// purchase entry if it never had one.
    pub async fn edit_payment(&self, id: i64, edit: &PaymentEdit, actor: Option<i64>) -> DbResult<Sale> {
        if edit.paid.is_negative() {
            return Err(CoreError::InvalidPaymentAmount {
                reason: "Paid amount cannot be negative.".to_string(),
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;
        let current = sale_in(&mut tx, id).await?;
        let now = Utc::now();
        let status = PaymentStatus::from_amounts(current.total(), edit.paid);

        let sql = format!(
            "UPDATE sales SET payment_method = ?1, paid_paisa = ?2, payment_status = ?3, \
             notes = ?4, updated_at = ?5 WHERE id = ?6 RETURNING {SALE_COLUMNS}"
        );
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(edit.payment_method)
            .bind(edit.paid.paisa())
            .bind(status)
            .bind(non_blank(edit.notes.as_deref()))
            .bind(now)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        if let (Some(customer_id), OrderStatus::Completed) = (sale.customer_id, sale.order_status) {
            let recorded = purchase_recorded_in(&mut tx, sale.id).await?;
            if let Some(owed) = credit_to_record(true, sale.due(), recorded) {
                add_purchase_in(&mut tx, customer_id, sale.id, owed, actor, now).await?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(sale_number = %sale.sale_number, status = sale.payment_status.as_str(), "Sale payment edited");
        Ok(sale)
    }

    /// Deletes a sale. A completed sale is restocked first and, for a credit
    /// sale, its total taken off the customer's credit. Returned or cancelled
    /// sales were already undone.
    pub async fn delete(&self, id: i64, actor: Option<i64>) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        let sale = sale_in(&mut tx, id).await?;

        if sale.order_status == OrderStatus::Completed {
            let note = format!("Sale {} deleted", sale.sale_number);
            undo_in(&mut tx, &sale, deletion_reversal(&sale), &note, actor, Utc::now()).await?;
        }

        sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(sale_number = %sale.sale_number, "Sale deleted");
        Ok(())
    }

    pub async fn mark_printed(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("UPDATE sales SET is_printed = 1 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", id));
        }
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn sale_in(conn: &mut SqliteConnection, id: i64) -> DbResult<Sale> {
    let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");
    sqlx::query_as::<_, Sale>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Sale", id))
}

async fn price_lines_in(conn: &mut SqliteConnection, lines: &[CheckoutLine]) -> DbResult<Vec<CartLine>> {
    let mut priced = Vec::with_capacity(lines.len());
    for line in lines {
        let row: Option<(String, String, i64)> = sqlx::query_as(
            "SELECT sku, name, selling_price_paisa FROM products WHERE id = ?1",
        )
        .bind(line.product_id)
        .fetch_optional(&mut *conn)
        .await?;

        let (sku, name, price) =
            row.ok_or_else(|| CoreError::ProductNotFound(line.product_id.to_string()))?;
        priced.push(CartLine {
            product_id: line.product_id,
            sku,
            name,
            priced: PricedLine {
                unit_price: Money::from_paisa(price),
                quantity: line.quantity,
                discount_bps: line.discount_bps,
            },
        });
    }
    Ok(priced)
}

/// Puts a sale's stock back and takes `reversal` off the customer's credit.
async fn undo_in(
    conn: &mut SqliteConnection,
    sale: &Sale,
    reversal: Option<Money>,
    note: &str,
    actor: Option<i64>,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM sale_items WHERE sale_id = ?1 ORDER BY id");
    let items = sqlx::query_as::<_, SaleItem>(&sql)
        .bind(sale.id)
        .fetch_all(&mut *conn)
        .await?;

    for item in &items {
        ensure_row_in(conn, item.product_id, now).await?;
        apply_delta_in(conn, item.product_id, item.quantity, now).await?;
        record_adjustment_in(
            conn,
            item.product_id,
            AdjustmentType::Return,
            item.quantity,
            Some(note),
            actor,
            now,
        )
        .await?;
    }

    if let (Some(customer_id), Some(reversal)) = (sale.customer_id, reversal) {
        refund_in(conn, customer_id, sale.id, reversal, note, actor, now).await?;
    }

    debug!(sale_id = sale.id, items = items.len(), "Sale undone");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::TenantDb;
    use crate::repository::product::tests::seed_product;
    use kirana_core::CreditTransactionType;

    fn line(product_id: i64, quantity: i64) -> CheckoutLine {
        CheckoutLine {
            product_id,
            quantity,
            discount_bps: 0,
        }
    }

    fn regular(phone: &str, lines: Vec<CheckoutLine>, paid: i64) -> Checkout {
        Checkout {
            customer_phone: Some(phone.to_string()),
            lines,
            paid: Some(Money::from_paisa(paid)),
            ..Default::default()
        }
    }

    async fn stock_of(shop: &TenantDb, product_id: i64) -> i64 {
        shop.inventory().line(product_id).await.unwrap().quantity_in_stock
    }

    #[tokio::test]
    async fn test_checkout_records_everything() {
        let shop = TenantDb::in_memory().await.unwrap();
        let pen = seed_product(&shop, "PEN-1", "Blue Pen", 5_000, 20).await;
        let book = seed_product(&shop, "NB-1", "Notebook", 10_000, 5).await;

        let sale = shop
            .sales()
            .checkout(
                &regular(
                    "9801234567",
                    vec![line(pen.product.id, 2), line(book.product.id, 1)],
                    22_600,
                ),
                CheckoutPolicy::default(),
            )
            .await
            .unwrap();

        assert!(sale.sale_number.starts_with("SAL"));
        assert!(sale.sale_number.ends_with(&format!("{:05}", sale.id)));
        assert!(sale.receipt_number.starts_with("REC"));
        assert_eq!(sale.subtotal_paisa, 20_000);
        assert_eq!(sale.tax_paisa, 2_600);
        assert_eq!(sale.total_paisa, 22_600);
        assert_eq!(sale.payment_status, PaymentStatus::Paid);

        assert_eq!(stock_of(&shop, pen.product.id).await, 18);
        assert_eq!(stock_of(&shop, book.product.id).await, 4);

        let detail = shop.sales().detail(sale.id).await.unwrap();
        assert_eq!(detail.items.len(), 2);
        assert_eq!(detail.items[0].product_name, "Blue Pen");
        let customer = detail.customer.unwrap();
        assert_eq!(customer.customer_name, WALK_IN_CUSTOMER_NAME);
        assert_eq!(customer.current_credit_paisa, 0);
        assert!(shop.credit().history(customer.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unpaid_checkout_goes_on_credit() {
        let shop = TenantDb::in_memory().await.unwrap();
        let pen = seed_product(&shop, "PEN-1", "Blue Pen", 10_000, 20).await;

        let sale = shop
            .sales()
            .checkout(
                &Checkout {
                    payment_method: PaymentMethod::Credit,
                    ..regular("9801234567", vec![line(pen.product.id, 1)], 0)
                },
                CheckoutPolicy::default(),
            )
            .await
            .unwrap();
        assert_eq!(sale.payment_status, PaymentStatus::Pending);

        let customer = shop.customers().get_by_phone("9801234567").await.unwrap();
        assert_eq!(customer.current_credit_paisa, 11_300);

        let history = shop.credit().history(customer.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].transaction_type, CreditTransactionType::Purchase);
        assert_eq!(history[0].description.as_deref(), Some("Sale on credit"));
        assert_eq!(history[0].related_sale_id, Some(sale.id));
    }

    #[tokio::test]
    async fn test_irregular_checkout_uses_default_name() {
        let shop = TenantDb::in_memory().await.unwrap();
        let pen = seed_product(&shop, "PEN-1", "Blue Pen", 5_000, 20).await;

        let sale = shop
            .sales()
            .checkout(
                &Checkout {
                    customer_type: CustomerType::Irregular,
                    lines: vec![line(pen.product.id, 1)],
                    paid: Some(Money::from_paisa(5_650)),
                    ..Default::default()
                },
                CheckoutPolicy::default(),
            )
            .await
            .unwrap();

        assert_eq!(sale.customer_id, None);
        let ir_id = sale.irregular_customer_id.unwrap();
        let ir = shop.customers().get_irregular(ir_id).await.unwrap();
        assert_eq!(ir.customer_name, IRREGULAR_CUSTOMER_NAME);
        assert_eq!(shop.sales().list_for_irregular(ir_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_checkout_leaves_no_trace() {
        let shop = TenantDb::in_memory().await.unwrap();
        let pen = seed_product(&shop, "PEN-1", "Blue Pen", 5_000, 1).await;

        let strict = CheckoutPolicy {
            allow_negative_stock: false,
            ..Default::default()
        };
        let err = shop
            .sales()
            .checkout(&regular("9801234567", vec![line(pen.product.id, 3)], 0), strict)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock {
                available: 1,
                requested: 3,
                ..
            })
        ));

        let err = shop
            .sales()
            .checkout(
                &regular("9801234567", vec![line(pen.product.id, 1), line(9_999, 1)], 0),
                CheckoutPolicy::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ProductNotFound(_))));

        assert_eq!(stock_of(&shop, pen.product.id).await, 1);
        assert!(shop.sales().list(&SaleFilter::default()).await.unwrap().is_empty());
        assert!(shop.customers().find_by_any_phone("9801234567").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_negative_stock_allowed_by_default() {
        let shop = TenantDb::in_memory().await.unwrap();
        let pen = seed_product(&shop, "PEN-1", "Blue Pen", 5_000, 1).await;

        shop.sales()
            .checkout(
                &Checkout {
                    lines: vec![line(pen.product.id, 3)],
                    ..Default::default()
                },
                CheckoutPolicy::default(),
            )
            .await
            .unwrap();
        assert_eq!(stock_of(&shop, pen.product.id).await, -2);
    }

    #[tokio::test]
    async fn test_return_restocks_and_reverses_credit() {
        let shop = TenantDb::in_memory().await.unwrap();
        let pen = seed_product(&shop, "PEN-1", "Blue Pen", 10_000, 10).await;

        // total 11_300, paid 3_300, due 8_000
        let sale = shop
            .sales()
            .checkout(
                &regular("9801234567", vec![line(pen.product.id, 1)], 3_300),
                CheckoutPolicy::default(),
            )
            .await
            .unwrap();
        assert_eq!(sale.payment_status, PaymentStatus::Partial);

        let returned = shop.sales().return_sale(sale.id, None).await.unwrap();
        assert_eq!(returned.order_status, OrderStatus::Returned);
        assert_eq!(stock_of(&shop, pen.product.id).await, 10);

        let customer = shop.customers().get_by_phone("9801234567").await.unwrap();
        assert_eq!(customer.current_credit_paisa, 0);
        let history = shop.credit().history(customer.id).await.unwrap();
        assert_eq!(history[0].transaction_type, CreditTransactionType::Refund);
        assert_eq!(history[0].amount_paisa, 8_000);

        let err = shop.sales().cancel_sale(sale.id, None).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidSaleStatus { .. })));

        let returns = shop.sales().returns(&SaleFilter::default()).await.unwrap();
        assert_eq!(returns.len(), 1);
    }

    #[tokio::test]
    async fn test_reversal_clamps_credit_at_zero() {
        let shop = TenantDb::in_memory().await.unwrap();
        let pen = seed_product(&shop, "PEN-1", "Blue Pen", 10_000, 10).await;

        let sale = shop
            .sales()
            .checkout(
                &Checkout {
                    payment_method: PaymentMethod::Credit,
                    ..regular("9801234567", vec![line(pen.product.id, 1)], 0)
                },
                CheckoutPolicy::default(),
            )
            .await
            .unwrap();
        let customer = shop.customers().get_by_phone("9801234567").await.unwrap();
        shop.credit()
            .pay(customer.id, Money::from_paisa(10_000), None, None)
            .await
            .unwrap();

        shop.sales().cancel_sale(sale.id, None).await.unwrap();
        let after = shop.customers().get(customer.id).await.unwrap();
        assert_eq!(after.current_credit_paisa, 0);
    }

    #[tokio::test]
    async fn test_return_of_credit_sale_reverses_its_total() {
        let shop = TenantDb::in_memory().await.unwrap();
        let pen = seed_product(&shop, "PEN-1", "Blue Pen", 10_000, 10).await;
        let on_credit = |paid| Checkout {
            payment_method: PaymentMethod::Credit,
            ..regular("9801234567", vec![line(pen.product.id, 1)], paid)
        };

        // Earlier unpaid credit sale stays on the books
        shop.sales()
            .checkout(&on_credit(0), CheckoutPolicy::default())
            .await
            .unwrap();
        let sale = shop
            .sales()
            .checkout(&on_credit(3_300), CheckoutPolicy::default())
            .await
            .unwrap();
        assert_eq!(sale.payment_status, PaymentStatus::Partial);

        let customer = shop.customers().get_by_phone("9801234567").await.unwrap();
        assert_eq!(customer.current_credit_paisa, 19_300);

        shop.sales().return_sale(sale.id, None).await.unwrap();

        let after = shop.customers().get(customer.id).await.unwrap();
        assert_eq!(after.current_credit_paisa, 8_000);
        let history = shop.credit().history(customer.id).await.unwrap();
        assert_eq!(history[0].transaction_type, CreditTransactionType::Refund);
        assert_eq!(history[0].amount_paisa, 11_300);
        assert_eq!(history[0].balance_after_paisa, 8_000);
    }

    #[tokio::test]
    async fn test_return_after_payment_edit_clears_credit() {
        let shop = TenantDb::in_memory().await.unwrap();
        let pen = seed_product(&shop, "PEN-1", "Blue Pen", 10_000, 10).await;

        let sale = shop
            .sales()
            .checkout(
                &Checkout {
                    payment_method: PaymentMethod::Credit,
                    ..regular("9801234567", vec![line(pen.product.id, 1)], 0)
                },
                CheckoutPolicy::default(),
            )
            .await
            .unwrap();

        let edit = PaymentEdit {
            payment_method: PaymentMethod::Credit,
            paid: Money::from_paisa(11_300),
            notes: None,
        };
        let edited = shop.sales().edit_payment(sale.id, &edit, None).await.unwrap();
        assert_eq!(edited.payment_status, PaymentStatus::Paid);

        let customer = shop.customers().get_by_phone("9801234567").await.unwrap();
        assert_eq!(customer.current_credit_paisa, 11_300);

        shop.sales().return_sale(sale.id, None).await.unwrap();
        let after = shop.customers().get(customer.id).await.unwrap();
        assert_eq!(after.current_credit_paisa, 0);
    }

    #[tokio::test]
    async fn test_edit_payment_adds_missing_credit_once() {
        let shop = TenantDb::in_memory().await.unwrap();
        let pen = seed_product(&shop, "PEN-1", "Blue Pen", 10_000, 10).await;

        let sale = shop
            .sales()
            .checkout(
                &regular("9801234567", vec![line(pen.product.id, 1)], 11_300),
                CheckoutPolicy::default(),
            )
            .await
            .unwrap();

        let edit = PaymentEdit {
            payment_method: PaymentMethod::Credit,
            paid: Money::from_paisa(1_300),
            notes: Some("pays next week".to_string()),
        };
        let edited = shop.sales().edit_payment(sale.id, &edit, None).await.unwrap();
        assert_eq!(edited.payment_status, PaymentStatus::Partial);
        assert_eq!(edited.notes.as_deref(), Some("pays next week"));

        shop.sales().edit_payment(sale.id, &edit, None).await.unwrap();

        let customer = shop.customers().get_by_phone("9801234567").await.unwrap();
        assert_eq!(customer.current_credit_paisa, 10_000);
        assert_eq!(shop.credit().history(customer.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_restocks_completed_sale() {
        let shop = TenantDb::in_memory().await.unwrap();
        let pen = seed_product(&shop, "PEN-1", "Blue Pen", 10_000, 10).await;

        let sale = shop
            .sales()
            .checkout(
                &Checkout {
                    payment_method: PaymentMethod::Credit,
                    ..regular("9801234567", vec![line(pen.product.id, 4)], 0)
                },
                CheckoutPolicy::default(),
            )
            .await
            .unwrap();
        assert_eq!(stock_of(&shop, pen.product.id).await, 6);

        shop.sales().delete(sale.id, None).await.unwrap();

        assert_eq!(stock_of(&shop, pen.product.id).await, 10);
        let customer = shop.customers().get_by_phone("9801234567").await.unwrap();
        assert_eq!(customer.current_credit_paisa, 0);
        assert!(matches!(shop.sales().get(sale.id).await, Err(DbError::NotFound { .. })));

        // Ledger entries survive with the sale link cleared
        let history = shop.credit().history(customer.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|t| t.related_sale_id.is_none()));
    }

    #[tokio::test]
    async fn test_list_filters_and_sorts() {
        let shop = TenantDb::in_memory().await.unwrap();
        let pen = seed_product(&shop, "PEN-1", "Blue Pen", 10_000, 50).await;
        let sales = shop.sales();

        let small = sales
            .checkout(
                &Checkout {
                    customer_name: Some("Ram".to_string()),
                    ..regular("9801111111", vec![line(pen.product.id, 1)], 11_300)
                },
                CheckoutPolicy::default(),
            )
            .await
            .unwrap();
        let big = sales
            .checkout(
                &Checkout {
                    customer_name: Some("Sita".to_string()),
                    ..regular("9802222222", vec![line(pen.product.id, 2)], 0)
                },
                CheckoutPolicy::default(),
            )
            .await
            .unwrap();

        let by_name = sales
            .list(&SaleFilter {
                query: Some("sit".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].sale.id, big.id);
        assert_eq!(by_name[0].customer_name.as_deref(), Some("Sita"));

        let by_amount = sales
            .list(&SaleFilter {
                query: Some("113".to_string()),
                filter_by: SaleSearch::Amount,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_amount.len(), 1);
        assert_eq!(by_amount[0].sale.id, small.id);

        let pending = sales
            .list(&SaleFilter {
                query: Some("Pending".to_string()),
                filter_by: SaleSearch::PaymentStatus,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);

        let ascending = sales
            .list(&SaleFilter {
                sort_by: SaleSort::AmountAsc,
                ..Default::default()
            })
            .await
            .unwrap();
        let ids: Vec<_> = ascending.iter().map(|s| s.sale.id).collect();
        assert_eq!(ids, [small.id, big.id]);

        let today = Period::local_today(Utc::now(), 0);
        let yesterday = Period {
            start: today.start - chrono::Duration::days(1),
            end: today.start - chrono::Duration::days(1) + chrono::Duration::hours(1),
        };
        let none = sales
            .list(&SaleFilter {
                period: Some(yesterday),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
