//! # Credit Repository
//!
//! The customer credit ledger.
//!
//! ## Running Balance
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  purchase  +amount   sale left unpaid ("Sale on credit")                │
//! │  payment   −amount   customer paid towards the balance                  │
//! │  refund    −amount   sale returned, cancelled or deleted (clamped ≥ 0)  │
//! │                                                                         │
//! │  Every entry stores balance_after = customers.current_credit right     │
//! │  after it was applied, inside the same transaction.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use kirana_core::sale::reduce_credit;
use kirana_core::{CoreError, CreditTransaction, CreditTransactionType, Money};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::non_blank;

const TRANSACTION_COLUMNS: &str = "id, customer_id, transaction_type, amount_paisa, \
     balance_after_paisa, description, related_sale_id, created_by, created_at";

pub const DEFAULT_PAYMENT_DESCRIPTION: &str = "Payment received";
pub const SALE_ON_CREDIT_DESCRIPTION: &str = "Sale on credit";

#[derive(Debug, Clone)]
pub struct CreditRepository {
    pool: SqlitePool,
}

impl CreditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CreditRepository { pool }
    }

    /// Ledger of one customer, newest first.
    pub async fn history(&self, customer_id: i64) -> DbResult<Vec<CreditTransaction>> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM credit_transactions \
             WHERE customer_id = ?1 ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, CreditTransaction>(&sql)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// A payment entry, for its receipt. Other entry types are not found.
    pub async fn get_payment(&self, id: i64) -> DbResult<CreditTransaction> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM credit_transactions \
             WHERE id = ?1 AND transaction_type = 'payment'"
        );
        sqlx::query_as::<_, CreditTransaction>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Payment", id))
    }

    /// Records a customer paying towards their credit.
    ///
    /// ## Errors
    /// - [`CoreError::InvalidPaymentAmount`] for zero or negative amounts
    /// - [`CoreError::PaymentExceedsCredit`] when paying more than is owed
    /// - `DbError::NotFound` for an unknown customer
    pub async fn pay(
        &self,
        customer_id: i64,
        amount: Money,
        description: Option<&str>,
        created_by: Option<i64>,
    ) -> DbResult<CreditTransaction> {
        if !amount.is_positive() {
            return Err(CoreError::InvalidPaymentAmount {
                reason: "Payment amount must be greater than zero.".to_string(),
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;

        let current = credit_of_in(&mut tx, customer_id).await?;
        if amount > current {
            return Err(CoreError::PaymentExceedsCredit.into());
        }

        let now = Utc::now();
        let balance = adjust_credit_in(&mut tx, customer_id, -amount, now).await?;
        let description =
            non_blank(description).unwrap_or_else(|| DEFAULT_PAYMENT_DESCRIPTION.to_string());
        let entry = record_in(
            &mut tx,
            &LedgerEntry {
                customer_id,
                transaction_type: CreditTransactionType::Payment,
                amount,
                balance_after: balance,
                description: &description,
                related_sale_id: None,
                created_by,
            },
            now,
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            customer_id,
            amount = amount.paisa(),
            balance = balance.paisa(),
            "Credit payment recorded"
        );
        Ok(entry)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// One ledger entry to write.
pub(crate) struct LedgerEntry<'a> {
    pub customer_id: i64,
    pub transaction_type: CreditTransactionType,
    pub amount: Money,
    pub balance_after: Money,
    pub description: &'a str,
    pub related_sale_id: Option<i64>,
    pub created_by: Option<i64>,
}

pub(crate) async fn record_in(
    conn: &mut SqliteConnection,
    entry: &LedgerEntry<'_>,
    now: DateTime<Utc>,
) -> DbResult<CreditTransaction> {
    let sql = format!(
        "INSERT INTO credit_transactions (customer_id, transaction_type, amount_paisa, \
         balance_after_paisa, description, related_sale_id, created_by, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) RETURNING {TRANSACTION_COLUMNS}"
    );
    let row = sqlx::query_as::<_, CreditTransaction>(&sql)
        .bind(entry.customer_id)
        .bind(entry.transaction_type)
        .bind(entry.amount.paisa())
        .bind(entry.balance_after.paisa())
        .bind(entry.description)
        .bind(entry.related_sale_id)
        .bind(entry.created_by)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;
    Ok(row)
}

pub(crate) async fn credit_of_in(conn: &mut SqliteConnection, customer_id: i64) -> DbResult<Money> {
    let credit: Option<i64> =
        sqlx::query_scalar("SELECT current_credit_paisa FROM customers WHERE id = ?1")
            .bind(customer_id)
            .fetch_optional(&mut *conn)
            .await?;
    credit
        .map(Money::from_paisa)
        .ok_or_else(|| DbError::not_found("Customer", customer_id))
}

/// Adds `delta` to a customer's credit and returns the new balance.
pub(crate) async fn adjust_credit_in(
    conn: &mut SqliteConnection,
    customer_id: i64,
    delta: Money,
    now: DateTime<Utc>,
) -> DbResult<Money> {
    let balance: Option<i64> = sqlx::query_scalar(
        "UPDATE customers SET current_credit_paisa = current_credit_paisa + ?1, \
         updated_date = ?2 WHERE id = ?3 RETURNING current_credit_paisa",
    )
    .bind(delta.paisa())
    .bind(now)
    .bind(customer_id)
    .fetch_optional(&mut *conn)
    .await?;
    balance
        .map(Money::from_paisa)
        .ok_or_else(|| DbError::not_found("Customer", customer_id))
}

/// True when a purchase entry already exists for the sale.
pub(crate) async fn purchase_recorded_in(conn: &mut SqliteConnection, sale_id: i64) -> DbResult<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM credit_transactions \
         WHERE related_sale_id = ?1 AND transaction_type = 'purchase'",
    )
    .bind(sale_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count > 0)
}

/// Adds an unpaid sale balance to the customer's credit.
pub(crate) async fn add_purchase_in(
    conn: &mut SqliteConnection,
    customer_id: i64,
    sale_id: i64,
    amount: Money,
    created_by: Option<i64>,
    now: DateTime<Utc>,
) -> DbResult<CreditTransaction> {
    let balance = adjust_credit_in(conn, customer_id, amount, now).await?;
    let entry = record_in(
        conn,
        &LedgerEntry {
            customer_id,
            transaction_type: CreditTransactionType::Purchase,
            amount,
            balance_after: balance,
            description: SALE_ON_CREDIT_DESCRIPTION,
            related_sale_id: Some(sale_id),
            created_by,
        },
        now,
    )
    .await?;
    debug!(customer_id, sale_id, amount = amount.paisa(), "Sale added to credit");
    Ok(entry)
}

/// Reverses `reversal` of a customer's credit, never below zero, and logs
/// a refund entry for the amount actually taken off.
pub(crate) async fn refund_in(
    conn: &mut SqliteConnection,
    customer_id: i64,
    sale_id: i64,
    reversal: Money,
    description: &str,
    created_by: Option<i64>,
    now: DateTime<Utc>,
) -> DbResult<CreditTransaction> {
    let current = credit_of_in(conn, customer_id).await?;
    let balance = reduce_credit(current, reversal);
    let taken = current - balance;
    adjust_credit_in(conn, customer_id, -taken, now).await?;

    let entry = record_in(
        conn,
        &LedgerEntry {
            customer_id,
            transaction_type: CreditTransactionType::Refund,
            amount: taken,
            balance_after: balance,
            description,
            related_sale_id: Some(sale_id),
            created_by,
        },
        now,
    )
    .await?;
    debug!(customer_id, sale_id, amount = taken.paisa(), "Credit reversed");
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::TenantDb;
    use crate::repository::customer::tests::{input, set_credit};

    #[tokio::test]
    async fn test_pay_reduces_credit_and_records_balance() {
        let shop = TenantDb::in_memory().await.unwrap();
        let customer = shop.customers().create(&input("9801234567", "Ram")).await.unwrap();
        set_credit(&shop, customer.id, 10_000).await;

        let entry = shop
            .credit()
            .pay(customer.id, Money::from_paisa(4_000), None, None)
            .await
            .unwrap();
        assert_eq!(entry.transaction_type, CreditTransactionType::Payment);
        assert_eq!(entry.amount_paisa, 4_000);
        assert_eq!(entry.balance_after_paisa, 6_000);
        assert_eq!(entry.description.as_deref(), Some(DEFAULT_PAYMENT_DESCRIPTION));

        let after = shop.customers().get(customer.id).await.unwrap();
        assert_eq!(after.current_credit_paisa, 6_000);

        let receipt = shop.credit().get_payment(entry.id).await.unwrap();
        assert_eq!(receipt.id, entry.id);
        assert_eq!(shop.credit().history(customer.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pay_more_than_owed_is_rejected() {
        let shop = TenantDb::in_memory().await.unwrap();
        let customer = shop.customers().create(&input("9801234567", "Ram")).await.unwrap();
        set_credit(&shop, customer.id, 1_000).await;

        let err = shop
            .credit()
            .pay(customer.id, Money::from_paisa(1_001), Some("cash"), None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Payment exceeds current credit balance.");

        let err = shop
            .credit()
            .pay(customer.id, Money::zero(), None, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Payment amount must be greater than zero.");

        let unchanged = shop.customers().get(customer.id).await.unwrap();
        assert_eq!(unchanged.current_credit_paisa, 1_000);
        assert!(shop.credit().history(customer.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_payment_ignores_other_entries() {
        let shop = TenantDb::in_memory().await.unwrap();
        let customer = shop.customers().create(&input("9801234567", "Ram")).await.unwrap();

        let mut conn = shop.database().pool().acquire().await.unwrap();
        let adjustment = record_in(
            &mut conn,
            &LedgerEntry {
                customer_id: customer.id,
                transaction_type: CreditTransactionType::Adjustment,
                amount: Money::from_paisa(500),
                balance_after: Money::from_paisa(500),
                description: "Opening balance",
                related_sale_id: None,
                created_by: None,
            },
            Utc::now(),
        )
        .await
        .unwrap();
        drop(conn);

        assert!(matches!(
            shop.credit().get_payment(adjustment.id).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
