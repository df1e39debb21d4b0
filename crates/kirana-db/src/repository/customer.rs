//! # Customer Repository
//!
//! Registered customers (keyed by phone) and irregular walk-up customers.
//!
//! ## Two Kinds of Customer
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  customers            phone_number UNIQUE, carries a credit balance     │
//! │                       ◄── get_or_create_in at checkout (regular)        │
//! │                                                                         │
//! │  irregular_customers  free-form name/phone/address, one row per sale   │
//! │                       ◄── create_irregular_in at checkout (irregular)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use kirana_core::validation::{validate_email, validate_name, validate_phone};
use kirana_core::{Customer, IrregularCustomer, Money, ValidationError};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::{non_blank, push_contains_any};

const CUSTOMER_COLUMNS: &str = "id, phone_number, secondary_phone_number, customer_name, email, \
     address, city, notes, current_credit_paisa, loyalty_points, registration_date, updated_date";

const IRREGULAR_COLUMNS: &str = "id, customer_name, phone_number, address, created_at";

const PHONE_TAKEN: &str = "A customer with this phone number already exists.";

// =============================================================================
// Inputs and Filters
// =============================================================================

/// Fields of a customer form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CustomerInput {
    pub phone_number: String,
    pub secondary_phone_number: Option<String>,
    pub customer_name: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub notes: Option<String>,
}

/// Column matched by the customer list search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerSearch {
    #[default]
    Name,
    Phone,
    SecondaryPhone,
    Email,
    /// Address or city.
    Address,
    /// Exact credit balance in rupees.
    Credit,
    All,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerSort {
    #[default]
    NameAsc,
    NameDesc,
    CreditAsc,
    CreditDesc,
}

#[derive(Debug, Clone, Default)]
pub struct CustomerFilter {
    pub query: Option<String>,
    pub filter_by: CustomerSearch,
    pub sort_by: CustomerSort,
}

/// Registered and irregular customers matching one filter.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CustomerListing {
    pub customers: Vec<Customer>,
    pub irregular: Vec<IrregularCustomer>,
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Registers a customer.
    ///
    /// ## Errors
    /// - "A customer with this phone number already exists."
    /// - Validation errors for name, phone and e-mail
    pub async fn create(&self, input: &CustomerInput) -> DbResult<Customer> {
        let fields = CleanInput::from_input(input)?;
        let now = Utc::now();

        let sql = format!(
            "INSERT INTO customers (phone_number, secondary_phone_number, customer_name, email, \
             address, city, notes, current_credit_paisa, loyalty_points, registration_date, \
             updated_date) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 0, ?8, ?8) \
             RETURNING {CUSTOMER_COLUMNS}"
        );
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(&fields.phone_number)
            .bind(&fields.secondary_phone_number)
            .bind(&fields.customer_name)
            .bind(&fields.email)
            .bind(&fields.address)
            .bind(&fields.city)
            .bind(&fields.notes)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(phone_taken)?;

        debug!(id = customer.id, phone = %customer.phone_number, "Customer created");
        Ok(customer)
    }

    pub async fn get(&self, id: i64) -> DbResult<Customer> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1");
        sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }

    pub async fn get_by_phone(&self, phone: &str) -> DbResult<Customer> {
        let phone = phone.trim();
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE phone_number = ?1");
        sqlx::query_as::<_, Customer>(&sql)
            .bind(phone)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", phone))
    }

    /// POS lookup: matches the primary or the secondary phone.
    pub async fn find_by_any_phone(&self, phone: &str) -> DbResult<Option<Customer>> {
        let phone = phone.trim();
        if phone.is_empty() {
            return Ok(None);
        }
        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers \
             WHERE phone_number = ?1 OR secondary_phone_number = ?1 \
             ORDER BY phone_number = ?1 DESC LIMIT 1"
        );
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(phone)
            .fetch_optional(&self.pool)
            .await?;
        Ok(customer)
    }

    /// Lists registered customers and irregular customers with one filter.
    ///
    /// Irregular customers have no e-mail, city or credit, so those
    /// searches only ever return registered customers.
    pub async fn list(&self, filter: &CustomerFilter) -> DbResult<CustomerListing> {
        let query = non_blank(filter.query.as_deref());

        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {CUSTOMER_COLUMNS} FROM customers"));
        qb.push(" WHERE 1 = 1");
        if let Some(q) = &query {
            if filter.filter_by == CustomerSearch::Credit {
                match q.parse::<Money>() {
                    Ok(credit) => {
                        qb.push(" AND current_credit_paisa = ").push_bind(credit.paisa());
                    }
                    Err(_) => return Ok(CustomerListing::default()),
                }
            } else {
                let columns: &[&str] = match filter.filter_by {
                    CustomerSearch::Name | CustomerSearch::Credit => &["customer_name"],
                    CustomerSearch::Phone => &["phone_number"],
                    CustomerSearch::SecondaryPhone => &["secondary_phone_number"],
                    CustomerSearch::Email => &["email"],
                    CustomerSearch::Address => &["address", "city"],
                    CustomerSearch::All => &[
                        "customer_name",
                        "phone_number",
                        "secondary_phone_number",
                        "email",
                        "address",
                        "city",
                    ],
                };
                push_contains_any(&mut qb, columns, q);
            }
        }
        push_customer_order(&mut qb, filter.sort_by);

        let customers = qb
            .build_query_as::<Customer>()
            .fetch_all(&self.pool)
            .await?;

        let irregular_columns: Option<&[&str]> = match filter.filter_by {
            CustomerSearch::Name => Some(&["customer_name"]),
            CustomerSearch::Phone => Some(&["phone_number"]),
            CustomerSearch::Address => Some(&["address"]),
            CustomerSearch::All => Some(&["customer_name", "phone_number", "address"]),
            CustomerSearch::SecondaryPhone | CustomerSearch::Email | CustomerSearch::Credit => None,
        };
        let irregular = match (&query, irregular_columns) {
            (None, _) => self.irregular_matching(None).await?,
            (Some(q), Some(columns)) => self.irregular_matching(Some((columns, q))).await?,
            (Some(_), None) => Vec::new(),
        };

        Ok(CustomerListing {
            customers,
            irregular,
        })
    }

    async fn irregular_matching(
        &self,
        search: Option<(&[&str], &String)>,
    ) -> DbResult<Vec<IrregularCustomer>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {IRREGULAR_COLUMNS} FROM irregular_customers WHERE 1 = 1"
        ));
        if let Some((columns, q)) = search {
            push_contains_any(&mut qb, columns, q);
        }
        qb.push(" ORDER BY created_at DESC, id DESC");
        let rows = qb
            .build_query_as::<IrregularCustomer>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Customers who owe credit, for the credit records page.
    ///
    /// Only `Name`, `Phone` (primary or secondary), `Email`, `Credit` and
    /// `All` are meaningful here; other searches fall back to name.
    pub async fn with_credit(&self, filter: &CustomerFilter) -> DbResult<Vec<Customer>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {CUSTOMER_COLUMNS} FROM customers"));
        qb.push(" WHERE current_credit_paisa > 0");

        if let Some(q) = non_blank(filter.query.as_deref()) {
            if filter.filter_by == CustomerSearch::Credit {
                match q.parse::<Money>() {
                    Ok(credit) => {
                        qb.push(" AND current_credit_paisa = ").push_bind(credit.paisa());
                    }
                    Err(_) => return Ok(Vec::new()),
                }
            } else {
                let columns: &[&str] = match filter.filter_by {
                    CustomerSearch::Phone | CustomerSearch::SecondaryPhone => {
                        &["phone_number", "secondary_phone_number"]
                    }
                    CustomerSearch::Email => &["email"],
                    CustomerSearch::All => &[
                        "customer_name",
                        "phone_number",
                        "secondary_phone_number",
                        "email",
                    ],
                    _ => &["customer_name"],
                };
                push_contains_any(&mut qb, columns, &q);
            }
        }
        push_customer_order(&mut qb, filter.sort_by);

        let customers = qb
            .build_query_as::<Customer>()
            .fetch_all(&self.pool)
            .await?;
        Ok(customers)
    }

    /// Edits the customer with `phone`. The primary phone may change too.
    pub async fn update_by_phone(&self, phone: &str, input: &CustomerInput) -> DbResult<Customer> {
        let current = self.get_by_phone(phone).await?;
        let fields = CleanInput::from_input(input)?;

        let sql = format!(
            "UPDATE customers SET phone_number = ?1, secondary_phone_number = ?2, \
             customer_name = ?3, email = ?4, address = ?5, city = ?6, notes = ?7, \
             updated_date = ?8 WHERE id = ?9 RETURNING {CUSTOMER_COLUMNS}"
        );
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(&fields.phone_number)
            .bind(&fields.secondary_phone_number)
            .bind(&fields.customer_name)
            .bind(&fields.email)
            .bind(&fields.address)
            .bind(&fields.city)
            .bind(&fields.notes)
            .bind(Utc::now())
            .bind(current.id)
            .fetch_one(&self.pool)
            .await
            .map_err(phone_taken)?;

        debug!(id = customer.id, "Customer updated");
        Ok(customer)
    }

    /// Deletes a customer; their sales keep existing without one.
    pub async fn delete_by_phone(&self, phone: &str) -> DbResult<()> {
        let phone = phone.trim();
        let result = sqlx::query("DELETE FROM customers WHERE phone_number = ?1")
            .bind(phone)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", phone));
        }
        debug!(phone = %phone, "Customer deleted");
        Ok(())
    }

    pub async fn get_irregular(&self, id: i64) -> DbResult<IrregularCustomer> {
        let sql = format!("SELECT {IRREGULAR_COLUMNS} FROM irregular_customers WHERE id = ?1");
        sqlx::query_as::<_, IrregularCustomer>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Irregular customer", id))
    }
}

// =============================================================================
// Checkout Helpers
// =============================================================================

/// Returns the customer with `phone`, registering them with `name` if new.
pub(crate) async fn get_or_create_in(
    conn: &mut SqliteConnection,
    phone: &str,
    name: &str,
    now: DateTime<Utc>,
) -> DbResult<Customer> {
    let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE phone_number = ?1");
    if let Some(existing) = sqlx::query_as::<_, Customer>(&sql)
        .bind(phone)
        .fetch_optional(&mut *conn)
        .await?
    {
        return Ok(existing);
    }

    validate_phone(phone)?;
    let sql = format!(
        "INSERT INTO customers (phone_number, customer_name, current_credit_paisa, \
         loyalty_points, registration_date, updated_date) VALUES (?1, ?2, 0, 0, ?3, ?3) \
         RETURNING {CUSTOMER_COLUMNS}"
    );
    let customer = sqlx::query_as::<_, Customer>(&sql)
        .bind(phone)
        .bind(name)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

    debug!(id = customer.id, phone = %phone, "Customer registered at checkout");
    Ok(customer)
}

pub(crate) async fn create_irregular_in(
    conn: &mut SqliteConnection,
    name: &str,
    phone: Option<&str>,
    address: Option<&str>,
    now: DateTime<Utc>,
) -> DbResult<i64> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO irregular_customers (customer_name, phone_number, address, created_at) \
         VALUES (?1, ?2, ?3, ?4) RETURNING id",
    )
    .bind(name)
    .bind(phone)
    .bind(address)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

// =============================================================================
// Helpers
// =============================================================================

struct CleanInput {
    phone_number: String,
    secondary_phone_number: Option<String>,
    customer_name: String,
    email: Option<String>,
    address: Option<String>,
    city: Option<String>,
    notes: Option<String>,
}

impl CleanInput {
    fn from_input(input: &CustomerInput) -> DbResult<Self> {
        let phone_number = input.phone_number.trim().to_string();
        let customer_name = input.customer_name.trim().to_string();
        if phone_number.is_empty() {
            return Err(ValidationError::Required {
                field: "phone_number".to_string(),
            }
            .into());
        }
        validate_phone(&phone_number)?;
        validate_name("customer_name", &customer_name, 100)?;

        let secondary_phone_number = non_blank(input.secondary_phone_number.as_deref());
        if let Some(secondary) = &secondary_phone_number {
            validate_phone(secondary)?;
        }
        let email = non_blank(input.email.as_deref()).map(|e| e.to_lowercase());
        if let Some(email) = &email {
            validate_email(email)?;
        }

        Ok(CleanInput {
            phone_number,
            secondary_phone_number,
            customer_name,
            email,
            address: non_blank(input.address.as_deref()),
            city: non_blank(input.city.as_deref()),
            notes: non_blank(input.notes.as_deref()),
        })
    }
}

fn push_customer_order(qb: &mut QueryBuilder<'_, Sqlite>, sort: CustomerSort) {
    qb.push(match sort {
        CustomerSort::NameAsc => " ORDER BY customer_name COLLATE NOCASE, id",
        CustomerSort::NameDesc => " ORDER BY customer_name COLLATE NOCASE DESC, id DESC",
        CustomerSort::CreditAsc => " ORDER BY current_credit_paisa, customer_name COLLATE NOCASE",
        CustomerSort::CreditDesc => {
            " ORDER BY current_credit_paisa DESC, customer_name COLLATE NOCASE"
        }
    });
}

fn phone_taken(err: sqlx::Error) -> DbError {
    match DbError::from(err) {
        e if e.is_unique_violation_on("customers.phone_number") => {
            ValidationError::rule(PHONE_TAKEN).into()
        }
        other => other,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pool::TenantDb;

    pub(crate) fn input(phone: &str, name: &str) -> CustomerInput {
        CustomerInput {
            phone_number: phone.to_string(),
            customer_name: name.to_string(),
            ..Default::default()
        }
    }

    pub(crate) async fn set_credit(shop: &TenantDb, customer_id: i64, paisa: i64) {
        sqlx::query("UPDATE customers SET current_credit_paisa = ?1 WHERE id = ?2")
            .bind(paisa)
            .bind(customer_id)
            .execute(shop.database().pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_customer_crud_by_phone() {
        let shop = TenantDb::in_memory().await.unwrap();
        let repo = shop.customers();

        let created = repo
            .create(&CustomerInput {
                email: Some(" Ram@Example.com ".to_string()),
                secondary_phone_number: Some("9812345678".to_string()),
                ..input("9801234567", "Ram Bahadur")
            })
            .await
            .unwrap();
        assert_eq!(created.email.as_deref(), Some("ram@example.com"));
        assert_eq!(created.current_credit_paisa, 0);

        let fetched = repo.get_by_phone("9801234567").await.unwrap();
        assert_eq!(fetched.id, created.id);

        let updated = repo
            .update_by_phone(
                "9801234567",
                &CustomerInput {
                    city: Some("Pokhara".to_string()),
                    ..input("9801234567", "Ram B. Thapa")
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.customer_name, "Ram B. Thapa");
        assert_eq!(updated.city.as_deref(), Some("Pokhara"));
        assert_eq!(updated.secondary_phone_number, None);

        repo.delete_by_phone("9801234567").await.unwrap();
        assert!(matches!(
            repo.get_by_phone("9801234567").await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_phone_is_rejected() {
        let shop = TenantDb::in_memory().await.unwrap();
        let repo = shop.customers();

        repo.create(&input("9801234567", "Ram")).await.unwrap();
        let err = repo.create(&input("9801234567", "Shyam")).await.unwrap_err();
        assert_eq!(err.to_string(), PHONE_TAKEN);
    }

    #[tokio::test]
    async fn test_find_by_secondary_phone() {
        let shop = TenantDb::in_memory().await.unwrap();
        let repo = shop.customers();

        repo.create(&CustomerInput {
            secondary_phone_number: Some("9812345678".to_string()),
            ..input("9801234567", "Sita")
        })
        .await
        .unwrap();

        let found = repo.find_by_any_phone("9812345678").await.unwrap().unwrap();
        assert_eq!(found.customer_name, "Sita");
        assert!(repo.find_by_any_phone("9800000000").await.unwrap().is_none());
        assert!(repo.find_by_any_phone("  ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_filters_and_sorts() {
        let shop = TenantDb::in_memory().await.unwrap();
        let repo = shop.customers();

        let ram = repo.create(&input("9801111111", "Ram")).await.unwrap();
        let sita = repo
            .create(&CustomerInput {
                city: Some("Kathmandu".to_string()),
                ..input("9802222222", "Sita")
            })
            .await
            .unwrap();
        set_credit(&shop, ram.id, 50_000).await;
        set_credit(&shop, sita.id, 12_000).await;

        let by_credit = repo
            .list(&CustomerFilter {
                sort_by: CustomerSort::CreditDesc,
                ..Default::default()
            })
            .await
            .unwrap();
        let names: Vec<_> = by_credit.customers.iter().map(|c| c.customer_name.as_str()).collect();
        assert_eq!(names, ["Ram", "Sita"]);

        let by_city = repo
            .list(&CustomerFilter {
                query: Some("kathmandu".to_string()),
                filter_by: CustomerSearch::Address,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_city.customers.len(), 1);
        assert_eq!(by_city.customers[0].id, sita.id);

        let exact_credit = repo
            .list(&CustomerFilter {
                query: Some("500".to_string()),
                filter_by: CustomerSearch::Credit,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(exact_credit.customers.len(), 1);
        assert_eq!(exact_credit.customers[0].id, ram.id);

        let garbage = repo
            .list(&CustomerFilter {
                query: Some("lots".to_string()),
                filter_by: CustomerSearch::Credit,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(garbage.customers.is_empty());
    }

    #[tokio::test]
    async fn test_with_credit_only_lists_debtors() {
        let shop = TenantDb::in_memory().await.unwrap();
        let repo = shop.customers();

        let ram = repo.create(&input("9801111111", "Ram")).await.unwrap();
        repo.create(&input("9802222222", "Sita")).await.unwrap();
        set_credit(&shop, ram.id, 2_500).await;

        let debtors = repo.with_credit(&CustomerFilter::default()).await.unwrap();
        assert_eq!(debtors.len(), 1);
        assert_eq!(debtors[0].id, ram.id);

        let by_phone = repo
            .with_credit(&CustomerFilter {
                query: Some("2222".to_string()),
                filter_by: CustomerSearch::Phone,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(by_phone.is_empty());
    }

    #[tokio::test]
    async fn test_checkout_helpers() {
        let shop = TenantDb::in_memory().await.unwrap();
        let mut conn = shop.database().pool().acquire().await.unwrap();
        let now = Utc::now();

        let first = get_or_create_in(&mut conn, "9801234567", "Walk-in Customer", now)
            .await
            .unwrap();
        let again = get_or_create_in(&mut conn, "9801234567", "Someone Else", now)
            .await
            .unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(again.customer_name, "Walk-in Customer");

        let ir = create_irregular_in(&mut conn, "IR Customer", None, Some("Baneshwor"), now)
            .await
            .unwrap();
        drop(conn);

        let irregular = shop.customers().get_irregular(ir).await.unwrap();
        assert_eq!(irregular.address.as_deref(), Some("Baneshwor"));

        let listing = shop.customers().list(&CustomerFilter::default()).await.unwrap();
        assert_eq!(listing.customers.len(), 1);
        assert_eq!(listing.irregular.len(), 1);
    }
}
