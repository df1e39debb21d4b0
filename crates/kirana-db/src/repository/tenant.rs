//! # Tenant Repository
//!
//! Vendor records in the platform database.
//!
//! A tenant row is the only link between the platform and a shop
//! database: `db_name` names the shop file and `admin_user_id` points at
//! the platform account of the vendor owner.

use chrono::Utc;
use kirana_core::tenant::default_db_name;
use kirana_core::{AccessFlags, Tenant, TenantStatus};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};

const TENANT_COLUMNS: &str = "id, name, code, owner_email, db_name, access_customers, \
     access_vendors, access_inventory, access_sales, access_reports, admin_user_id, \
     status, is_active, created_at, updated_at";

/// Input for a new vendor.
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub name: String,
    /// Stored lowercased.
    pub code: String,
    pub owner_email: String,
    /// Defaults to `shop_{code}`.
    pub db_name: Option<String>,
    pub access: AccessFlags,
}

/// Editable vendor fields.
#[derive(Debug, Clone)]
pub struct TenantUpdate {
    pub name: String,
    pub status: TenantStatus,
    pub access: AccessFlags,
}

/// Vendor counts for the superadmin dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TenantCounts {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
}

/// Repository for vendor records.
#[derive(Debug, Clone)]
pub struct TenantRepository {
    pool: SqlitePool,
}

impl TenantRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TenantRepository { pool }
    }

    /// Inserts a vendor. New vendors start active.
    ///
    /// ## Errors
    /// `DbError::UniqueViolation` on `tenants.code` or `tenants.db_name`.
    pub async fn create(&self, new: &NewTenant) -> DbResult<Tenant> {
        let code = new.code.trim().to_lowercase();
        let db_name = new
            .db_name
            .clone()
            .unwrap_or_else(|| default_db_name(&code));
        let now = Utc::now();

        debug!(code = %code, db_name = %db_name, "Creating tenant");

        let sql = format!(
            "INSERT INTO tenants (name, code, owner_email, db_name, access_customers, \
             access_vendors, access_inventory, access_sales, access_reports, status, \
             is_active, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'active', 1, ?10, ?10) \
             RETURNING {TENANT_COLUMNS}"
        );

        let tenant = sqlx::query_as::<_, Tenant>(&sql)
            .bind(new.name.trim())
            .bind(&code)
            .bind(new.owner_email.trim().to_lowercase())
            .bind(&db_name)
            .bind(new.access.customers)
            .bind(new.access.vendors)
            .bind(new.access.inventory)
            .bind(new.access.sales)
            .bind(new.access.reports)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { field, .. } => {
                    let value = if field == "tenants.code" { code.clone() } else { db_name.clone() };
                    DbError::duplicate(field, value)
                }
                other => other,
            })?;

        Ok(tenant)
    }

    pub async fn get(&self, id: i64) -> DbResult<Tenant> {
        let sql = format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id = ?1");
        sqlx::query_as::<_, Tenant>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Tenant", id))
    }

    /// Finds a vendor by code, case-insensitively, in any state.
    pub async fn find_by_code(&self, code: &str) -> DbResult<Option<Tenant>> {
        let sql = format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE code = ?1");
        let tenant = sqlx::query_as::<_, Tenant>(&sql)
            .bind(code.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }

    /// Finds an active vendor by code, case-insensitively.
    pub async fn find_active_by_code(&self, code: &str) -> DbResult<Option<Tenant>> {
        Ok(self
            .find_by_code(code)
            .await?
            .filter(|t| t.is_active))
    }

    /// Finds the newest active vendor owned by `email`.
    pub async fn find_active_by_owner_email(&self, email: &str) -> DbResult<Option<Tenant>> {
        let sql = format!(
            "SELECT {TENANT_COLUMNS} FROM tenants \
             WHERE owner_email = ?1 COLLATE NOCASE AND is_active = 1 \
             ORDER BY created_at DESC, id DESC LIMIT 1"
        );
        let tenant = sqlx::query_as::<_, Tenant>(&sql)
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }

    pub async fn code_exists(&self, code: &str) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tenants WHERE code = ?1")
            .bind(code.trim())
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// All vendors, newest first.
    pub async fn list(&self) -> DbResult<Vec<Tenant>> {
        let sql = format!("SELECT {TENANT_COLUMNS} FROM tenants ORDER BY created_at DESC, id DESC");
        let tenants = sqlx::query_as::<_, Tenant>(&sql)
            .fetch_all(&self.pool)
            .await?;
        debug!(count = tenants.len(), "Listed tenants");
        Ok(tenants)
    }

    pub async fn counts(&self) -> DbResult<TenantCounts> {
        let (total, active): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN is_active = 1 THEN 1 ELSE 0 END), 0) FROM tenants",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(TenantCounts {
            total,
            active,
            inactive: total - active,
        })
    }

    /// Links the vendor to its platform owner account.
    pub async fn set_admin_user(&self, id: i64, user_id: i64) -> DbResult<()> {
        let result = sqlx::query("UPDATE tenants SET admin_user_id = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(user_id)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Tenant", id));
        }
        Ok(())
    }

    /// Updates name, status and access switches.
    ///
    /// `is_active` follows the status: only `active` vendors are active.
    pub async fn update(&self, id: i64, update: &TenantUpdate) -> DbResult<Tenant> {
        let result = sqlx::query(
            "UPDATE tenants SET name = ?1, status = ?2, is_active = ?3, access_customers = ?4, \
             access_vendors = ?5, access_inventory = ?6, access_sales = ?7, access_reports = ?8, \
             updated_at = ?9 WHERE id = ?10",
        )
        .bind(update.name.trim())
        .bind(update.status)
        .bind(update.status == TenantStatus::Active)
        .bind(update.access.customers)
        .bind(update.access.vendors)
        .bind(update.access.inventory)
        .bind(update.access.sales)
        .bind(update.access.reports)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Tenant", id));
        }
        self.get(id).await
    }

    /// Activates or deactivates a vendor.
    pub async fn set_active(&self, id: i64, active: bool) -> DbResult<Tenant> {
        let status = if active {
            TenantStatus::Active
        } else {
            TenantStatus::Inactive
        };

        let result = sqlx::query(
            "UPDATE tenants SET is_active = ?1, status = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(active)
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Tenant", id));
        }
        debug!(tenant_id = id, active, "Tenant activation changed");
        self.get(id).await
    }

    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM tenants WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Tenant", id));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PlatformDb;

    fn new_tenant(code: &str) -> NewTenant {
        NewTenant {
            name: format!("{} Stationers", code),
            code: code.to_string(),
            owner_email: format!("Owner@{}.np", code),
            db_name: None,
            access: AccessFlags::default(),
        }
    }

    #[tokio::test]
    async fn test_create_and_find_by_code() {
        let platform = PlatformDb::in_memory().await.unwrap();
        let repo = platform.tenants();

        let tenant = repo.create(&new_tenant("KTM")).await.unwrap();
        assert_eq!(tenant.code, "ktm");
        assert_eq!(tenant.db_name, "shop_ktm");
        assert_eq!(tenant.owner_email, "owner@ktm.np");
        assert!(tenant.is_active);
        assert_eq!(tenant.status, TenantStatus::Active);

        let found = repo.find_active_by_code("Ktm").await.unwrap().unwrap();
        assert_eq!(found.id, tenant.id);
        assert!(repo.code_exists("ktm").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let platform = PlatformDb::in_memory().await.unwrap();
        let repo = platform.tenants();

        repo.create(&new_tenant("pkr")).await.unwrap();
        let err = repo.create(&new_tenant("PKR")).await.unwrap_err();
        assert!(err.is_unique_violation_on("tenants.code"));
    }

    #[tokio::test]
    async fn test_deactivated_tenant_not_found_as_active() {
        let platform = PlatformDb::in_memory().await.unwrap();
        let repo = platform.tenants();

        let tenant = repo.create(&new_tenant("brt")).await.unwrap();
        let tenant = repo.set_active(tenant.id, false).await.unwrap();
        assert_eq!(tenant.status, TenantStatus::Inactive);

        assert!(repo.find_active_by_code("brt").await.unwrap().is_none());
        assert!(repo.find_by_code("brt").await.unwrap().is_some());
        assert!(repo
            .find_active_by_owner_email("owner@brt.np")
            .await
            .unwrap()
            .is_none());

        let counts = repo.counts().await.unwrap();
        assert_eq!(counts, TenantCounts { total: 1, active: 0, inactive: 1 });
    }

    #[tokio::test]
    async fn test_update_status_drives_is_active() {
        let platform = PlatformDb::in_memory().await.unwrap();
        let repo = platform.tenants();
        let tenant = repo.create(&new_tenant("bkt")).await.unwrap();

        let updated = repo
            .update(
                tenant.id,
                &TenantUpdate {
                    name: "Bhaktapur Books".to_string(),
                    status: TenantStatus::Suspended,
                    access: AccessFlags {
                        reports: false,
                        ..AccessFlags::default()
                    },
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Bhaktapur Books");
        assert!(!updated.is_active);
        assert!(!updated.access_reports);
        assert!(updated.access_sales);
    }

    #[tokio::test]
    async fn test_delete_missing_tenant() {
        let platform = PlatformDb::in_memory().await.unwrap();
        let err = platform.tenants().delete(99).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
