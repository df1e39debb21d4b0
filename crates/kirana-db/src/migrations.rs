//! # Database Migrations
//!
//! Embedded SQL migrations for the platform and tenant databases.
//!
//! ## Two Migration Sets
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Migration Process                                  │
//! │                                                                         │
//! │  Server startup ──► PLATFORM_MIGRATOR ──► kirana.db                     │
//! │                                                                         │
//! │  Vendor created ──► TENANT_MIGRATOR ──► tenant_dbs/shop_ktm.sqlite3     │
//! │  Login on a shop                                                        │
//! │  whose file has no `users` table ──► TENANT_MIGRATOR (same file)        │
//! │                                                                         │
//! │  Each file keeps its own _sqlx_migrations table, so every tenant       │
//! │  can be upgraded independently the first time it is touched.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Adding New Migrations
//!
//! 1. Add the next `NNNN_description.sql` in `migrations/platform/` or
//!    `migrations/tenant/`
//! 2. Write idempotent SQL (use `IF NOT EXISTS` where possible)
//! 3. **NEVER** modify existing migrations - always add new ones

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;
use crate::pool::Schema;

/// Migrations of the platform database (tenants and platform users).
static PLATFORM_MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/platform");

/// Migrations applied to every tenant database.
static TENANT_MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/tenant");

fn migrator(schema: Schema) -> &'static sqlx::migrate::Migrator {
    match schema {
        Schema::Platform => &PLATFORM_MIGRATOR,
        Schema::Tenant => &TENANT_MIGRATOR,
    }
}

/// Runs all pending migrations of `schema`.
///
/// ## Safety
/// - Idempotent: safe to run multiple times
/// - Transactional: each migration runs in a transaction
/// - Ordered: migrations run in filename order
pub async fn run_migrations(pool: &SqlitePool, schema: Schema) -> DbResult<()> {
    info!(schema = ?schema, "Checking for pending migrations");

    migrator(schema).run(pool).await?;

    info!(schema = ?schema, "All migrations applied successfully");
    Ok(())
}

/// Returns `(total_migrations, applied_migrations)` for diagnostics.
pub async fn migration_status(pool: &SqlitePool, schema: Schema) -> DbResult<(usize, usize)> {
    let total = migrator(schema).migrations.len();

    // The bookkeeping table is missing until the first run
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    Ok((total, applied as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_migration_status_after_run() {
        let db = Database::new(DbConfig::in_memory(Schema::Tenant)).await.unwrap();
        let (total, applied) = migration_status(db.pool(), Schema::Tenant).await.unwrap();
        assert!(total > 0);
        assert_eq!(total, applied);

        // Running again is a no-op
        run_migrations(db.pool(), Schema::Tenant).await.unwrap();
    }

    #[tokio::test]
    async fn test_status_before_any_migration() {
        let db = Database::new(DbConfig::in_memory(Schema::Tenant).run_migrations(false))
            .await
            .unwrap();
        let (_, applied) = migration_status(db.pool(), Schema::Tenant).await.unwrap();
        assert_eq!(applied, 0);
    }
}
