//! # Tenant Registry
//!
//! Runtime registry of tenant database pools, keyed by alias.
//!
//! ## Lifecycle of a Tenant Database
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create vendor ──► provision() ──► migrate() ──► tenant admin user      │
//! │                    (dir + file)    (TENANT_MIGRATOR)                    │
//! │                                                                         │
//! │  any request   ──► ensure() ─┬─ alias registered? ──► shared TenantDb   │
//! │                              └─ no ──► open pool ──► insert ──► return  │
//! │                                                                         │
//! │  login         ──► ensure_schema() ── no `users` table? ──► migrate()   │
//! │                                                                         │
//! │  delete vendor ──► delete() ──► unregister ──► close ──► remove files   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! The map is a `DashMap`. No shard guard is ever held across an `.await`:
//! a pool is opened outside the map and then offered with `entry()`. When
//! two requests race to open the same tenant, the loser closes its pool and
//! both return the winner's.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use kirana_core::tenant::db_file_name;
use kirana_core::Tenant;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::DbResult;
use crate::pool::{DbConfig, TenantDb};

/// Tenant database pools, one per alias `tenant_{id}`.
///
/// ## Usage
/// ```rust,ignore
/// let registry = TenantRegistry::new("./tenant_dbs");
/// let shop = registry.ensure_schema(&tenant).await?;
/// let products = shop.products().list(&ProductFilter::default()).await?;
/// ```
#[derive(Debug)]
pub struct TenantRegistry {
    root: PathBuf,
    pools: DashMap<String, TenantDb>,
}

impl TenantRegistry {
    /// Creates an empty registry storing tenant files under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        TenantRegistry {
            root: root.into(),
            pools: DashMap::new(),
        }
    }

    /// Directory holding the tenant database files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path of a tenant's database.
    pub fn database_path(&self, tenant: &Tenant) -> PathBuf {
        self.root.join(db_file_name(&tenant.db_name))
    }

    /// Whether a pool is registered for the tenant.
    pub fn is_registered(&self, tenant: &Tenant) -> bool {
        self.pools.contains_key(&tenant.alias())
    }

    /// Number of registered tenant pools.
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// Whether no tenant pool is registered.
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Returns the tenant's pool, opening and registering it on first use.
    ///
    /// A file that already has a schema gets its pending migrations on
    /// first use. An empty file is left alone; see
    /// [`TenantRegistry::ensure_schema`].
    pub async fn ensure(&self, tenant: &Tenant) -> DbResult<TenantDb> {
        let alias = tenant.alias();

        if let Some(db) = self.pools.get(&alias).map(|entry| entry.value().clone()) {
            return Ok(db);
        }

        let path = self.database_path(tenant);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        debug!(alias = %alias, path = %path.display(), "Registering tenant database");
        let opened = TenantDb::open(DbConfig::tenant(path)).await?;

        let existing = match self.pools.entry(alias.clone()) {
            Entry::Occupied(entry) => Some(entry.get().clone()),
            Entry::Vacant(entry) => {
                entry.insert(opened.clone());
                None
            }
        };

        match existing {
            Some(winner) => {
                debug!(alias = %alias, "Tenant database registered concurrently, closing duplicate pool");
                opened.database().close().await;
                Ok(winner)
            }
            None => {
                // An existing shop file is brought up to the current schema
                if schema_present(&opened).await? {
                    opened.database().run_migrations().await?;
                }
                info!(alias = %alias, tenant = %tenant.code, "Tenant database registered");
                Ok(opened)
            }
        }
    }

    /// Creates the tenant directory and an empty database file.
    pub async fn provision(&self, tenant: &Tenant) -> DbResult<PathBuf> {
        let path = self.database_path(tenant);

        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        info!(tenant = %tenant.code, path = %path.display(), "Tenant database provisioned");
        Ok(path)
    }

    /// Applies all pending tenant migrations.
    pub async fn migrate(&self, tenant: &Tenant) -> DbResult<TenantDb> {
        let db = self.ensure(tenant).await?;
        db.database().run_migrations().await?;
        info!(tenant = %tenant.code, "Tenant schema migrated");
        Ok(db)
    }

    /// Whether the tenant database already has its schema.
    pub async fn has_schema(&self, tenant: &Tenant) -> DbResult<bool> {
        let db = self.ensure(tenant).await?;
        schema_present(&db).await
    }

    /// Returns the tenant's pool, migrating first when the schema is missing.
    pub async fn ensure_schema(&self, tenant: &Tenant) -> DbResult<TenantDb> {
        if self.has_schema(tenant).await? {
            return self.ensure(tenant).await;
        }
        warn!(tenant = %tenant.code, "Tenant schema missing, migrating");
        self.migrate(tenant).await
    }

    /// Unregisters and closes the tenant pool without touching the file.
    pub async fn unregister(&self, tenant: &Tenant) {
        let removed = self.pools.remove(&tenant.alias()).map(|(_, db)| db);
        if let Some(db) = removed {
            db.database().close().await;
        }
    }

    /// Closes the pool and removes the database file with its WAL siblings.
    pub async fn delete(&self, tenant: &Tenant) -> DbResult<()> {
        self.unregister(tenant).await;

        let path = self.database_path(tenant);
        let display = path.display().to_string();
        for file in [
            path.clone(),
            PathBuf::from(format!("{}-wal", display)),
            PathBuf::from(format!("{}-shm", display)),
        ] {
            match tokio::fs::remove_file(&file).await {
                Ok(()) => debug!(path = %file.display(), "Removed tenant file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        info!(tenant = %tenant.code, "Tenant database deleted");
        Ok(())
    }

    /// Closes every registered pool (shutdown).
    pub async fn close_all(&self) {
        let pools: Vec<TenantDb> = self.pools.iter().map(|e| e.value().clone()).collect();
        self.pools.clear();
        for db in pools {
            db.database().close().await;
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

async fn schema_present(db: &TenantDb) -> DbResult<bool> {
    let tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'users'",
    )
    .fetch_one(db.database().pool())
    .await?;
    Ok(tables > 0)
}
