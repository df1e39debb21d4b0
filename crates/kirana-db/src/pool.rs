//! # Connection Pool Management
//!
//! SQLite connection pools for the platform database and for each tenant.
//!
//! ## Two Kinds of Database
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PlatformDb  ── kirana.db ─────────── tenants, superadmin/owner users   │
//! │                                                                         │
//! │  TenantDb    ── tenant_dbs/shop_ktm.sqlite3 ── products, sales, ...     │
//! │  TenantDb    ── tenant_dbs/shop_pkr.sqlite3 ── products, sales, ...     │
//! │                                                                         │
//! │  Both wrap the same `Database` handle; the wrapper type decides which   │
//! │  repositories are reachable, so platform rows can never be written      │
//! │  into a shop file and shop rows can never reach the platform file.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::category::CategoryRepository;
use crate::repository::credit::CreditRepository;
use crate::repository::customer::CustomerRepository;
use crate::repository::inventory::InventoryRepository;
use crate::repository::product::ProductRepository;
use crate::repository::report::ReportRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::tenant::TenantRepository;
use crate::repository::user::UserRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Which migration set a database uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    Platform,
    Tenant,
}

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/kirana/kirana.db")
///     .max_connections(5)
///     .min_connections(1);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1 for the platform, 0 for tenants
    pub min_connections: u32,

    /// Connection timeout duration.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true for the platform, false for tenants (the registry
    /// decides when a tenant schema is migrated)
    pub run_migrations: bool,

    /// Migration set of this database.
    pub schema: Schema,
}

impl DbConfig {
    /// Creates a platform database configuration with the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
            schema: Schema::Platform,
        }
    }

    /// Creates a tenant database configuration.
    ///
    /// Idle tenants hold no connections.
    pub fn tenant(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            min_connections: 0,
            run_migrations: false,
            schema: Schema::Tenant,
            ..DbConfig::new(path)
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Sets the migration set.
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// An in-memory database lives inside one connection, so the pool is
    /// pinned to a single connection that never idles out.
    pub fn in_memory(schema: Schema) -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(24 * 60 * 60),
            run_migrations: true,
            schema,
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// A pooled SQLite database with one migration set.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    schema: Schema,
    path: PathBuf,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite:
    ///    - WAL mode for concurrent reads
    ///    - NORMAL synchronous (balance of safety/speed)
    ///    - Foreign keys enabled
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            schema = ?config.schema,
            "Initializing database connection"
        );

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            // Readers don't block writers, writers don't block readers
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // SQLite has them disabled by default for backwards compatibility
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database {
            pool,
            schema: config.schema,
            path: config.database_path,
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs the migrations of this database's schema.
    ///
    /// Idempotent: applied migrations are tracked in `_sqlx_migrations`.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!(schema = ?self.schema, "Running database migrations");
        migrations::run_migrations(&self.pool, self.schema).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn schema(&self) -> Schema {
        self.schema
    }

    /// Path of the database file (`:memory:` for test databases).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes the database connection pool.
    ///
    /// ## Note
    /// After calling close, all repository operations will fail.
    pub async fn close(&self) {
        info!(path = %self.path.display(), "Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Platform Database
// =============================================================================

/// The platform database: vendors and platform accounts.
///
/// ## Usage
/// ```rust,ignore
/// let platform = PlatformDb::open(DbConfig::new("./kirana.db")).await?;
/// let tenant = platform.tenants().find_active_by_code("ktm").await?;
/// ```
#[derive(Debug, Clone)]
pub struct PlatformDb {
    db: Database,
}

impl PlatformDb {
    /// Opens (and migrates) the platform database.
    pub async fn open(config: DbConfig) -> DbResult<Self> {
        let db = Database::new(config.schema(Schema::Platform)).await?;
        Ok(PlatformDb { db })
    }

    /// Opens a migrated in-memory platform database (for testing).
    pub async fn in_memory() -> DbResult<Self> {
        PlatformDb::open(DbConfig::in_memory(Schema::Platform)).await
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Returns the vendor repository.
    pub fn tenants(&self) -> TenantRepository {
        TenantRepository::new(self.db.pool().clone())
    }

    /// Returns the platform account repository.
    pub fn users(&self) -> UserRepository {
        UserRepository::platform(self.db.pool().clone())
    }
}

// =============================================================================
// Tenant Database
// =============================================================================

/// One vendor's shop database.
///
/// Obtained from [`crate::registry::TenantRegistry`] so that every request
/// for the same tenant shares one pool.
#[derive(Debug, Clone)]
pub struct TenantDb {
    db: Database,
}

impl TenantDb {
    /// Opens a tenant database without migrating it.
    pub async fn open(config: DbConfig) -> DbResult<Self> {
        let db = Database::new(config.schema(Schema::Tenant)).await?;
        Ok(TenantDb { db })
    }

    /// Opens a migrated in-memory tenant database (for testing).
    pub async fn in_memory() -> DbResult<Self> {
        TenantDb::open(DbConfig::in_memory(Schema::Tenant)).await
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Returns the shop staff repository.
    pub fn users(&self) -> UserRepository {
        UserRepository::tenant(self.db.pool().clone())
    }

    pub fn categories(&self) -> CategoryRepository {
        CategoryRepository::new(self.db.pool().clone())
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.db.pool().clone())
    }

    pub fn inventory(&self) -> InventoryRepository {
        InventoryRepository::new(self.db.pool().clone())
    }

    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.db.pool().clone())
    }

    pub fn credit(&self) -> CreditRepository {
        CreditRepository::new(self.db.pool().clone())
    }

    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.db.pool().clone())
    }

    pub fn reports(&self) -> ReportRepository {
        ReportRepository::new(self.db.pool().clone())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
