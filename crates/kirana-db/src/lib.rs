//! # kirana-db: Database Layer for Kirana POS
//!
//! SQLite persistence for the platform database and one database per shop.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kirana POS Data Flow                             │
//! │                                                                         │
//! │  HTTP handler (create-sale)                                             │
//! │       │  resolved Tenant from request extensions                        │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     kirana-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐   ┌──────────────┐   │   │
//! │  │   │  PlatformDb   │    │ TenantRegistry │   │  Migrations  │   │   │
//! │  │   │  tenants,     │    │ tenant_{id} →  │   │  platform/   │   │   │
//! │  │   │  superadmins  │    │ TenantDb       │──►│  tenant/     │   │   │
//! │  │   └───────────────┘    └───────┬────────┘   └──────────────┘   │   │
//! │  │                                │                                │   │
//! │  │                       Repositories (product, sale, credit, …)   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                          │                                      │
//! │       ▼                          ▼                                      │
//! │  platform.sqlite3         tenant_dbs/shop_{code}.sqlite3                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pools, `PlatformDb` and `TenantDb`
//! - [`registry`] - Lazily opened tenant pools
//! - [`migrations`] - Embedded platform and tenant migrations
//! - [`password`] - argon2 password hashing
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kirana_db::{DbConfig, PlatformDb, TenantRegistry};
//!
//! let platform = PlatformDb::open(DbConfig::new("platform.sqlite3")).await?;
//! let registry = TenantRegistry::new("tenant_dbs");
//!
//! let tenant = platform.tenants().find_active_by_code("ramstore").await?.unwrap();
//! let shop = registry.ensure(&tenant).await?;
//! let hits = shop.products().search_pos("pen").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod password;
pub mod pool;
pub mod registry;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use password::{hash_password, verify_password};
pub use pool::{Database, DbConfig, PlatformDb, Schema, TenantDb};
pub use registry::TenantRegistry;

// Repository re-exports for convenience
pub use repository::category::{CategoryInput, CategoryRepository};
pub use repository::credit::CreditRepository;
pub use repository::customer::{
    CustomerFilter, CustomerInput, CustomerListing, CustomerRepository, CustomerSearch,
    CustomerSort,
};
pub use repository::inventory::{
    InventoryRepository, LowStockFilter, LowStockSearch, LowStockSort, StockChange,
};
pub use repository::product::{
    PosProduct, ProductFilter, ProductInput, ProductRepository, ProductSearch, ProductSort,
};
pub use repository::report::{ReportRepository, SalesReport, ShopDashboard, TodaySales};
pub use repository::sale::{
    Checkout, CheckoutLine, CheckoutPolicy, PaymentEdit, SaleDetail, SaleFilter, SaleRepository,
    SaleSearch, SaleSort,
};
pub use repository::tenant::{NewTenant, TenantCounts, TenantRepository, TenantUpdate};
pub use repository::user::{NewUser, ProfileUpdate, UserRepository, UserStore, UserUpdate};
