//! # Domain Types
//!
//! Core domain types used throughout Kirana POS.
//!
//! ## Where Each Type Lives
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PLATFORM DATABASE                 TENANT DATABASE (one per vendor)     │
//! │  ─────────────────                 ──────────────────────────────────   │
//! │  Tenant                            UserAccount (shop staff)             │
//! │  UserAccount (superadmin, owner)   Category ─► Product ─► Inventory     │
//! │                                    StockAdjustment                      │
//! │                                    Customer ─► CreditTransaction        │
//! │                                    IrregularCustomer                    │
//! │                                    Sale ─► SaleItem                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Money Columns
//! Monetary columns are stored as integer paisa and named `*_paisa`.
//! Each entity exposes `Money` accessors for arithmetic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1300 bps = 13% (Nepal VAT)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::from_bps(crate::DEFAULT_VAT_BPS)
    }
}

// =============================================================================
// Tenant
// =============================================================================

/// Lifecycle state of a vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Active,
    Inactive,
    Suspended,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Active => "active",
            TenantStatus::Inactive => "inactive",
            TenantStatus::Suspended => "suspended",
        }
    }
}

/// A vendor (shop) with its own isolated database.
///
/// Rows live in the platform database; `db_name` names the tenant's
/// SQLite file inside the tenant database directory.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Tenant {
    pub id: i64,
    pub name: String,
    /// Short lowercase code, also used as subdomain.
    pub code: String,
    pub owner_email: String,
    pub db_name: String,
    pub access_customers: bool,
    pub access_vendors: bool,
    pub access_inventory: bool,
    pub access_sales: bool,
    pub access_reports: bool,
    /// Platform user that owns this vendor.
    pub admin_user_id: Option<i64>,
    pub status: TenantStatus,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Per-section feature switches of a vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AccessFlags {
    pub customers: bool,
    pub vendors: bool,
    pub inventory: bool,
    pub sales: bool,
    pub reports: bool,
}

impl Default for AccessFlags {
    fn default() -> Self {
        AccessFlags {
            customers: true,
            vendors: true,
            inventory: true,
            sales: true,
            reports: true,
        }
    }
}

impl Tenant {
    /// Returns the access switches as one value.
    pub fn access(&self) -> AccessFlags {
        AccessFlags {
            customers: self.access_customers,
            vendors: self.access_vendors,
            inventory: self.access_inventory,
            sales: self.access_sales,
            reports: self.access_reports,
        }
    }
}

// =============================================================================
// Users
// =============================================================================

/// Role of a user, either on the platform or inside a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Platform-wide administrator.
    Superadmin,
    /// Vendor owner.
    TenantAdmin,
    Manager,
    Cashier,
    Staff,
}

impl Role {
    /// Roles allowed to manage tenant staff accounts.
    pub fn can_manage_users(&self) -> bool {
        matches!(self, Role::Superadmin | Role::TenantAdmin | Role::Manager)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::TenantAdmin => "tenant_admin",
            Role::Manager => "manager",
            Role::Cashier => "cashier",
            Role::Staff => "staff",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Cashier
    }
}

/// A login account.
///
/// The same shape is stored in the platform database (superadmins and
/// vendor owners, `tenant_id` set for owners) and in every tenant database
/// (shop staff, no `tenant_id` column).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct UserAccount {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    #[ts(skip)]
    pub password_hash: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub is_active: bool,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub tenant_id: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Catalogue
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CategoryType {
    Stationery,
    Books,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub category_type: CategoryType,
    pub description: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A product available for sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: i64,
    /// Stock Keeping Unit - business identifier.
    pub sku: String,
    /// Unique per tenant; defaults to the SKU.
    pub barcode: Option<String>,
    pub name: String,
    pub category_id: Option<i64>,
    pub description: Option<String>,
    pub supplier: Option<String>,
    /// Title, class and publisher of a book; empty for other products.
    pub book_name: Option<String>,
    pub book_class: Option<String>,
    pub book_publication: Option<String>,
    pub unit: String,
    pub cost_price_paisa: i64,
    pub selling_price_paisa: i64,
    pub wholesale_price_paisa: Option<i64>,
    /// Low-stock threshold (inclusive).
    pub reorder_level: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the selling price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_paisa(self.selling_price_paisa)
    }

    /// Returns the cost price as Money.
    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_paisa(self.cost_price_paisa)
    }

    /// Profit margin over cost in basis points, zero when cost is zero.
    pub fn margin_bps(&self) -> i64 {
        if self.cost_price_paisa <= 0 {
            return 0;
        }
        (self.selling_price_paisa - self.cost_price_paisa) * 10_000 / self.cost_price_paisa
    }
}

/// A product joined with its category name and stock level.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductWithStock {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub product: Product,
    pub category_name: Option<String>,
    pub quantity_in_stock: i64,
}

// =============================================================================
// Inventory
// =============================================================================

/// Stock level of one product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Inventory {
    pub product_id: i64,
    pub quantity_in_stock: i64,
    pub quantity_reserved: i64,
    #[ts(as = "Option<String>")]
    pub last_restocked_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Inventory {
    /// Stock that is not reserved for pending orders.
    #[inline]
    pub fn available(&self) -> i64 {
        self.quantity_in_stock - self.quantity_reserved
    }
}

/// One row of the inventory and low-stock listings.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryLine {
    pub product_id: i64,
    pub product_name: String,
    pub sku: String,
    pub category_name: Option<String>,
    pub quantity_in_stock: i64,
    pub quantity_reserved: i64,
    pub reorder_level: i64,
    pub selling_price_paisa: i64,
}

impl InventoryLine {
    /// Low when stock is at or below the reorder level.
    #[inline]
    pub fn is_low(&self) -> bool {
        self.quantity_in_stock <= self.reorder_level
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentType {
    Purchase,
    Sale,
    Adjustment,
    Damage,
    Return,
}

/// Audit record of a manual or automatic stock change.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockAdjustment {
    pub id: i64,
    pub product_id: i64,
    pub adjustment_type: AdjustmentType,
    /// Signed change applied to `quantity_in_stock`.
    pub quantity: i64,
    pub notes: Option<String>,
    pub adjusted_by: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Customers
// =============================================================================

/// A regular customer, identified by mobile number.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: i64,
    pub phone_number: String,
    pub secondary_phone_number: Option<String>,
    pub customer_name: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub notes: Option<String>,
    /// Outstanding store credit owed by the customer.
    pub current_credit_paisa: i64,
    pub loyalty_points: i64,
    #[ts(as = "String")]
    pub registration_date: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_date: DateTime<Utc>,
}

impl Customer {
    #[inline]
    pub fn credit(&self) -> Money {
        Money::from_paisa(self.current_credit_paisa)
    }
}

/// A one-off customer recorded only for the receipt.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct IrregularCustomer {
    pub id: i64,
    pub customer_name: String,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CreditTransactionType {
    /// Sale left (partly) unpaid; increases credit.
    Purchase,
    /// Customer paid towards the balance; decreases credit.
    Payment,
    /// Sale returned, cancelled or deleted; decreases credit.
    Refund,
    Adjustment,
}

/// Ledger entry tracking a customer's running store-credit balance.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CreditTransaction {
    pub id: i64,
    pub customer_id: i64,
    pub transaction_type: CreditTransactionType,
    pub amount_paisa: i64,
    /// Customer credit right after this entry.
    pub balance_after_paisa: i64,
    pub description: Option<String>,
    pub related_sale_id: Option<i64>,
    pub created_by: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sales
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CustomerType {
    Regular,
    Irregular,
}

impl Default for CustomerType {
    fn default() -> Self {
        CustomerType::Regular
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    /// QR / card terminal.
    Card,
    /// Store credit.
    Credit,
    Cheque,
    /// Mobile money wallet.
    Momo,
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Cash
    }
}

impl PaymentMethod {
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Card => "QR",
            PaymentMethod::Credit => "Credit",
            PaymentMethod::Cheque => "Cheque",
            PaymentMethod::Momo => "Mobile Money",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Pending,
    Partial,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Partial => "partial",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Completed,
    Cancelled,
    Returned,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Completed
    }
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Returned => "returned",
        }
    }
}

/// A recorded sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: i64,
    pub sale_number: String,
    pub receipt_number: String,
    pub customer_id: Option<i64>,
    pub irregular_customer_id: Option<i64>,
    pub customer_type: CustomerType,
    pub cashier_id: Option<i64>,
    pub subtotal_paisa: i64,
    pub discount_bps: i64,
    pub discount_paisa: i64,
    pub tax_paisa: i64,
    pub total_paisa: i64,
    pub payment_method: PaymentMethod,
    pub paid_paisa: i64,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub notes: Option<String>,
    pub is_printed: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_paisa(self.total_paisa)
    }

    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_paisa(self.paid_paisa)
    }

    /// Amount still owed on this sale (total − paid, may be negative).
    #[inline]
    pub fn due(&self) -> Money {
        self.total() - self.paid()
    }
}

/// A sale joined with the display name and phone of its customer.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleSummary {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub sale: Sale,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
}

/// A line item in a sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: i64,
    pub sale_id: i64,
    pub product_id: i64,
    /// Product name at time of sale.
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_paisa: i64,
    pub discount_bps: i64,
    pub line_total_paisa: i64,
}

impl SaleItem {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_paisa(self.line_total_paisa)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
