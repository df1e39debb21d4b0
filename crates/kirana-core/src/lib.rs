//! # kirana-core: Pure Business Logic for Kirana POS
//!
//! This crate is the **heart** of Kirana POS. It contains all business logic
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kirana POS Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  kirana-server (axum)                           │   │
//! │  │    tenant middleware ──► section rules ──► route handlers      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ kirana-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ │   │
//! │  │   │  types  │ │  money  │ │  sale   │ │ tenant  │ │ receipt │ │   │
//! │  │   │ Product │ │  Money  │ │ totals  │ │ code    │ │ words   │ │   │
//! │  │   │  Sale   │ │ TaxRate │ │ status  │ │ section │ │ text    │ │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    kirana-db (Database Layer)                   │   │
//! │  │        platform DB, tenant registry, migrations, repositories   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Tenant, Product, Customer, Sale, ...)
//! - [`money`] - Money type with integer arithmetic (paisa, no floating point)
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//! - [`tenant`] - Tenant code extraction and section access rules
//! - [`period`] - Shop-local reporting days mapped to UTC ranges
//! - [`sale`] - Sale totals, payment status and credit reversal rules
//! - [`words`] - Amount in words for receipts
//! - [`receipt`] - Receipt model and plain-text rendering
//!
//! ## Example Usage
//!
//! ```rust
//! use kirana_core::money::Money;
//! use kirana_core::types::TaxRate;
//!
//! // Create money from paisa (never from floats!)
//! let price = Money::from_paisa(10_000); // Rs. 100.00
//!
//! // 13% VAT
//! let vat = price.calculate_tax(TaxRate::from_bps(1300));
//! assert_eq!(vat.paisa(), 1_300);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod period;
pub mod receipt;
pub mod sale;
pub mod tenant;
pub mod types;
pub mod validation;
pub mod words;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default VAT rate in basis points (13%).
pub const DEFAULT_VAT_BPS: u32 = 1300;

/// Minimum number of characters before the POS search hits the database.
pub const POS_SEARCH_MIN_CHARS: usize = 2;

/// Maximum number of products returned by the POS search.
pub const POS_SEARCH_LIMIT: u32 = 10;

/// Reorder level assigned to new products when none is given.
pub const DEFAULT_REORDER_LEVEL: i64 = 10;

/// Unit assigned to new products when none is given.
pub const DEFAULT_UNIT: &str = "piece";

/// Name given to a regular customer created implicitly at checkout.
pub const WALK_IN_CUSTOMER_NAME: &str = "Walk-in Customer";

/// Name given to an irregular (one-off) customer when none is entered.
pub const IRREGULAR_CUSTOMER_NAME: &str = "IR Customer";

/// Maximum quantity of a single line in a sale.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10)
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Highest catalogue price, in paisa (Rs. 1,00,00,000).
///
/// Keeps `price × MAX_ITEM_QUANTITY × MAX_SALE_ITEMS` well inside `i64`.
pub const MAX_PRICE_PAISA: i64 = 1_000_000_000;

/// Maximum number of lines in a single sale.
pub const MAX_SALE_ITEMS: usize = 100;
