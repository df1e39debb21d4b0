//! # Repository Module
//!
//! Data access layer implementing the Repository pattern.
//!
//! ## Which Database Each Repository Talks To
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PlatformDb ──► TenantRepository, UserRepository (platform store)       │
//! │                                                                         │
//! │  TenantDb   ──► UserRepository (tenant store), CategoryRepository,      │
//! │                 ProductRepository, InventoryRepository,                 │
//! │                 CustomerRepository, CreditRepository,                   │
//! │                 SaleRepository, ReportRepository                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Repositories hold a cloned `SqlitePool` and are cheap to create per
//! request. Multi-step writes open one transaction and pass
//! `&mut SqliteConnection` to the `*_in` helpers so every statement of a
//! checkout shares it.

pub mod category;
pub mod credit;
pub mod customer;
pub mod inventory;
pub mod product;
pub mod report;
pub mod sale;
pub mod tenant;
pub mod user;

use sqlx::{QueryBuilder, Sqlite};

/// `LIKE` clause suffix matching the escaping done by [`contains_pattern`].
pub(crate) const LIKE_ESCAPE: &str = " ESCAPE '\\'";

/// Case-insensitive substring pattern for `LIKE ... ESCAPE '\'`.
///
/// SQLite `LIKE` is already case-insensitive for ASCII; only the wildcard
/// characters of the needle need escaping.
pub(crate) fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Pushes ` AND (a LIKE ? OR b LIKE ? ...)` matching `needle` anywhere.
pub(crate) fn push_contains_any(qb: &mut QueryBuilder<'_, Sqlite>, columns: &[&str], needle: &str) {
    let pattern = contains_pattern(needle);
    qb.push(" AND (");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            qb.push(" OR ");
        }
        qb.push(*column)
            .push(" LIKE ")
            .push_bind(pattern.clone())
            .push(LIKE_ESCAPE);
    }
    qb.push(")");
}

/// Trims optional text, treating blank input as absent.
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
