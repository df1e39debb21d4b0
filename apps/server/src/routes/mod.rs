//! HTTP routes.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  /auth/*          login, logout, me              any realm              │
//! │  /superadmin/*    vendor console                 platform superadmin    │
//! │  /inventory/*     categories, products, stock    shop session           │
//! │  /customers/*     customers, credit              shop session           │
//! │  /sales/*         POS, history, receipts         shop session           │
//! │  /reports/*       dashboard, sales, low stock    shop session           │
//! │  /users/*         shop staff                     admins and managers    │
//! │  /profile         own account                    any session            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::Router;
use serde::{Deserialize, Deserializer, Serialize};

use crate::state::SharedState;

pub mod auth;
pub mod customers;
pub mod inventory;
pub mod profile;
pub mod reports;
pub mod sales;
pub mod superadmin;
pub mod users;

/// Every route of the service, without middleware.
pub fn router() -> Router<SharedState> {
    Router::new()
        .merge(auth::router())
        .merge(superadmin::router())
        .merge(inventory::router())
        .merge(customers::router())
        .merge(sales::router())
        .merge(reports::router())
        .merge(users::router())
        .merge(profile::router())
}

/// A confirmation shown to the user.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Message {
            message: message.into(),
        }
    }
}

/// Treats an empty query parameter (`?q=`) as absent.
pub(crate) fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}
