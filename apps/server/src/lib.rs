//! # kirana-server: Multi-Vendor POS Server
//!
//! JSON over HTTP for the superadmin console and for every vendor's shop.
//!
//! ## Request Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  request                                                                │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  CorsLayer ──► TraceLayer                                               │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  resolve_tenant        session from the bearer token, vendor from the   │
//! │     │                  token or X-Tenant-Code / Host, shop DB pool      │
//! │     ▼                                                                   │
//! │  enforce_section_access  /customers /inventory /sales /reports          │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  handler ──► Shop / Session / Superadmin extractors ──► repositories    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - `ServerConfig` from `kirana.toml` and `KIRANA_*`
//! - [`state`] - Platform database, tenant registry, token manager
//! - [`auth`] - Session tokens and extractors
//! - [`middleware`] - Tenant resolution and section access
//! - [`services`] - Login and vendor lifecycle
//! - [`routes`] - HTTP handlers
//! - [`error`] - `ApiError` and its HTTP mapping

pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::{ConfigError, ServerConfig};
pub use error::{ApiError, ErrorCode};
pub use state::{AppState, SharedState};

/// Builds the application router.
///
/// Layers run outermost first, so tenant resolution (added last) sees the
/// request before the section rules do.
pub fn app(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .merge(routes::router())
        .layer(from_fn(middleware::access::enforce_section_access))
        .layer(from_fn_with_state(state.clone(), middleware::tenant::resolve_tenant))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}
