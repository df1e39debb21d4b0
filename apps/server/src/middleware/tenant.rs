//! # Tenant Resolution
//!
//! Decides which vendor (and so which shop database) a request belongs to.
//!
//! ## Resolution Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Authorization: Bearer <jwt>                                            │
//! │      │ valid, not revoked                                               │
//! │      ▼                                                                  │
//! │  claims.tenant_id ──► tenant active? ── yes ──► use it                  │
//! │      │                      │                                           │
//! │      │                      no ──► drop the tenant part of the session  │
//! │      ▼                                                                  │
//! │  X-Tenant-Code / X-Tenant header ──► Host subdomain ──► active tenant?  │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  registry.ensure(tenant) ──► CurrentTenant in request extensions        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The context lives in the request's extensions and is dropped with the
//! request. Nothing about the tenant is stored globally.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::{AUTHORIZATION, HOST};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use kirana_core::tenant::{extract_tenant_code, TENANT_CODE_HEADER, TENANT_HEADER};
use kirana_core::Tenant;
use kirana_db::{DbError, TenantDb};
use std::convert::Infallible;
use tracing::{debug, warn};

use crate::auth::{extract_bearer_token, Realm, Session, SessionClaims};
use crate::error::{ApiError, ErrorCode};
use crate::state::SharedState;

/// The vendor resolved for this request, with its shop database.
#[derive(Debug, Clone)]
pub struct CurrentTenant {
    pub tenant: Tenant,
    pub db: TenantDb,
}

/// Resolves the session and the tenant of a request.
pub async fn resolve_tenant(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let mut session = bearer_claims(&state, request.headers());
    let mut tenant = None;

    if let Some(tenant_id) = session.as_ref().and_then(|claims| claims.tenant_id) {
        match state.platform.tenants().get(tenant_id).await {
            Ok(found) if found.is_active => tenant = Some(found),
            Ok(_) | Err(DbError::NotFound { .. }) => {
                warn!(tenant_id, "Session vendor is inactive or gone, dropping shop session");
                session = session.and_then(|claims| claims.without_tenant());
            }
            Err(e) => return Err(e.into()),
        }
    }

    if tenant.is_none() {
        if let Some(code) = requested_code(&state, request.headers()) {
            tenant = state.platform.tenants().find_active_by_code(&code).await?;
            if tenant.is_none() {
                debug!(code = %code, "No active vendor for requested code");
            }
        }
    }

    if let Some(tenant) = tenant {
        let db = state.registry.ensure(&tenant).await?;
        debug!(tenant = %tenant.code, alias = %tenant.alias(), "Tenant resolved");
        request.extensions_mut().insert(CurrentTenant { tenant, db });
    }
    if let Some(claims) = session {
        request.extensions_mut().insert(Session(claims));
    }

    Ok(next.run(request).await)
}

fn bearer_claims(state: &SharedState, headers: &HeaderMap) -> Option<SessionClaims> {
    let token = header_str(headers, AUTHORIZATION.as_str()).and_then(extract_bearer_token)?;

    match state.jwt.validate(token) {
        Ok(claims) => Some(claims),
        Err(e) => {
            debug!(error = %e, "Ignoring unusable bearer token");
            None
        }
    }
}

fn requested_code(state: &SharedState, headers: &HeaderMap) -> Option<String> {
    let code_header = header_str(headers, TENANT_CODE_HEADER)
        .filter(|value| !value.trim().is_empty())
        .or_else(|| header_str(headers, TENANT_HEADER));

    extract_tenant_code(
        code_header,
        header_str(headers, HOST.as_str()),
        state.config.tenant_domain.as_deref(),
    )
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

// =============================================================================
// Extractors
// =============================================================================

/// The tenant, when one was resolved. Login uses it to authenticate
/// against that shop's users.
#[derive(Debug, Clone)]
pub struct MaybeTenant(pub Option<CurrentTenant>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeTenant {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeTenant(parts.extensions.get::<CurrentTenant>().cloned()))
    }
}

/// A signed-in user working in a shop.
///
/// Shop users may only act on their own vendor; a superadmin may act on
/// the vendor they are viewing or the one named by the request.
#[derive(Debug, Clone)]
pub struct Shop {
    pub tenant: Tenant,
    pub db: TenantDb,
    pub session: SessionClaims,
}

impl Shop {
    /// Shop user id for audit columns.
    pub fn actor(&self) -> Option<i64> {
        self.session.shop_user_id()
    }

    /// Staff management is limited to admins and managers.
    pub fn require_user_manager(&self) -> Result<(), ApiError> {
        if self.session.role.can_manage_users() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Only admins and managers can manage users."))
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Shop {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Session(session) = Session::from_request_parts(parts, state).await?;
        let current = parts.extensions.get::<CurrentTenant>().cloned().ok_or_else(|| {
            ApiError::new(ErrorCode::TenantRequired, "No vendor selected for this request.")
        })?;

        let allowed = match session.realm {
            Realm::Tenant => session.tenant_id == Some(current.tenant.id),
            Realm::Platform => session.is_superadmin(),
        };
        if !allowed {
            warn!(
                user = session.sub,
                tenant = %current.tenant.code,
                "Session tried to use another vendor's shop"
            );
            return Err(ApiError::forbidden("Access denied."));
        }

        Ok(Shop {
            tenant: current.tenant,
            db: current.db,
            session,
        })
    }
}
