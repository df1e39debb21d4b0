//! Login, logout and the current session.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use kirana_core::{Role, Tenant, UserAccount};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{Grant, Realm, Session};
use crate::error::ApiError;
use crate::middleware::tenant::MaybeTenant;
use crate::routes::Message;
use crate::services::login::{login, LoginOutcome, LoginPolicy};
use crate::state::SharedState;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/auth/vendor-login", post(vendor_login))
        .route("/auth/user-login", post(user_login))
        .route("/auth/superadmin-login", post(superadmin_login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username, e-mail or vendor code.
    pub identifier: String,
    pub password: String,
}

/// The vendor a session belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct TenantBrief {
    pub id: i64,
    pub name: String,
    pub code: String,
}

impl From<&Tenant> for TenantBrief {
    fn from(tenant: &Tenant) -> Self {
        TenantBrief {
            id: tenant.id,
            name: tenant.name.clone(),
            code: tenant.code.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub realm: Realm,
    pub role: Role,
    pub tenant: Option<TenantBrief>,
    pub user: UserAccount,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub realm: Realm,
    pub role: Role,
    /// Set while a superadmin is viewing a shop.
    pub viewing_as_superadmin: bool,
    pub tenant: Option<TenantBrief>,
    pub user: UserAccount,
}

async fn vendor_login(
    State(state): State<SharedState>,
    MaybeTenant(current): MaybeTenant,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    sign_in(&state, current.map(|c| c.tenant), req, LoginPolicy::VENDOR).await
}

async fn user_login(
    State(state): State<SharedState>,
    MaybeTenant(current): MaybeTenant,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    sign_in(&state, current.map(|c| c.tenant), req, LoginPolicy::USER).await
}

/// The console login never authenticates against a shop.
async fn superadmin_login(
    State(state): State<SharedState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    sign_in(&state, None, req, LoginPolicy::SUPERADMIN).await
}

async fn sign_in(
    state: &SharedState,
    resolved: Option<Tenant>,
    req: LoginRequest,
    policy: LoginPolicy,
) -> Result<Json<LoginResponse>, ApiError> {
    let outcome = login(state, resolved.as_ref(), &req.identifier, &req.password, policy).await?;

    let (grant, tenant, user) = match outcome {
        LoginOutcome::Platform(user) => (Grant::platform(&user), None, user),
        LoginOutcome::Tenant { tenant, user } => {
            (Grant::tenant(&user, tenant.id), Some(tenant), user)
        }
    };
    let issued = state.jwt.issue(grant)?;

    Ok(Json(LoginResponse {
        token: issued.token,
        expires_at: issued.expires_at,
        realm: grant.realm,
        role: grant.role,
        tenant: tenant.as_ref().map(TenantBrief::from),
        user,
    }))
}

async fn logout(
    State(state): State<SharedState>,
    Session(claims): Session,
) -> Json<Message> {
    state.jwt.revoke(&claims);
    info!(user = claims.sub, realm = ?claims.realm, "Signed out");
    Json(Message::new("You have been logged out."))
}

async fn me(
    State(state): State<SharedState>,
    Session(claims): Session,
    MaybeTenant(current): MaybeTenant,
) -> Result<Json<MeResponse>, ApiError> {
    let user = match (claims.realm, claims.superadmin_id) {
        (Realm::Platform, _) => state.platform.users().get(claims.sub).await?,
        (Realm::Tenant, Some(superadmin_id)) => state.platform.users().get(superadmin_id).await?,
        (Realm::Tenant, None) => {
            let current = current
                .as_ref()
                .ok_or_else(|| ApiError::unauthorized("Authentication required."))?;
            current.db.users().get(claims.sub).await?
        }
    };

    let tenant = match claims.realm {
        Realm::Tenant => current.as_ref().map(|c| TenantBrief::from(&c.tenant)),
        Realm::Platform => None,
    };

    Ok(Json(MeResponse {
        realm: claims.realm,
        role: claims.role,
        viewing_as_superadmin: claims.superadmin_id.is_some(),
        tenant,
        user,
    }))
}
