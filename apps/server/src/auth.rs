//! Session token module.
//!
//! Handles JWT issuing, validation and logout revocation, plus the
//! extractors handlers use to read the signed-in user.
//!
//! ## Realms
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  platform  superadmin signed in to the console; no tenant              │
//! │  tenant    shop user of tenant_id, authenticated against the shop DB   │
//! │            (or a superadmin viewing a shop: superadmin_id is set)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{DateTime, Duration, TimeZone, Utc};
use dashmap::DashMap;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use kirana_core::{Role, UserAccount};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

/// Which user store a session was authenticated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Realm {
    Platform,
    Tenant,
}

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user id in the realm's store)
    pub sub: i64,

    pub realm: Realm,

    pub role: Role,

    /// Vendor the session is bound to
    pub tenant_id: Option<i64>,

    /// Set when a superadmin is viewing a vendor's shop
    pub superadmin_id: Option<i64>,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

impl SessionClaims {
    pub fn is_superadmin(&self) -> bool {
        self.role == Role::Superadmin
    }

    /// A superadmin signed in to the console (not viewing a shop).
    pub fn is_platform_superadmin(&self) -> bool {
        self.realm == Realm::Platform && self.is_superadmin()
    }

    /// Shop user id for `created_by` columns. None when a superadmin is
    /// viewing the shop, since they have no row in the shop database.
    pub fn shop_user_id(&self) -> Option<i64> {
        (self.realm == Realm::Tenant && self.superadmin_id.is_none()).then_some(self.sub)
    }

    /// The console session behind a superadmin's shop view.
    pub fn without_tenant(&self) -> Option<SessionClaims> {
        let superadmin_id = self.superadmin_id?;
        Some(SessionClaims {
            sub: superadmin_id,
            realm: Realm::Platform,
            role: Role::Superadmin,
            tenant_id: None,
            superadmin_id: None,
            ..self.clone()
        })
    }
}

/// Who a new token is for.
#[derive(Debug, Clone, Copy)]
pub struct Grant {
    pub user_id: i64,
    pub realm: Realm,
    pub role: Role,
    pub tenant_id: Option<i64>,
    pub superadmin_id: Option<i64>,
}

impl Grant {
    pub fn platform(user: &UserAccount) -> Self {
        Grant {
            user_id: user.id,
            realm: Realm::Platform,
            role: user.role,
            tenant_id: None,
            superadmin_id: None,
        }
    }

    pub fn tenant(user: &UserAccount, tenant_id: i64) -> Self {
        Grant {
            user_id: user.id,
            realm: Realm::Tenant,
            role: user.role,
            tenant_id: Some(tenant_id),
            superadmin_id: None,
        }
    }

    /// A superadmin viewing a vendor's shop.
    pub fn impersonation(superadmin_id: i64, tenant_id: i64) -> Self {
        Grant {
            user_id: superadmin_id,
            realm: Realm::Tenant,
            role: Role::Superadmin,
            tenant_id: Some(tenant_id),
            superadmin_id: Some(superadmin_id),
        }
    }
}

/// A signed token and when it stops working.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// JWT token manager.
///
/// Logged-out token ids are kept in memory until the token would have
/// expired anyway.
pub struct JwtManager {
    secret: String,
    lifetime_secs: i64,
    revoked: DashMap<String, i64>,
}

impl JwtManager {
    /// Create a new JWT manager.
    pub fn new(secret: String, lifetime_secs: i64) -> Self {
        JwtManager {
            secret,
            lifetime_secs,
            revoked: DashMap::new(),
        }
    }

    /// Generate a session token.
    pub fn issue(&self, grant: Grant) -> Result<IssuedToken, ApiError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.lifetime_secs);

        let claims = SessionClaims {
            sub: grant.user_id,
            realm: grant.realm,
            role: grant.role,
            tenant_id: grant.tenant_id,
            superadmin_id: grant.superadmin_id,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ApiError::internal(format!("Failed to generate token: {}", e)))?;

        Ok(IssuedToken {
            token,
            expires_at: Utc.timestamp_opt(claims.exp, 0).single().unwrap_or(exp),
        })
    }

    /// Validate and decode a token.
    pub fn validate(&self, token: &str) -> Result<SessionClaims, ApiError> {
        let token_data: TokenData<SessionClaims> = decode(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| ApiError::unauthorized(format!("Invalid token: {}", e)))?;

        if self.revoked.contains_key(&token_data.claims.jti) {
            return Err(ApiError::unauthorized("Session has ended."));
        }

        Ok(token_data.claims)
    }

    /// Ends a session before its expiry.
    pub fn revoke(&self, claims: &SessionClaims) {
        let now = Utc::now().timestamp();
        self.revoked.retain(|_, exp| *exp > now);
        self.revoked.insert(claims.jti.clone(), claims.exp);
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

// =============================================================================
// Extractors
// =============================================================================

/// The signed-in user. Placed in request extensions by the tenant
/// middleware once the token checks out.
#[derive(Debug, Clone)]
pub struct Session(pub SessionClaims);

impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required."))
    }
}

/// A superadmin signed in to the console.
#[derive(Debug, Clone)]
pub struct Superadmin(pub SessionClaims);

impl<S: Send + Sync> FromRequestParts<S> for Superadmin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Session(claims) = Session::from_request_parts(parts, state).await?;
        if !claims.is_platform_superadmin() {
            return Err(ApiError::forbidden(
                "Access denied. Superadmin privileges required.",
            ));
        }
        Ok(Superadmin(claims))
    }
}
