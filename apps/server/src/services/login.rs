//! # Login
//!
//! One login routine behind the vendor, user and superadmin endpoints. It
//! switches between the platform user store and a shop's user store.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. platform users ── superadmin? ── allowed here? ──► console session  │
//! │                                   └─ no ──► "Please use the superadmin  │
//! │                                              login page."               │
//! │  2. tenant resolved from the request?                                   │
//! │        ensure_schema ──► shop users ── match ──► shop session           │
//! │  3. identifier is a vendor code (or owner e-mail on vendor login)?      │
//! │        shop user with the owner's e-mail ── password ok ──► shop session│
//! │        no such user, owner password ok ──► create tenant admin ──►      │
//! │  4. "Invalid credentials or unauthorized access."                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use kirana_core::{Role, Tenant, UserAccount};
use kirana_db::{verify_password, NewUser};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::state::AppState;

pub const SUPERADMIN_PAGE: &str = "Please use the superadmin login page.";
pub const INVALID_CREDENTIALS: &str = "Invalid credentials or unauthorized access.";

/// What each login endpoint accepts.
#[derive(Debug, Clone, Copy)]
pub struct LoginPolicy {
    pub allow_superadmin: bool,
    /// Also find the vendor by its owner's e-mail.
    pub owner_lookup: bool,
}

impl LoginPolicy {
    pub const VENDOR: LoginPolicy = LoginPolicy {
        allow_superadmin: false,
        owner_lookup: true,
    };
    pub const USER: LoginPolicy = LoginPolicy {
        allow_superadmin: false,
        owner_lookup: false,
    };
    pub const SUPERADMIN: LoginPolicy = LoginPolicy {
        allow_superadmin: true,
        owner_lookup: false,
    };
}

/// Who signed in.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    /// A superadmin on the console.
    Platform(UserAccount),
    /// A user of a shop database.
    Tenant { tenant: Tenant, user: UserAccount },
}

/// Authenticates `identifier` (username, e-mail or vendor code).
///
/// ## Errors
/// - "Please use the superadmin login page." for a superadmin elsewhere
/// - "Invalid credentials or unauthorized access." otherwise
pub async fn login(
    state: &AppState,
    resolved: Option<&Tenant>,
    identifier: &str,
    password: &str,
    policy: LoginPolicy,
) -> Result<LoginOutcome, ApiError> {
    let identifier = identifier.trim().to_lowercase();

    if let Some(user) = state.platform.users().authenticate(&identifier, password).await? {
        if user.role == Role::Superadmin {
            if policy.allow_superadmin {
                info!(user = %user.username, "Superadmin signed in");
                return Ok(LoginOutcome::Platform(user));
            }
            warn!(user = %user.username, "Superadmin refused on a shop login page");
            return Err(ApiError::unauthorized(SUPERADMIN_PAGE));
        }
    }

    if let Some(tenant) = resolved {
        let shop = state.registry.ensure_schema(tenant).await?;
        if let Some(user) = shop.users().authenticate(&identifier, password).await? {
            info!(user = %user.username, tenant = %tenant.code, "Shop user signed in");
            return Ok(LoginOutcome::Tenant {
                tenant: tenant.clone(),
                user,
            });
        }
    }

    let tenants = state.platform.tenants();
    let mut vendor = tenants.find_active_by_code(&identifier).await?;
    if vendor.is_none() && policy.owner_lookup {
        vendor = tenants.find_active_by_owner_email(&identifier).await?;
    }

    if let Some(tenant) = vendor {
        if let Some(user) = login_as_owner(state, &tenant, password).await? {
            return Ok(LoginOutcome::Tenant { tenant, user });
        }
    }

    warn!(identifier = %identifier, "Login refused");
    Err(ApiError::unauthorized(INVALID_CREDENTIALS))
}

/// Signs in as the vendor's tenant admin, creating that account on first
/// use from the platform owner's password.
async fn login_as_owner(
    state: &AppState,
    tenant: &Tenant,
    password: &str,
) -> Result<Option<UserAccount>, ApiError> {
    let Some(admin_id) = tenant.admin_user_id else {
        return Ok(None);
    };
    let owner = match state.platform.users().get(admin_id).await {
        Ok(owner) => owner,
        Err(kirana_db::DbError::NotFound { .. }) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let shop = state.registry.ensure_schema(tenant).await?;
    let lookup_email = if owner.email.is_empty() {
        tenant.owner_email.clone()
    } else {
        owner.email.clone()
    };

    match shop.users().find_by_email(&lookup_email).await? {
        Some(user) if user.is_active && verify_password(password, &user.password_hash) => {
            info!(tenant = %tenant.code, "Vendor admin signed in");
            Ok(Some(user))
        }
        None if verify_password(password, &owner.password_hash) => {
            let user = shop
                .users()
                .create(&NewUser {
                    username: lookup_email.clone(),
                    email: lookup_email,
                    password: password.to_string(),
                    role: Role::TenantAdmin,
                    ..Default::default()
                })
                .await?;
            info!(tenant = %tenant.code, "Tenant admin created on first sign-in");
            Ok(Some(user))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::services::vendor::{create_vendor, VendorForm};
    use crate::state::SharedState;
    use kirana_db::PlatformDb;
    use tempfile::TempDir;

    async fn state(dir: &TempDir) -> SharedState {
        let config = ServerConfig {
            jwt_secret: "test".to_string(),
            tenant_db_dir: dir.path().join("tenant_dbs"),
            ..Default::default()
        };
        AppState::with_platform(PlatformDb::in_memory().await.unwrap(), config)
    }

    async fn superadmin(state: &AppState) -> UserAccount {
        state
            .platform
            .users()
            .create(&NewUser {
                username: "root".to_string(),
                email: "root@kirana.local".to_string(),
                password: "rootpass".to_string(),
                role: Role::Superadmin,
                ..Default::default()
            })
            .await
            .unwrap()
    }

    fn vendor_form(code: &str) -> VendorForm {
        VendorForm {
            vendor_name: "Ram Stationers".to_string(),
            vendor_code: code.to_string(),
            owner_email: format!("owner@{}.np", code),
            admin_password: "secret123".to_string(),
            admin_password2: "secret123".to_string(),
            access: None,
        }
    }

    #[tokio::test]
    async fn test_superadmin_only_on_superadmin_page() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir).await;
        superadmin(&state).await;

        let err = login(&state, None, "ROOT", "rootpass", LoginPolicy::USER)
            .await
            .unwrap_err();
        assert_eq!(err.message, SUPERADMIN_PAGE);

        let outcome = login(&state, None, "root", "rootpass", LoginPolicy::SUPERADMIN)
            .await
            .unwrap();
        assert!(matches!(outcome, LoginOutcome::Platform(user) if user.role == Role::Superadmin));
    }

    #[tokio::test]
    async fn test_vendor_login_by_code_and_owner_email() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir).await;
        let tenant = create_vendor(&state, &vendor_form("ramstore")).await.unwrap();

        let by_code = login(&state, None, "RamStore", "secret123", LoginPolicy::USER)
            .await
            .unwrap();
        match by_code {
            LoginOutcome::Tenant { tenant: t, user } => {
                assert_eq!(t.id, tenant.id);
                assert_eq!(user.role, Role::TenantAdmin);
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let err = login(&state, None, "owner@ramstore.np", "secret123", LoginPolicy::USER)
            .await
            .unwrap_err();
        assert_eq!(err.message, INVALID_CREDENTIALS);

        let by_email = login(&state, None, "owner@ramstore.np", "secret123", LoginPolicy::VENDOR)
            .await
            .unwrap();
        assert!(matches!(by_email, LoginOutcome::Tenant { .. }));

        let err = login(&state, None, "ramstore", "wrong-pass", LoginPolicy::VENDOR)
            .await
            .unwrap_err();
        assert_eq!(err.message, INVALID_CREDENTIALS);
    }

    #[tokio::test]
    async fn test_missing_tenant_admin_is_created_from_owner_password() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir).await;
        let tenant = create_vendor(&state, &vendor_form("shyam")).await.unwrap();

        let shop = state.registry.ensure(&tenant).await.unwrap();
        let admin = shop.users().find_by_email("owner@shyam.np").await.unwrap().unwrap();
        shop.users().delete(admin.id).await.unwrap();

        let outcome = login(&state, None, "shyam", "secret123", LoginPolicy::VENDOR)
            .await
            .unwrap();
        let LoginOutcome::Tenant { user, .. } = outcome else {
            panic!("expected a shop session");
        };
        assert_eq!(user.email, "owner@shyam.np");
        assert_ne!(user.id, admin.id);
    }

    #[tokio::test]
    async fn test_resolved_tenant_authenticates_shop_users() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir).await;
        let tenant = create_vendor(&state, &vendor_form("hari")).await.unwrap();

        let shop = state.registry.ensure(&tenant).await.unwrap();
        shop.users()
            .create(&NewUser {
                username: "sita".to_string(),
                email: "sita@hari.np".to_string(),
                password: "cashier1".to_string(),
                role: Role::Cashier,
                ..Default::default()
            })
            .await
            .unwrap();

        let outcome = login(&state, Some(&tenant), "sita", "cashier1", LoginPolicy::USER)
            .await
            .unwrap();
        assert!(matches!(outcome, LoginOutcome::Tenant { user, .. } if user.role == Role::Cashier));

        let err = login(&state, None, "sita", "cashier1", LoginPolicy::USER)
            .await
            .unwrap_err();
        assert_eq!(err.message, INVALID_CREDENTIALS);
    }
}
