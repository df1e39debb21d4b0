//! # Vendor Lifecycle
//!
//! Everything the superadmin console does to a vendor.
//!
//! ## Creating a Vendor
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  form checks ──► tenants row ──► platform owner ──► link admin_user_id  │
//! │                                                          │              │
//! │                  tenant admin ◄── migrate ◄── provision ◄┘              │
//! │                                                                         │
//! │  any failure: delete the file, the tenants row and the owner            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Deleting a vendor removes its record and its database file. The owner's
//! platform account is left in place.

use kirana_core::validation::{validate_email, validate_password_pair, validate_vendor_code};
use kirana_core::{AccessFlags, Role, Tenant, TenantStatus, ValidationError};
use kirana_db::{verify_password, DbError, NewTenant, NewUser, TenantUpdate};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::auth::{Grant, IssuedToken, SessionClaims};
use crate::error::ApiError;
use crate::state::AppState;

/// The new-vendor form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VendorForm {
    pub vendor_name: String,
    pub vendor_code: String,
    pub owner_email: String,
    pub admin_password: String,
    pub admin_password2: String,
    /// All sections are on when omitted.
    pub access: Option<AccessFlags>,
}

/// Editable vendor fields.
#[derive(Debug, Clone, Deserialize)]
pub struct VendorUpdate {
    pub name: String,
    pub status: TenantStatus,
    #[serde(default)]
    pub access: AccessFlags,
}

fn rule(message: &str) -> ApiError {
    ValidationError::rule(message).into()
}

/// Creates a vendor with its owner account and a migrated shop database.
///
/// ## Errors
/// - "All fields are required."
/// - "Passwords do not match."
/// - "Vendor code already exists."
/// - "Email already registered."
/// - "Error creating vendor: …" when provisioning fails (nothing is kept)
pub async fn create_vendor(state: &AppState, form: &VendorForm) -> Result<Tenant, ApiError> {
    let name = form.vendor_name.trim();
    let code = form.vendor_code.trim().to_lowercase();
    let email = form.owner_email.trim().to_lowercase();

    if name.is_empty() || code.is_empty() || email.is_empty() || form.admin_password.is_empty() {
        return Err(rule("All fields are required."));
    }
    validate_password_pair(&form.admin_password, &form.admin_password2)?;
    validate_vendor_code(&code)?;
    validate_email(&email)?;

    if state.platform.tenants().code_exists(&code).await? {
        return Err(rule("Vendor code already exists."));
    }
    if state.platform.users().login_taken(&email).await? {
        return Err(rule("Email already registered."));
    }

    let tenant = state
        .platform
        .tenants()
        .create(&NewTenant {
            name: name.to_string(),
            code: code.clone(),
            owner_email: email.clone(),
            db_name: None,
            access: form.access.unwrap_or_default(),
        })
        .await?;

    let mut owner_id = None;
    let result = provision_vendor(state, &tenant, &email, &form.admin_password, &mut owner_id).await;

    match result {
        Ok(tenant) => {
            info!(tenant = %tenant.code, id = tenant.id, "Vendor created");
            Ok(tenant)
        }
        Err(e) => {
            error!(tenant = %code, error = %e, "Vendor creation failed, rolling back");
            rollback_vendor(state, &tenant, owner_id).await;
            Err(ApiError::validation(format!("Error creating vendor: {}", e)))
        }
    }
}

async fn provision_vendor(
    state: &AppState,
    tenant: &Tenant,
    email: &str,
    password: &str,
    owner_id: &mut Option<i64>,
) -> Result<Tenant, DbError> {
    let owner = state
        .platform
        .users()
        .create(&NewUser {
            username: email.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: Role::TenantAdmin,
            tenant_id: Some(tenant.id),
            ..Default::default()
        })
        .await?;
    *owner_id = Some(owner.id);

    state.platform.tenants().set_admin_user(tenant.id, owner.id).await?;

    state.registry.provision(tenant).await?;
    let shop = state.registry.migrate(tenant).await?;
    shop.users()
        .create(&NewUser {
            username: email.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: Role::TenantAdmin,
            ..Default::default()
        })
        .await?;

    state.platform.tenants().get(tenant.id).await
}

async fn rollback_vendor(state: &AppState, tenant: &Tenant, owner_id: Option<i64>) {
    if let Err(e) = state.registry.delete(tenant).await {
        warn!(tenant = %tenant.code, error = %e, "Could not remove vendor database during rollback");
    }
    if let Err(e) = state.platform.tenants().delete(tenant.id).await {
        warn!(tenant = %tenant.code, error = %e, "Could not remove vendor record during rollback");
    }
    if let Some(id) = owner_id {
        if let Err(e) = state.platform.users().delete(id).await {
            warn!(user_id = id, error = %e, "Could not remove vendor owner during rollback");
        }
    }
}

/// Updates name, status and section access.
pub async fn update_vendor(state: &AppState, id: i64, update: &VendorUpdate) -> Result<Tenant, ApiError> {
    if update.name.trim().is_empty() {
        return Err(rule("Vendor name is required."));
    }
    let tenant = state
        .platform
        .tenants()
        .update(
            id,
            &TenantUpdate {
                name: update.name.trim().to_string(),
                status: update.status,
                access: update.access,
            },
        )
        .await?;
    info!(tenant = %tenant.code, status = tenant.status.as_str(), "Vendor updated");
    Ok(tenant)
}

pub async fn set_vendor_active(state: &AppState, id: i64, active: bool) -> Result<Tenant, ApiError> {
    let tenant = state.platform.tenants().set_active(id, active).await?;
    info!(tenant = %tenant.code, active, "Vendor activation changed");
    Ok(tenant)
}

/// Sets a new password on the owner's platform account and on the shop's
/// admin account, creating the latter when it is missing.
///
/// ## Errors
/// - "Passwords do not match or are empty."
/// - "Vendor has no admin user."
pub async fn reset_vendor_password(
    state: &AppState,
    id: i64,
    password: &str,
    confirm: &str,
) -> Result<Tenant, ApiError> {
    if password.is_empty() || password != confirm {
        return Err(rule("Passwords do not match or are empty."));
    }

    let tenant = state.platform.tenants().get(id).await?;
    let admin_id = tenant
        .admin_user_id
        .ok_or_else(|| rule("Vendor has no admin user."))?;

    let owner = state.platform.users().get(admin_id).await?;
    state.platform.users().set_password(owner.id, password).await?;

    let shop = state.registry.ensure_schema(&tenant).await?;
    match shop.users().find_by_email(&owner.email).await? {
        Some(admin) => shop.users().set_password(admin.id, password).await?,
        None => {
            shop.users()
                .create(&NewUser {
                    username: owner.email.clone(),
                    email: owner.email.clone(),
                    password: password.to_string(),
                    role: Role::TenantAdmin,
                    ..Default::default()
                })
                .await?;
        }
    }

    info!(tenant = %tenant.code, "Vendor password reset");
    Ok(tenant)
}

/// Deletes a vendor's database file and record.
///
/// ## Errors
/// - "Confirmation code does not match vendor code."
/// - "Superadmin password is incorrect."
pub async fn delete_vendor(
    state: &AppState,
    session: &SessionClaims,
    id: i64,
    confirm: &str,
    password: &str,
) -> Result<Tenant, ApiError> {
    let tenant = state.platform.tenants().get(id).await?;
    if confirm.trim().to_lowercase() != tenant.code {
        return Err(rule("Confirmation code does not match vendor code."));
    }

    let superadmin = state.platform.users().get(session.sub).await?;
    if !verify_password(password, &superadmin.password_hash) {
        warn!(user = %superadmin.username, tenant = %tenant.code, "Vendor delete refused");
        return Err(rule("Superadmin password is incorrect."));
    }

    state.registry.delete(&tenant).await?;
    state.platform.tenants().delete(tenant.id).await?;
    info!(tenant = %tenant.code, by = %superadmin.username, "Vendor deleted");
    Ok(tenant)
}

/// Opens a shop session on behalf of a superadmin.
pub async fn login_as_vendor(
    state: &AppState,
    session: &SessionClaims,
    id: i64,
) -> Result<(Tenant, IssuedToken), ApiError> {
    if !session.is_superadmin() {
        return Err(ApiError::forbidden("Access denied."));
    }
    let superadmin_id = session.superadmin_id.unwrap_or(session.sub);

    let tenant = state.platform.tenants().get(id).await?;
    if !tenant.is_active {
        return Err(rule("Vendor is not active."));
    }
    state.registry.ensure_schema(&tenant).await?;

    let token = state.jwt.issue(Grant::impersonation(superadmin_id, tenant.id))?;
    info!(tenant = %tenant.code, superadmin_id, "Superadmin viewing vendor");
    Ok((tenant, token))
}

/// Changes the signed-in superadmin's own password.
///
/// ## Errors
/// - "All fields are required."
/// - "New passwords do not match."
/// - "Current password is incorrect."
pub async fn change_superadmin_password(
    state: &AppState,
    user_id: i64,
    current: &str,
    new: &str,
    confirm: &str,
) -> Result<(), ApiError> {
    if current.is_empty() || new.is_empty() || confirm.is_empty() {
        return Err(rule("All fields are required."));
    }
    if new != confirm {
        return Err(rule("New passwords do not match."));
    }

    let user = state.platform.users().get(user_id).await?;
    if !verify_password(current, &user.password_hash) {
        return Err(rule("Current password is incorrect."));
    }

    state.platform.users().set_password(user.id, new).await?;
    info!(user = %user.username, "Superadmin password changed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Realm;
    use crate::config::ServerConfig;
    use crate::state::SharedState;
    use kirana_core::UserAccount;
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

    async fn superadmin(state: &AppState) -> (UserAccount, SessionClaims) {
        let user = state
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
            .unwrap();
        let issued = state.jwt.issue(Grant::platform(&user)).unwrap();
        let claims = state.jwt.validate(&issued.token).unwrap();
        (user, claims)
    }

    fn form(code: &str) -> VendorForm {
        VendorForm {
            vendor_name: "Gita Books".to_string(),
            vendor_code: code.to_string(),
            owner_email: format!("owner@{}.np", code),
            admin_password: "secret123".to_string(),
            admin_password2: "secret123".to_string(),
            access: None,
        }
    }

    #[tokio::test]
    async fn test_create_vendor_provisions_everything() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir).await;

        let tenant = create_vendor(&state, &form("Gita")).await.unwrap();
        assert_eq!(tenant.code, "gita");
        assert_eq!(tenant.db_name, "shop_gita");
        assert!(tenant.is_active);

        let owner = state.platform.users().get(tenant.admin_user_id.unwrap()).await.unwrap();
        assert_eq!(owner.role, Role::TenantAdmin);
        assert_eq!(owner.tenant_id, Some(tenant.id));

        assert!(state.registry.database_path(&tenant).exists());
        let shop = state.registry.ensure(&tenant).await.unwrap();
        let admin = shop.users().find_by_email("owner@gita.np").await.unwrap().unwrap();
        assert_eq!(admin.role, Role::TenantAdmin);
    }

    #[tokio::test]
    async fn test_create_vendor_form_errors() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir).await;

        let mut missing = form("gita");
        missing.vendor_name = "  ".to_string();
        let err = create_vendor(&state, &missing).await.unwrap_err();
        assert_eq!(err.message, "All fields are required.");

        let mut mismatch = form("gita");
        mismatch.admin_password2 = "other123".to_string();
        let err = create_vendor(&state, &mismatch).await.unwrap_err();
        assert_eq!(err.message, "Passwords do not match.");

        create_vendor(&state, &form("gita")).await.unwrap();
        let err = create_vendor(&state, &form("GITA")).await.unwrap_err();
        assert_eq!(err.message, "Vendor code already exists.");

        let mut same_owner = form("gita2");
        same_owner.owner_email = "owner@gita.np".to_string();
        let err = create_vendor(&state, &same_owner).await.unwrap_err();
        assert_eq!(err.message, "Email already registered.");

        assert_eq!(state.platform.tenants().counts().await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_update_and_activation() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir).await;
        let tenant = create_vendor(&state, &form("gita")).await.unwrap();

        let updated = update_vendor(
            &state,
            tenant.id,
            &VendorUpdate {
                name: "Gita Book House".to_string(),
                status: TenantStatus::Suspended,
                access: AccessFlags {
                    reports: false,
                    ..AccessFlags::default()
                },
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.name, "Gita Book House");
        assert!(!updated.is_active);
        assert!(!updated.access_reports);

        let active = set_vendor_active(&state, tenant.id, true).await.unwrap();
        assert!(active.is_active);
        assert_eq!(active.status, TenantStatus::Active);
    }

    #[tokio::test]
    async fn test_reset_password_updates_both_accounts() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir).await;
        let tenant = create_vendor(&state, &form("gita")).await.unwrap();

        let err = reset_vendor_password(&state, tenant.id, "newpass1", "newpass2")
            .await
            .unwrap_err();
        assert_eq!(err.message, "Passwords do not match or are empty.");

        reset_vendor_password(&state, tenant.id, "newpass1", "newpass1")
            .await
            .unwrap();

        let owner = state.platform.users().get(tenant.admin_user_id.unwrap()).await.unwrap();
        assert!(verify_password("newpass1", &owner.password_hash));
        let shop = state.registry.ensure(&tenant).await.unwrap();
        assert!(shop.users().authenticate("owner@gita.np", "newpass1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_requires_code_and_password() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir).await;
        let (_, claims) = superadmin(&state).await;
        let tenant = create_vendor(&state, &form("gita")).await.unwrap();
        let path = state.registry.database_path(&tenant);

        let err = delete_vendor(&state, &claims, tenant.id, "other", "rootpass")
            .await
            .unwrap_err();
        assert_eq!(err.message, "Confirmation code does not match vendor code.");

        let err = delete_vendor(&state, &claims, tenant.id, "gita", "nope")
            .await
            .unwrap_err();
        assert_eq!(err.message, "Superadmin password is incorrect.");

        delete_vendor(&state, &claims, tenant.id, "GITA", "rootpass")
            .await
            .unwrap();
        assert!(!path.exists());
        assert!(state.platform.tenants().find_by_code("gita").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_as_vendor_issues_impersonation_session() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir).await;
        let (root, claims) = superadmin(&state).await;
        let tenant = create_vendor(&state, &form("gita")).await.unwrap();

        let (_, issued) = login_as_vendor(&state, &claims, tenant.id).await.unwrap();
        let viewing = state.jwt.validate(&issued.token).unwrap();
        assert_eq!(viewing.realm, Realm::Tenant);
        assert_eq!(viewing.tenant_id, Some(tenant.id));
        assert_eq!(viewing.superadmin_id, Some(root.id));
        assert_eq!(viewing.shop_user_id(), None);

        let shop_admin = state
            .registry
            .ensure(&tenant)
            .await
            .unwrap()
            .users()
            .find_by_email("owner@gita.np")
            .await
            .unwrap()
            .unwrap();
        let issued = state.jwt.issue(Grant::tenant(&shop_admin, tenant.id)).unwrap();
        let shop_claims = state.jwt.validate(&issued.token).unwrap();
        let err = login_as_vendor(&state, &shop_claims, tenant.id).await.unwrap_err();
        assert_eq!(err.message, "Access denied.");
    }

    #[tokio::test]
    async fn test_change_superadmin_password() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir).await;
        let (root, _) = superadmin(&state).await;

        let err = change_superadmin_password(&state, root.id, "", "a", "a").await.unwrap_err();
        assert_eq!(err.message, "All fields are required.");
        let err = change_superadmin_password(&state, root.id, "rootpass", "newroot1", "newroot2")
            .await
            .unwrap_err();
        assert_eq!(err.message, "New passwords do not match.");
        let err = change_superadmin_password(&state, root.id, "wrong", "newroot1", "newroot1")
            .await
            .unwrap_err();
        assert_eq!(err.message, "Current password is incorrect.");

        change_superadmin_password(&state, root.id, "rootpass", "newroot1", "newroot1")
            .await
            .unwrap();
        let root = state.platform.users().get(root.id).await.unwrap();
        assert!(verify_password("newroot1", &root.password_hash));
    }
}
