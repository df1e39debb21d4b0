//! # User Repository
//!
//! Login accounts in either store.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UserStore::Platform  users(..., tenant_id)   superadmins, owners       │
//! │  UserStore::Tenant    users(...)              shop staff                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usernames and e-mails are stored lowercased; logins may use either.

use chrono::Utc;
use kirana_core::validation::validate_email;
use kirana_core::{Role, UserAccount, ValidationError};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::password::{hash_password, verify_password};
use crate::repository::non_blank;

const PLATFORM_COLUMNS: &str = "id, username, email, password_hash, full_name, role, phone, \
     address, city, is_active, tenant_id, created_at, updated_at";

const TENANT_COLUMNS: &str = "id, username, email, password_hash, full_name, role, phone, \
     address, city, is_active, created_at, updated_at";

/// Which database a [`UserRepository`] reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStore {
    Platform,
    Tenant,
}

/// Input for a new account.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    /// Platform store only.
    pub tenant_id: Option<i64>,
}

/// Fields an administrator may change on a staff account.
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub is_active: bool,
}

/// Fields a user may change on their own profile.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
}

/// Repository for login accounts.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
    store: UserStore,
}

impl UserRepository {
    /// Accounts of the platform database.
    pub fn platform(pool: SqlitePool) -> Self {
        UserRepository {
            pool,
            store: UserStore::Platform,
        }
    }

    /// Staff accounts of one tenant database.
    pub fn tenant(pool: SqlitePool) -> Self {
        UserRepository {
            pool,
            store: UserStore::Tenant,
        }
    }

    pub fn store(&self) -> UserStore {
        self.store
    }

    fn columns(&self) -> &'static str {
        match self.store {
            UserStore::Platform => PLATFORM_COLUMNS,
            UserStore::Tenant => TENANT_COLUMNS,
        }
    }

    /// Creates an account with a hashed password.
    ///
    /// ## Errors
    /// - "Superadmin role is not allowed for tenant users." in a tenant store
    /// - `DbError::UniqueViolation` on `users.username`
    pub async fn create(&self, new: &NewUser) -> DbResult<UserAccount> {
        if self.store == UserStore::Tenant && new.role == Role::Superadmin {
            return Err(ValidationError::rule("Superadmin role is not allowed for tenant users.").into());
        }

        let username = new.username.trim().to_lowercase();
        if username.is_empty() {
            return Err(ValidationError::Required {
                field: "username".to_string(),
            }
            .into());
        }
        let email = new.email.trim().to_lowercase();
        validate_email(&email)?;
        if new.password.is_empty() {
            return Err(ValidationError::Required {
                field: "password".to_string(),
            }
            .into());
        }

        let password_hash = hash_password(&new.password)?;
        let now = Utc::now();

        debug!(username = %username, role = new.role.as_str(), store = ?self.store, "Creating user");

        let id: i64 = match self.store {
            UserStore::Platform => {
                sqlx::query_scalar::<_, i64>(
                    "INSERT INTO users (username, email, password_hash, full_name, role, phone, \
                     address, city, is_active, tenant_id, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?10, ?10) RETURNING id",
                )
                .bind(&username)
                .bind(&email)
                .bind(&password_hash)
                .bind(non_blank(new.full_name.as_deref()))
                .bind(new.role)
                .bind(non_blank(new.phone.as_deref()))
                .bind(non_blank(new.address.as_deref()))
                .bind(non_blank(new.city.as_deref()))
                .bind(new.tenant_id)
                .bind(now)
                .fetch_one(&self.pool)
                .await
            }
            UserStore::Tenant => {
                sqlx::query_scalar::<_, i64>(
                    "INSERT INTO users (username, email, password_hash, full_name, role, phone, \
                     address, city, is_active, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?9) RETURNING id",
                )
                .bind(&username)
                .bind(&email)
                .bind(&password_hash)
                .bind(non_blank(new.full_name.as_deref()))
                .bind(new.role)
                .bind(non_blank(new.phone.as_deref()))
                .bind(non_blank(new.address.as_deref()))
                .bind(non_blank(new.city.as_deref()))
                .bind(now)
                .fetch_one(&self.pool)
                .await
            }
        }
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, username.clone()),
            other => other,
        })?;

        self.get(id).await
    }

    pub async fn get(&self, id: i64) -> DbResult<UserAccount> {
        let sql = format!("SELECT {} FROM users WHERE id = ?1", self.columns());
        sqlx::query_as::<_, UserAccount>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))
    }

    /// Finds an active account by username or e-mail (lowercased).
    pub async fn find_by_login(&self, identifier: &str) -> DbResult<Option<UserAccount>> {
        let identifier = identifier.trim().to_lowercase();
        let sql = format!(
            "SELECT {} FROM users WHERE is_active = 1 AND (username = ?1 OR email = ?1) \
             ORDER BY CASE WHEN username = ?1 THEN 0 ELSE 1 END, id LIMIT 1",
            self.columns()
        );
        let user = sqlx::query_as::<_, UserAccount>(&sql)
            .bind(&identifier)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Finds any account whose e-mail matches (lowercased).
    pub async fn find_by_email(&self, email: &str) -> DbResult<Option<UserAccount>> {
        let sql = format!(
            "SELECT {} FROM users WHERE email = ?1 ORDER BY id LIMIT 1",
            self.columns()
        );
        let user = sqlx::query_as::<_, UserAccount>(&sql)
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Returns the account when the identifier and password match.
    pub async fn authenticate(&self, identifier: &str, password: &str) -> DbResult<Option<UserAccount>> {
        let user = self.find_by_login(identifier).await?;
        Ok(user.filter(|u| verify_password(password, &u.password_hash)))
    }

    /// Whether an account with this username or e-mail exists.
    pub async fn login_taken(&self, identifier: &str) -> DbResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?1 OR email = ?1")
                .bind(identifier.trim().to_lowercase())
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    pub async fn list(&self) -> DbResult<Vec<UserAccount>> {
        let sql = format!("SELECT {} FROM users ORDER BY username", self.columns());
        let users = sqlx::query_as::<_, UserAccount>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    pub async fn update(&self, id: i64, update: &UserUpdate) -> DbResult<UserAccount> {
        if self.store == UserStore::Tenant && update.role == Role::Superadmin {
            return Err(ValidationError::rule("Superadmin role is not allowed for tenant users.").into());
        }
        let email = update.email.trim().to_lowercase();
        validate_email(&email)?;

        let result = sqlx::query(
            "UPDATE users SET email = ?1, full_name = ?2, role = ?3, phone = ?4, address = ?5, \
             city = ?6, is_active = ?7, updated_at = ?8 WHERE id = ?9",
        )
        .bind(&email)
        .bind(non_blank(update.full_name.as_deref()))
        .bind(update.role)
        .bind(non_blank(update.phone.as_deref()))
        .bind(non_blank(update.address.as_deref()))
        .bind(non_blank(update.city.as_deref()))
        .bind(update.is_active)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        self.get(id).await
    }

    /// Updates the signed-in user's own profile. Absent fields are kept.
    pub async fn update_profile(&self, id: i64, profile: &ProfileUpdate) -> DbResult<UserAccount> {
        let current = self.get(id).await?;

        let email = match non_blank(profile.email.as_deref()) {
            Some(email) => {
                let email = email.to_lowercase();
                validate_email(&email)?;
                email
            }
            None => current.email,
        };

        sqlx::query(
            "UPDATE users SET email = ?1, full_name = ?2, phone = ?3, address = ?4, city = ?5, \
             updated_at = ?6 WHERE id = ?7",
        )
        .bind(&email)
        .bind(non_blank(profile.full_name.as_deref()).or(current.full_name))
        .bind(non_blank(profile.phone.as_deref()).or(current.phone))
        .bind(non_blank(profile.address.as_deref()).or(current.address))
        .bind(non_blank(profile.city.as_deref()).or(current.city))
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get(id).await
    }

    /// Replaces the password hash.
    pub async fn set_password(&self, id: i64, password: &str) -> DbResult<()> {
        let password_hash = hash_password(password)?;
        let result = sqlx::query("UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(password_hash)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        debug!(user_id = id, store = ?self.store, "Password changed");
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
