//! Shop staff accounts.
//!
//! Only tenant admins, managers and superadmins reach these handlers.

use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use kirana_core::validation::validate_password_pair;
use kirana_core::{Role, UserAccount};
use kirana_db::{NewUser, UserUpdate};
use serde::Deserialize;
use tracing::info;

use crate::error::ApiError;
use crate::middleware::tenant::Shop;
use crate::routes::Message;
use crate::state::SharedState;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", get(user_detail).put(update_user).delete(delete_user))
        .route("/users/{id}/password", post(set_password))
}

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password2: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUser {
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default = "active")]
    pub is_active: bool,
}

fn active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct NewPassword {
    pub password: String,
    pub password2: String,
}

async fn list_users(shop: Shop) -> Result<Json<Vec<UserAccount>>, ApiError> {
    shop.require_user_manager()?;
    Ok(Json(shop.db.users().list().await?))
}

async fn create_user(
    shop: Shop,
    Json(req): Json<CreateUser>,
) -> Result<(StatusCode, Json<UserAccount>), ApiError> {
    shop.require_user_manager()?;
    validate_password_pair(&req.password, &req.password2)?;

    let user = shop
        .db
        .users()
        .create(&NewUser {
            username: req.username,
            email: req.email,
            password: req.password,
            full_name: req.full_name,
            role: req.role,
            phone: req.phone,
            address: req.address,
            city: req.city,
            tenant_id: None,
        })
        .await?;
    info!(tenant = %shop.tenant.code, user = %user.username, role = user.role.as_str(), "Staff account created");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn user_detail(shop: Shop, Path(id): Path<i64>) -> Result<Json<UserAccount>, ApiError> {
    shop.require_user_manager()?;
    Ok(Json(shop.db.users().get(id).await?))
}

async fn update_user(
    shop: Shop,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUser>,
) -> Result<Json<UserAccount>, ApiError> {
    shop.require_user_manager()?;
    let user = shop
        .db
        .users()
        .update(
            id,
            &UserUpdate {
                email: req.email,
                full_name: req.full_name,
                role: req.role,
                phone: req.phone,
                address: req.address,
                city: req.city,
                is_active: req.is_active,
            },
        )
        .await?;
    Ok(Json(user))
}

async fn set_password(
    shop: Shop,
    Path(id): Path<i64>,
    Json(req): Json<NewPassword>,
) -> Result<Json<Message>, ApiError> {
    shop.require_user_manager()?;
    validate_password_pair(&req.password, &req.password2)?;
    shop.db.users().set_password(id, &req.password).await?;
    Ok(Json(Message::new("Password updated successfully.")))
}

async fn delete_user(shop: Shop, Path(id): Path<i64>) -> Result<Json<Message>, ApiError> {
    shop.require_user_manager()?;
    if shop.actor() == Some(id) {
        return Err(ApiError::validation("You cannot delete your own account."));
    }
    let user = shop.db.users().get(id).await?;
    shop.db.users().delete(id).await?;
    info!(tenant = %shop.tenant.code, user = %user.username, "Staff account deleted");
    Ok(Json(Message::new("User deleted successfully.")))
}
