//! The signed-in user's own account.
//!
//! Shop users edit their row in the shop database. Superadmins, including
//! one viewing a shop, edit their platform account.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use kirana_core::validation::validate_password_pair;
use kirana_core::{UserAccount, ValidationError};
use kirana_db::{verify_password, ProfileUpdate, UserRepository};
use serde::Deserialize;

use crate::auth::{Realm, Session, SessionClaims};
use crate::error::ApiError;
use crate::middleware::tenant::MaybeTenant;
use crate::routes::Message;
use crate::state::SharedState;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/profile", get(profile).put(update_profile))
        .route("/profile/password", post(change_password))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProfileForm {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PasswordForm {
    pub current_password: String,
    pub new_password: String,
    pub new_password2: String,
}

/// The store holding the session's own account, and its id there.
fn own_account(
    state: &SharedState,
    claims: &SessionClaims,
    current: MaybeTenant,
) -> Result<(UserRepository, i64), ApiError> {
    match (claims.realm, claims.superadmin_id) {
        (Realm::Tenant, None) => {
            let MaybeTenant(Some(current)) = current else {
                return Err(ApiError::unauthorized("Authentication required."));
            };
            Ok((current.db.users(), claims.sub))
        }
        (Realm::Tenant, Some(superadmin_id)) => Ok((state.platform.users(), superadmin_id)),
        (Realm::Platform, _) => Ok((state.platform.users(), claims.sub)),
    }
}

async fn profile(
    State(state): State<SharedState>,
    Session(claims): Session,
    current: MaybeTenant,
) -> Result<Json<UserAccount>, ApiError> {
    let (users, id) = own_account(&state, &claims, current)?;
    Ok(Json(users.get(id).await?))
}

async fn update_profile(
    State(state): State<SharedState>,
    Session(claims): Session,
    current: MaybeTenant,
    Json(form): Json<ProfileForm>,
) -> Result<Json<UserAccount>, ApiError> {
    let (users, id) = own_account(&state, &claims, current)?;
    let update = ProfileUpdate {
        email: form.email,
        full_name: form.full_name,
        phone: form.phone,
        address: form.address,
        city: form.city,
    };
    Ok(Json(users.update_profile(id, &update).await?))
}

async fn change_password(
    State(state): State<SharedState>,
    Session(claims): Session,
    current: MaybeTenant,
    Json(form): Json<PasswordForm>,
) -> Result<Json<Message>, ApiError> {
    let (users, id) = own_account(&state, &claims, current)?;
    let user = users.get(id).await?;
    if !verify_password(&form.current_password, &user.password_hash) {
        return Err(ValidationError::rule("Current password is incorrect.").into());
    }
    validate_password_pair(&form.new_password, &form.new_password2)?;
    users.set_password(id, &form.new_password).await?;
    Ok(Json(Message::new("Password updated successfully.")))
}
