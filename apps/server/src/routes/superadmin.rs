//! Superadmin console: the vendor list and vendor lifecycle.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use kirana_core::Tenant;
use kirana_db::TenantCounts;
use serde::{Deserialize, Serialize};

use crate::auth::{Session, Superadmin};
use crate::error::ApiError;
use crate::routes::auth::TenantBrief;
use crate::routes::Message;
use crate::services::vendor::{self, VendorForm, VendorUpdate};
use crate::state::SharedState;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/superadmin/dashboard", get(dashboard))
        .route("/superadmin/vendors", get(list_vendors).post(create_vendor))
        .route(
            "/superadmin/vendors/{id}",
            get(vendor_detail).put(update_vendor).delete(delete_vendor),
        )
        .route("/superadmin/vendors/{id}/activate", post(activate_vendor))
        .route("/superadmin/vendors/{id}/deactivate", post(deactivate_vendor))
        .route("/superadmin/vendors/{id}/reset-password", post(reset_password))
        .route("/superadmin/vendors/{id}/login-as", post(login_as))
        .route("/superadmin/change-password", post(change_password))
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub vendors: Vec<Tenant>,
    pub counts: TenantCounts,
}

/// A vendor change with its confirmation.
#[derive(Debug, Serialize)]
pub struct VendorMessage {
    pub message: String,
    pub vendor: Tenant,
}

#[derive(Debug, Deserialize)]
pub struct PasswordReset {
    pub password: String,
    pub password2: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteVendor {
    /// Must repeat the vendor code.
    pub confirm: String,
    /// The superadmin's own password.
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordChange {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub new_password2: String,
}

#[derive(Debug, Serialize)]
pub struct ViewingAs {
    pub message: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub tenant: TenantBrief,
}

async fn dashboard(
    State(state): State<SharedState>,
    _admin: Superadmin,
) -> Result<Json<Dashboard>, ApiError> {
    let tenants = state.platform.tenants();
    Ok(Json(Dashboard {
        vendors: tenants.list().await?,
        counts: tenants.counts().await?,
    }))
}

async fn list_vendors(
    State(state): State<SharedState>,
    _admin: Superadmin,
) -> Result<Json<Vec<Tenant>>, ApiError> {
    Ok(Json(state.platform.tenants().list().await?))
}

async fn create_vendor(
    State(state): State<SharedState>,
    _admin: Superadmin,
    Json(form): Json<VendorForm>,
) -> Result<(StatusCode, Json<VendorMessage>), ApiError> {
    let tenant = vendor::create_vendor(&state, &form).await?;
    Ok((
        StatusCode::CREATED,
        Json(VendorMessage {
            message: format!("Vendor \"{}\" created successfully.", tenant.name),
            vendor: tenant,
        }),
    ))
}

async fn vendor_detail(
    State(state): State<SharedState>,
    _admin: Superadmin,
    Path(id): Path<i64>,
) -> Result<Json<Tenant>, ApiError> {
    Ok(Json(state.platform.tenants().get(id).await?))
}

async fn update_vendor(
    State(state): State<SharedState>,
    _admin: Superadmin,
    Path(id): Path<i64>,
    Json(update): Json<VendorUpdate>,
) -> Result<Json<VendorMessage>, ApiError> {
    let tenant = vendor::update_vendor(&state, id, &update).await?;
    Ok(Json(VendorMessage {
        message: "Vendor updated successfully.".to_string(),
        vendor: tenant,
    }))
}

async fn activate_vendor(
    State(state): State<SharedState>,
    _admin: Superadmin,
    Path(id): Path<i64>,
) -> Result<Json<VendorMessage>, ApiError> {
    let tenant = vendor::set_vendor_active(&state, id, true).await?;
    Ok(Json(VendorMessage {
        message: format!("Vendor \"{}\" has been activated.", tenant.name),
        vendor: tenant,
    }))
}

async fn deactivate_vendor(
    State(state): State<SharedState>,
    _admin: Superadmin,
    Path(id): Path<i64>,
) -> Result<Json<VendorMessage>, ApiError> {
    let tenant = vendor::set_vendor_active(&state, id, false).await?;
    Ok(Json(VendorMessage {
        message: format!("Vendor \"{}\" has been deactivated.", tenant.name),
        vendor: tenant,
    }))
}

async fn reset_password(
    State(state): State<SharedState>,
    _admin: Superadmin,
    Path(id): Path<i64>,
    Json(req): Json<PasswordReset>,
) -> Result<Json<Message>, ApiError> {
    vendor::reset_vendor_password(&state, id, &req.password, &req.password2).await?;
    Ok(Json(Message::new("Password reset successfully.")))
}

async fn delete_vendor(
    State(state): State<SharedState>,
    Superadmin(claims): Superadmin,
    Path(id): Path<i64>,
    Json(req): Json<DeleteVendor>,
) -> Result<Json<Message>, ApiError> {
    let tenant = vendor::delete_vendor(&state, &claims, id, &req.confirm, &req.password).await?;
    Ok(Json(Message::new(format!(
        "Vendor \"{}\" deleted successfully.",
        tenant.name
    ))))
}

/// Any session may call this; non-superadmins get "Access denied.".
async fn login_as(
    State(state): State<SharedState>,
    Session(claims): Session,
    Path(id): Path<i64>,
) -> Result<Json<ViewingAs>, ApiError> {
    let (tenant, issued) = vendor::login_as_vendor(&state, &claims, id).await?;
    Ok(Json(ViewingAs {
        message: format!("Now viewing as: {}", tenant.name),
        token: issued.token,
        expires_at: issued.expires_at,
        tenant: TenantBrief::from(&tenant),
    }))
}

async fn change_password(
    State(state): State<SharedState>,
    Superadmin(claims): Superadmin,
    Json(req): Json<PasswordChange>,
) -> Result<Json<Message>, ApiError> {
    vendor::change_superadmin_password(
        &state,
        claims.sub,
        &req.current_password,
        &req.new_password,
        &req.new_password2,
    )
    .await?;
    Ok(Json(Message::new("Password updated successfully.")))
}
