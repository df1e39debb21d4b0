//! Section access rules.
//!
//! A vendor can be denied whole sections of the shop. The rule is keyed on
//! the path prefix (`/customers`, `/inventory`, `/sales`, `/reports`) and
//! checked after the tenant is resolved. Superadmins are never blocked.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use kirana_core::tenant::Section;
use tracing::debug;

use crate::auth::Session;
use crate::error::ApiError;
use crate::middleware::tenant::CurrentTenant;

pub const SECTION_DENIED: &str = "Access denied for this section.";

pub async fn enforce_section_access(request: Request, next: Next) -> Response {
    if let Some(section) = Section::from_path(request.uri().path()) {
        let superadmin = request
            .extensions()
            .get::<Session>()
            .is_some_and(|Session(claims)| claims.is_superadmin());

        if !superadmin {
            if let Some(current) = request.extensions().get::<CurrentTenant>() {
                if !current.tenant.allows(section) {
                    debug!(
                        tenant = %current.tenant.code,
                        section = section.as_str(),
                        "Section denied"
                    );
                    return ApiError::forbidden(SECTION_DENIED).into_response();
                }
            }
        }
    }

    next.run(request).await
}
