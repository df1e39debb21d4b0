//! # API Error Type
//!
//! Unified error type for HTTP handlers.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Kirana Server                          │
//! │                                                                         │
//! │  Handler -> Result<Json<T>, ApiError>                                   │
//! │         │                                                               │
//! │         ├── DbError::QueryFailed ──────► DATABASE_ERROR (500, logged)  │
//! │         ├── DbError::NotFound ─────────► NOT_FOUND (404)               │
//! │         ├── CoreError::InsufficientStock ► INSUFFICIENT_STOCK (409)    │
//! │         ├── ValidationError ───────────► VALIDATION_ERROR (400)        │
//! │         └── rule messages ("Passwords do not match.") keep their text  │
//! │                                                                         │
//! │  Body: { "code": "NOT_FOUND", "message": "Sale not found: 42" }         │
//! │                                                                         │
//! │  POS endpoints wrap the same error in PosError:                         │
//! │  Body: { "success": false, "error": "No items in sale" } (400)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kirana_core::{CoreError, ValidationError};
use kirana_db::DbError;
use serde::Serialize;

/// API error returned from handlers.
///
/// ## Serialization
/// ```json
/// {
///   "code": "NOT_FOUND",
///   "message": "Customer not found: 9801234567"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Missing, expired or refused credentials (401)
    Unauthorized,

    /// Signed in but not allowed (403)
    Forbidden,

    /// Duplicate value (409)
    Conflict,

    /// No vendor could be resolved for a shop route (400)
    TenantRequired,

    /// Database operation failed (500)
    DatabaseError,

    /// Business logic error (422)
    BusinessLogic,

    /// Insufficient stock (409)
    InsufficientStock,

    /// Payment processing error (400)
    PaymentError,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError | ErrorCode::TenantRequired | ErrorCode::PaymentError => {
                StatusCode::BAD_REQUEST
            }
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::Conflict | ErrorCode::InsufficientStock => StatusCode::CONFLICT,
            ErrorCode::BusinessLogic => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::DatabaseError | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Forbidden, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::Conflict,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::Domain(core) => core.into(),
            DbError::ConnectionFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Database migration failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::TransactionFailed(e) => {
                tracing::error!("Transaction failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database transaction failed")
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::new(
                    ErrorCode::BusinessLogic,
                    "Record is still referenced and cannot be changed",
                )
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::Storage(e) => {
                tracing::error!("Tenant storage error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Shop database is unavailable")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            CoreError::ProductNotFound(_) | CoreError::SaleNotFound(_) => ErrorCode::NotFound,
            CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            CoreError::InvalidSaleStatus { .. } => ErrorCode::BusinessLogic,
            CoreError::EmptySale
            | CoreError::SaleTooLarge { .. }
            | CoreError::QuantityTooLarge { .. }
            | CoreError::AmountTooLarge
            | CoreError::Validation(_) => ErrorCode::ValidationError,
            CoreError::InvalidPaymentAmount { .. } | CoreError::PaymentExceedsCredit => {
                ErrorCode::PaymentError
            }
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// =============================================================================
// POS Errors
// =============================================================================

/// Error shape the POS screen expects: always 400 with `success: false`.
#[derive(Debug, Clone)]
pub struct PosError(pub ApiError);

#[derive(Serialize)]
struct PosErrorBody {
    success: bool,
    error: String,
}

impl From<ApiError> for PosError {
    fn from(err: ApiError) -> Self {
        PosError(err)
    }
}

impl From<DbError> for PosError {
    fn from(err: DbError) -> Self {
        PosError(err.into())
    }
}

impl From<CoreError> for PosError {
    fn from(err: CoreError) -> Self {
        PosError(err.into())
    }
}

impl IntoResponse for PosError {
    fn into_response(self) -> Response {
        let body = PosErrorBody {
            success: false,
            error: self.0.message,
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_errors_map_to_codes() {
        let err: ApiError = DbError::not_found("Sale", 42).into();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.message, "Sale not found: 42");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err: ApiError = DbError::QueryFailed("no such column: foo".to_string()).into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert_eq!(err.message, "Database operation failed");
    }

    #[test]
    fn test_domain_errors_keep_their_message() {
        let err: ApiError = DbError::Domain(CoreError::PaymentExceedsCredit).into();
        assert_eq!(err.code, ErrorCode::PaymentError);
        assert_eq!(err.message, "Payment exceeds current credit balance.");

        let err: ApiError = ValidationError::rule("Passwords do not match.").into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Passwords do not match.");
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_value(ApiError::new(ErrorCode::InsufficientStock, "x")).unwrap();
        assert_eq!(json["code"], "INSUFFICIENT_STOCK");
        assert_eq!(json["message"], "x");
    }

    #[test]
    fn test_pos_error_is_bad_request() {
        let response = PosError::from(CoreError::EmptySale).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
