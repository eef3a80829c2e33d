//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::services::secret_protection::DecryptError;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error message.
///
/// # Error Categories
///
/// - **Persistence**: any `sqlx::Error` from the credential or tenant store
/// - **Authentication**: missing credential, rejected credential, missing tenant context
/// - **Crypto**: bcrypt failures, blocking task failures, decryption failures
/// - **Resource / Validation**: unknown tenant, unknown setting, bad input
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    ///
    /// Propagated unmodified from the store; never retried here.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No credential was supplied on a private operation.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("API key is required")]
    AuthenticationRequired,

    /// A credential was supplied but did not validate.
    ///
    /// Unknown key, revoked key, inactive tenant and hash mismatch all end
    /// up here so the response never reveals which check failed.
    #[error("Invalid API key")]
    AuthenticationInvalid,

    /// A handler asked for tenant context on a request the gate did not authenticate.
    #[error("Tenant context not found")]
    TenantContextMissing,

    /// Tenant does not exist.
    #[error("Tenant not found")]
    TenantNotFound,

    /// Tenant setting does not exist.
    #[error("Setting not found")]
    SettingNotFound,

    /// bcrypt hashing or verification failed.
    #[error("Hashing error: {0}")]
    Hashing(#[from] bcrypt::BcryptError),

    /// A blocking task (bcrypt) panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A stored encrypted value could not be decrypted.
    #[error("Decryption failed: {0}")]
    Decryption(#[from] DecryptError),

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Invalid request")]
    InvalidRequest(String),
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `AuthenticationRequired` / `AuthenticationInvalid` / `TenantContextMissing` → 401
/// - `TenantNotFound` / `SettingNotFound` → 404
/// - `InvalidRequest` → 400
/// - everything else → 500 (details are logged, never returned)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::AuthenticationRequired => (
                StatusCode::UNAUTHORIZED,
                "authentication_required",
                self.to_string(),
            ),
            AppError::AuthenticationInvalid => (
                StatusCode::UNAUTHORIZED,
                "invalid_api_key",
                self.to_string(),
            ),
            AppError::TenantContextMissing => (
                StatusCode::UNAUTHORIZED,
                "tenant_context_missing",
                self.to_string(),
            ),
            AppError::TenantNotFound => {
                (StatusCode::NOT_FOUND, "tenant_not_found", self.to_string())
            }
            AppError::SettingNotFound => {
                (StatusCode::NOT_FOUND, "setting_not_found", self.to_string())
            }
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::Decryption(ref err) => {
                tracing::warn!(error = %err, "stored value failed to decrypt");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "decryption_failed",
                    "Stored value could not be decrypted".to_string(),
                )
            }
            AppError::Database(_) | AppError::Hashing(_) | AppError::Task(_) => {
                tracing::error!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
