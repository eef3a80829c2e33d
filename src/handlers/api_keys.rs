//! API key management HTTP handlers.
//!
//! This module implements the key endpoints, all scoped to the calling tenant:
//! - POST /api/v1/api-keys - Issue a new key
//! - GET /api/v1/api-keys - List the tenant's keys
//! - DELETE /api/v1/api-keys/{id} - Revoke a key

use crate::{
    error::AppError,
    middleware::tenant_context::CurrentTenantId,
    models::api_key::{ApiKeyResponse, CreateApiKeyRequest, IssuedApiKey, RevokeApiKeyResponse},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

/// Issue a new API key for the authenticated tenant.
///
/// # Endpoint
///
/// `POST /api/v1/api-keys`
///
/// # Request Body
///
/// ```json
/// { "label": "ci-key" }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: the new key. The raw `key` is shown only here.
/// - **Error (400)**: blank or overlong label
/// - **Error (401)**: missing or invalid API key
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "tenant_id": "1a2b3c4d-0000-0000-0000-000000000000",
///   "label": "ci-key",
///   "prefix": "sk_1a2b3",
///   "key": "sk_1a2b3c4d_..."
/// }
/// ```
pub async fn create_api_key(
    State(state): State<AppState>,
    CurrentTenantId(tenant_id): CurrentTenantId,
    Json(request): Json<CreateApiKeyRequest>,
) -> Result<(StatusCode, Json<IssuedApiKey>), AppError> {
    let issued = state.api_keys.generate(tenant_id, &request.label).await?;

    Ok((StatusCode::CREATED, Json(issued)))
}

/// List the authenticated tenant's keys, newest first. Hashes are never returned.
///
/// # Endpoint
///
/// `GET /api/v1/api-keys`
pub async fn list_api_keys(
    State(state): State<AppState>,
    CurrentTenantId(tenant_id): CurrentTenantId,
) -> Result<Json<Vec<ApiKeyResponse>>, AppError> {
    let keys = state.api_keys.list(tenant_id).await?;

    Ok(Json(keys))
}

/// Revoke one of the authenticated tenant's keys.
///
/// # Endpoint
///
/// `DELETE /api/v1/api-keys/{id}`
///
/// # Response (200 OK)
///
/// ```json
/// { "id": "550e8400-e29b-41d4-a716-446655440000", "revoked": true }
/// ```
///
/// `revoked` is false when the key is unknown, already revoked, or owned by
/// another tenant. Other tenants' keys are never touched.
pub async fn revoke_api_key(
    State(state): State<AppState>,
    CurrentTenantId(tenant_id): CurrentTenantId,
    Path(id): Path<Uuid>,
) -> Result<Json<RevokeApiKeyResponse>, AppError> {
    let revoked = state.api_keys.revoke(id, tenant_id).await?;

    Ok(Json(RevokeApiKeyResponse { id, revoked }))
}
