//! Tenant profile and encrypted settings.
//!
//! - GET /api/v1/tenant - The authenticated tenant
//! - PUT /api/v1/tenant/settings/{name} - Store an encrypted setting
//! - GET /api/v1/tenant/settings/{name} - Read a setting back in clear

use crate::{
    error::AppError,
    middleware::tenant_context::{CurrentTenantId, FullTenantContext},
    models::tenant::{PutSettingRequest, PutSettingResponse, SettingResponse, Tenant},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use uuid::Uuid;

/// The tenant plus the key the caller authenticated with.
#[derive(Debug, Serialize)]
pub struct TenantProfile {
    pub api_key_id: Uuid,
    #[serde(flatten)]
    pub tenant: Tenant,
}

/// Show the authenticated tenant.
///
/// # Endpoint
///
/// `GET /api/v1/tenant`
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "api_key_id": "550e8400-e29b-41d4-a716-446655440000",
///   "id": "1a2b3c4d-0000-0000-0000-000000000000",
///   "name": "Acme",
///   "is_active": true,
///   "created_at": "2025-12-20T10:00:00Z",
///   "updated_at": "2025-12-20T10:00:00Z"
/// }
/// ```
pub async fn get_tenant(
    State(state): State<AppState>,
    FullTenantContext(ctx): FullTenantContext,
) -> Result<Json<TenantProfile>, AppError> {
    let tenant = state.tenants.find_tenant(ctx.tenant_id).await?;

    Ok(Json(TenantProfile {
        api_key_id: ctx.api_key_id,
        tenant,
    }))
}

/// Encrypt and store a named setting for the authenticated tenant.
///
/// # Endpoint
///
/// `PUT /api/v1/tenant/settings/{name}`
///
/// # Request Body
///
/// ```json
/// { "value": "whsec_live_123" }
/// ```
///
/// # Response (200 OK)
///
/// The value is never echoed; `changed` is false when the stored value was
/// already identical.
///
/// ```json
/// { "name": "webhook_secret", "changed": true }
/// ```
pub async fn put_setting(
    State(state): State<AppState>,
    CurrentTenantId(tenant_id): CurrentTenantId,
    Path(name): Path<String>,
    Json(request): Json<PutSettingRequest>,
) -> Result<Json<PutSettingResponse>, AppError> {
    let response = state
        .tenants
        .put_setting(tenant_id, &name, &request.value)
        .await?;

    Ok(Json(response))
}

/// Decrypt and return a named setting.
///
/// # Endpoint
///
/// `GET /api/v1/tenant/settings/{name}`
///
/// # Response
///
/// - **Success (200 OK)**: `{ "name", "value" }`
/// - **Error (404)**: no such setting
/// - **Error (500)**: stored bundle failed authentication
pub async fn get_setting(
    State(state): State<AppState>,
    CurrentTenantId(tenant_id): CurrentTenantId,
    Path(name): Path<String>,
) -> Result<Json<SettingResponse>, AppError> {
    let setting = state.tenants.get_setting(tenant_id, &name).await?;

    Ok(Json(setting))
}
