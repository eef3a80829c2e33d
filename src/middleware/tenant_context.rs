//! Access to the tenant resolved by the authorization gate.
//!
//! The gate inserts a [`TenantContext`] into the request extensions after a
//! key validates. Handlers read it back through the extractors below instead
//! of validating again:
//!
//! ```ignore
//! async fn handler(CurrentTenantId(tenant_id): CurrentTenantId) { ... }
//! async fn handler(FullTenantContext(ctx): FullTenantContext) { ... }
//! ```
//!
//! Both reject with `TenantContextMissing` (401) on a request the gate did not
//! authenticate, e.g. a public operation.

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::Serialize;
use uuid::Uuid;

use crate::{error::AppError, services::api_key_service::ValidatedApiKey};

/// Authentication context attached to authenticated requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantContext {
    /// ID of the API key that authenticated the request
    pub api_key_id: Uuid,

    /// Owning tenant; every tenant-scoped query filters on this
    pub tenant_id: Uuid,

    pub tenant_name: String,
}

impl From<ValidatedApiKey> for TenantContext {
    fn from(key: ValidatedApiKey) -> Self {
        Self {
            api_key_id: key.api_key_id,
            tenant_id: key.tenant_id,
            tenant_name: key.tenant_name,
        }
    }
}

/// The authenticated tenant's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentTenantId(pub Uuid);

/// The full authenticated context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullTenantContext(pub TenantContext);

impl<S> FromRequestParts<S> for CurrentTenantId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .map(|ctx| CurrentTenantId(ctx.tenant_id))
            .ok_or(AppError::TenantContextMissing)
    }
}

impl<S> FromRequestParts<S> for FullTenantContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .cloned()
            .map(FullTenantContext)
            .ok_or(AppError::TenantContextMissing)
    }
}
