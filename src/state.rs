//! Shared application state handed to every handler.

use crate::services::{api_key_service::ApiKeyManager, tenant_service::TenantService};

#[derive(Debug, Clone)]
pub struct AppState {
    pub api_keys: ApiKeyManager,
    pub tenants: TenantService,
}
