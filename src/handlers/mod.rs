//! HTTP request handlers (route handlers).
//!
//! Handlers behind the authorization gate receive the tenant through the
//! `CurrentTenantId` / `FullTenantContext` extractors and scope every
//! operation to it.

/// API key management endpoints
pub mod api_keys;
/// Retention classification table
pub mod classifications;
/// Health check endpoint
pub mod health;
/// Tenant profile and encrypted settings
pub mod tenant;
