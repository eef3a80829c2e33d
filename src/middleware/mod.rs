//! HTTP middleware components.
//!
//! The authorization gate runs on every routed request. It decides from the
//! registered [`access::AccessPolicy`] whether the operation is public, and
//! otherwise validates the bearer API key and attaches the tenant context
//! that the [`tenant_context`] extractors read.

/// Public/private operation registry
pub mod access;
/// API key authentication middleware
pub mod auth;
/// Extractors for the authenticated tenant
pub mod tenant_context;
