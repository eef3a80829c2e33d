//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables,
//! plus the request/response bodies built from them.

/// API key model
pub mod api_key;
/// Retention classification contract
pub mod classification;
/// Tenant model
pub mod tenant;
