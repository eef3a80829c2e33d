//! Tenant model.
//!
//! A tenant is an isolated customer or organization. It owns its API keys and
//! an opaque settings blob in which sensitive values are stored encrypted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a tenant record from the database.
///
/// # Database Table
///
/// Maps to the `tenants` table. `name` is unique across tenants.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Tenant {
    pub id: Uuid,

    pub name: String,

    /// Inactive tenants fail validation for every key they own, without the
    /// keys themselves being revoked.
    pub is_active: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// An encrypted value stored inside a tenant's settings blob.
///
/// ```json
/// { "bundle": "<hex nonce>:<hex tag>:<hex ciphertext>", "digest": "<hmac-sha256 hex>" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedSetting {
    pub bundle: String,

    /// Keyed digest of the plaintext, for change detection. Never returned to clients.
    pub digest: String,
}

/// Request body for storing a tenant setting.
#[derive(Debug, Deserialize)]
pub struct PutSettingRequest {
    pub value: String,
}

/// Response after storing a tenant setting. Never echoes the value.
#[derive(Debug, Serialize)]
pub struct PutSettingResponse {
    pub name: String,
    /// False when the stored value was already identical.
    pub changed: bool,
}

/// Response for reading a tenant setting.
#[derive(Debug, Serialize)]
pub struct SettingResponse {
    pub name: String,
    pub value: String,
}
