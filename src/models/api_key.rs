//! API Key model for authentication.
//!
//! API keys authenticate tenants making requests to the API. They are stored
//! as bcrypt hashes next to a short plaintext prefix used to find the row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents an API key record from the database, without its hash.
///
/// # Database Table
///
/// Maps to the `api_keys` table with columns:
/// - `id`: Unique identifier (UUID)
/// - `tenant_id`: Owning tenant
/// - `name`: Human-readable label
/// - `key_prefix`: First 8 characters of the key, set once at issuance
/// - `is_active`: Cleared on revocation
/// - `last_used_at`: Updated in the background after successful validations
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKey {
    pub id: Uuid,

    pub tenant_id: Uuid,

    pub name: String,

    /// Plaintext lookup prefix. Not secret, and not unique.
    pub key_prefix: String,

    /// Inactive keys are rejected during authentication. Revocation clears
    /// this flag instead of deleting the record.
    pub is_active: bool,

    pub last_used_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// An active key joined with its owning tenant, as returned by prefix lookup.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKeyCandidate {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub key_hash: String,
    pub tenant_name: String,
    pub tenant_is_active: bool,
}

/// Fields persisted by key generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApiKey {
    pub tenant_id: Uuid,
    pub name: String,
    pub key_hash: String,
    pub key_prefix: String,
}

/// Request body for issuing a key.
///
/// ```json
/// { "label": "ci-key" }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    pub label: String,
}

/// A freshly generated key. `key` is the only copy of the raw secret.
#[derive(Debug, Serialize)]
pub struct IssuedApiKey {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub label: String,
    pub prefix: String,
    pub key: String,
}

/// API response for listing keys (hash excluded).
#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub id: Uuid,
    pub label: String,
    pub prefix: String,
    pub is_active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Revocation time for inactive keys.
    pub updated_at: DateTime<Utc>,
}

impl From<ApiKey> for ApiKeyResponse {
    fn from(key: ApiKey) -> Self {
        Self {
            id: key.id,
            label: key.name,
            prefix: key.key_prefix,
            is_active: key.is_active,
            last_used_at: key.last_used_at,
            created_at: key.created_at,
            updated_at: key.updated_at,
        }
    }
}

/// Response after a revocation attempt.
#[derive(Debug, Serialize)]
pub struct RevokeApiKeyResponse {
    pub id: Uuid,
    /// False when the key was already inactive or belongs to another tenant.
    pub revoked: bool,
}
