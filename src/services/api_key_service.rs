//! API key service - issuing, validating and revoking tenant credentials.
//!
//! # Key Format
//!
//! ```text
//! sk_<8 chars of tenant id>_<base64url of 32 random bytes>
//! ```
//!
//! # Storage
//!
//! Only a bcrypt hash of the full key is stored, together with the first 8
//! characters as a plaintext prefix. bcrypt is salted, so the hash cannot be
//! looked up directly; the prefix narrows validation to the few rows that can
//! match before any bcrypt comparison runs. Every key of a tenant shares its
//! prefix, so the number of rows compared per request is capped.
//!
//! # Failure Semantics
//!
//! An unknown, revoked or mismatching key is not an error: `validate` returns
//! `Ok(None)`. Store failures propagate unchanged and are never retried here.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::api_key::{ApiKeyCandidate, ApiKeyResponse, IssuedApiKey, NewApiKey},
    services::credential_store::CredentialStore,
};

const KEY_TAG: &str = "sk_";
const TENANT_FRAGMENT_LEN: usize = 8;
const RANDOM_BYTES: usize = 32;

/// Length of the stored lookup prefix.
pub const KEY_PREFIX_LEN: usize = 8;

/// Stored keys a single presented key is compared against, unless configured.
pub const DEFAULT_MAX_CANDIDATES: usize = 10;

const MAX_LABEL_CHARS: usize = 255;

/// Tenant identity resolved from a valid key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedApiKey {
    pub api_key_id: Uuid,
    pub tenant_id: Uuid,
    pub tenant_name: String,
}

/// Why a candidate key was turned down. Only ever logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    NotFound,
    TenantInactive,
    HashMismatch,
}

/// Issues, validates and revokes API keys.
///
/// Cheap to clone; the store is shared.
#[derive(Clone)]
pub struct ApiKeyManager {
    store: Arc<dyn CredentialStore>,
    bcrypt_cost: u32,
    max_candidates: usize,
}

impl std::fmt::Debug for ApiKeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyManager")
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("max_candidates", &self.max_candidates)
            .finish_non_exhaustive()
    }
}

impl ApiKeyManager {
    pub fn new(store: Arc<dyn CredentialStore>, bcrypt_cost: u32) -> Self {
        Self {
            store,
            bcrypt_cost,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }

    /// Cap the stored keys compared per validation (at least 1).
    pub fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = max_candidates.max(1);
        self
    }

    /// Generate and store a new key for `tenant_id`.
    ///
    /// # Process
    ///
    /// 1. Build `sk_<tenant fragment>_<random>`
    /// 2. bcrypt the full key on the blocking pool
    /// 3. Insert hash + prefix, only if the tenant exists
    /// 4. Return the raw key (the only time it is available)
    ///
    /// # Errors
    ///
    /// - `TenantNotFound`: no such tenant
    /// - `Hashing` / `Task`: bcrypt failed
    /// - `Database`: store error
    pub async fn generate(&self, tenant_id: Uuid, label: &str) -> Result<IssuedApiKey, AppError> {
        let label = label.trim();
        if label.is_empty() || label.chars().count() > MAX_LABEL_CHARS {
            return Err(AppError::InvalidRequest(
                "Label must be between 1 and 255 characters".to_string(),
            ));
        }

        let raw_key = build_raw_key(tenant_id);
        let key_prefix = key_prefix(&raw_key).to_string();

        let key_hash = {
            let raw_key = raw_key.clone();
            let cost = self.bcrypt_cost;
            tokio::task::spawn_blocking(move || bcrypt::hash(raw_key, cost)).await??
        };

        let new_key = NewApiKey {
            tenant_id,
            name: label.to_string(),
            key_hash,
            key_prefix: key_prefix.clone(),
        };

        let id = self
            .store
            .insert_api_key(&new_key)
            .await?
            .ok_or(AppError::TenantNotFound)?;

        tracing::info!(api_key_id = %id, tenant_id = %tenant_id, label, "API key generated");

        Ok(IssuedApiKey {
            id,
            tenant_id,
            label: new_key.name,
            prefix: key_prefix,
            key: raw_key,
        })
    }

    /// Validate a raw key.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(_))` for an active key of an active tenant whose hash matches
    /// - `Ok(None)` for an absent or empty key (the store is not queried) and
    ///   for any rejected key
    ///
    /// On success the key's `last_used_at` is updated by a detached task; the
    /// caller never waits for it and never sees its failure.
    ///
    /// # Errors
    ///
    /// Store, bcrypt and task failures.
    pub async fn validate(
        &self,
        candidate: Option<&str>,
    ) -> Result<Option<ValidatedApiKey>, AppError> {
        let Some(raw_key) = candidate.filter(|k| !k.is_empty()) else {
            return Ok(None);
        };

        let prefix = key_prefix(raw_key);

        // One extra row tells us whether anything was cut off
        let limit = i64::try_from(self.max_candidates + 1).unwrap_or(i64::MAX);
        let mut candidates = self.store.find_active_by_prefix(prefix, limit).await?;
        if candidates.len() > self.max_candidates {
            tracing::warn!(
                key_prefix = prefix,
                max_candidates = self.max_candidates,
                "More active keys share this prefix than are checked per request"
            );
            candidates.truncate(self.max_candidates);
        }

        let validated = match self.match_candidate(raw_key, candidates).await? {
            Ok(validated) => validated,
            Err(rejection) => {
                match rejection {
                    Rejection::TenantInactive => {
                        tracing::warn!(key_prefix = prefix, "API key tenant is inactive")
                    }
                    Rejection::HashMismatch => {
                        tracing::debug!(key_prefix = prefix, "API key hash mismatch")
                    }
                    Rejection::NotFound => {
                        tracing::debug!(key_prefix = prefix, "API key not found or inactive")
                    }
                }
                return Ok(None);
            }
        };

        self.spawn_touch_last_used(validated.api_key_id);

        Ok(Some(validated))
    }

    /// Check each candidate in store order until its hash matches `raw_key`.
    ///
    /// The hash is compared before the tenant's state is looked at, so an
    /// inactive tenant costs the same as a mismatch. A match for an inactive
    /// tenant ends the search. Otherwise the rejection describes the last
    /// candidate turned down.
    async fn match_candidate(
        &self,
        raw_key: &str,
        candidates: Vec<ApiKeyCandidate>,
    ) -> Result<Result<ValidatedApiKey, Rejection>, AppError> {
        let mut rejection = Rejection::NotFound;

        for candidate in candidates {
            let matches = {
                let raw_key = raw_key.to_string();
                let key_hash = candidate.key_hash.clone();
                tokio::task::spawn_blocking(move || bcrypt::verify(raw_key, &key_hash)).await??
            };

            if !matches {
                rejection = Rejection::HashMismatch;
                continue;
            }

            if !candidate.tenant_is_active {
                tracing::debug!(
                    api_key_id = %candidate.id,
                    tenant_id = %candidate.tenant_id,
                    "key belongs to inactive tenant"
                );
                return Ok(Err(Rejection::TenantInactive));
            }

            return Ok(Ok(ValidatedApiKey {
                api_key_id: candidate.id,
                tenant_id: candidate.tenant_id,
                tenant_name: candidate.tenant_name,
            }));
        }

        Ok(Err(rejection))
    }

    fn spawn_touch_last_used(&self, api_key_id: Uuid) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(e) = store.touch_last_used(api_key_id).await {
                tracing::error!(
                    api_key_id = %api_key_id,
                    error = %e,
                    "Failed to update API key last used timestamp"
                );
            }
        });
    }

    /// Deactivate a key, scoped to the owning tenant.
    ///
    /// Returns `false` if the key does not exist, belongs to another tenant,
    /// or was already revoked.
    pub async fn revoke(&self, api_key_id: Uuid, tenant_id: Uuid) -> Result<bool, AppError> {
        let revoked = self.store.deactivate(api_key_id, tenant_id).await?;

        if revoked {
            tracing::info!(api_key_id = %api_key_id, tenant_id = %tenant_id, "API key revoked");
        } else {
            tracing::debug!(api_key_id = %api_key_id, tenant_id = %tenant_id, "API key revoke had no effect");
        }

        Ok(revoked)
    }

    /// Check the credential store is reachable.
    pub async fn check_store(&self) -> Result<(), AppError> {
        self.store.ping().await?;
        Ok(())
    }

    /// All keys of a tenant, newest first, without hashes.
    pub async fn list(&self, tenant_id: Uuid) -> Result<Vec<ApiKeyResponse>, AppError> {
        let keys = self.store.list_for_tenant(tenant_id).await?;
        Ok(keys.into_iter().map(Into::into).collect())
    }
}

/// `sk_` + tenant fragment + `_` + 43 base64url characters (55 bytes total,
/// under bcrypt's 72-byte input limit).
fn build_raw_key(tenant_id: Uuid) -> String {
    let fragment = tenant_fragment(tenant_id);
    let random: [u8; RANDOM_BYTES] = rand::random();
    format!("{KEY_TAG}{fragment}_{}", URL_SAFE_NO_PAD.encode(random))
}

/// First 8 characters of the tenant id without hyphens.
fn tenant_fragment(tenant_id: Uuid) -> String {
    tenant_id
        .simple()
        .to_string()
        .chars()
        .take(TENANT_FRAGMENT_LEN)
        .collect()
}

/// First [`KEY_PREFIX_LEN`] characters, or the whole key if shorter.
fn key_prefix(raw_key: &str) -> &str {
    match raw_key.char_indices().nth(KEY_PREFIX_LEN) {
        Some((end, _)) => &raw_key[..end],
        None => raw_key,
    }
}
