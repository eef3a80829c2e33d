//! Credential store: durable storage for API keys.
//!
//! The key manager only talks to the [`CredentialStore`] trait. Production uses
//! [`PgCredentialStore`]; tests use mocks or the in-memory store.
//!
//! Every operation is a single statement, so atomicity comes from PostgreSQL
//! and no locks are held here.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use uuid::Uuid;

use crate::{
    db::DbPool,
    models::api_key::{ApiKey, ApiKeyCandidate, NewApiKey},
};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// At most `limit` active keys with the given prefix, joined with their tenant.
    ///
    /// Most recently used keys come first.
    async fn find_active_by_prefix(
        &self,
        prefix: &str,
        limit: i64,
    ) -> Result<Vec<ApiKeyCandidate>, sqlx::Error>;

    /// Insert a key. Returns `None` without inserting if the tenant does not exist.
    async fn insert_api_key(&self, key: &NewApiKey) -> Result<Option<Uuid>, sqlx::Error>;

    /// Set `last_used_at` to now.
    async fn touch_last_used(&self, api_key_id: Uuid) -> Result<(), sqlx::Error>;

    /// Deactivate a key owned by `tenant_id`. Returns whether a row changed.
    async fn deactivate(&self, api_key_id: Uuid, tenant_id: Uuid) -> Result<bool, sqlx::Error>;

    async fn list_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<ApiKey>, sqlx::Error>;

    /// Round-trip to the backing store, for health checks.
    async fn ping(&self) -> Result<(), sqlx::Error>;
}

/// PostgreSQL-backed credential store.
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: DbPool,
}

impl PgCredentialStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_active_by_prefix(
        &self,
        prefix: &str,
        limit: i64,
    ) -> Result<Vec<ApiKeyCandidate>, sqlx::Error> {
        // Served by the partial index on (key_prefix) WHERE is_active
        sqlx::query_as::<_, ApiKeyCandidate>(
            r#"
            SELECT k.id,
                   k.tenant_id,
                   k.key_hash,
                   t.name AS tenant_name,
                   t.is_active AS tenant_is_active
            FROM api_keys k
            JOIN tenants t ON t.id = k.tenant_id
            WHERE k.key_prefix = $1 AND k.is_active = true
            ORDER BY k.last_used_at DESC NULLS LAST, k.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(prefix)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    async fn insert_api_key(&self, key: &NewApiKey) -> Result<Option<Uuid>, sqlx::Error> {
        // Selecting from tenants makes the existence check and insert one statement
        sqlx::query_scalar(
            r#"
            INSERT INTO api_keys (tenant_id, name, key_hash, key_prefix, is_active)
            SELECT id, $2, $3, $4, true
            FROM tenants
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(key.tenant_id)
        .bind(&key.name)
        .bind(&key.key_hash)
        .bind(&key.key_prefix)
        .fetch_optional(&self.pool)
        .await
    }

    async fn touch_last_used(&self, api_key_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE id = $1")
            .bind(api_key_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn deactivate(&self, api_key_id: Uuid, tenant_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE api_keys
            SET is_active = false,
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2 AND is_active = true
            "#,
        )
        .bind(api_key_id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<ApiKey>, sqlx::Error> {
        sqlx::query_as::<_, ApiKey>(
            r#"
            SELECT id, tenant_id, name, key_prefix, is_active,
                   last_used_at, created_at, updated_at
            FROM api_keys
            WHERE tenant_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
