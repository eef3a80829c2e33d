//! Tenant service - tenant records and encrypted tenant settings.
//!
//! Settings are stored inside the tenant's `settings` JSONB blob. Each named
//! setting is a [`SealedSetting`]: the AES-GCM bundle plus a keyed digest of
//! the plaintext. Neither ever leaves the server.

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::tenant::{PutSettingResponse, SealedSetting, SettingResponse, Tenant},
    services::secret_protection::SecretProtection,
};

const MAX_SETTING_NAME_LEN: usize = 128;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn create_tenant(&self, name: &str) -> Result<Tenant, sqlx::Error>;

    async fn find_tenant(&self, tenant_id: Uuid) -> Result<Option<Tenant>, sqlx::Error>;

    async fn get_setting(
        &self,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<Option<SealedSetting>, sqlx::Error>;

    /// Merge one setting into the blob. Returns `false` if the tenant does not exist.
    async fn put_setting(
        &self,
        tenant_id: Uuid,
        name: &str,
        setting: &SealedSetting,
    ) -> Result<bool, sqlx::Error>;
}

/// PostgreSQL-backed tenant store.
#[derive(Debug, Clone)]
pub struct PgTenantStore {
    pool: DbPool,
}

impl PgTenantStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantStore for PgTenantStore {
    async fn create_tenant(&self, name: &str) -> Result<Tenant, sqlx::Error> {
        sqlx::query_as::<_, Tenant>(
            r#"
            INSERT INTO tenants (name)
            VALUES ($1)
            RETURNING id, name, is_active, created_at, updated_at
            "#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
    }

    async fn find_tenant(&self, tenant_id: Uuid) -> Result<Option<Tenant>, sqlx::Error> {
        sqlx::query_as::<_, Tenant>(
            "SELECT id, name, is_active, created_at, updated_at FROM tenants WHERE id = $1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_setting(
        &self,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<Option<SealedSetting>, sqlx::Error> {
        let value: Option<Option<Json<SealedSetting>>> =
            sqlx::query_scalar("SELECT settings -> $2::text FROM tenants WHERE id = $1")
                .bind(tenant_id)
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        Ok(value.flatten().map(|Json(setting)| setting))
    }

    async fn put_setting(
        &self,
        tenant_id: Uuid,
        name: &str,
        setting: &SealedSetting,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE tenants
            SET settings = COALESCE(settings, '{}'::jsonb) || jsonb_build_object($2::text, $3::jsonb),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(tenant_id)
        .bind(name)
        .bind(Json(setting))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Tenant operations that need encryption.
#[derive(Clone)]
pub struct TenantService {
    store: Arc<dyn TenantStore>,
    protection: Arc<SecretProtection>,
}

impl std::fmt::Debug for TenantService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantService").finish_non_exhaustive()
    }
}

impl TenantService {
    pub fn new(store: Arc<dyn TenantStore>, protection: Arc<SecretProtection>) -> Self {
        Self { store, protection }
    }

    /// Create a tenant.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: blank name
    /// - `Database`: includes unique violations on `name`
    pub async fn create_tenant(&self, name: &str) -> Result<Tenant, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidRequest(
                "Tenant name must not be empty".to_string(),
            ));
        }

        let tenant = self.store.create_tenant(name).await?;
        tracing::info!(tenant_id = %tenant.id, name = %tenant.name, "Tenant created");
        Ok(tenant)
    }

    pub async fn find_tenant(&self, tenant_id: Uuid) -> Result<Tenant, AppError> {
        self.store
            .find_tenant(tenant_id)
            .await?
            .ok_or(AppError::TenantNotFound)
    }

    /// Encrypt and store a setting.
    ///
    /// If the stored digest already matches, nothing is written.
    pub async fn put_setting(
        &self,
        tenant_id: Uuid,
        name: &str,
        value: &str,
    ) -> Result<PutSettingResponse, AppError> {
        validate_setting_name(name)?;

        let digest = self.protection.digest(value);

        if let Some(existing) = self.store.get_setting(tenant_id, name).await?
            && existing.digest == digest
        {
            return Ok(PutSettingResponse {
                name: name.to_string(),
                changed: false,
            });
        }

        let sealed = SealedSetting {
            bundle: self.protection.encrypt(value),
            digest,
        };

        if !self.store.put_setting(tenant_id, name, &sealed).await? {
            return Err(AppError::TenantNotFound);
        }

        tracing::info!(tenant_id = %tenant_id, setting = name, "Tenant setting stored");

        Ok(PutSettingResponse {
            name: name.to_string(),
            changed: true,
        })
    }

    /// Read and decrypt a setting.
    ///
    /// # Errors
    ///
    /// - `SettingNotFound`: no such setting
    /// - `Decryption`: the stored bundle was malformed or tampered with
    pub async fn get_setting(
        &self,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<SettingResponse, AppError> {
        validate_setting_name(name)?;

        let sealed = self
            .store
            .get_setting(tenant_id, name)
            .await?
            .ok_or(AppError::SettingNotFound)?;

        let value = self.protection.decrypt(&sealed.bundle)?;

        Ok(SettingResponse {
            name: name.to_string(),
            value,
        })
    }
}

fn validate_setting_name(name: &str) -> Result<(), AppError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_SETTING_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');

    if valid {
        Ok(())
    } else {
        Err(AppError::InvalidRequest(
            "Setting name must be 1-128 characters of [A-Za-z0-9_.-]".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{secret_protection::DecryptError, testing};

    fn service(store: Arc<dyn TenantStore>) -> TenantService {
        TenantService::new(store, testing::protection())
    }

    #[tokio::test]
    async fn setting_round_trip_is_encrypted_at_rest() {
        let store = Arc::new(testing::InMemoryStore::default());
        let tenant = store.add_tenant("tenant-1", true);
        let service = service(store.clone());

        let put = service
            .put_setting(tenant, "webhook_secret", "s3cr3t")
            .await
            .unwrap();
        assert!(put.changed);

        let sealed = store.get_setting(tenant, "webhook_secret").await.unwrap().unwrap();
        assert!(!sealed.bundle.contains("s3cr3t"));
        assert_eq!(sealed.digest, testing::protection().digest("s3cr3t"));

        let read = service.get_setting(tenant, "webhook_secret").await.unwrap();
        assert_eq!(read.value, "s3cr3t");
    }

    #[tokio::test]
    async fn unchanged_value_is_not_rewritten() {
        let mut store = MockTenantStore::new();
        let digest = testing::protection().digest("same");
        store.expect_get_setting().returning(move |_, _| {
            Ok(Some(SealedSetting {
                bundle: "unused".to_string(),
                digest: digest.clone(),
            }))
        });
        store.expect_put_setting().never();

        let put = service(Arc::new(store))
            .put_setting(Uuid::new_v4(), "name", "same")
            .await
            .unwrap();

        assert!(!put.changed);
    }

    #[tokio::test]
    async fn stored_setting_holds_no_plain_hash_of_the_value() {
        let store = Arc::new(testing::InMemoryStore::default());
        let tenant = store.add_tenant("tenant-1", true);
        let service = service(store.clone());
        let plain_hash = SecretProtection::fingerprint("hunter2");

        service.put_setting(tenant, "db_password", "hunter2").await.unwrap();

        let sealed = store.get_setting(tenant, "db_password").await.unwrap().unwrap();
        let stored = serde_json::to_string(&sealed).unwrap();
        assert!(!stored.contains(&plain_hash));
        assert!(!stored.contains("hunter2"));
    }

    #[tokio::test]
    async fn changed_value_is_rewritten() {
        let store = Arc::new(testing::InMemoryStore::default());
        let tenant = store.add_tenant("tenant-1", true);
        let service = service(store.clone());

        assert!(service.put_setting(tenant, "token", "one").await.unwrap().changed);
        assert!(!service.put_setting(tenant, "token", "one").await.unwrap().changed);
        assert!(service.put_setting(tenant, "token", "two").await.unwrap().changed);

        assert_eq!(service.get_setting(tenant, "token").await.unwrap().value, "two");
    }

    #[tokio::test]
    async fn missing_tenant_on_put() {
        let mut store = MockTenantStore::new();
        store.expect_get_setting().returning(|_, _| Ok(None));
        store.expect_put_setting().returning(|_, _, _| Ok(false));

        let result = service(Arc::new(store))
            .put_setting(Uuid::new_v4(), "name", "value")
            .await;

        assert!(matches!(result, Err(AppError::TenantNotFound)));
    }

    #[tokio::test]
    async fn tampered_setting_fails_to_decrypt() {
        let store = Arc::new(testing::InMemoryStore::default());
        let tenant = store.add_tenant("tenant-1", true);
        let service = service(store.clone());
        service.put_setting(tenant, "token", "value").await.unwrap();

        let mut sealed = store.get_setting(tenant, "token").await.unwrap().unwrap();
        let last = sealed.bundle.pop().unwrap();
        sealed.bundle.push(if last == '0' { '1' } else { '0' });
        store.put_setting(tenant, "token", &sealed).await.unwrap();

        let result = service.get_setting(tenant, "token").await;

        assert!(matches!(
            result,
            Err(AppError::Decryption(DecryptError::AuthenticationFailure))
        ));
    }

    #[tokio::test]
    async fn unknown_setting_is_not_found() {
        let store = Arc::new(testing::InMemoryStore::default());
        let tenant = store.add_tenant("tenant-1", true);

        let result = service(store).get_setting(tenant, "missing").await;

        assert!(matches!(result, Err(AppError::SettingNotFound)));
    }

    #[tokio::test]
    async fn rejects_bad_setting_names() {
        let store = Arc::new(testing::InMemoryStore::default());
        let tenant = store.add_tenant("tenant-1", true);
        let service = service(store);

        for name in ["", "has space", "slash/name", &"x".repeat(129)] {
            assert!(matches!(
                service.put_setting(tenant, name, "v").await,
                Err(AppError::InvalidRequest(_))
            ));
        }
    }

    #[tokio::test]
    async fn blank_tenant_name_is_rejected() {
        let mut store = MockTenantStore::new();
        store.expect_create_tenant().never();

        let result = service(Arc::new(store)).create_tenant("  ").await;

        assert!(matches!(result, Err(AppError::InvalidRequest(_))));
    }
}
