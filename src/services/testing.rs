//! In-memory stores for tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, OnceLock},
};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    models::{
        api_key::{ApiKey, ApiKeyCandidate, NewApiKey},
        tenant::{SealedSetting, Tenant},
    },
    services::{
        credential_store::CredentialStore,
        secret_protection::{EncryptionKey, SecretProtection},
        tenant_service::TenantStore,
    },
};

/// Shared protection instance; key derivation is deliberately slow.
pub fn protection() -> Arc<SecretProtection> {
    static PROTECTION: OnceLock<Arc<SecretProtection>> = OnceLock::new();
    PROTECTION
        .get_or_init(|| {
            let key = EncryptionKey::derive(Some("test-encryption-key")).unwrap();
            Arc::new(SecretProtection::new(&key))
        })
        .clone()
}

/// A key row together with the hash column the listing type leaves out.
#[derive(Debug, Clone)]
struct StoredKey {
    record: ApiKey,
    key_hash: String,
}

/// Tenants and keys held in memory, behaving like the PostgreSQL stores.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tenants: Mutex<Vec<Tenant>>,
    api_keys: Mutex<Vec<StoredKey>>,
    /// Each tenant's `settings` blob.
    settings: Mutex<HashMap<Uuid, serde_json::Value>>,
}

impl InMemoryStore {
    pub fn add_tenant(&self, name: &str, is_active: bool) -> Uuid {
        let now = Utc::now();
        let tenant = Tenant {
            id: Uuid::new_v4(),
            name: name.to_string(),
            is_active,
            created_at: now,
            updated_at: now,
        };
        let id = tenant.id;
        self.tenants.lock().unwrap().push(tenant);
        id
    }

    pub fn set_tenant_active(&self, tenant_id: Uuid, is_active: bool) {
        let mut tenants = self.tenants.lock().unwrap();
        if let Some(tenant) = tenants.iter_mut().find(|t| t.id == tenant_id) {
            tenant.is_active = is_active;
        }
    }

    pub fn api_key(&self, api_key_id: Uuid) -> Option<ApiKey> {
        self.stored_key(api_key_id).map(|k| k.record)
    }

    pub fn key_hash(&self, api_key_id: Uuid) -> Option<String> {
        self.stored_key(api_key_id).map(|k| k.key_hash)
    }

    fn stored_key(&self, api_key_id: Uuid) -> Option<StoredKey> {
        self.api_keys
            .lock()
            .unwrap()
            .iter()
            .find(|k| k.record.id == api_key_id)
            .cloned()
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn find_active_by_prefix(
        &self,
        prefix: &str,
        limit: i64,
    ) -> Result<Vec<ApiKeyCandidate>, sqlx::Error> {
        let tenants = self.tenants.lock().unwrap();
        let mut keys: Vec<StoredKey> = self
            .api_keys
            .lock()
            .unwrap()
            .iter()
            .filter(|k| k.record.key_prefix == prefix && k.record.is_active)
            .cloned()
            .collect();
        keys.sort_by(|a, b| {
            b.record
                .last_used_at
                .cmp(&a.record.last_used_at)
                .then(b.record.created_at.cmp(&a.record.created_at))
        });

        Ok(keys
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(0))
            .filter_map(|k| {
                let tenant = tenants.iter().find(|t| t.id == k.record.tenant_id)?;
                Some(ApiKeyCandidate {
                    id: k.record.id,
                    tenant_id: k.record.tenant_id,
                    key_hash: k.key_hash,
                    tenant_name: tenant.name.clone(),
                    tenant_is_active: tenant.is_active,
                })
            })
            .collect())
    }

    async fn insert_api_key(&self, key: &NewApiKey) -> Result<Option<Uuid>, sqlx::Error> {
        if !self
            .tenants
            .lock()
            .unwrap()
            .iter()
            .any(|t| t.id == key.tenant_id)
        {
            return Ok(None);
        }

        let now = Utc::now();
        let id = Uuid::new_v4();
        self.api_keys.lock().unwrap().push(StoredKey {
            record: ApiKey {
                id,
                tenant_id: key.tenant_id,
                name: key.name.clone(),
                key_prefix: key.key_prefix.clone(),
                is_active: true,
                last_used_at: None,
                created_at: now,
                updated_at: now,
            },
            key_hash: key.key_hash.clone(),
        });
        Ok(Some(id))
    }

    async fn touch_last_used(&self, api_key_id: Uuid) -> Result<(), sqlx::Error> {
        let mut keys = self.api_keys.lock().unwrap();
        if let Some(key) = keys.iter_mut().find(|k| k.record.id == api_key_id) {
            key.record.last_used_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn deactivate(&self, api_key_id: Uuid, tenant_id: Uuid) -> Result<bool, sqlx::Error> {
        let mut keys = self.api_keys.lock().unwrap();
        match keys.iter_mut().map(|k| &mut k.record).find(|k| {
            k.id == api_key_id && k.tenant_id == tenant_id && k.is_active
        }) {
            Some(key) => {
                key.is_active = false;
                key.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<ApiKey>, sqlx::Error> {
        let mut keys: Vec<ApiKey> = self
            .api_keys
            .lock()
            .unwrap()
            .iter()
            .filter(|k| k.record.tenant_id == tenant_id)
            .map(|k| k.record.clone())
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        Ok(())
    }
}

#[async_trait]
impl TenantStore for InMemoryStore {
    async fn create_tenant(&self, name: &str) -> Result<Tenant, sqlx::Error> {
        let id = self.add_tenant(name, true);
        Ok(self.find_tenant(id).await?.unwrap())
    }

    async fn find_tenant(&self, tenant_id: Uuid) -> Result<Option<Tenant>, sqlx::Error> {
        Ok(self
            .tenants
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == tenant_id)
            .cloned())
    }

    async fn get_setting(
        &self,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<Option<SealedSetting>, sqlx::Error> {
        let setting = self
            .settings
            .lock()
            .unwrap()
            .get(&tenant_id)
            .and_then(|s| s.get(name))
            .cloned();

        setting
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))
    }

    async fn put_setting(
        &self,
        tenant_id: Uuid,
        name: &str,
        setting: &SealedSetting,
    ) -> Result<bool, sqlx::Error> {
        let mut tenants = self.tenants.lock().unwrap();
        let Some(tenant) = tenants.iter_mut().find(|t| t.id == tenant_id) else {
            return Ok(false);
        };

        let value = serde_json::to_value(setting).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let mut settings = self.settings.lock().unwrap();
        let blob = settings
            .entry(tenant_id)
            .or_insert_with(|| serde_json::Value::Object(Default::default()));
        if let Some(map) = blob.as_object_mut() {
            map.insert(name.to_string(), value);
        }
        tenant.updated_at = Utc::now();
        Ok(true)
    }
}
