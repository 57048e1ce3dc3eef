//! Key ledger: creation, listing, deletion and HWID reset of license keys.
//!
//! The validation-time state machine lives in [`super::validation`]; this
//! module covers the owner-facing CRUD side.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

use crate::db::Store;
use crate::models::{LicenseKey, User};

#[derive(Debug, Error)]
pub enum CreateKeyError {
    #[error("Key code and name are required")]
    MissingFields,

    #[error("A key with this code already exists")]
    DuplicateCode,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct KeyLedger {
    store: Store,
}

impl KeyLedger {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Mints a key with a caller-supplied code.
    ///
    /// The code must be unique across the whole ledger; the uniqueness check
    /// and the insert share one critical section.
    pub async fn create(
        &self,
        owner: &User,
        code: &str,
        name: &str,
        service_id: Option<String>,
        expiration_date: Option<DateTime<Utc>>,
    ) -> Result<LicenseKey, CreateKeyError> {
        if code.is_empty() || name.is_empty() {
            return Err(CreateKeyError::MissingFields);
        }

        let mut store = self.store.lock().await;

        if store.key_by_code(code).is_some() {
            return Err(CreateKeyError::DuplicateCode);
        }

        let key = LicenseKey {
            code: code.to_string(),
            name: name.to_string(),
            service_id,
            owner_id: owner.id.clone(),
            owner_username: owner.username.clone(),
            hwid: None,
            expiration_date,
            created_at: Utc::now(),
            first_used: None,
            last_used: None,
        };

        store.keys.push(key.clone());
        store
            .persist_keys()
            .await
            .context("Failed to save new key")?;

        info!("Key created: {} by {}", key.code, owner.username);
        Ok(key)
    }

    /// Keys owned by `owner`, optionally narrowed to one service.
    ///
    /// When a filter is given, keys with no service never match it.
    pub async fn list_for_owner(&self, owner: &User, service_id: Option<&str>) -> Vec<LicenseKey> {
        let store = self.store.lock().await;
        store
            .keys
            .iter()
            .filter(|k| k.owner_id == owner.id)
            .filter(|k| service_id.is_none_or(|id| k.service_id.as_deref() == Some(id)))
            .cloned()
            .collect()
    }

    /// Deletes an owned key by code. Returns false when no owned key matches.
    pub async fn delete(&self, owner: &User, code: &str) -> Result<bool> {
        let mut store = self.store.lock().await;

        let Some(index) = store
            .keys
            .iter()
            .position(|k| k.code == code && k.owner_id == owner.id)
        else {
            return Ok(false);
        };

        store.keys.remove(index);
        store
            .persist_keys()
            .await
            .context("Failed to save keys after delete")?;

        info!("Key deleted: {code}");
        Ok(true)
    }

    /// Unbinds an owned key from its device so the next validation can bind a
    /// new HWID. Usage history (`first_used`/`last_used`) is kept.
    pub async fn reset_hwid(&self, owner: &User, code: &str) -> Result<bool> {
        let mut store = self.store.lock().await;

        let Some(key) = store
            .keys
            .iter_mut()
            .find(|k| k.code == code && k.owner_id == owner.id)
        else {
            return Ok(false);
        };

        key.hwid = None;
        store
            .persist_keys()
            .await
            .context("Failed to save keys after hwid reset")?;

        info!("HWID reset: {code}");
        Ok(true)
    }

    pub async fn find_by_code(&self, code: &str) -> Option<LicenseKey> {
        let store = self.store.lock().await;
        store.key_by_code(code).cloned()
    }
}
