//! File-backed store for the three record collections.
//!
//! Each collection lives in its own JSON-array file under the data directory
//! and is rewritten in full on every mutation. All reads and read-modify-write
//! sequences go through a single coarse lock: callers take the guard via
//! [`Store::lock`], perform their checks and mutations, and persist before
//! releasing it. That serializes the race windows that matter here (duplicate
//! key-code creation, double HWID binding, token issuance) without per-record
//! locking.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::models::{LicenseKey, Service, User};

const USERS_FILE: &str = "users.json";
const SERVICES_FILE: &str = "services.json";
const KEYS_FILE: &str = "keys.json";

#[derive(Clone)]
pub struct Store {
    inner: Arc<Mutex<Collections>>,
}

/// The shared mutable state guarded by the store lock.
pub struct Collections {
    data_dir: PathBuf,
    pub users: Vec<User>,
    pub services: Vec<Service>,
    pub keys: Vec<LicenseKey>,
}

impl Store {
    /// Opens the store, loading all three collections from `data_dir`.
    ///
    /// Missing files initialize the collection empty. A file that exists but
    /// fails to parse also degrades to empty (with a warning) so the service
    /// stays up.
    pub async fn open(data_dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .with_context(|| format!("Failed to create data dir: {}", data_dir.display()))?;

        let users = load_collection(&data_dir.join(USERS_FILE)).await;
        let services = load_collection(&data_dir.join(SERVICES_FILE)).await;
        let keys = load_collection(&data_dir.join(KEYS_FILE)).await;

        info!(
            users = users.len(),
            services = services.len(),
            keys = keys.len(),
            "Store loaded from {}",
            data_dir.display()
        );

        Ok(Self {
            inner: Arc::new(Mutex::new(Collections {
                data_dir: data_dir.to_path_buf(),
                users,
                services,
                keys,
            })),
        })
    }

    /// Acquires the global critical section. Held across the persist await so
    /// check-then-mutate sequences cannot interleave.
    pub async fn lock(&self) -> MutexGuard<'_, Collections> {
        self.inner.lock().await
    }
}

impl Collections {
    pub fn user_by_token(&self, token: &str) -> Option<&User> {
        if token.is_empty() {
            return None;
        }
        self.users.iter().find(|u| u.token == token)
    }

    pub fn user_by_username_ci(&self, username: &str) -> Option<&User> {
        self.users
            .iter()
            .find(|u| u.username.eq_ignore_ascii_case(username))
    }

    pub fn user_by_email_ci(&self, email: &str) -> Option<&User> {
        self.users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
    }

    pub fn key_by_code(&self, code: &str) -> Option<&LicenseKey> {
        self.keys.iter().find(|k| k.code == code)
    }

    pub fn key_by_code_mut(&mut self, code: &str) -> Option<&mut LicenseKey> {
        self.keys.iter_mut().find(|k| k.code == code)
    }

    /// Rewrites `users.json` from the in-memory collection.
    pub async fn persist_users(&self) -> Result<()> {
        persist_collection(&self.data_dir.join(USERS_FILE), &self.users).await
    }

    /// Rewrites `services.json` from the in-memory collection.
    pub async fn persist_services(&self) -> Result<()> {
        persist_collection(&self.data_dir.join(SERVICES_FILE), &self.services).await
    }

    /// Rewrites `keys.json` from the in-memory collection.
    pub async fn persist_keys(&self) -> Result<()> {
        persist_collection(&self.data_dir.join(KEYS_FILE), &self.keys).await
    }
}

async fn load_collection<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    "Failed to parse {}, starting with an empty collection: {e}",
                    path.display()
                );
                Vec::new()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            warn!(
                "Failed to read {}, starting with an empty collection: {e}",
                path.display()
            );
            Vec::new()
        }
    }
}

async fn persist_collection<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let content = serde_json::to_string_pretty(records)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;

    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
