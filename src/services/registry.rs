//! Service registry: named products a user scopes keys to.

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::db::Store;
use crate::models::{Service, User};

#[derive(Clone)]
pub struct ServiceRegistry {
    store: Store,
}

impl ServiceRegistry {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Creates a service owned by `owner`. Names are not unique.
    pub async fn create(&self, owner: &User, name: &str) -> Result<Service> {
        let service = Service {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            owner_id: owner.id.clone(),
            owner_username: owner.username.clone(),
            created_at: Utc::now(),
        };

        let mut store = self.store.lock().await;
        store.services.push(service.clone());
        store
            .persist_services()
            .await
            .context("Failed to save new service")?;

        info!("Service created: {} by {}", service.name, owner.username);
        Ok(service)
    }

    /// Services owned by `owner`, in insertion order.
    pub async fn list_for_owner(&self, owner: &User) -> Vec<Service> {
        let store = self.store.lock().await;
        store
            .services
            .iter()
            .filter(|s| s.owner_id == owner.id)
            .cloned()
            .collect()
    }

    /// Deletes an owned service and cascades to every key scoped to it.
    ///
    /// The service removal, the key cascade and both persists happen in one
    /// critical section. Returns false when no owned service matches.
    pub async fn delete(&self, owner: &User, service_id: &str) -> Result<bool> {
        let mut store = self.store.lock().await;

        let Some(index) = store
            .services
            .iter()
            .position(|s| s.id == service_id && s.owner_id == owner.id)
        else {
            return Ok(false);
        };

        store.services.remove(index);
        let before = store.keys.len();
        store
            .keys
            .retain(|k| k.service_id.as_deref() != Some(service_id));
        let cascaded = before - store.keys.len();

        store
            .persist_services()
            .await
            .context("Failed to save services after delete")?;
        store
            .persist_keys()
            .await
            .context("Failed to save keys after service cascade")?;

        info!("Service {service_id} deleted, {cascaded} keys cascaded");
        Ok(true)
    }
}
