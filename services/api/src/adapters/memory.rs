//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the `PlantStore` and `CredentialStore` ports.
//! Used for local development (`STORE_BACKEND=memory`) and as the backing store in tests.
//! Collections are kept in creation order; nothing survives a restart.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use greenlog_core::domain::{Identity, Log, NewPlant, Plant, PlantPatch};
use greenlog_core::ports::{CredentialStore, PlantStore, PortError, PortResult, SnapshotStream};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::adapters::changes::{snapshot_stream, ChangeFeed};
use crate::adapters::TOKEN_TTL_DAYS;

struct TokenRecord {
    identity: Identity,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    plants: RwLock<HashMap<Uuid, Vec<Plant>>>,
    tokens: RwLock<HashMap<String, TokenRecord>>,
}

/// A cloneable handle; clones share the same collections and change feed.
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
    changes: ChangeFeed,
    token_ttl: Duration,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self {
            inner: Arc::default(),
            changes: ChangeFeed::default(),
            token_ttl: Duration::days(TOKEN_TTL_DAYS),
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues tokens valid for `ttl` instead of the default lifetime.
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    async fn modify_plant<F>(&self, user_id: Uuid, plant_id: &str, f: F) -> PortResult<()>
    where
        F: FnOnce(&mut Plant) + Send,
    {
        {
            let mut plants = self.inner.plants.write().await;
            let plant = plants
                .get_mut(&user_id)
                .and_then(|collection| collection.iter_mut().find(|plant| plant.id == plant_id))
                .ok_or_else(|| PortError::NotFound(format!("Plant {} not found", plant_id)))?;
            f(plant);
        }
        self.changes.publish(user_id);
        Ok(())
    }
}

#[async_trait]
impl PlantStore for InMemoryStore {
    async fn subscribe(&self, user_id: Uuid) -> PortResult<SnapshotStream> {
        let changes = self.changes.listen();
        let initial = self.list(user_id).await?;
        Ok(snapshot_stream(self.clone(), user_id, changes, initial))
    }

    async fn list(&self, user_id: Uuid) -> PortResult<Vec<Plant>> {
        let plants = self.inner.plants.read().await;
        Ok(plants.get(&user_id).cloned().unwrap_or_default())
    }

    async fn create(&self, user_id: Uuid, plant: NewPlant) -> PortResult<String> {
        let id = Uuid::new_v4().to_string();
        self.inner
            .plants
            .write()
            .await
            .entry(user_id)
            .or_default()
            .push(plant.into_plant(id.clone()));
        self.changes.publish(user_id);
        Ok(id)
    }

    async fn update(&self, user_id: Uuid, plant_id: &str, patch: PlantPatch) -> PortResult<()> {
        self.modify_plant(user_id, plant_id, |plant| patch.apply_to(plant)).await
    }

    async fn prepend_log(&self, user_id: Uuid, plant_id: &str, log: Log) -> PortResult<()> {
        self.modify_plant(user_id, plant_id, |plant| plant.logs.insert(0, log)).await
    }

    async fn delete(&self, user_id: Uuid, plant_id: &str) -> PortResult<()> {
        let removed = {
            let mut plants = self.inner.plants.write().await;
            match plants.get_mut(&user_id) {
                Some(collection) => {
                    let before = collection.len();
                    collection.retain(|plant| plant.id != plant_id);
                    before != collection.len()
                }
                None => false,
            }
        };
        if removed {
            self.changes.publish(user_id);
        } else {
            debug!(%plant_id, "Delete of an absent plant ignored.");
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn issue_anonymous(&self) -> PortResult<(Identity, String)> {
        let identity = Identity {
            user_id: Uuid::new_v4(),
            anonymous: true,
        };
        let token = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut tokens = self.inner.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, record| record.expires_at > now);
        if tokens.len() < before {
            debug!(purged = before - tokens.len(), "Purged expired session tokens.");
        }
        tokens.insert(
            token.clone(),
            TokenRecord {
                identity: identity.clone(),
                expires_at: now + self.token_ttl,
            },
        );
        Ok((identity, token))
    }

    async fn resolve_token(&self, token: &str) -> PortResult<Identity> {
        let mut tokens = self.inner.tokens.write().await;
        match tokens.get(token) {
            Some(record) if record.expires_at > Utc::now() => Ok(record.identity.clone()),
            Some(_) => {
                tokens.remove(token);
                Err(PortError::Unauthorized)
            }
            None => Err(PortError::Unauthorized),
        }
    }

    async fn revoke_token(&self, token: &str) -> PortResult<()> {
        self.inner.tokens.write().await.remove(token);
        Ok(())
    }
}
