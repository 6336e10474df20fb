//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! `PlantStore` and `CredentialStore` ports from the `core` crate. Plants are stored
//! one row per document with their care logs embedded as JSONB, and every write is
//! announced over Postgres `LISTEN/NOTIFY` so that all server instances push fresh
//! snapshots to their subscribers.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use greenlog_core::domain::{Identity, Log, NewPlant, Plant, PlantPatch};
use greenlog_core::ports::{CredentialStore, PlantStore, PortError, PortResult, SnapshotStream};
use sqlx::postgres::PgListener;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::adapters::changes::{snapshot_stream, ChangeFeed};
use crate::adapters::TOKEN_TTL_DAYS;

/// The `NOTIFY` channel carrying the id of the user whose plants changed.
const CHANGE_CHANNEL: &str = "plant_changes";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `PlantStore` and `CredentialStore` ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
    app_id: String,
    changes: ChangeFeed,
}

impl DbAdapter {
    /// Creates a new `DbAdapter` scoped to the `app_id` namespace.
    pub fn new(pool: PgPool, app_id: impl Into<String>) -> Self {
        Self {
            pool,
            app_id: app_id.into(),
            changes: ChangeFeed::new(),
        }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Starts forwarding `NOTIFY` messages into the local change feed.
    ///
    /// Notifications sent while the listener is disconnected are lost, so after
    /// reconnecting it asks every subscription to reload.
    pub async fn spawn_change_listener(&self) -> Result<JoinHandle<()>, sqlx::Error> {
        let mut listener = listen_for_changes(&self.pool).await?;
        let pool = self.pool.clone();
        let changes = self.changes.clone();
        info!("Listening for plant changes on '{}'.", CHANGE_CHANNEL);

        Ok(tokio::spawn(async move {
            loop {
                match listener.recv().await {
                    Ok(notification) => match Uuid::parse_str(notification.payload()) {
                        Ok(user_id) => changes.publish(user_id),
                        Err(e) => warn!("Ignoring malformed change notification: {}", e),
                    },
                    Err(e) => {
                        error!("Change listener error: {}", e);
                        listener = reconnect_listener(&pool).await;
                        changes.resync();
                    }
                }
            }
        }))
    }

    async fn notify_changed(&self, user_id: Uuid) {
        let result = sqlx::query("SELECT pg_notify($1, $2)")
            .bind(CHANGE_CHANNEL)
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await;
        if let Err(e) = result {
            warn!(%user_id, "Failed to announce plant change: {}", e);
        }
    }

    async fn ensure_user(&self, user_id: Uuid, anonymous: bool) -> PortResult<()> {
        sqlx::query("INSERT INTO users (user_id, anonymous) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .bind(anonymous)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}

impl DbAdapter {
    /// Deletes expired tokens, then anonymous users left with neither a token nor a plant.
    async fn purge_expired_tokens(&self) -> PortResult<()> {
        let tokens = sqlx::query("DELETE FROM auth_tokens WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if tokens.rows_affected() == 0 {
            return Ok(());
        }
        let users = sqlx::query(
            "DELETE FROM users u WHERE u.anonymous \
             AND NOT EXISTS (SELECT 1 FROM auth_tokens t WHERE t.user_id = u.user_id) \
             AND NOT EXISTS (SELECT 1 FROM plants p WHERE p.user_id = u.user_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        debug!(
            tokens = tokens.rows_affected(),
            users = users.rows_affected(),
            "Purged expired sessions."
        );
        Ok(())
    }
}

async fn listen_for_changes(pool: &PgPool) -> Result<PgListener, sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(CHANGE_CHANNEL).await?;
    Ok(listener)
}

/// Retries until the change channel is listened to again.
async fn reconnect_listener(pool: &PgPool) -> PgListener {
    loop {
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        match listen_for_changes(pool).await {
            Ok(listener) => {
                info!("Change listener reconnected; resyncing subscriptions.");
                return listener;
            }
            Err(e) => warn!("Change listener reconnect failed: {}", e),
        }
    }
}

/// Plant ids are UUIDs in this store; anything else cannot name a stored plant.
fn parse_plant_id(plant_id: &str) -> PortResult<Uuid> {
    Uuid::parse_str(plant_id).map_err(|_| PortError::NotFound(format!("Plant {} not found", plant_id)))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct PlantRecord {
    id: Uuid,
    name: String,
    species: Option<String>,
    date_added: NaiveDate,
    image: Option<String>,
    logs: Json<Vec<Log>>,
}
impl PlantRecord {
    fn to_domain(self) -> Plant {
        Plant {
            id: self.id.to_string(),
            name: self.name,
            species: self.species,
            date_added: self.date_added,
            image: self.image,
            logs: self.logs.0,
        }
    }
}

#[derive(FromRow)]
struct IdentityRecord {
    user_id: Uuid,
    anonymous: bool,
}
impl IdentityRecord {
    fn to_domain(self) -> Identity {
        Identity {
            user_id: self.user_id,
            anonymous: self.anonymous,
        }
    }
}

//=========================================================================================
// `PlantStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl PlantStore for DbAdapter {
    async fn subscribe(&self, user_id: Uuid) -> PortResult<SnapshotStream> {
        let changes = self.changes.listen();
        let initial = self.list(user_id).await?;
        Ok(snapshot_stream(self.clone(), user_id, changes, initial))
    }

    async fn list(&self, user_id: Uuid) -> PortResult<Vec<Plant>> {
        let records = sqlx::query_as::<_, PlantRecord>(
            "SELECT id, name, species, date_added, image, logs FROM plants WHERE app_id = $1 AND user_id = $2 ORDER BY created_at ASC",
        )
        .bind(&self.app_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let plants = records.into_iter().map(|r| r.to_domain()).collect();
        Ok(plants)
    }

    async fn create(&self, user_id: Uuid, plant: NewPlant) -> PortResult<String> {
        self.ensure_user(user_id, true).await?;
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO plants (id, user_id, app_id, name, species, date_added, image) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(id)
        .bind(user_id)
        .bind(&self.app_id)
        .bind(plant.name)
        .bind(plant.species)
        .bind(plant.date_added)
        .bind(plant.image)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        self.notify_changed(user_id).await;
        Ok(id.to_string())
    }

    async fn update(&self, user_id: Uuid, plant_id: &str, patch: PlantPatch) -> PortResult<()> {
        let id = parse_plant_id(plant_id)?;
        if patch.is_empty() {
            debug!(%plant_id, "Empty plant patch; nothing to write.");
            return Ok(());
        }

        let result = sqlx::query(
            "UPDATE plants SET name = COALESCE($4, name), species = COALESCE($5, species), image = COALESCE($6, image), logs = COALESCE($7, logs) WHERE id = $1 AND user_id = $2 AND app_id = $3",
        )
        .bind(id)
        .bind(user_id)
        .bind(&self.app_id)
        .bind(patch.name)
        .bind(patch.species)
        .bind(patch.image)
        .bind(patch.logs.map(Json))
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Plant {} not found", plant_id)));
        }
        self.notify_changed(user_id).await;
        Ok(())
    }

    async fn prepend_log(&self, user_id: Uuid, plant_id: &str, log: Log) -> PortResult<()> {
        let id = parse_plant_id(plant_id)?;
        // Single statement, so concurrent appends never overwrite each other.
        let result = sqlx::query(
            "UPDATE plants SET logs = jsonb_build_array($4::jsonb) || logs WHERE id = $1 AND user_id = $2 AND app_id = $3",
        )
        .bind(id)
        .bind(user_id)
        .bind(&self.app_id)
        .bind(Json(log))
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Plant {} not found", plant_id)));
        }
        self.notify_changed(user_id).await;
        Ok(())
    }

    async fn delete(&self, user_id: Uuid, plant_id: &str) -> PortResult<()> {
        let Ok(id) = Uuid::parse_str(plant_id) else {
            debug!(%plant_id, "Delete of a non-UUID plant id ignored.");
            return Ok(());
        };
        let result = sqlx::query("DELETE FROM plants WHERE id = $1 AND user_id = $2 AND app_id = $3")
            .bind(id)
            .bind(user_id)
            .bind(&self.app_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if result.rows_affected() > 0 {
            self.notify_changed(user_id).await;
        }
        Ok(())
    }
}

//=========================================================================================
// `CredentialStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl CredentialStore for DbAdapter {
    async fn issue_anonymous(&self) -> PortResult<(Identity, String)> {
        if let Err(e) = self.purge_expired_tokens().await {
            warn!("Failed to purge expired session tokens: {}", e);
        }

        let identity = Identity {
            user_id: Uuid::new_v4(),
            anonymous: true,
        };
        self.ensure_user(identity.user_id, identity.anonymous).await?;

        let token = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO auth_tokens (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&token)
            .bind(identity.user_id)
            .bind(Utc::now() + Duration::days(TOKEN_TTL_DAYS))
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok((identity, token))
    }

    async fn resolve_token(&self, token: &str) -> PortResult<Identity> {
        let record = sqlx::query_as::<_, IdentityRecord>(
            "SELECT u.user_id, u.anonymous FROM auth_tokens t JOIN users u ON u.user_id = t.user_id WHERE t.token = $1 AND t.expires_at > NOW()",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::Unauthorized,
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
    }

    async fn revoke_token(&self, token: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_tokens WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}
