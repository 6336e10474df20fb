//! crates/greenlog_core/src/ports.rs
//!
//! Defines the service contracts (traits) the core depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the identity provider, the document store and the host's
//! file APIs. Every collaborator is injected as an `Arc<dyn Port>`.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;
use crate::domain::{Identity, ImageFile, Log, NewPlant, Plant, PlantPatch};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, decoder).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A push-driven, never-ending sequence of full plant-collection snapshots.
/// Dropping the stream ends the subscription.
pub type SnapshotStream = Pin<Box<dyn Stream<Item = PortResult<Vec<Plant>>> + Send>>;

/// Identity-changed notifications. `None` means the user signed out.
pub type IdentityStream = Pin<Box<dyn Stream<Item = Option<Identity>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Signs the user in (token-based when a token is available, anonymous otherwise).
    async fn authenticate(&self) -> PortResult<Identity>;

    /// Notifications for identity changes made after this call.
    fn identity_changes(&self) -> IdentityStream;

    async fn sign_out(&self) -> PortResult<()>;
}

#[async_trait]
pub trait PlantStore: Send + Sync {
    /// Subscribes to a user's collection. The first item is the current collection,
    /// then one full snapshot follows every change.
    async fn subscribe(&self, user_id: Uuid) -> PortResult<SnapshotStream>;

    /// One-shot read of a user's collection.
    async fn list(&self, user_id: Uuid) -> PortResult<Vec<Plant>>;

    /// Creates a plant and returns its store-assigned id.
    async fn create(&self, user_id: Uuid, plant: NewPlant) -> PortResult<String>;

    /// Overwrites the fields present in `patch`.
    async fn update(&self, user_id: Uuid, plant_id: &str, patch: PlantPatch) -> PortResult<()>;

    /// Atomically puts `log` in front of the plant's stored logs.
    async fn prepend_log(&self, user_id: Uuid, plant_id: &str, log: Log) -> PortResult<()>;

    async fn delete(&self, user_id: Uuid, plant_id: &str) -> PortResult<()>;
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    // --- Auth Methods ---
    async fn issue_anonymous(&self) -> PortResult<(Identity, String)>;

    async fn resolve_token(&self, token: &str) -> PortResult<Identity>;

    async fn revoke_token(&self, token: &str) -> PortResult<()>;
}

#[async_trait]
pub trait ImageDecoder: Send + Sync {
    /// Turns a picked file into a self-contained embeddable payload (a data URI).
    async fn decode(&self, file: ImageFile) -> PortResult<String>;
}

pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// The calendar date in UTC, matching how stored `YYYY-MM-DD` dates are written.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}
