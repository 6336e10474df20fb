//! services/api/src/adapters/changes.rs
//!
//! Real-time change notification shared by the store adapters. Writers publish the
//! id of the user whose collection changed; every open subscription for that user
//! re-reads the full collection and pushes it as the next snapshot.

use greenlog_core::ports::{PlantStore, SnapshotStream};
use greenlog_core::Plant;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

/// One message on the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// The collection of this user changed.
    Plants(Uuid),
    /// Notifications may have been lost; every subscription re-reads.
    Resync,
}

#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<Change>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Announces that `user_id`'s collection changed. Having no listeners is fine.
    pub fn publish(&self, user_id: Uuid) {
        let _ = self.tx.send(Change::Plants(user_id));
    }

    /// Makes every open subscription reload its collection.
    pub fn resync(&self) {
        let _ = self.tx.send(Change::Resync);
    }

    pub fn listen(&self) -> broadcast::Receiver<Change> {
        self.tx.subscribe()
    }
}

/// Builds the snapshot stream for one user. `changes` must be obtained before
/// `initial` is read so that no write between the two is missed.
pub fn snapshot_stream<S>(
    store: S,
    user_id: Uuid,
    mut changes: broadcast::Receiver<Change>,
    initial: Vec<Plant>,
) -> SnapshotStream
where
    S: PlantStore + 'static,
{
    Box::pin(async_stream::stream! {
        yield Ok(initial);
        loop {
            match changes.recv().await {
                Ok(Change::Plants(changed)) if changed != user_id => continue,
                Ok(Change::Plants(_)) => {}
                Ok(Change::Resync) => {
                    debug!(%user_id, "Change feed resync; reloading collection.");
                }
                Err(RecvError::Lagged(skipped)) => {
                    // Missed notifications collapse into one full re-read.
                    warn!(%user_id, skipped, "Change feed lagged; reloading collection.");
                }
                Err(RecvError::Closed) => {
                    debug!(%user_id, "Change feed closed; ending subscription.");
                    break;
                }
            }
            yield store.list(user_id).await;
        }
    })
}
