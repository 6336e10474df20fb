//! crates/greenlog_core/src/domain.rs
//!
//! Defines the core data structures for the application: plants, their care logs,
//! the identity of the signed-in user and the draft forms a user composes.
//! Field names serialize in camelCase to stay compatible with the stored document shape.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One tracked specimen, as delivered by the plant store.
///
/// `logs` is kept newest first. The store never reorders it; callers prepend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub species: Option<String>,
    pub date_added: NaiveDate,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub logs: Vec<Log>,
}

/// A single dated care event, embedded in its owning plant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub watered: bool,
    #[serde(default)]
    pub fertilized: bool,
    #[serde(default)]
    pub image: Option<String>,
}

/// The fields submitted when a plant is created. The store assigns `id` and `createdAt`,
/// and every new plant starts with an empty log history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlant {
    pub name: String,
    pub species: Option<String>,
    pub date_added: NaiveDate,
    pub image: Option<String>,
}

impl NewPlant {
    /// Materializes the stored plant once the store has assigned an id.
    pub fn into_plant(self, id: String) -> Plant {
        Plant {
            id,
            name: self.name,
            species: self.species,
            date_added: self.date_added,
            image: self.image,
            logs: Vec::new(),
        }
    }
}

/// A partial update of a plant document. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantPatch {
    pub name: Option<String>,
    pub species: Option<String>,
    pub image: Option<String>,
    pub logs: Option<Vec<Log>>,
}

impl PlantPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.species.is_none() && self.image.is_none() && self.logs.is_none()
    }

    /// Applies the patch onto a plant, overwriting whole fields (last write wins).
    pub fn apply_to(self, plant: &mut Plant) {
        if let Some(name) = self.name {
            plant.name = name;
        }
        if let Some(species) = self.species {
            plant.species = Some(species);
        }
        if let Some(image) = self.image {
            plant.image = Some(image);
        }
        if let Some(logs) = self.logs {
            plant.logs = logs;
        }
    }
}

/// The authenticated user behind a controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub anonymous: bool,
}

/// A file picked by the user, not yet decoded.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// The draft field an ingested image is written into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageDestination {
    NewPlantImage,
    NewLogImage,
}

/// The "add plant" form being composed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlantDraft {
    pub name: String,
    pub species: String,
    pub image: Option<String>,
}

/// The "record care" form being composed on the detail screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogDraft {
    pub note: String,
    pub watered: bool,
    pub fertilized: bool,
    pub image: Option<String>,
}

/// One photo in a plant's chronological timeline. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhotoTimelineEntry {
    pub id: String,
    pub date: NaiveDate,
    pub url: String,
}

/// Maps blank free text to `None`.
pub(crate) fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
