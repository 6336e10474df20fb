//! crates/greenlog_core/src/view.rs
//!
//! Read-only view models the controller derives for the presentation layer.

use serde::Serialize;
use crate::domain::{Identity, LogDraft, PhotoTimelineEntry, Plant, PlantDraft};

/// The screen currently shown. A session starts on `List` and never terminates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    #[default]
    List,
    Add,
    Detail,
}

/// The user action a failure notice refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Authenticate,
    Subscribe,
    CreatePlant,
    AddLog,
    DeletePlant,
    IngestImage,
    SignOut,
}

/// A user-visible failure that the user may retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub action: Action,
    pub message: String,
    pub retryable: bool,
}

/// One row of the plant list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlantSummary {
    pub id: String,
    pub name: String,
    pub species: Option<String>,
    pub image: Option<String>,
}

impl From<&Plant> for PlantSummary {
    fn from(plant: &Plant) -> Self {
        Self {
            id: plant.id.clone(),
            name: plant.name.clone(),
            species: plant.species.clone(),
            image: plant.image.clone(),
        }
    }
}

/// Everything the detail screen renders for the selected plant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlantDetail {
    pub plant: Plant,
    pub timeline: Vec<PhotoTimelineEntry>,
    /// Resolved comparison photos, earliest first.
    pub comparison: Vec<PhotoTimelineEntry>,
    pub comparison_ready: bool,
    /// Selected photo ids in pick order, for highlighting thumbnails.
    pub selected_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewModel {
    pub screen: Screen,
    pub loading: bool,
    pub identity: Option<Identity>,
    pub plants: Vec<PlantSummary>,
    pub detail: Option<PlantDetail>,
    pub plant_draft: PlantDraft,
    pub log_draft: LogDraft,
    pub notice: Option<Notice>,
}
