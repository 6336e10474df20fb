//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server.
//! The client sends user intents; the server answers with the full view model after
//! every intent and every pushed snapshot.

use greenlog_core::domain::ImageDestination;
use greenlog_core::view::{Action, ViewModel};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================
// NOTE: Image bytes are sent as raw Binary frames between `ImageUploadStarted` and
// `ImageUploadEnded`, not as part of this enum.
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    OpenAddForm,
    GoBack,
    SelectPlant { plant_id: String },

    SetPlantName { name: String },
    SetPlantSpecies { species: String },
    CreatePlant,

    SetLogNote { note: String },
    ToggleWatered,
    ToggleFertilized,
    AddLog { plant_id: String },

    DeletePlant { plant_id: String },

    /// Adds or removes a photo from the growth comparison.
    TogglePhoto { photo_id: String },

    /// Announces an image upload. Binary frames follow until `ImageUploadEnded`.
    ImageUploadStarted {
        destination: ImageDestination,
        file_name: String,
        #[serde(default)]
        content_type: Option<String>,
    },
    ImageUploadEnded,
    ClearImage { destination: ImageDestination },

    DismissNotice,
    SignOut,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms sign-in. The client should keep `token` to resume as the same user.
    SessionInitialized {
        user_id: Uuid,
        anonymous: bool,
        token: Option<String>,
    },

    /// The complete state to render.
    View(ViewModel),

    /// A user action failed. The client should offer to retry when `retryable` is set.
    ActionFailed {
        action: Action,
        message: String,
        retryable: bool,
    },

    /// Reports a connection-level error to the client.
    Error { message: String },
}
