//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the state of one WebSocket connection.

use crate::adapters::TokenSessionProvider;
use crate::config::Config;
use bytes::BytesMut;
use greenlog_core::domain::{ImageDestination, ImageFile};
use greenlog_core::ports::{Clock, CredentialStore, ImageDecoder, PlantStore};
use greenlog_core::PlantController;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PlantStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub decoder: Arc<dyn ImageDecoder>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<Config>,
}

//=========================================================================================
// ConnectionState (Specific to One WebSocket Connection)
//=========================================================================================

/// An image arriving as binary frames between `image_upload_started` and `image_upload_ended`.
pub struct PendingUpload {
    pub destination: ImageDestination,
    pub file_name: String,
    pub content_type: Option<String>,
    pub buffer: BytesMut,
}

impl PendingUpload {
    pub fn into_file(self) -> (ImageFile, ImageDestination) {
        let file = ImageFile {
            file_name: self.file_name,
            content_type: self.content_type,
            bytes: self.buffer.to_vec(),
        };
        (file, self.destination)
    }
}

/// The state for a single, active WebSocket connection.
pub struct ConnectionState {
    pub session: Arc<TokenSessionProvider>,
    pub controller: PlantController,
    pub upload: Option<PendingUpload>,
}

impl ConnectionState {
    /// Wires a fresh controller to the shared adapters and a per-connection session.
    pub fn new(app_state: &AppState, token: Option<String>) -> Self {
        let session = Arc::new(TokenSessionProvider::new(app_state.credentials.clone(), token));
        let controller = PlantController::new(
            session.clone(),
            app_state.store.clone(),
            app_state.decoder.clone(),
            app_state.clock.clone(),
        )
        .with_append_strategy(app_state.config.log_append_strategy);

        Self {
            session,
            controller,
            upload: None,
        }
    }
}
