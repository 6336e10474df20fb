//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! Each connection owns one `PlantController`. Client intents and pushed plant
//! snapshots are interleaved on the connection's task, and the full view is sent
//! back after each of them.

use crate::web::{
    middleware::request_token,
    protocol::{ClientMessage, ServerMessage},
    state::{AppState, ConnectionState, PendingUpload},
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::Response,
};
use bytes::BytesMut;
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use greenlog_core::{Action, CareError, Identity, Outcome};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

type WsSender = SplitSink<WebSocket, Message>;

/// Floor for the per-message limit, so intents fit even under a tiny upload cap.
const MIN_MESSAGE_BYTES: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// The handler for upgrading HTTP requests to WebSocket connections.
///
/// The session token is taken from the `token` query parameter, then the request
/// headers, then the configured initial token. Without any, the connection signs in
/// anonymously.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
) -> Response {
    let token = params
        .token
        .or_else(|| request_token(&headers))
        .or_else(|| app_state.config.initial_auth_token.clone());
    // Uploads are capped by the buffered total, not per frame.
    let max_message = app_state.config.max_upload_bytes.max(MIN_MESSAGE_BYTES);
    ws.max_message_size(max_message)
        .on_upgrade(move |socket| handle_socket(socket, app_state, token))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, token: Option<String>) {
    info!("New WebSocket connection established.");
    let (mut sender, mut receiver) = socket.split();
    let mut connection = ConnectionState::new(&app_state, token);

    // --- 1. Initialization Phase ---
    let started = connection.controller.start().await;
    let init_msg = session_message(started, connection.session.token());
    if send_message(&mut sender, &init_msg).await.is_err() {
        error!("Failed to send session initialized message.");
        return;
    }
    let first_view = view_message(&connection);
    if send_message(&mut sender, &first_view).await.is_err() {
        error!("Failed to send initial view.");
        return;
    }

    // --- 2. Main Message Loop ---
    loop {
        let sent = tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    handle_text_message(text.as_str(), &mut connection, &mut sender).await
                }
                Some(Ok(Message::Binary(data))) => {
                    buffer_upload(&data, &app_state, &mut connection, &mut sender).await
                }
                Some(Ok(Message::Close(_))) => {
                    info!("Client sent close message.");
                    break;
                }
                Some(Ok(_)) => Ok(()),
                Some(Err(e)) => {
                    warn!("WebSocket receive error: {}", e);
                    break;
                }
                None => {
                    info!("Client disconnected.");
                    break;
                }
            },
            event = connection.controller.next_event() => {
                debug!(?event, "Controller event.");
                let view = view_message(&connection);
                send_message(&mut sender, &view).await
            }
        };

        if let Err(e) = sent {
            error!("Failed to send to client: {}. Closing connection.", e);
            break;
        }
    }

    // --- 3. Cleanup ---
    // Dropping the controller ends its plant subscription.
    info!("WebSocket connection closed.");
}

/// Applies one client intent to the controller and reports the result.
async fn handle_text_message(
    text: &str,
    connection: &mut ConnectionState,
    sender: &mut WsSender,
) -> Result<(), axum::Error> {
    let client_msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            return send_message(
                sender,
                &ServerMessage::Error {
                    message: format!("Unrecognized message: {}", e),
                },
            )
            .await;
        }
    };
    debug!(?client_msg, "Client message received.");

    let controller = &mut connection.controller;
    let result: Result<Outcome, CareError> = match client_msg {
        ClientMessage::OpenAddForm => {
            controller.open_add_form();
            Ok(Outcome::Applied)
        }
        ClientMessage::GoBack => {
            controller.go_back();
            Ok(Outcome::Applied)
        }
        ClientMessage::SelectPlant { plant_id } => {
            controller.select_plant(&plant_id);
            Ok(Outcome::Applied)
        }
        ClientMessage::SetPlantName { name } => {
            controller.set_plant_name(name);
            Ok(Outcome::Applied)
        }
        ClientMessage::SetPlantSpecies { species } => {
            controller.set_plant_species(species);
            Ok(Outcome::Applied)
        }
        ClientMessage::CreatePlant => controller.create_plant().await,
        ClientMessage::SetLogNote { note } => {
            controller.set_log_note(note);
            Ok(Outcome::Applied)
        }
        ClientMessage::ToggleWatered => {
            controller.toggle_watered();
            Ok(Outcome::Applied)
        }
        ClientMessage::ToggleFertilized => {
            controller.toggle_fertilized();
            Ok(Outcome::Applied)
        }
        ClientMessage::AddLog { plant_id } => controller.add_log(&plant_id).await,
        ClientMessage::DeletePlant { plant_id } => controller.delete_plant(&plant_id).await,
        ClientMessage::TogglePhoto { photo_id } => {
            controller.toggle_photo(&photo_id);
            Ok(Outcome::Applied)
        }
        ClientMessage::ImageUploadStarted {
            destination,
            file_name,
            content_type,
        } => {
            if connection.upload.is_some() {
                warn!("Image upload started while another was pending; discarding the earlier one.");
            }
            connection.upload = Some(PendingUpload {
                destination,
                file_name,
                content_type,
                buffer: BytesMut::new(),
            });
            // Nothing to render until the upload completes.
            return Ok(());
        }
        ClientMessage::ImageUploadEnded => match connection.upload.take() {
            Some(upload) => {
                let (file, destination) = upload.into_file();
                controller.ingest_image(file, destination).await
            }
            None => {
                warn!("ImageUploadEnded without a pending upload; ignored.");
                return Ok(());
            }
        },
        ClientMessage::ClearImage { destination } => {
            controller.clear_image(destination);
            Ok(Outcome::Applied)
        }
        ClientMessage::DismissNotice => {
            controller.dismiss_notice();
            Ok(Outcome::Applied)
        }
        ClientMessage::SignOut => controller.sign_out().await.map(|()| Outcome::Applied),
    };

    match result {
        Ok(Outcome::Applied) => {}
        Ok(Outcome::Skipped(reason)) => debug!(?reason, "Intent skipped."),
        Err(e) => {
            let failure = match connection.controller.notice() {
                Some(notice) => ServerMessage::ActionFailed {
                    action: notice.action,
                    message: notice.message.clone(),
                    retryable: notice.retryable,
                },
                None => ServerMessage::Error {
                    message: e.to_string(),
                },
            };
            send_message(sender, &failure).await?;
        }
    }

    let view = view_message(connection);
    send_message(sender, &view).await
}

/// Appends a binary frame to the pending image upload.
async fn buffer_upload(
    data: &[u8],
    app_state: &AppState,
    connection: &mut ConnectionState,
    sender: &mut WsSender,
) -> Result<(), axum::Error> {
    let Some(upload) = connection.upload.as_mut() else {
        debug!(bytes = data.len(), "Binary frame outside an image upload; ignored.");
        return Ok(());
    };

    if upload.buffer.len() + data.len() > app_state.config.max_upload_bytes {
        warn!(file_name = %upload.file_name, "Image upload exceeds the size limit; discarded.");
        connection.upload = None;
        return send_message(
            sender,
            &ServerMessage::ActionFailed {
                action: Action::IngestImage,
                message: format!(
                    "Images are limited to {} bytes.",
                    app_state.config.max_upload_bytes
                ),
                retryable: false,
            },
        )
        .await;
    }

    upload.buffer.extend_from_slice(data);
    Ok(())
}

/// The first message of a connection, reporting how `start` went.
fn session_message(started: Result<Identity, CareError>, token: Option<String>) -> ServerMessage {
    match started {
        Ok(identity) => ServerMessage::SessionInitialized {
            user_id: identity.user_id,
            anonymous: identity.anonymous,
            token,
        },
        Err(CareError::Auth(e)) => {
            // The session continues unauthenticated; every guarded intent is a no-op.
            error!("Failed to sign in: {}", e);
            ServerMessage::Error {
                message: "Sign-in failed. Your plants cannot be loaded.".to_string(),
            }
        }
        Err(e) => {
            // Signed in, but the plant subscription could not be opened.
            error!("Failed to load plants: {}", e);
            ServerMessage::Error {
                message: format!("Signed in, but your plants could not be loaded: {}", e),
            }
        }
    }
}

fn view_message(connection: &ConnectionState) -> ServerMessage {
    ServerMessage::View(connection.controller.view())
}

async fn send_message(sender: &mut WsSender, msg: &ServerMessage) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    sender.send(Message::Text(json.into())).await
}
