//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{auth, state::AppState};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::NaiveDate;
use greenlog_core::domain::{Identity, ImageFile, PhotoTimelineEntry, Plant};
use greenlog_core::timeline;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::anonymous_signin_handler,
        auth::logout_handler,
        list_plants_handler,
        plant_timeline_handler,
        decode_image_handler,
    ),
    components(
        schemas(auth::AuthResponse, PlantSummaryResponse, TimelineEntryResponse, DecodedImageResponse)
    ),
    tags(
        (name = "GreenLog API", description = "Plant care tracking: plants, care logs and photo timelines.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// One plant as shown in the plant list.
#[derive(Serialize, ToSchema)]
pub struct PlantSummaryResponse {
    pub id: String,
    pub name: String,
    pub species: Option<String>,
    pub date_added: NaiveDate,
    pub image: Option<String>,
    pub log_count: usize,
}

impl From<Plant> for PlantSummaryResponse {
    fn from(plant: Plant) -> Self {
        Self {
            log_count: plant.logs.len(),
            id: plant.id,
            name: plant.name,
            species: plant.species,
            date_added: plant.date_added,
            image: plant.image,
        }
    }
}

/// One photo of a plant's growth timeline, oldest first.
#[derive(Serialize, ToSchema)]
pub struct TimelineEntryResponse {
    pub id: String,
    pub date: NaiveDate,
    pub url: String,
}

impl From<PhotoTimelineEntry> for TimelineEntryResponse {
    fn from(entry: PhotoTimelineEntry) -> Self {
        Self {
            id: entry.id,
            date: entry.date,
            url: entry.url,
        }
    }
}

/// An uploaded image turned into an embeddable payload.
#[derive(Serialize, ToSchema)]
pub struct DecodedImageResponse {
    pub payload: String,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// List the caller's plants.
#[utoipa::path(
    get,
    path = "/plants",
    responses(
        (status = 200, description = "The caller's plants, oldest first", body = [PlantSummaryResponse]),
        (status = 401, description = "Missing or invalid session token"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_plants_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let plants = app_state.store.list(identity.user_id).await.map_err(|e| {
        error!("Failed to list plants: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to list plants".to_string())
    })?;

    let response: Vec<PlantSummaryResponse> = plants.into_iter().map(Into::into).collect();
    Ok(Json(response))
}

/// Get the chronological photo timeline of one plant.
#[utoipa::path(
    get,
    path = "/plants/{plant_id}/timeline",
    responses(
        (status = 200, description = "Cover photo and log photos sorted by date", body = [TimelineEntryResponse]),
        (status = 401, description = "Missing or invalid session token"),
        (status = 404, description = "No such plant for this user"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("plant_id" = String, Path, description = "The plant's id.")
    )
)]
pub async fn plant_timeline_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(plant_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let plants = app_state.store.list(identity.user_id).await.map_err(|e| {
        error!("Failed to load plants: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to load plant".to_string())
    })?;

    let plant = plants
        .iter()
        .find(|plant| plant.id == plant_id)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Plant {} not found", plant_id)))?;

    let response: Vec<TimelineEntryResponse> =
        timeline::derive(plant).into_iter().map(Into::into).collect();
    Ok(Json(response))
}

/// Turn an uploaded image into a `data:` URI usable as a plant or log photo.
///
/// Accepts a multipart/form-data request with a single file part.
#[utoipa::path(
    post,
    path = "/images",
    request_body(content_type = "multipart/form-data", description = "The image to encode."),
    responses(
        (status = 200, description = "Image encoded", body = DecodedImageResponse),
        (status = 400, description = "Missing file or not an image"),
        (status = 401, description = "Missing or invalid session token")
    )
)]
pub async fn decode_image_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Failed to read multipart data: {}", e),
            )
        })?
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "Multipart form must include a file".to_string(),
            )
        })?;

    let file_name = field.file_name().unwrap_or("upload").to_string();
    let content_type = field.content_type().map(str::to_string);
    let data = field.bytes().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read file bytes: {}", e),
        )
    })?;

    let file = ImageFile {
        file_name,
        content_type,
        bytes: data.to_vec(),
    };
    let payload = app_state.decoder.decode(file).await.map_err(|e| {
        warn!("Rejected image upload: {}", e);
        (StatusCode::BAD_REQUEST, e.to_string())
    })?;

    Ok(Json(DecodedImageResponse { payload }))
}
