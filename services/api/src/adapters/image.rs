//! services/api/src/adapters/image.rs
//!
//! This module contains the adapter that turns uploaded image files into
//! self-contained `data:` URIs. It implements the `ImageDecoder` port from the `core` crate.
//! Pixel data is never inspected; the media type comes from the upload's declared
//! content type or, failing that, from the file extension.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use greenlog_core::domain::ImageFile;
use greenlog_core::ports::{ImageDecoder, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `ImageDecoder` port by base64-encoding the file.
#[derive(Clone, Debug)]
pub struct DataUriDecoder {
    max_bytes: usize,
}

impl DataUriDecoder {
    /// Creates a new `DataUriDecoder` that refuses files larger than `max_bytes`.
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

//=========================================================================================
// `ImageDecoder` Trait Implementation
//=========================================================================================

#[async_trait]
impl ImageDecoder for DataUriDecoder {
    async fn decode(&self, file: ImageFile) -> PortResult<String> {
        if file.bytes.is_empty() {
            return Err(PortError::Unexpected(format!("'{}' is empty", file.file_name)));
        }
        if file.bytes.len() > self.max_bytes {
            return Err(PortError::Unexpected(format!(
                "'{}' is {} bytes, above the {} byte limit",
                file.file_name,
                file.bytes.len(),
                self.max_bytes
            )));
        }
        let media_type = media_type(&file)?;

        // Encoding a multi-megabyte photo is CPU-bound; keep it off the async workers.
        let encoded = tokio::task::spawn_blocking(move || general_purpose::STANDARD.encode(&file.bytes))
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(format!("data:{};base64,{}", media_type, encoded))
    }
}

fn media_type(file: &ImageFile) -> PortResult<String> {
    let declared = file
        .content_type
        .as_deref()
        .map(|value| value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty() && value != "application/octet-stream");

    match declared {
        Some(value) if value.starts_with("image/") => Ok(value),
        Some(value) => Err(PortError::Unexpected(format!(
            "'{}' is {}, not an image",
            file.file_name, value
        ))),
        None => media_type_from_extension(&file.file_name).map(str::to_string).ok_or_else(|| {
            PortError::Unexpected(format!("Cannot tell the image type of '{}'", file.file_name))
        }),
    }
}

fn media_type_from_extension(file_name: &str) -> Option<&'static str> {
    let extension = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    let media_type = match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        _ => return None,
    };
    Some(media_type)
}
