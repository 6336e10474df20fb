//! crates/greenlog_core/src/error.rs
//!
//! The failure taxonomy surfaced by the view state controller.

use crate::ports::PortError;

/// Why a controller operation failed. Guard rejections are not errors; see `Outcome`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CareError {
    /// Identity acquisition or sign-out failed.
    #[error("Authentication failed: {0}")]
    Auth(PortError),

    /// A create, update, delete or subscribe call against the plant store failed.
    #[error("Plant store error: {0}")]
    Store(PortError),

    /// The picked file could not be turned into an embeddable image.
    #[error("Image decode failed: {0}")]
    Decode(PortError),
}
