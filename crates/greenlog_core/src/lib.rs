pub mod comparison;
pub mod controller;
pub mod domain;
pub mod error;
pub mod ports;
pub mod timeline;
pub mod view;

pub use comparison::ComparisonSelector;
pub use controller::{ControllerEvent, LogAppendStrategy, Outcome, PlantController, SkipReason};
pub use domain::{
    Identity, ImageDestination, ImageFile, Log, LogDraft, NewPlant, PhotoTimelineEntry, Plant,
    PlantDraft, PlantPatch,
};
pub use error::CareError;
pub use ports::{
    Clock, CredentialStore, IdentityStream, ImageDecoder, PlantStore, PortError, PortResult,
    SessionProvider, SnapshotStream, SystemClock,
};
pub use view::{Action, Notice, PlantDetail, PlantSummary, Screen, ViewModel};
