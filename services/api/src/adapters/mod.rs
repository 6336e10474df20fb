pub mod changes;
pub mod db;
pub mod image;
pub mod memory;
pub mod session;

pub use db::DbAdapter;
pub use image::DataUriDecoder;
pub use memory::InMemoryStore;
pub use session::TokenSessionProvider;

/// How long an issued session token stays valid.
pub const TOKEN_TTL_DAYS: i64 = 30;
