//! Storage: the on-device SQLite store and the server's in-memory
//! repository.

pub mod cache_entries;
pub mod local;
pub mod migrations;
pub mod server;

pub use local::LocalStore;
pub use server::{RefreshGrant, ServerDb, StoredCheckin};

/// Table names as constants.
pub mod tables {
    pub const CHECKINS: &str = "checkins";
    pub const LOCATIONS: &str = "locations";
    pub const CREDENTIALS: &str = "credentials";
    pub const CACHES: &str = "caches";
    pub const CACHE_ENTRIES: &str = "cache_entries";
}

/// Errors produced by the local store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Invalid check-in timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Convenience alias used by the store.
pub type Result<T> = std::result::Result<T, StoreError>;
