//! Continuity store trait definitions

use std::path::Path;
use thiserror::Error;

/// Name of the single slot holding the most recent result envelope.
pub const RESULT_SLOT: &str = "analysisResults";

/// Errors that can occur while reading or writing the slot
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Result type for continuity store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// A single named slot of serialized text, replaced on every write.
///
/// Implementations must be thread-safe (Send + Sync). `load` returning
/// `Ok(None)` is a normal outcome, not an error.
pub trait ContinuityStore: Send + Sync {
    /// Read the slot, if it holds anything
    fn load(&self) -> StoreResult<Option<String>>;

    /// Replace the slot's contents
    fn save(&self, record: &str) -> StoreResult<()>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: ContinuityStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StoreResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StoreResult<Self>;
}
