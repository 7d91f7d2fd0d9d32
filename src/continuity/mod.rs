//! Continuity store: a best-effort slot carrying the latest result envelope
//! across a process boundary (a later `insight show`, for example).
//!
//! The core depends only on the [`ContinuityStore`] trait and tolerates a slot
//! that is empty or unreadable. `SqliteStore` is the persistent backend;
//! `MemoryStore` serves tests and one-shot runs.

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{ContinuityStore, OpenStore, StoreError, StoreResult, RESULT_SLOT};
