//! Persistence for users, stats and game snapshots.

mod error;
mod models;
mod repository;

pub use error::StoreError;
pub use models::{Stats, StatsKey, UserRecord};
pub use repository::{JsonFileStore, MemoryStore, Repository};
