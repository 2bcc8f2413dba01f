//! Genre Detector Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod catalog;
pub mod classifier;
pub mod config;
pub mod genre;
pub mod server;
pub mod sqlite_persistence;
pub mod user;

// Re-export commonly used types for convenience
pub use catalog::{CatalogStore, SongRecord, SqliteCatalogStore};
pub use classifier::{GenreClassifier, HttpGenreClassifier};
pub use genre::{GenreCount, Recommendation};
pub use server::{run_server, RequestsLoggingLevel};
pub use user::{SqliteUserStore, UserManager, UserStore};
