//! CatalogStore trait definition.

use super::SongRecord;
use anyhow::Result;

/// Storage backend for the global song catalog.
///
/// Handed to the recommendation engine as `&dyn CatalogStore`, so tests can
/// substitute an in-memory implementation.
pub trait CatalogStore: Send + Sync {
    /// Replaces the whole catalog with `songs`, returns the number of songs inserted.
    fn replace_all(&self, songs: &[SongRecord]) -> Result<usize>;

    /// Returns every song tagged with exactly `genre`.
    fn get_songs_by_genre(&self, genre: &str) -> Result<Vec<SongRecord>>;

    /// Returns the whole catalog.
    fn get_all_songs(&self) -> Result<Vec<SongRecord>>;

    /// Get the number of songs in the catalog.
    fn get_songs_count(&self) -> usize;
}
