//! Loading of the song catalog from its textual source.
//!
//! The source is a list of `{"title", "artist", "genre"}` records. Besides
//! plain JSON, the relaxed syntax of hand-written lists is accepted: single
//! quoted strings, trailing commas and comments. Anything that does not parse
//! as such a list counts as an empty catalog rather than an error.

use super::{CatalogStore, SongRecord};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

pub fn parse_songs_source(text: &str) -> Vec<SongRecord> {
    if text.trim().is_empty() {
        warn!("Songs source is empty.");
        return vec![];
    }
    match json5::from_str::<Vec<SongRecord>>(text) {
        Ok(songs) => songs,
        Err(err) => {
            warn!("Songs source is not a valid list of songs, treating it as empty: {}", err);
            vec![]
        }
    }
}

/// Replaces the catalog content with the songs listed in the file at `path`.
/// Returns the number of songs now in the catalog.
pub fn reload_catalog<P: AsRef<Path>>(store: &dyn CatalogStore, path: P) -> Result<usize> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read songs file {:?}", path))?;
    let songs = parse_songs_source(&text);
    let inserted = store.replace_all(&songs)?;
    info!("Catalog reloaded from {:?} with {} songs", path, inserted);
    Ok(inserted)
}
