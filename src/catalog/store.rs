//! SQLite-backed song catalog.

use super::schema::{CATALOG_VERSIONED_SCHEMAS, SONG_TABLE_V_0};
use super::{CatalogStore, SongRecord};
use crate::sqlite_persistence::open_versioned_db;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

#[derive(Clone)]
pub struct SqliteCatalogStore {
    conn: Arc<Mutex<Connection>>,
}

fn song_from_row(row: &Row) -> rusqlite::Result<SongRecord> {
    Ok(SongRecord {
        title: row.get(0)?,
        artist: row.get(1)?,
        genre: row.get(2)?,
    })
}

impl SqliteCatalogStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let conn = open_versioned_db(db_path, CATALOG_VERSIONED_SCHEMAS)
            .context("Failed to open catalog database")?;
        Ok(SqliteCatalogStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl CatalogStore for SqliteCatalogStore {
    fn replace_all(&self, songs: &[SongRecord]) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let deleted = tx.execute(&format!("DELETE FROM {}", SONG_TABLE_V_0.name), [])?;
        debug!("Removed {} songs from the catalog", deleted);
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} (title, artist, genre) VALUES (?1, ?2, ?3)",
                SONG_TABLE_V_0.name
            ))?;
            for song in songs {
                stmt.execute(params![song.title, song.artist, song.genre])
                    .with_context(|| format!("Failed to insert song {:?}", song))?;
            }
        }
        tx.commit()?;
        Ok(songs.len())
    }

    fn get_songs_by_genre(&self, genre: &str) -> Result<Vec<SongRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT title, artist, genre FROM {} WHERE genre = ?1 ORDER BY id",
            SONG_TABLE_V_0.name
        ))?;
        let songs = stmt
            .query_map(params![genre], song_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(songs)
    }

    fn get_all_songs(&self) -> Result<Vec<SongRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT title, artist, genre FROM {} ORDER BY id",
            SONG_TABLE_V_0.name
        ))?;
        let songs = stmt
            .query_map([], song_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(songs)
    }

    fn get_songs_count(&self) -> usize {
        let conn = self.conn.lock().unwrap();
        match conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", SONG_TABLE_V_0.name),
            [],
            |row| row.get::<usize, i64>(0),
        ) {
            Ok(count) => count as usize,
            Err(err) => {
                error!("Failed to count catalog songs: {}", err);
                0
            }
        }
    }
}
