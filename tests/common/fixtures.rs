//! Test data for end-to-end tests

use super::constants::*;
use anyhow::{bail, Result};
use async_trait::async_trait;
use genre_detector_server::catalog::{reload_catalog, SqliteCatalogStore};
use genre_detector_server::classifier::{ClassificationScore, GenreClassifier};
use genre_detector_server::user::{SqliteUserStore, UserManager};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Classifies a clip as the genre spelled by its bytes, so tests pick the
/// outcome by choosing the clip content. A clip starting with `fail` makes
/// every attempt fail.
#[derive(Default)]
pub struct FakeClassifier {
    pub reinitialize_count: AtomicUsize,
}

#[async_trait]
impl GenreClassifier for FakeClassifier {
    async fn classify(&self, audio: &[u8]) -> Result<Vec<ClassificationScore>> {
        let label = String::from_utf8_lossy(audio).trim().to_string();
        if label.starts_with("fail") {
            bail!("model crashed");
        }
        Ok(vec![
            ClassificationScore::new("other", 0.1),
            ClassificationScore::new(label, 0.9),
        ])
    }

    async fn reinitialize(&self) -> Result<()> {
        self.reinitialize_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn songs_source() -> String {
    let mut songs = Vec::new();
    for i in 0..ROCK_SONGS_COUNT {
        songs.push(serde_json::json!({
            "title": format!("Rock Song {}", i),
            "artist": "The Test Band",
            "genre": ROCK,
        }));
    }
    for i in 0..JAZZ_SONGS_COUNT {
        songs.push(serde_json::json!({
            "title": format!("Jazz Song {}", i),
            "artist": "Jazz Ensemble",
            "genre": JAZZ,
        }));
    }
    serde_json::Value::Array(songs).to_string()
}

/// Writes a songs source file and loads it into a fresh catalog db.
pub fn create_test_catalog() -> Result<(TempDir, SqliteCatalogStore)> {
    let dir = TempDir::new()?;
    let songs_file = dir.path().join("songs.json");
    std::fs::write(&songs_file, songs_source())?;

    let store = SqliteCatalogStore::new(dir.path().join("catalog.db"))?;
    reload_catalog(&store, &songs_file)?;
    Ok((dir, store))
}

/// Creates a user db holding the test users.
pub fn create_test_db_with_users() -> Result<(TempDir, PathBuf)> {
    let dir = TempDir::new()?;
    let db_path = dir.path().join("user.db");
    let store = SqliteUserStore::new(&db_path)?;
    let user_manager = UserManager::new(Arc::new(store));
    user_manager.register_user(TEST_USER, TEST_PASS, TEST_PASS)?;
    user_manager.register_user(OTHER_USER, OTHER_PASS, OTHER_PASS)?;
    Ok((dir, db_path))
}
