use serde::{Deserialize, Serialize};

/// A recommendable song, tagged with the genre it is recommended for.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SongRecord {
    pub title: String,
    pub artist: String,
    pub genre: String,
}

impl SongRecord {
    pub fn new<T: Into<String>, A: Into<String>, G: Into<String>>(
        title: T,
        artist: A,
        genre: G,
    ) -> Self {
        SongRecord {
            title: title.into(),
            artist: artist.into(),
            genre: genre.into(),
        }
    }
}
