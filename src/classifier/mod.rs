//! Genre classification through an external machine-learning service.

mod client;
mod fallback;
mod models;
mod payload;

pub use client::{GenreClassifier, HttpGenreClassifier};
pub use fallback::classify_with_fallback;
pub use models::{select_top_label, ClassificationScore, UNKNOWN_GENRE_MESSAGE};
pub use payload::{audio_extension, decode_audio_payload};
