//! Per-user genre statistics and genre-based song recommendations.

mod recommend;
mod stats;

pub use recommend::{
    recommend_songs, sample_genre, sample_songs, split_recommendation_slots, Recommendation,
    RECOMMENDATIONS_COUNT,
};
pub use stats::{aggregate_genre_counts, get_user_stats, GenreCount};
