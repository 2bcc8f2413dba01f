use super::GenreCount;
use crate::catalog::{CatalogStore, SongRecord};
use anyhow::Result;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

pub const RECOMMENDATIONS_COUNT: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Artist")]
    pub artist: String,
    #[serde(rename = "Genre")]
    pub genre: String,
}

impl From<SongRecord> for Recommendation {
    fn from(song: SongRecord) -> Self {
        Recommendation {
            title: song.title,
            artist: song.artist,
            genre: song.genre,
        }
    }
}

/// `numerator / denominator` rounded to the nearest integer, ties going to
/// the even one.
fn div_round_half_even(numerator: usize, denominator: usize) -> usize {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    match (2 * remainder).cmp(&denominator) {
        Ordering::Less => quotient,
        Ordering::Greater => quotient + 1,
        Ordering::Equal if quotient % 2 == 0 => quotient,
        Ordering::Equal => quotient + 1,
    }
}

/// Splits the recommendation slots between the top genre and the second one,
/// proportionally to their amounts. Returns `(0, 0)` when both are zero.
pub fn split_recommendation_slots(top_amount: usize, second_amount: usize) -> (usize, usize) {
    let total = top_amount + second_amount;
    if total == 0 {
        return (0, 0);
    }
    let top_count = div_round_half_even(RECOMMENDATIONS_COUNT * top_amount, total);
    (top_count, RECOMMENDATIONS_COUNT - top_count)
}

/// Draws up to `count` distinct songs uniformly at random. When fewer than
/// `count` songs are available all of them are returned.
pub fn sample_songs<R: Rng + ?Sized>(
    songs: &[SongRecord],
    count: usize,
    rng: &mut R,
) -> Vec<SongRecord> {
    songs.choose_multiple(rng, count).cloned().collect()
}

pub fn sample_genre<R: Rng + ?Sized>(
    catalog: &dyn CatalogStore,
    genre: &str,
    count: usize,
    rng: &mut R,
) -> Result<Vec<SongRecord>> {
    if count == 0 {
        return Ok(vec![]);
    }
    let songs = catalog.get_songs_by_genre(genre)?;
    debug!(
        "Sampling {} out of {} songs of genre {}",
        count,
        songs.len(),
        genre
    );
    Ok(sample_songs(&songs, count, rng))
}

/// Recommends up to [`RECOMMENDATIONS_COUNT`] songs from the catalog, weighted
/// toward the two genres with the highest amounts. Songs of the top genre come
/// first.
pub fn recommend_songs<R: Rng + ?Sized>(
    genres: &[GenreCount],
    catalog: &dyn CatalogStore,
    rng: &mut R,
) -> Result<Vec<Recommendation>> {
    let mut sorted: Vec<&GenreCount> = genres.iter().collect();
    // stable, ties keep their aggregation order
    sorted.sort_by(|a, b| b.amount.cmp(&a.amount));

    let Some(top) = sorted.first() else {
        return Ok(vec![]);
    };
    let second = sorted.get(1);

    let (top_count, second_count) =
        split_recommendation_slots(top.amount, second.map_or(0, |g| g.amount));

    let mut songs = sample_genre(catalog, &top.name, top_count, rng)?;
    if let Some(second) = second {
        songs.extend(sample_genre(catalog, &second.name, second_count, rng)?);
    }

    Ok(songs.into_iter().map(Recommendation::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    struct InMemoryCatalog {
        songs: Vec<SongRecord>,
    }

    impl InMemoryCatalog {
        fn with_genres(genres: &[(&str, usize)]) -> Self {
            let songs = genres
                .iter()
                .flat_map(|(genre, count)| {
                    (0..*count).map(move |i| {
                        SongRecord::new(
                            format!("{} song {}", genre, i),
                            format!("{} artist", genre),
                            *genre,
                        )
                    })
                })
                .collect();
            InMemoryCatalog { songs }
        }
    }

    impl CatalogStore for InMemoryCatalog {
        fn replace_all(&self, _songs: &[SongRecord]) -> Result<usize> {
            unimplemented!()
        }

        fn get_songs_by_genre(&self, genre: &str) -> Result<Vec<SongRecord>> {
            Ok(self
                .songs
                .iter()
                .filter(|s| s.genre == genre)
                .cloned()
                .collect())
        }

        fn get_all_songs(&self) -> Result<Vec<SongRecord>> {
            Ok(self.songs.clone())
        }

        fn get_songs_count(&self) -> usize {
            self.songs.len()
        }
    }

    fn genre(name: &str, amount: usize) -> GenreCount {
        GenreCount {
            name: name.to_string(),
            amount,
            percentage: String::new(),
        }
    }

    fn genres_of(recommendations: &[Recommendation]) -> Vec<&str> {
        recommendations.iter().map(|r| r.genre.as_str()).collect()
    }

    #[test]
    fn splits_slots_with_half_even_rounding() {
        assert_eq!(split_recommendation_slots(5, 3), (3, 2));
        assert_eq!(split_recommendation_slots(1, 1), (2, 3));
        assert_eq!(split_recommendation_slots(3, 1), (4, 1));
        assert_eq!(split_recommendation_slots(7, 0), (5, 0));
        assert_eq!(split_recommendation_slots(9, 1), (4, 1));
        assert_eq!(split_recommendation_slots(2, 1), (3, 2));
        assert_eq!(split_recommendation_slots(0, 0), (0, 0));
    }

    #[test]
    fn recommends_proportionally_to_top_two_genres() {
        let catalog = InMemoryCatalog::with_genres(&[("rock", 4), ("pop", 3), ("jazz", 5)]);
        let mut rng = StdRng::seed_from_u64(42);

        let result = recommend_songs(
            &[genre("rock", 5), genre("pop", 3), genre("jazz", 1)],
            &catalog,
            &mut rng,
        )
        .unwrap();

        assert_eq!(genres_of(&result), vec!["rock", "rock", "rock", "pop", "pop"]);
        let titles: HashSet<_> = result.iter().map(|r| r.title.clone()).collect();
        assert_eq!(titles.len(), result.len());
    }

    #[test]
    fn sorts_genres_by_amount() {
        let catalog = InMemoryCatalog::with_genres(&[("rock", 4), ("pop", 4)]);
        let mut rng = StdRng::seed_from_u64(1);

        let result =
            recommend_songs(&[genre("pop", 1), genre("rock", 3)], &catalog, &mut rng).unwrap();

        assert_eq!(genres_of(&result), vec!["rock", "rock", "rock", "rock", "pop"]);
    }

    #[test]
    fn equal_amounts_keep_first_genre_on_top() {
        let catalog = InMemoryCatalog::with_genres(&[("a", 5), ("b", 5), ("c", 5)]);
        let mut rng = StdRng::seed_from_u64(7);

        let result = recommend_songs(
            &[genre("a", 2), genre("b", 2), genre("c", 2)],
            &catalog,
            &mut rng,
        )
        .unwrap();

        assert_eq!(genres_of(&result), vec!["a", "a", "b", "b", "b"]);
    }

    #[test]
    fn single_genre_gets_every_slot() {
        let catalog = InMemoryCatalog::with_genres(&[("jazz", 7), ("rock", 7)]);
        let mut rng = StdRng::seed_from_u64(3);

        let result = recommend_songs(&[genre("jazz", 2)], &catalog, &mut rng).unwrap();

        assert_eq!(result.len(), RECOMMENDATIONS_COUNT);
        assert!(result.iter().all(|r| r.genre == "jazz"));
    }

    #[test]
    fn no_genres_means_no_recommendations() {
        let catalog = InMemoryCatalog::with_genres(&[("rock", 10)]);
        let mut rng = StdRng::seed_from_u64(3);

        assert!(recommend_songs(&[], &catalog, &mut rng).unwrap().is_empty());
        assert!(recommend_songs(&[genre("rock", 0)], &catalog, &mut rng)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn returns_only_available_songs() {
        let catalog = InMemoryCatalog::with_genres(&[("rock", 1), ("pop", 5)]);
        let mut rng = StdRng::seed_from_u64(11);

        let result =
            recommend_songs(&[genre("rock", 5), genre("pop", 3)], &catalog, &mut rng).unwrap();

        assert_eq!(genres_of(&result), vec!["rock", "pop", "pop"]);
    }

    #[test]
    fn genre_missing_from_catalog_yields_nothing() {
        let catalog = InMemoryCatalog::with_genres(&[("rock", 3)]);
        let mut rng = StdRng::seed_from_u64(5);

        let result = recommend_songs(&[genre("metal", 4)], &catalog, &mut rng).unwrap();

        assert!(result.is_empty());
    }

    #[test]
    fn same_seed_gives_same_recommendations() {
        let catalog = InMemoryCatalog::with_genres(&[("rock", 20), ("pop", 20)]);
        let genres = [genre("rock", 3), genre("pop", 2)];

        let first = recommend_songs(&genres, &catalog, &mut StdRng::seed_from_u64(99)).unwrap();
        let second = recommend_songs(&genres, &catalog, &mut StdRng::seed_from_u64(99)).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn sample_songs_draws_without_replacement() {
        let songs: Vec<SongRecord> = (0..10)
            .map(|i| SongRecord::new(format!("t{}", i), "a", "g"))
            .collect();
        let mut rng = StdRng::seed_from_u64(0);

        let sample = sample_songs(&songs, 6, &mut rng);
        let distinct: HashSet<_> = sample.iter().collect();
        assert_eq!(sample.len(), 6);
        assert_eq!(distinct.len(), 6);

        assert_eq!(sample_songs(&songs, 20, &mut rng).len(), 10);
        assert!(sample_songs(&[], 3, &mut rng).is_empty());
    }

    #[test]
    fn serializes_with_capitalized_keys() {
        let recommendation = Recommendation::from(SongRecord::new("Song", "Someone", "rock"));
        assert_eq!(
            serde_json::to_value(&recommendation).unwrap(),
            serde_json::json!({"Title": "Song", "Artist": "Someone", "Genre": "rock"})
        );
    }
}
