use crate::user::UserGenreLogStore;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How many of a user's classified clips fall into one genre.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreCount {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Amount")]
    pub amount: usize,
    /// Share of the user's clips, formatted as `"62.50%"`.
    #[serde(rename = "Percentage", default)]
    pub percentage: String,
}

fn format_percentage(amount: usize, total: usize) -> String {
    format!("{:.2}%", (amount as f64 / total as f64) * 100.0)
}

/// Groups genre labels and counts them. Genres are listed in the order in
/// which they first appear in `labels`. No labels means no genres.
pub fn aggregate_genre_counts<I, S>(labels: I) -> Vec<GenreCount>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = vec![];
    for label in labels {
        let label = label.as_ref();
        match positions.get(label) {
            Some(&position) => counts[position].1 += 1,
            None => {
                positions.insert(label.to_owned(), counts.len());
                counts.push((label.to_owned(), 1));
            }
        }
    }

    let total: usize = counts.iter().map(|(_, amount)| amount).sum();
    if total == 0 {
        return vec![];
    }

    counts
        .into_iter()
        .map(|(name, amount)| GenreCount {
            percentage: format_percentage(amount, total),
            name,
            amount,
        })
        .collect()
}

/// Genre statistics of a single user, computed from their genre log.
pub fn get_user_stats<S: UserGenreLogStore + ?Sized>(
    store: &S,
    user_id: usize,
) -> Result<Vec<GenreCount>> {
    let labels = store.get_user_genre_labels(user_id)?;
    Ok(aggregate_genre_counts(labels))
}
