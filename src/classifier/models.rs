use serde::{Deserialize, Serialize};

/// Returned to clients when no label can be picked for a clip.
pub const UNKNOWN_GENRE_MESSAGE: &str = "We don't know what the type of this music is :(";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassificationScore {
    pub label: String,
    pub score: f64,
}

impl ClassificationScore {
    pub fn new<L: Into<String>>(label: L, score: f64) -> Self {
        ClassificationScore {
            label: label.into(),
            score,
        }
    }
}

/// Picks the label with the highest score. On equal scores the later entry
/// wins. Entries scoring below zero (or NaN) never qualify.
pub fn select_top_label(scores: &[ClassificationScore]) -> Option<&str> {
    let mut max_score = 0.0;
    let mut selected = None;
    for entry in scores {
        if entry.score >= max_score {
            max_score = entry.score;
            selected = Some(entry.label.as_str());
        }
    }
    selected
}
