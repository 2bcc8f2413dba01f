use super::{ClassificationScore, GenreClassifier};
use anyhow::{Context, Result};
use tracing::warn;

/// Classifies `audio`, and if that fails reinitializes the model and tries
/// exactly once more. The second failure is returned to the caller.
pub async fn classify_with_fallback(
    classifier: &dyn GenreClassifier,
    audio: &[u8],
) -> Result<Vec<ClassificationScore>> {
    match classifier.classify(audio).await {
        Ok(scores) => Ok(scores),
        Err(err) => {
            warn!("Classification failed, reinitializing the model: {:#}", err);
            classifier
                .reinitialize()
                .await
                .context("Failed to reinitialize the classification model")?;
            classifier
                .classify(audio)
                .await
                .context("Classification failed after reinitializing the model")
        }
    }
}
