//! HTTP client for the external genre classification service.

use super::ClassificationScore;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

/// Something that can label an audio clip with genre scores.
#[async_trait]
pub trait GenreClassifier: Send + Sync {
    /// Scores every genre the model knows for the given clip.
    async fn classify(&self, audio: &[u8]) -> Result<Vec<ClassificationScore>>;

    /// Re-fetches and re-initializes the underlying model.
    async fn reinitialize(&self) -> Result<()>;
}

/// Talks to the classification service over HTTP.
///
/// `POST {base_url}/classify` takes the raw audio as body and answers with a
/// JSON list of `{label, score}`, `POST {base_url}/reload` reloads the model.
pub struct HttpGenreClassifier {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGenreClassifier {
    pub fn new(base_url: String, timeout_sec: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = base_url.trim_end_matches('/').to_string();

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl GenreClassifier for HttpGenreClassifier {
    async fn classify(&self, audio: &[u8]) -> Result<Vec<ClassificationScore>> {
        let url = format!("{}/classify", self.base_url);
        debug!("Sending {} bytes to {}", audio.len(), url);
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(audio.to_vec())
            .send()
            .await
            .context("Failed to connect to classification service")?;

        if !response.status().is_success() {
            bail!("Classification failed with status: {}", response.status());
        }

        response
            .json()
            .await
            .context("Failed to parse classification response")
    }

    async fn reinitialize(&self) -> Result<()> {
        let url = format!("{}/reload", self.base_url);
        info!("Reloading classification model at {}", url);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .context("Failed to connect to classification service")?;

        if response.status().is_success() {
            Ok(())
        } else {
            bail!("Model reload failed with status: {}", response.status())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash() {
        let classifier = HttpGenreClassifier::new("http://localhost:5000/".to_string(), 5).unwrap();
        assert_eq!(classifier.base_url(), "http://localhost:5000");
    }

    #[tokio::test]
    async fn unreachable_service_is_an_error() {
        let classifier = HttpGenreClassifier::new("http://127.0.0.1:1".to_string(), 1).unwrap();
        assert!(classifier.classify(b"audio").await.is_err());
        assert!(classifier.reinitialize().await.is_err());
    }
}
