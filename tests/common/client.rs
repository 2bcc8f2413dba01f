//! HTTP client for end-to-end tests
//!
//! Wraps reqwest and provides one method per server endpoint. When API
//! routes or request formats change, update only this file.

use super::constants::*;
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use serde_json::json;
use std::time::Duration;

/// HTTP test client with cookie-based session management
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// Creates a client logged in as [TEST_USER].
    ///
    /// # Panics
    ///
    /// Panics if authentication fails (indicates test infrastructure problem).
    pub async fn authenticated(base_url: String) -> Self {
        Self::authenticated_as(base_url, TEST_USER, TEST_PASS).await
    }

    pub async fn authenticated_as(base_url: String, handle: &str, password: &str) -> Self {
        let client = Self::new(base_url);

        let response = client.login(handle, password).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Authentication of {} failed: {:?}",
            handle,
            response.text().await
        );

        client
    }

    // ========================================================================
    // Authentication Endpoints
    // ========================================================================

    /// POST /v1/auth/register
    pub async fn register(&self, handle: &str, password1: &str, password2: &str) -> Response {
        self.client
            .post(format!("{}/v1/auth/register", self.base_url))
            .json(&json!({
                "user_handle": handle,
                "password1": password1,
                "password2": password2,
            }))
            .send()
            .await
            .expect("Register request failed")
    }

    /// POST /v1/auth/login
    pub async fn login(&self, handle: &str, password: &str) -> Response {
        self.client
            .post(format!("{}/v1/auth/login", self.base_url))
            .json(&json!({
                "user_handle": handle,
                "password": password,
            }))
            .send()
            .await
            .expect("Login request failed")
    }

    /// GET /v1/auth/logout
    pub async fn logout(&self) -> Response {
        self.client
            .get(format!("{}/v1/auth/logout", self.base_url))
            .send()
            .await
            .expect("Logout request failed")
    }

    /// GET /
    pub async fn get_server_info(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Server info request failed")
    }

    // ========================================================================
    // User Endpoints
    // ========================================================================

    /// GET /v1/user/home
    pub async fn get_home(&self) -> Response {
        self.client
            .get(format!("{}/v1/user/home", self.base_url))
            .send()
            .await
            .expect("Home request failed")
    }

    /// GET /v1/user/stats
    pub async fn get_stats(&self) -> Response {
        self.client
            .get(format!("{}/v1/user/stats", self.base_url))
            .send()
            .await
            .expect("Stats request failed")
    }

    /// GET /v1/user/recommendations
    pub async fn get_recommendations(&self) -> Response {
        self.client
            .get(format!("{}/v1/user/recommendations", self.base_url))
            .send()
            .await
            .expect("Recommendations request failed")
    }

    /// POST /v1/user/upload with a file part
    pub async fn upload_file(&self, music_name: &str, author: &str, audio: &[u8]) -> Response {
        let form = Form::new()
            .text("music_name", music_name.to_string())
            .text("author", author.to_string())
            .part(
                "music_file",
                Part::bytes(audio.to_vec()).file_name("clip.bin"),
            );
        self.send_upload(form).await
    }

    /// POST /v1/user/upload with a recorded clip as data URL
    pub async fn upload_recording(
        &self,
        music_name: &str,
        author: &str,
        recorded_audio: &str,
    ) -> Response {
        let form = Form::new()
            .text("music_name", music_name.to_string())
            .text("author", author.to_string())
            .text("recorded_audio", recorded_audio.to_string());
        self.send_upload(form).await
    }

    async fn send_upload(&self, form: Form) -> Response {
        self.client
            .post(format!("{}/v1/user/upload", self.base_url))
            .multipart(form)
            .send()
            .await
            .expect("Upload request failed")
    }

    // ========================================================================
    // Classification Endpoint
    // ========================================================================

    /// POST /v1/classify
    pub async fn classify(&self, audio: &str) -> Response {
        self.client
            .post(format!("{}/v1/classify", self.base_url))
            .json(&json!({ "audio": audio }))
            .send()
            .await
            .expect("Classify request failed")
    }

    /// Classifies `genre` encoded as a data URL, which the fake classifier
    /// answers with that same genre.
    pub async fn classify_as(&self, genre: &str) -> Response {
        self.classify(&data_url(genre.as_bytes())).await
    }
}

pub fn data_url(bytes: &[u8]) -> String {
    use base64::Engine;
    format!(
        "data:audio/webm;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}
