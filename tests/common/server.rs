//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own catalog, user db and
//! uploads directory.

use super::constants::*;
use super::fixtures::{create_test_catalog, create_test_db_with_users, FakeClassifier};
use genre_detector_server::catalog::CatalogStore;
use genre_detector_server::classifier::GenreClassifier;
use genre_detector_server::server::{make_app, RequestsLoggingLevel, ServerConfig};
use genre_detector_server::user::{SqliteUserStore, UserStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance, shut down when dropped.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    pub port: u16,

    /// User store for direct database access in tests
    pub user_store: Arc<dyn UserStore>,

    /// Where uploaded clips are written
    pub uploads_dir: PathBuf,

    pub classifier: Option<Arc<FakeClassifier>>,

    _temp_catalog_dir: TempDir,
    _temp_db_dir: TempDir,
    _temp_uploads_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a server with a [FakeClassifier] on a random port.
    pub async fn spawn() -> Self {
        Self::spawn_with_classifier(Some(Arc::new(FakeClassifier::default()))).await
    }

    /// Spawns a server with no classification service configured.
    pub async fn spawn_without_classifier() -> Self {
        Self::spawn_with_classifier(None).await
    }

    async fn spawn_with_classifier(classifier: Option<Arc<FakeClassifier>>) -> Self {
        let (temp_catalog_dir, catalog_store) =
            create_test_catalog().expect("Failed to create test catalog");
        let (temp_db_dir, db_path) =
            create_test_db_with_users().expect("Failed to create test database");
        let temp_uploads_dir = TempDir::new().expect("Failed to create uploads dir");
        let uploads_dir = temp_uploads_dir.path().join("uploads");

        let catalog_store: Arc<dyn CatalogStore> = Arc::new(catalog_store);
        let user_store: Arc<dyn UserStore> =
            Arc::new(SqliteUserStore::new(&db_path).expect("Failed to open user store"));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            port,
            frontend_dir_path: None,
            uploads_dir: uploads_dir.clone(),
            max_upload_bytes: 1024 * 1024,
        };

        let app = make_app(
            config,
            catalog_store,
            user_store.clone(),
            classifier
                .clone()
                .map(|c| c as Arc<dyn GenreClassifier>),
        )
        .expect("Failed to build app");

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            user_store,
            uploads_dir,
            classifier,
            _temp_catalog_dir: temp_catalog_dir,
            _temp_db_dir: temp_db_dir,
            _temp_uploads_dir: temp_uploads_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Polls `/` until the server answers.
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
