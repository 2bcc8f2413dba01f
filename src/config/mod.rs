mod file_config;

pub use file_config::{ClassifierConfig, FileConfig};

use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

const BYTES_PER_MB: usize = 1024 * 1024;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub classifier_url: Option<String>,
    pub classifier_timeout_sec: u64,
    pub songs_file: Option<PathBuf>,
    pub uploads_dir: Option<PathBuf>,
    pub max_upload_mb: usize,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub classifier_url: Option<String>,
    pub classifier_timeout_sec: u64,
    /// Catalog source loaded into the catalog db at start.
    pub songs_file: Option<PathBuf>,
    pub uploads_dir: PathBuf,
    pub max_upload_mb: usize,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        let classifier_file = file.classifier.unwrap_or_default();
        let classifier_url = classifier_file
            .url
            .or_else(|| cli.classifier_url.clone())
            .filter(|url| !url.trim().is_empty());
        let classifier_timeout_sec = classifier_file
            .timeout_sec
            .unwrap_or(cli.classifier_timeout_sec);

        let songs_file = file
            .songs_file
            .map(PathBuf::from)
            .or_else(|| cli.songs_file.clone());

        let uploads_dir = file
            .uploads_dir
            .map(PathBuf::from)
            .or_else(|| cli.uploads_dir.clone())
            .unwrap_or_else(|| db_dir.join("uploads"));

        let max_upload_mb = file.max_upload_mb.unwrap_or(cli.max_upload_mb);
        if max_upload_mb == 0 {
            bail!("max_upload_mb must be greater than 0");
        }
        if max_upload_mb.checked_mul(BYTES_PER_MB).is_none() {
            bail!("max_upload_mb is too large: {}", max_upload_mb);
        }

        Ok(Self {
            db_dir,
            port,
            logging_level,
            frontend_dir_path,
            classifier_url,
            classifier_timeout_sec,
            songs_file,
            uploads_dir,
            max_upload_mb,
        })
    }

    pub fn catalog_db_path(&self) -> PathBuf {
        self.db_dir.join("catalog.db")
    }

    pub fn user_db_path(&self) -> PathBuf {
        self.db_dir.join("user.db")
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(BYTES_PER_MB)
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
