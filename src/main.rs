use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use genre_detector_server::catalog::reload_catalog;
use genre_detector_server::config::{AppConfig, CliConfig, FileConfig};
use genre_detector_server::{
    run_server, CatalogStore, GenreClassifier, HttpGenreClassifier, RequestsLoggingLevel,
    SqliteCatalogStore, SqliteUserStore,
};

mod cli_style;
use cli_style::get_styles;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(styles = get_styles())]
struct CliArgs {
    /// Path to a TOML config file, its values override the command line ones.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding user.db and catalog.db.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Base URL of the genre classification service.
    #[clap(long)]
    pub classifier_url: Option<String>,

    /// Timeout in seconds for classification requests.
    #[clap(long, default_value_t = 120)]
    pub classifier_timeout_sec: u64,

    /// Song list loaded into the recommendation catalog at start.
    #[clap(long, value_parser = parse_path)]
    pub songs_file: Option<PathBuf>,

    /// Where uploaded clips are stored, defaults to <db-dir>/uploads.
    #[clap(long, value_parser = parse_path)]
    pub uploads_dir: Option<PathBuf>,

    /// Maximum size of an uploaded clip in megabytes.
    #[clap(long, default_value_t = 20)]
    pub max_upload_mb: usize,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_dir: self.db_dir.clone(),
            port: self.port,
            logging_level: self.logging_level.clone(),
            frontend_dir_path: self.frontend_dir_path.clone(),
            classifier_url: self.classifier_url.clone(),
            classifier_timeout_sec: self.classifier_timeout_sec,
            songs_file: self.songs_file.clone(),
            uploads_dir: self.uploads_dir.clone(),
            max_upload_mb: self.max_upload_mb,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config file {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!(
        "Opening SQLite catalog database at {:?}...",
        config.catalog_db_path()
    );
    let catalog_store = Arc::new(SqliteCatalogStore::new(config.catalog_db_path())?);
    match &config.songs_file {
        Some(songs_file) => {
            let count = reload_catalog(&*catalog_store, songs_file)?;
            info!("Loaded {} songs from {:?}", count, songs_file);
        }
        None => info!(
            "No songs file given, catalog has {} songs",
            catalog_store.get_songs_count()
        ),
    }

    info!(
        "Opening SQLite user database at {:?}...",
        config.user_db_path()
    );
    let user_store = Arc::new(SqliteUserStore::new(config.user_db_path())?);

    let classifier: Option<Arc<dyn GenreClassifier>> = match &config.classifier_url {
        Some(url) => {
            info!("Using genre classifier at {}", url);
            Some(Arc::new(HttpGenreClassifier::new(
                url.clone(),
                config.classifier_timeout_sec,
            )?))
        }
        None => {
            warn!("No classifier configured, classification routes are disabled");
            None
        }
    };

    info!("Ready to serve at port {}!", config.port);
    run_server(
        catalog_store,
        user_store,
        classifier,
        config.logging_level.clone(),
        config.port,
        config.frontend_dir_path.clone(),
        config.uploads_dir.clone(),
        config.max_upload_bytes(),
    )
    .await
}
