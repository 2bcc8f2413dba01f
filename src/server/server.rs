use anyhow::{Context, Result};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use tracing::{debug, error, info, warn};

use crate::catalog::CatalogStore;
use crate::classifier::{
    audio_extension, classify_with_fallback, decode_audio_payload, select_top_label,
    GenreClassifier, UNKNOWN_GENRE_MESSAGE,
};
use crate::genre::{recommend_songs, GenreCount, Recommendation};
use crate::user::{AuthTokenValue, RegistrationError, UserManager, UserStore};
use axum_extra::extract::cookie::{Cookie, SameSite};
use tower_http::services::ServeDir;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::session::{Session, COOKIE_SESSION_TOKEN_KEY};
use super::{log_requests, state::*, RequestsLoggingLevel, ServerConfig};

const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid username or password.";

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub session_token: Option<String>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct RegisterBody {
    #[serde(default)]
    pub user_handle: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

#[derive(Deserialize)]
struct LoginBody {
    #[serde(default)]
    pub user_handle: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
struct ClassifyBody {
    pub audio: String,
}

#[derive(Serialize)]
struct LoginSuccessResponse {
    token: String,
}

#[derive(Serialize)]
struct RegisterSuccessResponse {
    user_id: usize,
}

#[derive(Serialize)]
struct UserHomeResponse {
    genres: Vec<GenreCount>,
    recommendations: Vec<Recommendation>,
}

#[derive(Serialize)]
struct UploadResponse {
    file: String,
    genre: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response<T: Into<String>>(status: StatusCode, message: T) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

async fn home(session: Option<Session>, State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        session_token: session.map(|s| s.token),
    };
    Json(stats)
}

async fn register(
    State(user_manager): State<GuardedUserManager>,
    Json(body): Json<RegisterBody>,
) -> Response {
    debug!("register() called for {:?}", body.user_handle);
    let result = user_manager.lock().unwrap().register_user(
        &body.user_handle,
        &body.password1,
        &body.password2,
    );
    match result {
        Ok(user_id) => (
            StatusCode::CREATED,
            Json(RegisterSuccessResponse { user_id }),
        )
            .into_response(),
        Err(RegistrationError::Internal(err)) => {
            error!("Registration failed: {:#}", err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Registration failed.")
        }
        Err(err @ RegistrationError::HandleTaken) => {
            error_response(StatusCode::CONFLICT, err.to_string())
        }
        Err(err) => error_response(StatusCode::BAD_REQUEST, err.to_string()),
    }
}

async fn login(
    State(user_manager): State<GuardedUserManager>,
    Json(body): Json<LoginBody>,
) -> Response {
    debug!("login() called for {:?}", body.user_handle);
    let locked_manager = user_manager.lock().unwrap();
    let credentials = match locked_manager.authenticate(&body.user_handle, &body.password) {
        Ok(Some(credentials)) => credentials,
        Ok(None) => {
            return error_response(StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS_MESSAGE);
        }
        Err(err) => {
            error!("Error while checking credentials: {:#}", err);
            return error_response(StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS_MESSAGE);
        }
    };

    match locked_manager.generate_auth_token(&credentials) {
        Ok(auth_token) => {
            let cookie = Cookie::build((COOKIE_SESSION_TOKEN_KEY, auth_token.value.0.clone()))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .build();
            (
                StatusCode::CREATED,
                [(header::SET_COOKIE, cookie.to_string())],
                Json(LoginSuccessResponse {
                    token: auth_token.value.0,
                }),
            )
                .into_response()
        }
        Err(err) => {
            error!("Error with auth token generation: {:#}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn logout(State(user_manager): State<GuardedUserManager>, session: Session) -> Response {
    let locked_manager = user_manager.lock().unwrap();
    match locked_manager.delete_auth_token(session.user_id, &AuthTokenValue(session.token)) {
        Ok(()) => {
            let cookie = Cookie::build((COOKIE_SESSION_TOKEN_KEY, ""))
                .path("/")
                .expires(time::OffsetDateTime::now_utc() - time::Duration::days(1))
                .same_site(SameSite::Lax)
                .build();

            (StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]).into_response()
        }
        Err(err) => {
            warn!("Logout failed: {:#}", err);
            StatusCode::BAD_REQUEST.into_response()
        }
    }
}

fn get_user_recommendations(
    catalog_store: &dyn CatalogStore,
    genres: &[GenreCount],
) -> Result<Vec<Recommendation>> {
    let mut rng = rand::rng();
    recommend_songs(genres, catalog_store, &mut rng)
}

fn get_user_home(
    user_manager: &GuardedUserManager,
    catalog_store: &dyn CatalogStore,
    user_id: usize,
) -> Result<UserHomeResponse> {
    let genres = user_manager.lock().unwrap().get_user_stats(user_id)?;
    let recommendations = get_user_recommendations(catalog_store, &genres)?;
    Ok(UserHomeResponse {
        genres,
        recommendations,
    })
}

async fn get_home(
    session: Session,
    State(user_manager): State<GuardedUserManager>,
    State(catalog_store): State<GuardedCatalogStore>,
) -> Response {
    match get_user_home(&user_manager, catalog_store.as_ref(), session.user_id) {
        Ok(home) => Json(home).into_response(),
        Err(err) => {
            error!("Failed to build home of user {}: {:#}", session.user_id, err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn get_stats(session: Session, State(user_manager): State<GuardedUserManager>) -> Response {
    match user_manager.lock().unwrap().get_user_stats(session.user_id) {
        Ok(genres) => Json(genres).into_response(),
        Err(err) => {
            error!("Failed to get stats of user {}: {:#}", session.user_id, err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn get_recommendations(
    session: Session,
    State(user_manager): State<GuardedUserManager>,
    State(catalog_store): State<GuardedCatalogStore>,
) -> Response {
    match get_user_home(&user_manager, catalog_store.as_ref(), session.user_id) {
        Ok(home) => Json(home.recommendations).into_response(),
        Err(err) => {
            error!(
                "Failed to get recommendations of user {}: {:#}",
                session.user_id, err
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

enum ClassificationError {
    NotConfigured,
    Failed(anyhow::Error),
}

impl IntoResponse for ClassificationError {
    fn into_response(self) -> Response {
        match self {
            ClassificationError::NotConfigured => error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Genre classification is not available.",
            ),
            ClassificationError::Failed(err) => {
                error!("Classification failed: {:#}", err);
                error_response(StatusCode::BAD_GATEWAY, "Genre classification failed.")
            }
        }
    }
}

/// Classifies the clip and, when a label could be picked and a user is given,
/// appends it to that user's genre log. Returns the label or the "unknown"
/// message.
async fn classify_and_log(
    classifier: &dyn GenreClassifier,
    user_manager: &GuardedUserManager,
    user_id: Option<usize>,
    audio: &[u8],
) -> Result<String, ClassificationError> {
    let scores = classify_with_fallback(classifier, audio)
        .await
        .map_err(ClassificationError::Failed)?;
    let Some(label) = select_top_label(&scores) else {
        return Ok(UNKNOWN_GENRE_MESSAGE.to_string());
    };
    if let Some(user_id) = user_id {
        user_manager
            .lock()
            .unwrap()
            .log_genre(user_id, label)
            .map_err(ClassificationError::Failed)?;
    }
    Ok(label.to_string())
}

async fn classify(
    session: Option<Session>,
    State(classifier): State<OptionalClassifier>,
    State(user_manager): State<GuardedUserManager>,
    Json(body): Json<ClassifyBody>,
) -> Response {
    let Some(classifier) = classifier else {
        return ClassificationError::NotConfigured.into_response();
    };
    let audio = match decode_audio_payload(&body.audio) {
        Ok(audio) => audio,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, format!("{:#}", err)),
    };

    let user_id = session.map(|s| s.user_id);
    match classify_and_log(classifier.as_ref(), &user_manager, user_id, &audio).await {
        Ok(label) => Json(label).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Default)]
struct UploadForm {
    music_name: String,
    author: String,
    music_file: Option<Vec<u8>>,
    recorded_audio: Option<String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<UploadForm> {
        let mut form = UploadForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .context("Malformed multipart body")?
        {
            let field_name = field.name().unwrap_or("").to_string();
            match field_name.as_str() {
                "music_name" => form.music_name = field.text().await?,
                "author" => form.author = field.text().await?,
                "music_file" => {
                    let bytes = field.bytes().await?;
                    if !bytes.is_empty() {
                        form.music_file = Some(bytes.to_vec());
                    }
                }
                "recorded_audio" => {
                    let text = field.text().await?;
                    if !text.trim().is_empty() {
                        form.recorded_audio = Some(text);
                    }
                }
                other => debug!("Ignoring upload field {}", other),
            }
        }
        Ok(form)
    }

    /// The clip bytes and the extension used when the content is not
    /// recognised.
    fn audio(&self) -> Result<Option<(Vec<u8>, &'static str)>> {
        if let Some(bytes) = &self.music_file {
            return Ok(Some((bytes.clone(), "mp3")));
        }
        match &self.recorded_audio {
            Some(payload) => Ok(Some((decode_audio_payload(payload)?, "webm"))),
            None => Ok(None),
        }
    }
}

fn sanitize_file_name_part(part: &str) -> String {
    part.trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `<music_name>_<author>.<extension>`, restricted to characters that are
/// safe in a file name.
fn upload_file_name(music_name: &str, author: &str, extension: &str) -> String {
    let music_name = sanitize_file_name_part(music_name);
    let author = sanitize_file_name_part(author);
    let stem = match (music_name.is_empty(), author.is_empty()) {
        (true, true) => "clip".to_string(),
        _ => format!("{}_{}", music_name, author),
    };
    format!("{}.{}", stem, extension)
}

async fn store_upload(uploads_dir: &Path, file_name: &str, audio: &[u8]) -> Result<()> {
    tokio::fs::create_dir_all(uploads_dir)
        .await
        .with_context(|| format!("Failed to create uploads dir {:?}", uploads_dir))?;
    let path = uploads_dir.join(file_name);
    tokio::fs::write(&path, audio)
        .await
        .with_context(|| format!("Failed to write upload {:?}", path))?;
    Ok(())
}

async fn upload(
    session: Session,
    State(state): State<ServerState>,
    multipart: Multipart,
) -> Response {
    let Some(classifier) = state.classifier.clone() else {
        return ClassificationError::NotConfigured.into_response();
    };

    let form = match UploadForm::read(multipart).await {
        Ok(form) => form,
        Err(err) => {
            warn!("Failed to read upload: {:#}", err);
            return error_response(StatusCode::BAD_REQUEST, "Failed to read upload.");
        }
    };
    let (audio, fallback_extension) = match form.audio() {
        Ok(Some(audio)) => audio,
        Ok(None) => return error_response(StatusCode::BAD_REQUEST, "No audio provided."),
        Err(err) => return error_response(StatusCode::BAD_REQUEST, format!("{:#}", err)),
    };

    let extension = audio_extension(&audio, fallback_extension);
    let file_name = upload_file_name(&form.music_name, &form.author, extension);
    if let Err(err) = store_upload(&state.config.uploads_dir, &file_name, &audio).await {
        error!("{:#}", err);
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    info!(
        "User {} uploaded {} ({} bytes)",
        session.user_id,
        file_name,
        audio.len()
    );

    match classify_and_log(
        classifier.as_ref(),
        &state.user_manager,
        Some(session.user_id),
        &audio,
    )
    .await
    {
        Ok(genre) => Json(UploadResponse {
            file: file_name,
            genre,
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn make_app(
    config: ServerConfig,
    catalog_store: Arc<dyn CatalogStore>,
    user_store: Arc<dyn UserStore>,
    classifier: Option<Arc<dyn GenreClassifier>>,
) -> Result<Router> {
    let user_manager = UserManager::new(user_store);
    let state = ServerState::new(config.clone(), catalog_store, user_manager, classifier);

    let auth_routes: Router = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .with_state(state.clone());

    let user_routes: Router = Router::new()
        .route("/home", get(get_home))
        .route("/stats", get(get_stats))
        .route("/recommendations", get(get_recommendations))
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(state.clone());

    let classify_routes: Router = Router::new()
        .route("/v1/classify", post(classify))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(state.clone());

    let home_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    let app: Router = home_router
        .nest("/v1/auth", auth_routes)
        .nest("/v1/user", user_routes)
        .merge(classify_routes)
        .layer(middleware::from_fn_with_state(state.clone(), log_requests));

    Ok(app)
}

#[allow(clippy::too_many_arguments)]
pub async fn run_server(
    catalog_store: Arc<dyn CatalogStore>,
    user_store: Arc<dyn UserStore>,
    classifier: Option<Arc<dyn GenreClassifier>>,
    requests_logging_level: RequestsLoggingLevel,
    port: u16,
    frontend_dir_path: Option<String>,
    uploads_dir: PathBuf,
    max_upload_bytes: usize,
) -> Result<()> {
    let config = ServerConfig {
        port,
        requests_logging_level,
        frontend_dir_path,
        uploads_dir,
        max_upload_bytes,
    };
    let app = make_app(config, catalog_store, user_store, classifier)?;

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on port {}", port);

    Ok(axum::serve(listener, app).await?)
}
