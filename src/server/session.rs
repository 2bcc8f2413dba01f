use super::state::ServerState;
use crate::user::AuthTokenValue;

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;
use std::convert::Infallible;
use tracing::debug;

/// The authenticated caller of a request.
#[derive(Debug)]
pub struct Session {
    pub user_id: usize,
    pub token: String,
}

pub const COOKIE_SESSION_TOKEN_KEY: &str = "session_token";
pub const HEADER_SESSION_TOKEN_KEY: &str = "Authorization";

pub enum SessionExtractionError {
    AccessDenied,
}

impl IntoResponse for SessionExtractionError {
    fn into_response(self) -> axum::response::Response {
        match self {
            SessionExtractionError::AccessDenied => StatusCode::FORBIDDEN.into_response(),
        }
    }
}

fn extract_session_token_from_cookies(parts: &Parts) -> Option<String> {
    CookieJar::from_headers(&parts.headers)
        .get(COOKIE_SESSION_TOKEN_KEY)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

fn extract_session_token_from_headers(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(HEADER_SESSION_TOKEN_KEY)?;
    let value = String::from_utf8_lossy(value.as_bytes());
    let token = value.strip_prefix("Bearer ").unwrap_or(&value).trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Tries the cookie token first, then the header one, so that a stale cookie
/// does not hide a valid `Authorization` header.
fn extract_session_from_request_parts(parts: &Parts, ctx: &ServerState) -> Option<Session> {
    let candidates: Vec<String> = extract_session_token_from_cookies(parts)
        .into_iter()
        .chain(extract_session_token_from_headers(parts))
        .collect();
    if candidates.is_empty() {
        debug!("No token in cookies nor headers.");
        return None;
    }

    let user_manager = ctx.user_manager.lock().unwrap();
    for token in candidates {
        let auth_token_value = AuthTokenValue(token);
        let auth_token = match user_manager.get_auth_token(&auth_token_value) {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("Auth token not found in database");
                continue;
            }
            Err(err) => {
                debug!("Failed to get auth token from database: {}", err);
                continue;
            }
        };
        user_manager.touch_auth_token(&auth_token_value);
        debug!("Found auth token for user_id={}", auth_token.user_id);

        return Some(Session {
            user_id: auth_token.user_id,
            token: auth_token.value.0,
        });
    }
    None
}

impl FromRequestParts<ServerState> for Session {
    type Rejection = SessionExtractionError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        extract_session_from_request_parts(parts, ctx).ok_or(SessionExtractionError::AccessDenied)
    }
}

impl OptionalFromRequestParts<ServerState> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(extract_session_from_request_parts(parts, ctx))
    }
}
