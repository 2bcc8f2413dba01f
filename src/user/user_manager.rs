use super::{
    auth::CredentialsHasher, AuthToken, AuthTokenValue, UserAuthCredentials, UserStore,
    UsernamePasswordCredentials,
};
use crate::genre::{get_user_stats, GenreCount};
use anyhow::{bail, Context, Result};
use std::{sync::Arc, time::SystemTime};
use thiserror::Error;
use tracing::{info, warn};

/// Why a registration attempt was refused. The message is meant to be shown
/// to the user as is.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("The user handle cannot be empty.")]
    EmptyHandle,
    #[error("A password is required.")]
    MissingPassword,
    #[error("Passwords do not match. Please try again.")]
    PasswordMismatch,
    #[error("Username already exists. Please choose a different one.")]
    HandleTaken,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub struct UserManager {
    user_store: Arc<dyn UserStore>,
}

impl UserManager {
    pub fn new(user_store: Arc<dyn UserStore>) -> Self {
        Self { user_store }
    }

    pub fn add_user<T: AsRef<str>>(&self, user_handle: T) -> Result<usize> {
        let user_handle = user_handle.as_ref();
        if user_handle.is_empty() {
            bail!("The user handle cannot be empty.")
        }

        if self.user_store.get_user_id(user_handle)?.is_some() {
            bail!("User handle already exists.");
        }

        self.user_store.create_user(user_handle)
    }

    /// Creates a user with password credentials. Nothing is stored unless
    /// every check passes.
    pub fn register_user(
        &self,
        user_handle: &str,
        password1: &str,
        password2: &str,
    ) -> Result<usize, RegistrationError> {
        let user_handle = user_handle.trim();
        if user_handle.is_empty() {
            return Err(RegistrationError::EmptyHandle);
        }
        if password1.is_empty() {
            return Err(RegistrationError::MissingPassword);
        }
        if password1 != password2 {
            return Err(RegistrationError::PasswordMismatch);
        }
        if self.user_store.get_user_id(user_handle)?.is_some() {
            return Err(RegistrationError::HandleTaken);
        }

        let password_credentials = Self::create_hashed_password(0, password1)?;
        let user_id = self
            .user_store
            .create_user_with_password(user_handle, password_credentials)?;
        info!("Registered user {} with id {}", user_handle, user_id);
        Ok(user_id)
    }

    /// Returns the credentials of `user_handle` if `password` is their
    /// password, None in every other case.
    pub fn authenticate(
        &self,
        user_handle: &str,
        password: &str,
    ) -> Result<Option<UserAuthCredentials>> {
        let Some(credentials) = self.user_store.get_user_auth_credentials(user_handle)? else {
            return Ok(None);
        };
        match &credentials.username_password {
            Some(password_credentials) if password_credentials.matches(password) => {
                Ok(Some(credentials))
            }
            _ => Ok(None),
        }
    }

    pub fn get_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        self.user_store.get_user_auth_token(value)
    }

    pub fn touch_auth_token(&self, value: &AuthTokenValue) {
        if let Err(err) = self
            .user_store
            .update_user_auth_token_last_used_timestamp(value)
        {
            warn!("Failed to update auth token last used timestamp: {}", err);
        }
    }

    pub fn generate_auth_token(&self, credentials: &UserAuthCredentials) -> Result<AuthToken> {
        let token = AuthToken {
            user_id: credentials.user_id,
            value: AuthTokenValue::generate(),
            created: SystemTime::now(),
            last_used: None,
        };
        self.user_store.add_user_auth_token(token.clone())?;
        Ok(token)
    }

    fn create_hashed_password(
        user_id: usize,
        password: &str,
    ) -> Result<UsernamePasswordCredentials> {
        let hasher = CredentialsHasher::Argon2;
        let salt = hasher.generate_b64_salt();
        let hash = hasher.hash(password.as_bytes(), &salt)?;
        Ok(UsernamePasswordCredentials {
            user_id,
            salt,
            hash,
            hasher,
            created: SystemTime::now(),
            last_tried: None,
            last_used: None,
        })
    }

    pub fn create_password_credentials(&self, user_handle: &str, password: &str) -> Result<()> {
        let mut credentials = self
            .user_store
            .get_user_auth_credentials(user_handle)?
            .with_context(|| format!("User with handle {} not found.", user_handle))?;
        if credentials.username_password.is_some() {
            bail!("User with handle {} already has password credentials. Maybe you want to modify them?", user_handle);
        }
        credentials.username_password =
            Some(Self::create_hashed_password(credentials.user_id, password)?);
        self.user_store.update_user_auth_credentials(credentials)
    }

    pub fn update_password_credentials(&self, user_handle: &str, password: &str) -> Result<()> {
        let mut credentials = self
            .user_store
            .get_user_auth_credentials(user_handle)?
            .with_context(|| format!("User with handle {} not found.", user_handle))?;
        if credentials.username_password.is_none() {
            bail!(
                "Cannot update password of user with handle {} since it never had one.",
                user_handle
            );
        }
        credentials.username_password =
            Some(Self::create_hashed_password(credentials.user_id, password)?);
        self.user_store.update_user_auth_credentials(credentials)
    }

    pub fn delete_password_credentials(&self, user_handle: &str) -> Result<()> {
        let mut credentials = self
            .user_store
            .get_user_auth_credentials(user_handle)?
            .with_context(|| format!("User with handle {} not found.", user_handle))?;
        credentials.username_password = None;
        self.user_store.update_user_auth_credentials(credentials)
    }

    pub fn get_user_credentials(&self, user_handle: &str) -> Result<Option<UserAuthCredentials>> {
        self.user_store.get_user_auth_credentials(user_handle)
    }

    pub fn delete_auth_token(&self, user_id: usize, token_value: &AuthTokenValue) -> Result<()> {
        match self.user_store.delete_user_auth_token(token_value)? {
            Some(removed) if removed.user_id == user_id => Ok(()),
            Some(removed) => {
                self.user_store.add_user_auth_token(removed.clone())?;
                bail!(
                    "Tried to delete auth token {}, but the authenticated user {} was not the owner {} of the token.",
                    token_value.0,
                    user_id,
                    removed.user_id
                )
            }
            None => bail!("Did not find auth token {}", token_value.0),
        }
    }

    pub fn get_user_tokens(&self, user_handle: &str) -> Result<Vec<AuthToken>> {
        self.user_store.get_all_user_auth_tokens(user_handle)
    }

    pub fn get_all_user_handles(&self) -> Result<Vec<String>> {
        self.user_store.get_all_user_handles()
    }

    pub fn get_user_handle(&self, user_id: usize) -> Result<Option<String>> {
        self.user_store.get_user_handle(user_id)
    }

    pub fn log_genre(&self, user_id: usize, genre: &str) -> Result<()> {
        self.user_store.add_genre_log_entry(user_id, genre)
    }

    pub fn get_user_stats(&self, user_id: usize) -> Result<Vec<GenreCount>> {
        get_user_stats(self.user_store.as_ref(), user_id)
    }
}
