use super::auth::{AuthToken, AuthTokenValue, UserAuthCredentials, UsernamePasswordCredentials};
use anyhow::Result;

pub trait UserAuthCredentialsStore: Send + Sync {
    /// Returns the user's authentication credentials given the user handle.
    /// Returns Ok(None) if the user does not exist.
    fn get_user_auth_credentials(&self, user_handle: &str) -> Result<Option<UserAuthCredentials>>;

    /// Replaces the user's authentication credentials, a `None` password
    /// removes the password credentials.
    fn update_user_auth_credentials(&self, credentials: UserAuthCredentials) -> Result<()>;
}

pub trait UserAuthTokenStore: Send + Sync {
    /// Returns Ok(None) if the token does not exist.
    fn get_user_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>>;

    /// Deletes an auth token given the token value, returning the deleted token.
    /// Returns Ok(None) if the token does not exist.
    fn delete_user_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>>;

    /// Updates an auth token with the latest timestamp.
    fn update_user_auth_token_last_used_timestamp(&self, token: &AuthTokenValue) -> Result<()>;

    fn add_user_auth_token(&self, token: AuthToken) -> Result<()>;

    /// Returns all of a user's authentication tokens.
    fn get_all_user_auth_tokens(&self, user_handle: &str) -> Result<Vec<AuthToken>>;
}

/// Append-only log of the genres detected in a user's clips.
pub trait UserGenreLogStore: Send + Sync {
    fn add_genre_log_entry(&self, user_id: usize, genre: &str) -> Result<()>;

    /// Returns every genre logged for the user, oldest first.
    fn get_user_genre_labels(&self, user_id: usize) -> Result<Vec<String>>;
}

pub trait UserStore:
    UserAuthTokenStore + UserAuthCredentialsStore + UserGenreLogStore + Send + Sync
{
    /// Creates a new user and returns the user id.
    fn create_user(&self, user_handle: &str) -> Result<usize>;

    /// Creates a new user together with its password credentials and returns
    /// the user id. Either both are stored or nothing is. The `user_id` of
    /// `password` is ignored.
    fn create_user_with_password(
        &self,
        user_handle: &str,
        password: UsernamePasswordCredentials,
    ) -> Result<usize>;

    /// Returns a user's handle given the user id.
    /// Returns Ok(None) if the user does not exist.
    fn get_user_handle(&self, user_id: usize) -> Result<Option<String>>;

    /// Returns all users' handles.
    fn get_all_user_handles(&self) -> Result<Vec<String>>;

    /// Returns Ok(None) if the user does not exist.
    fn get_user_id(&self, user_handle: &str) -> Result<Option<usize>>;

    /// Deletes a user together with everything it owns.
    /// Returns false if the user did not exist.
    fn delete_user(&self, user_id: usize) -> Result<bool>;
}
