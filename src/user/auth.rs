//! Authentication primitives: session tokens and password hashing.

use anyhow::{bail, Result};

use rand::Rng;
use rand_distr::Alphanumeric;
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

const AUTH_TOKEN_LENGTH: usize = 64;

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct AuthTokenValue(pub String);

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct AuthToken {
    pub user_id: usize,
    pub created: SystemTime,
    pub last_used: Option<SystemTime>,
    pub value: AuthTokenValue,
}

impl AuthTokenValue {
    pub fn generate() -> AuthTokenValue {
        let rng = rand::rng();
        let random_string: String = rng
            .sample_iter(&Alphanumeric)
            .take(AUTH_TOKEN_LENGTH)
            .map(char::from)
            .collect();
        AuthTokenValue(random_string)
    }
}

mod argon2_hashing {
    use anyhow::{anyhow, Result};
    use argon2::{
        password_hash::{
            rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        },
        Argon2,
    };

    #[cfg(not(feature = "test-fast-hasher"))]
    fn argon2() -> Result<Argon2<'static>> {
        Ok(Argon2::default())
    }

    /// Minimum cost parameters, only meant to keep test suites fast.
    #[cfg(feature = "test-fast-hasher")]
    fn argon2() -> Result<Argon2<'static>> {
        let params = argon2::Params::new(argon2::Params::MIN_M_COST, 1, 1, None)
            .map_err(|err| anyhow!("{}", err))?;
        Ok(Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            params,
        ))
    }

    pub fn generate_b64_salt() -> String {
        SaltString::generate(&mut OsRng).to_string()
    }

    pub fn hash<T: AsRef<str>>(plain: &[u8], b64_salt: T) -> Result<String> {
        let salt = SaltString::from_b64(b64_salt.as_ref()).map_err(|err| anyhow!("{}", err))?;
        let hash_string = argon2()?
            .hash_password(plain, &salt)
            .map_err(|err| anyhow!("{}", err))?
            .to_string();
        Ok(hash_string)
    }

    pub fn verify<T: AsRef<str>>(plain_pw: &[u8], target_hash: T) -> Result<bool> {
        let password_hash =
            PasswordHash::new(target_hash.as_ref()).map_err(|err| anyhow!("{}", err))?;
        Ok(argon2()?.verify_password(plain_pw, &password_hash).is_ok())
    }
}

/// Algorithm used to hash a stored password. Persisted by name next to the
/// hash so that it can be changed without invalidating older credentials.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum CredentialsHasher {
    Argon2,
}

impl FromStr for CredentialsHasher {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "argon2" => Ok(CredentialsHasher::Argon2),
            _ => bail!("Unknown hasher {}", s),
        }
    }
}

impl fmt::Display for CredentialsHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialsHasher::Argon2 => write!(f, "argon2"),
        }
    }
}

impl CredentialsHasher {
    pub fn generate_b64_salt(&self) -> String {
        match self {
            CredentialsHasher::Argon2 => argon2_hashing::generate_b64_salt(),
        }
    }

    pub fn hash<T: AsRef<str>>(&self, plain: &[u8], b64_salt: T) -> Result<String> {
        match self {
            CredentialsHasher::Argon2 => argon2_hashing::hash(plain, b64_salt),
        }
    }

    /// The salt is embedded in argon2 hashes, `_salt` is only there for
    /// hashers that keep it separately.
    pub fn verify<T: AsRef<str>>(&self, plain_pw: T, target_hash: T, _salt: T) -> Result<bool> {
        match self {
            CredentialsHasher::Argon2 => {
                argon2_hashing::verify(plain_pw.as_ref().as_bytes(), target_hash)
            }
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct UsernamePasswordCredentials {
    pub user_id: usize,
    pub salt: String,
    pub hash: String,
    pub hasher: CredentialsHasher,

    pub created: SystemTime,
    pub last_tried: Option<SystemTime>,
    pub last_used: Option<SystemTime>,
}

impl UsernamePasswordCredentials {
    pub fn matches<T: AsRef<str>>(&self, password: T) -> bool {
        matches!(
            self.hasher
                .verify(password.as_ref(), self.hash.as_str(), self.salt.as_str()),
            Ok(true)
        )
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct UserAuthCredentials {
    pub user_id: usize,
    pub username_password: Option<UsernamePasswordCredentials>,
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn argon2_hash() {
        let pw = "123mypw";
        let b64_salt = CredentialsHasher::Argon2.generate_b64_salt();

        let hash1 = CredentialsHasher::Argon2
            .hash(pw.as_bytes(), &b64_salt)
            .unwrap();
        let hash2 = CredentialsHasher::Argon2
            .hash(b"123mypw", &b64_salt)
            .unwrap();
        assert_eq!(hash1, hash2);

        assert!(CredentialsHasher::Argon2
            .verify("123mypw", hash1.as_str(), "unused")
            .unwrap());
        assert!(!CredentialsHasher::Argon2
            .verify("not the pw", hash1.as_str(), "unused")
            .unwrap());
    }

    #[test]
    fn different_salts_give_different_hashes() {
        let hasher = CredentialsHasher::Argon2;
        let hash1 = hasher.hash(b"pw", hasher.generate_b64_salt()).unwrap();
        let hash2 = hasher.hash(b"pw", hasher.generate_b64_salt()).unwrap();
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn hasher_name_round_trips() {
        let name = CredentialsHasher::Argon2.to_string();
        assert_eq!(name, "argon2");
        assert_eq!(
            CredentialsHasher::from_str(&name).unwrap(),
            CredentialsHasher::Argon2
        );
        assert!(CredentialsHasher::from_str("md5").is_err());
    }

    #[test]
    fn generates_alphanumeric_tokens() {
        let token = AuthTokenValue::generate();
        assert_eq!(token.0.len(), AUTH_TOKEN_LENGTH);
        assert!(token.0.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, AuthTokenValue::generate());
    }

    #[test]
    fn credentials_match_only_their_password() {
        let hasher = CredentialsHasher::Argon2;
        let salt = hasher.generate_b64_salt();
        let credentials = UsernamePasswordCredentials {
            user_id: 1,
            hash: hasher.hash(b"secret", &salt).unwrap(),
            salt,
            hasher,
            created: SystemTime::now(),
            last_tried: None,
            last_used: None,
        };

        assert!(credentials.matches("secret"));
        assert!(!credentials.matches("Secret"));
        assert!(!credentials.matches(""));
    }
}
