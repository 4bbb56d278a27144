//! Secret hashing capability.
//!
//! The directory only needs `hash` and `verify`; the default implementation
//! uses Argon2id.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

use iamdir_core::DirectoryError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecretError {
    #[error("invalid hashing parameters: {0}")]
    InvalidParams(String),

    #[error("hashing failed: {0}")]
    HashingFailed(String),
}

impl From<SecretError> for DirectoryError {
    fn from(err: SecretError) -> Self {
        DirectoryError::store(err.to_string())
    }
}

/// `hash(secret) -> digest` / `verify(secret, digest) -> bool`.
pub trait SecretHasher: Send + Sync {
    fn hash(&self, secret: &str) -> Result<String, SecretError>;

    /// A malformed digest never verifies.
    fn verify(&self, secret: &str, digest: &str) -> bool;
}

/// Argon2id hasher producing PHC strings.
#[derive(Debug, Clone)]
pub struct Argon2SecretHasher {
    params: Params,
}

impl Argon2SecretHasher {
    /// m=19456 KiB, t=2, p=1.
    pub fn new() -> Self {
        Self {
            params: Params::new(19_456, 2, 1, None).unwrap_or_default(),
        }
    }

    pub fn with_params(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, SecretError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| SecretError::InvalidParams(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl Default for Argon2SecretHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretHasher for Argon2SecretHasher {
    fn hash(&self, secret: &str) -> Result<String, SecretError> {
        let salt = SaltString::generate(&mut OsRng);
        let digest = self
            .argon2()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| SecretError::HashingFailed(e.to_string()))?;
        Ok(digest.to_string())
    }

    fn verify(&self, secret: &str, digest: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(digest) else {
            return false;
        };
        self.argon2().verify_password(secret.as_bytes(), &parsed).is_ok()
    }
}

impl<T: SecretHasher + ?Sized> SecretHasher for std::sync::Arc<T> {
    fn hash(&self, secret: &str) -> Result<String, SecretError> {
        (**self).hash(secret)
    }

    fn verify(&self, secret: &str, digest: &str) -> bool {
        (**self).verify(secret, digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> Argon2SecretHasher {
        Argon2SecretHasher::with_params(8, 1, 1).unwrap()
    }

    #[test]
    fn hash_then_verify() {
        let hasher = cheap();
        let digest = hasher.hash("s3cret!").unwrap();
        assert!(digest.starts_with("$argon2id$"));
        assert!(hasher.verify("s3cret!", &digest));
        assert!(!hasher.verify("wrong", &digest));
    }

    #[test]
    fn same_secret_gets_distinct_salts() {
        let hasher = cheap();
        assert_ne!(hasher.hash("x").unwrap(), hasher.hash("x").unwrap());
    }

    #[test]
    fn garbage_digest_does_not_verify() {
        assert!(!cheap().verify("x", "not-a-phc-string"));
    }

    #[test]
    fn invalid_params_are_rejected() {
        assert!(matches!(
            Argon2SecretHasher::with_params(0, 0, 0),
            Err(SecretError::InvalidParams(_))
        ));
    }
}
