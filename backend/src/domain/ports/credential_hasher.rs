//! Port for password hashing.

use crate::domain::{PasswordHash, PlainPassword};

use super::define_port_error;

define_port_error! {
    /// Errors raised by credential hasher adapters.
    pub enum CredentialHasherError {
        /// Hashing failed.
        Hash { message: String } => "password hashing failed: {message}",
        /// The stored hash could not be parsed.
        MalformedHash { message: String } => "stored password hash is malformed: {message}",
    }
}

/// One-way password hashing.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialHasher: Send + Sync {
    /// Hash a plaintext password with a fresh salt.
    fn hash(&self, password: &PlainPassword) -> Result<PasswordHash, CredentialHasherError>;

    /// Check `password` against a stored hash.
    fn verify(
        &self,
        password: &PlainPassword,
        hash: &PasswordHash,
    ) -> Result<bool, CredentialHasherError>;
}

/// Fixture hasher producing a reversible, clearly-marked encoding.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureCredentialHasher;

impl FixtureCredentialHasher {
    const PREFIX: &'static str = "fixture$";
}

impl CredentialHasher for FixtureCredentialHasher {
    fn hash(&self, password: &PlainPassword) -> Result<PasswordHash, CredentialHasherError> {
        Ok(PasswordHash::new(format!("{}{}", Self::PREFIX, password.expose())))
    }

    fn verify(
        &self,
        password: &PlainPassword,
        hash: &PasswordHash,
    ) -> Result<bool, CredentialHasherError> {
        let stored = hash
            .as_str()
            .strip_prefix(Self::PREFIX)
            .ok_or_else(|| CredentialHasherError::malformed_hash("missing fixture prefix"))?;
        Ok(stored == password.expose())
    }
}
