//! Port for encrypting message bodies at rest.

use super::define_port_error;

define_port_error! {
    /// Errors raised by cipher adapters.
    pub enum MessageCipherError {
        /// Encryption failed.
        Encrypt { message: String } => "message encryption failed: {message}",
        /// Ciphertext was malformed, tampered with or sealed under another key.
        Decrypt { message: String } => "message decryption failed: {message}",
    }
}

/// Symmetric cipher applied to message bodies before storage.
#[cfg_attr(test, mockall::automock)]
pub trait MessageCipher: Send + Sync {
    /// Seal `plaintext` into opaque bytes.
    fn encrypt(&self, plaintext: &str) -> Result<Vec<u8>, MessageCipherError>;

    /// Open bytes produced by [`MessageCipher::encrypt`].
    fn decrypt(&self, ciphertext: &[u8]) -> Result<String, MessageCipherError>;
}

/// Fixture cipher that stores UTF-8 bytes unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureMessageCipher;

impl MessageCipher for FixtureMessageCipher {
    fn encrypt(&self, plaintext: &str) -> Result<Vec<u8>, MessageCipherError> {
        Ok(plaintext.as_bytes().to_vec())
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<String, MessageCipherError> {
        String::from_utf8(ciphertext.to_vec())
            .map_err(|err| MessageCipherError::decrypt(err.to_string()))
    }
}
