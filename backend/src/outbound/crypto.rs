//! Cipher and password hashing adapters.
//!
//! - [`AesGcmMessageCipher`] seals message bodies with AES-256-GCM. Stored
//!   bytes are the 12-byte nonce followed by the ciphertext and tag.
//! - [`Argon2CredentialHasher`] produces Argon2id PHC strings.

use std::io;
use std::path::Path;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::password_hash::{self, PasswordHash as PhcString, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use cap_std::{ambient_authority, fs::Dir};
use thiserror::Error;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::domain::ports::{
    CredentialHasher, CredentialHasherError, MessageCipher, MessageCipherError,
};
use crate::domain::{PasswordHash, PlainPassword};

/// Length in bytes of an AES-256 key.
pub const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Errors raised while loading the message key.
#[derive(Debug, Error)]
pub enum CipherKeyError {
    /// The key file could not be read.
    #[error("failed to read message key: {0}")]
    Io(#[from] io::Error),
    /// The key file is not hex.
    #[error("message key is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    /// The decoded key has the wrong length.
    #[error("message key must be {KEY_LEN} bytes, got {actual}")]
    Length { actual: usize },
}

/// AES-256-GCM cipher over an explicitly injected key.
#[derive(Clone)]
pub struct AesGcmMessageCipher {
    cipher: Aes256Gcm,
}

impl AesGcmMessageCipher {
    /// Build a cipher from raw key bytes.
    pub fn from_key_bytes(key: &[u8]) -> Result<Self, CipherKeyError> {
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|_| CipherKeyError::Length { actual: key.len() })?;
        Ok(Self { cipher })
    }

    /// Load a hex-encoded key from `path`. Surrounding whitespace is ignored.
    pub fn from_key_file(path: &Path) -> Result<Self, CipherKeyError> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let file_name = path.file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "key path has no file name")
        })?;
        let dir = Dir::open_ambient_dir(parent, ambient_authority())?;
        let encoded = Zeroizing::new(dir.read_to_string(file_name)?);
        let key = Zeroizing::new(hex::decode(encoded.trim())?);
        Self::from_key_bytes(&key)
    }
}

/// Generate a fresh random key, hex encoded for a key file.
pub fn generate_key_hex() -> Zeroizing<String> {
    let key = Aes256Gcm::generate_key(&mut OsRng);
    Zeroizing::new(hex::encode(key))
}

impl MessageCipher for AesGcmMessageCipher {
    fn encrypt(&self, plaintext: &str) -> Result<Vec<u8>, MessageCipherError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|err| MessageCipherError::encrypt(err.to_string()))?;

        let mut stored = Vec::with_capacity(NONCE_LEN + sealed.len());
        stored.extend_from_slice(&nonce);
        stored.extend_from_slice(&sealed);
        Ok(stored)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<String, MessageCipherError> {
        if ciphertext.len() < NONCE_LEN {
            return Err(MessageCipherError::decrypt("ciphertext shorter than nonce"));
        }
        let (nonce, sealed) = ciphertext.split_at(NONCE_LEN);
        let opened = Zeroizing::new(
            self.cipher
                .decrypt(Nonce::from_slice(nonce), sealed)
                .map_err(|_| MessageCipherError::decrypt("authentication failed"))?,
        );
        String::from_utf8(opened.to_vec())
            .map_err(|err| MessageCipherError::decrypt(err.to_string()))
    }
}

/// Argon2 hasher with the crate's default parameters.
#[derive(Clone, Default)]
pub struct Argon2CredentialHasher {
    argon2: Argon2<'static>,
}

impl Argon2CredentialHasher {
    /// Use explicit Argon2 parameters.
    pub fn new(argon2: Argon2<'static>) -> Self {
        Self { argon2 }
    }
}

impl CredentialHasher for Argon2CredentialHasher {
    fn hash(&self, password: &PlainPassword) -> Result<PasswordHash, CredentialHasherError> {
        let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
            .map_err(|err| CredentialHasherError::hash(err.to_string()))?;
        let phc = self
            .argon2
            .hash_password(password.expose().as_bytes(), &salt)
            .map_err(|err| CredentialHasherError::hash(err.to_string()))?;
        Ok(PasswordHash::new(phc.to_string()))
    }

    fn verify(
        &self,
        password: &PlainPassword,
        hash: &PasswordHash,
    ) -> Result<bool, CredentialHasherError> {
        let parsed = PhcString::new(hash.as_str())
            .map_err(|err| CredentialHasherError::malformed_hash(err.to_string()))?;
        match self
            .argon2
            .verify_password(password.expose().as_bytes(), &parsed)
        {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(err) => Err(CredentialHasherError::hash(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Behavioural coverage for the cipher and hasher.
    use super::*;
    use rstest::{fixture, rstest};

    use crate::test_support::cap_fs::write_file;

    #[fixture]
    fn cipher() -> AesGcmMessageCipher {
        AesGcmMessageCipher::from_key_bytes(&[7_u8; KEY_LEN]).expect("key")
    }

    fn password(raw: &str) -> PlainPassword {
        PlainPassword::new(raw).expect("password")
    }

    #[rstest]
    fn sealed_text_opens_to_the_original(cipher: AesGcmMessageCipher) {
        let sealed = cipher.encrypt("see you at noon").expect("encrypt");

        assert_ne!(&sealed[NONCE_LEN..], b"see you at noon".as_slice());
        assert_eq!(cipher.decrypt(&sealed).expect("decrypt"), "see you at noon");
    }

    #[rstest]
    fn nonces_differ_between_seals(cipher: AesGcmMessageCipher) {
        let first = cipher.encrypt("same").expect("encrypt");
        let second = cipher.encrypt("same").expect("encrypt");
        assert_ne!(first, second);
    }

    #[rstest]
    fn tampered_bytes_fail_to_open(cipher: AesGcmMessageCipher) {
        let mut sealed = cipher.encrypt("payload").expect("encrypt");
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;

        let err = cipher.decrypt(&sealed).expect_err("tampered");
        assert!(matches!(err, MessageCipherError::Decrypt { .. }));
    }

    #[rstest]
    fn another_key_cannot_open(cipher: AesGcmMessageCipher) {
        let sealed = cipher.encrypt("payload").expect("encrypt");
        let other = AesGcmMessageCipher::from_key_bytes(&[9_u8; KEY_LEN]).expect("key");
        assert!(other.decrypt(&sealed).is_err());
    }

    #[rstest]
    #[case(&[])]
    #[case(&[1, 2, 3])]
    fn short_input_is_rejected(cipher: AesGcmMessageCipher, #[case] bytes: &[u8]) {
        assert_eq!(
            cipher.decrypt(bytes),
            Err(MessageCipherError::decrypt("ciphertext shorter than nonce"))
        );
    }

    #[rstest]
    #[case(16)]
    #[case(31)]
    #[case(33)]
    fn wrong_key_length_is_rejected(#[case] len: usize) {
        let err = AesGcmMessageCipher::from_key_bytes(&vec![0_u8; len])
            .err()
            .expect("length error");
        assert!(matches!(err, CipherKeyError::Length { actual } if actual == len));
    }

    #[rstest]
    fn key_file_is_read_as_hex() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("message.key");
        write_file(&path, format!("{}\n", hex::encode([7_u8; KEY_LEN])).as_bytes())
            .expect("write key");

        let from_file = AesGcmMessageCipher::from_key_file(&path).expect("load");
        let sealed = cipher().encrypt("shared").expect("encrypt");
        assert_eq!(from_file.decrypt(&sealed).expect("decrypt"), "shared");
    }

    #[rstest]
    fn generated_keys_load_and_differ() {
        let first = generate_key_hex();
        let second = generate_key_hex();

        assert_eq!(first.len(), KEY_LEN * 2);
        assert_ne!(*first, *second);
        let key = hex::decode(first.as_str()).expect("hex");
        assert!(AesGcmMessageCipher::from_key_bytes(&key).is_ok());
    }

    #[rstest]
    fn non_hex_key_file_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("message.key");
        write_file(&path, b"not-hex").expect("write key");

        let err = AesGcmMessageCipher::from_key_file(&path)
            .err()
            .expect("hex error");
        assert!(matches!(err, CipherKeyError::Hex(_)));
    }

    #[rstest]
    fn argon2_hash_verifies_only_the_right_password() {
        let hasher = Argon2CredentialHasher::default();
        let hash = hasher.hash(&password("correct horse")).expect("hash");

        assert!(hash.as_str().starts_with("$argon2id$"));
        assert!(hasher.verify(&password("correct horse"), &hash).expect("verify"));
        assert!(!hasher.verify(&password("battery staple"), &hash).expect("verify"));
    }

    #[rstest]
    fn argon2_salts_are_fresh() {
        let hasher = Argon2CredentialHasher::default();
        let first = hasher.hash(&password("pw")).expect("hash");
        let second = hasher.hash(&password("pw")).expect("hash");
        assert_ne!(first.as_str(), second.as_str());
    }

    #[rstest]
    fn malformed_hash_is_reported() {
        let hasher = Argon2CredentialHasher::default();
        let err = hasher
            .verify(&password("pw"), &PasswordHash::new("plain-text"))
            .expect_err("malformed");
        assert!(matches!(err, CredentialHasherError::MalformedHash { .. }));
    }
}
