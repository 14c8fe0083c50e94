//! Filesystem-backed `BlobStore` confined to a capability directory.
//!
//! Blobs live as flat files directly under the root directory. Each name is a
//! random UUID followed by a sanitised copy of the upload name, so two uploads
//! of `avatar.png` never collide and no reference can escape the root.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use cap_std::{ambient_authority, fs::Dir};
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use crate::domain::BlobRef;
use crate::domain::ports::{BlobStore, BlobStoreError};

const SUFFIX_MAX: usize = 64;

/// Blob store writing into a single `cap_std` directory.
#[derive(Debug)]
pub struct CapStdBlobStore {
    root: Dir,
}

impl CapStdBlobStore {
    /// Open (creating if needed) the directory at `path`.
    pub fn open(path: &Path) -> io::Result<Self> {
        Dir::create_ambient_dir_all(path, ambient_authority())?;
        let root = Dir::open_ambient_dir(path, ambient_authority())?;
        Ok(Self { root })
    }

    /// Wrap an already opened directory.
    pub fn from_dir(root: Dir) -> Self {
        Self { root }
    }

    /// Read a stored blob back.
    pub fn read(&self, blob_ref: &BlobRef) -> Result<Vec<u8>, BlobStoreError> {
        let name = checked_name(blob_ref)?;
        self.root.read(name).map_err(io_error)
    }
}

fn io_error(error: io::Error) -> BlobStoreError {
    BlobStoreError::io(error.to_string())
}

/// Keep ASCII alphanumerics, `.`, `-` and `_`; replace everything else.
fn sanitise(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|ch| !ch.is_control())
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .take(SUFFIX_MAX)
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "blob".to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Reject references that are not a single plain file name.
fn checked_name(blob_ref: &BlobRef) -> Result<&str, BlobStoreError> {
    let raw = blob_ref.as_str();
    let valid = !raw.is_empty()
        && !raw.starts_with('.')
        && raw
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_'));
    if valid {
        Ok(raw)
    } else {
        Err(BlobStoreError::invalid_ref(raw))
    }
}

#[async_trait]
impl BlobStore for CapStdBlobStore {
    async fn save(&self, bytes: &[u8], name: &str) -> Result<BlobRef, BlobStoreError> {
        let file_name = format!("{}-{}", Uuid::new_v4(), sanitise(name));
        self.root.write(&file_name, bytes).map_err(io_error)?;

        let digest = hex::encode(Sha256::digest(bytes));
        debug!(blob_ref = %file_name, size = bytes.len(), sha256 = %digest, "saved blob");
        Ok(BlobRef::new(file_name))
    }

    async fn delete(&self, blob_ref: &BlobRef) -> Result<(), BlobStoreError> {
        let name = checked_name(blob_ref)?;
        match self.root.remove_file(name) {
            Ok(()) => {
                debug!(blob_ref = %blob_ref, "deleted blob");
                Ok(())
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(io_error(error)),
        }
    }
}
