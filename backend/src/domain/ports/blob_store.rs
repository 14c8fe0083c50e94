//! Port for attachment byte storage.
use async_trait::async_trait;

use crate::domain::BlobRef;

use super::define_port_error;

define_port_error! {
    /// Errors raised by blob store adapters.
    pub enum BlobStoreError {
        /// The backing store failed to read or write.
        Io { message: String } => "blob store i/o failed: {message}",
        /// The reference does not name a blob this store issued.
        InvalidRef { blob_ref: String } => "blob reference '{blob_ref}' is not valid",
    }
}

/// Opaque byte storage addressed by [`BlobRef`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist `bytes` and return a reference. `name` is a hint only.
    async fn save(&self, bytes: &[u8], name: &str) -> Result<BlobRef, BlobStoreError>;

    /// Remove a blob. Deleting an absent blob succeeds.
    async fn delete(&self, blob_ref: &BlobRef) -> Result<(), BlobStoreError>;
}

/// Fixture store that keeps nothing and echoes the name as the reference.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureBlobStore;

#[async_trait]
impl BlobStore for FixtureBlobStore {
    async fn save(&self, _bytes: &[u8], name: &str) -> Result<BlobRef, BlobStoreError> {
        Ok(BlobRef::new(format!("fixture/{name}")))
    }

    async fn delete(&self, _blob_ref: &BlobRef) -> Result<(), BlobStoreError> {
        Ok(())
    }
}
