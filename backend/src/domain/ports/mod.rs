//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod attachment_repository;
mod auth_context;
mod blob_store;
mod content_repository;
mod credential_hasher;
mod engagement_repository;
mod follow_repository;
mod message_cipher;
mod messaging_repository;
mod settings_repository;
mod user_repository;

#[cfg(test)]
pub use attachment_repository::MockAttachmentRepository;
pub use attachment_repository::{AttachmentRepository, AttachmentRepositoryError};
#[cfg(test)]
pub use auth_context::MockAuthContext;
pub use auth_context::{AuthContext, FixedAuthContext};
#[cfg(test)]
pub use blob_store::MockBlobStore;
pub use blob_store::{BlobStore, BlobStoreError, FixtureBlobStore};
#[cfg(test)]
pub use content_repository::MockContentRepository;
pub use content_repository::{ContentRepository, ContentRepositoryError};
#[cfg(test)]
pub use credential_hasher::MockCredentialHasher;
pub use credential_hasher::{CredentialHasher, CredentialHasherError, FixtureCredentialHasher};
#[cfg(test)]
pub use engagement_repository::MockEngagementRepository;
pub use engagement_repository::{EngagementRepository, EngagementRepositoryError};
#[cfg(test)]
pub use follow_repository::MockFollowRepository;
pub use follow_repository::{FollowRepository, FollowRepositoryError};
#[cfg(test)]
pub use message_cipher::MockMessageCipher;
pub use message_cipher::{FixtureMessageCipher, MessageCipher, MessageCipherError};
#[cfg(test)]
pub use messaging_repository::MockMessagingRepository;
pub use messaging_repository::{MessagingRepository, MessagingRepositoryError};
#[cfg(test)]
pub use settings_repository::MockSettingsRepository;
pub use settings_repository::{SettingsRepository, SettingsRepositoryError};
#[cfg(test)]
pub use user_repository::MockUserRepository;
pub use user_repository::{UserRepository, UserRepositoryError};
