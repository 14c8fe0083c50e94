//! Port abstraction for user and profile persistence adapters.
use async_trait::async_trait;

use crate::domain::{BlobRef, NewUser, User, UserChanges, UserId, UserProfile};

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by user repository adapters.
    pub enum UserRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "user repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "user repository query failed: {message}",
        /// A unique column already holds the value.
        Duplicate { field: String } => "a user with this {field} already exists",
        /// The user row does not exist.
        MissingUser { user_id: UserId } => "user {user_id} does not exist",
        /// The user already has a profile.
        DuplicateProfile { user_id: UserId } => "user {user_id} already has a profile",
        /// The user has no profile.
        MissingProfile { user_id: UserId } => "user {user_id} has no profile",
        /// Concurrent transaction invalidated the observed state.
        StaleState { message: String } => "user repository state changed concurrently: {message}",
    }
}

/// Storage for accounts and their 1:1 profiles.
///
/// Counter columns are only written by [`UserRepository::delete_user`], which
/// releases what the departing user contributed to other rows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new account with zeroed counters and no admin flag.
    async fn insert_user(&self, user: &NewUser) -> Result<User, UserRepositoryError>;

    /// Fetch a user by identifier.
    async fn find_user(&self, id: UserId) -> Result<Option<User>, UserRepositoryError>;

    /// All users ordered by id.
    async fn list_users(&self) -> Result<Vec<User>, UserRepositoryError>;

    /// Apply a partial update.
    ///
    /// Fails with [`UserRepositoryError::MissingUser`] when the row is gone and
    /// with [`UserRepositoryError::Duplicate`] when a unique column collides.
    async fn update_user(
        &self,
        id: UserId,
        changes: &UserChanges,
    ) -> Result<User, UserRepositoryError>;

    /// Delete a user together with everything that references them.
    ///
    /// In the same transaction, followers and followed users lose the edge
    /// from their follow counters, and posts the user rated or commented on
    /// lose those contributions. Returns the blobs of every attachment row
    /// removed.
    async fn delete_user(&self, id: UserId) -> Result<Vec<BlobRef>, UserRepositoryError>;

    /// Insert a profile, failing when one already exists.
    async fn insert_profile(&self, profile: &UserProfile) -> Result<(), UserRepositoryError>;

    /// Fetch the profile of `user_id`.
    async fn find_profile(
        &self,
        user_id: UserId,
    ) -> Result<Option<UserProfile>, UserRepositoryError>;

    /// Overwrite an existing profile.
    async fn update_profile(&self, profile: &UserProfile) -> Result<(), UserRepositoryError>;

    /// Remove the profile of `user_id`.
    async fn delete_profile(&self, user_id: UserId) -> Result<(), UserRepositoryError>;

    /// All profiles ordered by user id.
    async fn list_profiles(&self) -> Result<Vec<UserProfile>, UserRepositoryError>;
}
