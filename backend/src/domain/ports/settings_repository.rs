//! Port for per-user settings storage.
use async_trait::async_trait;

use crate::domain::{Settings, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by settings repository adapters.
    pub enum SettingsRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "settings repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "settings repository query failed: {message}",
        /// The owning user does not exist.
        MissingUser { user_id: UserId } => "user {user_id} does not exist",
        /// Concurrent transaction invalidated the observed state.
        StaleState { message: String } =>
            "settings repository state changed concurrently: {message}",
    }
}

/// Storage for the validated settings map of each user.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Fetch the stored map, if any.
    async fn find(&self, user_id: UserId) -> Result<Option<Settings>, SettingsRepositoryError>;

    /// Merge `update` over the stored map in one transaction, creating the
    /// row when absent. Returns the merged map.
    async fn merge(
        &self,
        user_id: UserId,
        update: &Settings,
    ) -> Result<Settings, SettingsRepositoryError>;

    /// Delete the stored map. Returns `false` when nothing was stored.
    async fn delete(&self, user_id: UserId) -> Result<bool, SettingsRepositoryError>;
}
