//! Accounts, profiles and settings.
//!
//! Account rows carry the follow counters, but this service never writes
//! them: [`UserChanges`] has no counter fields, so the only paths that move
//! them are the follow operations, their recount and account deletion.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::debug;

use crate::domain::attachment_service::release_orphaned_blobs;
use crate::domain::ports::{
    BlobStore, CredentialHasher, CredentialHasherError, SettingsRepository, SettingsRepositoryError,
    UserRepository, UserRepositoryError,
};
use crate::domain::{
    AccountChanges, AdminOverride, Caller, Error, NewAccount, NewUser, PlainPassword,
    ProfileFields, ServiceResult, Settings, SettingsValidationError, User, UserChanges, UserId,
    UserProfile, UserSummary, UserValidationError, authorize,
};

/// Account service implementing registration, profile and settings
/// operations.
#[derive(Clone)]
pub struct AccountService<U, S, H, B> {
    users: Arc<U>,
    settings: Arc<S>,
    hasher: Arc<H>,
    blobs: Arc<B>,
}

impl<U, S, H, B> AccountService<U, S, H, B> {
    /// Create a new service. `blobs` holds the bytes of the attachments a
    /// deleted account leaves behind.
    pub fn new(users: Arc<U>, settings: Arc<S>, hasher: Arc<H>, blobs: Arc<B>) -> Self {
        Self {
            users,
            settings,
            hasher,
            blobs,
        }
    }
}

fn map_user_validation_error(err: UserValidationError) -> Error {
    Error::invalid_argument(err.to_string())
}

fn map_settings_validation_error(err: SettingsValidationError) -> Error {
    let details = match &err {
        SettingsValidationError::NotAnObject => json!({ "code": "not_an_object" }),
        SettingsValidationError::UnknownKey { key } => {
            json!({ "code": "unknown_key", "key": key })
        }
        SettingsValidationError::WrongKind { key, expected } => {
            json!({ "code": "wrong_kind", "key": key.as_str(), "expected": expected })
        }
    };
    Error::invalid_argument(err.to_string()).with_details(details)
}

impl<U, S, H, B> AccountService<U, S, H, B>
where
    U: UserRepository,
    S: SettingsRepository,
    H: CredentialHasher,
    B: BlobStore,
{
    fn map_user_error(error: UserRepositoryError) -> Error {
        match error {
            UserRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("user repository unavailable: {message}"))
            }
            UserRepositoryError::Query { message } => {
                Error::internal(format!("user repository error: {message}"))
            }
            UserRepositoryError::StaleState { message } => {
                Error::conflict(format!("user changed concurrently: {message}"))
            }
            UserRepositoryError::Duplicate { field } => {
                Error::already_exists(format!("a user with this {field} already exists"))
                    .with_details(json!({ "field": field }))
            }
            err @ UserRepositoryError::DuplicateProfile { .. } => {
                Error::already_exists(err.to_string())
            }
            err @ (UserRepositoryError::MissingUser { .. }
            | UserRepositoryError::MissingProfile { .. }) => Error::not_found(err.to_string()),
        }
    }

    fn map_settings_error(error: SettingsRepositoryError) -> Error {
        match error {
            SettingsRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("settings repository unavailable: {message}"))
            }
            SettingsRepositoryError::Query { message } => {
                Error::internal(format!("settings repository error: {message}"))
            }
            SettingsRepositoryError::StaleState { message } => {
                Error::conflict(format!("settings changed concurrently: {message}"))
            }
            err @ SettingsRepositoryError::MissingUser { .. } => Error::not_found(err.to_string()),
        }
    }

    fn map_hasher_error(error: CredentialHasherError) -> Error {
        Error::internal(error.to_string())
    }

    // Accounts

    /// Register a new account with zeroed counters and no admin flag.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        profile_pic: Option<String>,
    ) -> ServiceResult<User> {
        let account = NewAccount::try_from_parts(username, email, password, profile_pic)
            .map_err(map_user_validation_error)?;
        let password_hash = self
            .hasher
            .hash(&account.password)
            .map_err(Self::map_hasher_error)?;
        let user = self
            .users
            .insert_user(&NewUser {
                username: account.username,
                email: account.email,
                password_hash,
                profile_pic: account.profile_pic,
            })
            .await
            .map_err(Self::map_user_error)?;
        debug!(user = %user.id, "account registered");
        Ok(user)
    }

    /// Fetch an account.
    pub async fn get_user(&self, user_id: UserId) -> ServiceResult<User> {
        self.users
            .find_user(user_id)
            .await
            .map_err(Self::map_user_error)?
            .ok_or_else(|| Error::not_found(format!("user {user_id} does not exist")))
    }

    /// Public summaries of every account.
    pub async fn list_users(&self) -> ServiceResult<Vec<UserSummary>> {
        let users = self
            .users
            .list_users()
            .await
            .map_err(Self::map_user_error)?;
        Ok(users.iter().map(UserSummary::from).collect())
    }

    /// Update account fields. Owner or admin; a new password is rehashed.
    pub async fn update_user(
        &self,
        caller: &Caller,
        user_id: UserId,
        changes: AccountChanges,
    ) -> ServiceResult<User> {
        authorize(caller, user_id, AdminOverride::Allowed)?;
        let password_hash = changes
            .password
            .as_ref()
            .map(|password| self.hasher.hash(password))
            .transpose()
            .map_err(Self::map_hasher_error)?;
        let changes = UserChanges {
            username: changes.username,
            email: changes.email,
            password_hash,
            profile_pic: changes.profile_pic,
        };
        if changes.is_empty() {
            return Err(Error::invalid_argument("no account fields supplied"));
        }
        let user = self
            .users
            .update_user(user_id, &changes)
            .await
            .map_err(Self::map_user_error)?;
        debug!(user = %user_id, "account updated");
        Ok(user)
    }

    /// Delete an account and everything hanging off it. Owner or admin.
    pub async fn delete_user(&self, caller: &Caller, user_id: UserId) -> ServiceResult<()> {
        authorize(caller, user_id, AdminOverride::Allowed)?;
        let orphaned = self
            .users
            .delete_user(user_id)
            .await
            .map_err(Self::map_user_error)?;
        release_orphaned_blobs(self.blobs.as_ref(), &orphaned).await;
        debug!(user = %user_id, attachments = orphaned.len(), "account deleted");
        Ok(())
    }

    /// Verify a password. Unknown users and wrong passwords are both
    /// `Unauthorized`.
    pub async fn check_password(&self, user_id: UserId, password: &str) -> ServiceResult<()> {
        let rejected = || Error::unauthorized("invalid credentials");
        let password = PlainPassword::new(password).map_err(|_| rejected())?;
        let user = self
            .users
            .find_user(user_id)
            .await
            .map_err(Self::map_user_error)?
            .ok_or_else(rejected)?;
        let verified = self
            .hasher
            .verify(&password, &user.password_hash)
            .map_err(Self::map_hasher_error)?;
        if verified { Ok(()) } else { Err(rejected()) }
    }

    // Profiles

    /// Create the caller's profile.
    pub async fn create_profile(
        &self,
        caller: &Caller,
        fields: ProfileFields,
    ) -> ServiceResult<UserProfile> {
        let mut profile = UserProfile {
            user_id: caller.id,
            bio: None,
            social_links: None,
            profile_pic: None,
        };
        fields.apply_to(&mut profile);
        self.users
            .insert_profile(&profile)
            .await
            .map_err(Self::map_user_error)?;
        debug!(user = %caller.id, "profile created");
        Ok(profile)
    }

    /// Fetch a profile.
    pub async fn get_profile(&self, user_id: UserId) -> ServiceResult<UserProfile> {
        self.users
            .find_profile(user_id)
            .await
            .map_err(Self::map_user_error)?
            .ok_or_else(|| Error::not_found(format!("user {user_id} has no profile")))
    }

    /// Fetch the caller's profile.
    pub async fn my_profile(&self, caller: &Caller) -> ServiceResult<UserProfile> {
        self.get_profile(caller.id).await
    }

    /// Overlay fields onto a profile. Owner only; at least one field.
    pub async fn update_profile(
        &self,
        caller: &Caller,
        user_id: UserId,
        fields: ProfileFields,
    ) -> ServiceResult<UserProfile> {
        if fields.is_empty() {
            return Err(Error::invalid_argument(
                "at least one of bio, socialLinks or profilePic is required",
            ));
        }
        authorize(caller, user_id, AdminOverride::NotApplicable)?;
        let mut profile = self.get_profile(user_id).await?;
        fields.apply_to(&mut profile);
        self.users
            .update_profile(&profile)
            .await
            .map_err(Self::map_user_error)?;
        Ok(profile)
    }

    /// Delete a profile. Owner or admin.
    pub async fn delete_profile(&self, caller: &Caller, user_id: UserId) -> ServiceResult<()> {
        authorize(caller, user_id, AdminOverride::Allowed)?;
        self.users
            .delete_profile(user_id)
            .await
            .map_err(Self::map_user_error)
    }

    /// Every profile.
    pub async fn list_profiles(&self) -> ServiceResult<Vec<UserProfile>> {
        self.users
            .list_profiles()
            .await
            .map_err(Self::map_user_error)
    }

    // Settings

    /// The caller's settings; empty when none are stored.
    pub async fn get_settings(&self, caller: &Caller) -> ServiceResult<Settings> {
        Ok(self
            .settings
            .find(caller.id)
            .await
            .map_err(Self::map_settings_error)?
            .unwrap_or_default())
    }

    /// Validate `raw` and merge it over the caller's stored settings.
    pub async fn upsert_settings(&self, caller: &Caller, raw: &Value) -> ServiceResult<Settings> {
        let update = Settings::from_json(raw).map_err(map_settings_validation_error)?;
        let merged = self
            .settings
            .merge(caller.id, &update)
            .await
            .map_err(Self::map_settings_error)?;
        debug!(user = %caller.id, keys = update.len(), "settings merged");
        Ok(merged)
    }

    /// Delete the caller's settings.
    pub async fn delete_settings(&self, caller: &Caller) -> ServiceResult<()> {
        let deleted = self
            .settings
            .delete(caller.id)
            .await
            .map_err(Self::map_settings_error)?;
        if deleted {
            Ok(())
        } else {
            Err(Error::not_found(format!(
                "user {} has no stored settings",
                caller.id
            )))
        }
    }
}

#[cfg(test)]
#[path = "account_service_tests.rs"]
mod tests;
