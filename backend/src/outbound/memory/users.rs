//! User, profile and settings ports over [`InMemoryStore`].

use async_trait::async_trait;
use tracing::debug;

use crate::domain::ports::{
    SettingsRepository, SettingsRepositoryError, UserRepository, UserRepositoryError,
};
use crate::domain::{BlobRef, NewUser, Settings, User, UserChanges, UserId, UserProfile};

use super::{InMemoryStore, State, next};

/// First unique field the given values would collide on, ignoring `except`.
fn taken_field(
    state: &State,
    username: Option<&str>,
    email: Option<&str>,
    except: Option<UserId>,
) -> Option<&'static str> {
    let others = || {
        state
            .users
            .values()
            .filter(move |user| Some(user.id) != except)
    };
    if username.is_some_and(|name| others().any(|user| user.username.as_ref() == name)) {
        return Some("username");
    }
    if email.is_some_and(|address| others().any(|user| user.email.as_ref() == address)) {
        return Some("email");
    }
    None
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert_user(&self, user: &NewUser) -> Result<User, UserRepositoryError> {
        let mut state = self.lock();
        if let Some(field) = taken_field(
            &state,
            Some(user.username.as_ref()),
            Some(user.email.as_ref()),
            None,
        ) {
            return Err(UserRepositoryError::duplicate(field));
        }

        let id = UserId::from_store(next(&mut state.sequences.users));
        let stored = User {
            id,
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            profile_pic: user.profile_pic.clone(),
            followers_count: 0,
            following_count: 0,
            is_admin: false,
        };
        state.users.insert(id, stored.clone());
        debug!(user_id = %id, "inserted user");
        Ok(stored)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, UserRepositoryError> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, UserRepositoryError> {
        Ok(self.lock().users.values().cloned().collect())
    }

    async fn update_user(
        &self,
        id: UserId,
        changes: &UserChanges,
    ) -> Result<User, UserRepositoryError> {
        let mut state = self.lock();
        if !state.user_exists(id) {
            return Err(UserRepositoryError::missing_user(id));
        }
        if let Some(field) = taken_field(
            &state,
            changes.username.as_ref().map(|name| name.as_ref()),
            changes.email.as_ref().map(|email| email.as_ref()),
            Some(id),
        ) {
            return Err(UserRepositoryError::duplicate(field));
        }

        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| UserRepositoryError::missing_user(id))?;
        if let Some(username) = &changes.username {
            user.username = username.clone();
        }
        if let Some(email) = &changes.email {
            user.email = email.clone();
        }
        if let Some(hash) = &changes.password_hash {
            user.password_hash = hash.clone();
        }
        if let Some(pic) = &changes.profile_pic {
            user.profile_pic = pic.clone();
        }
        Ok(user.clone())
    }

    async fn delete_user(&self, id: UserId) -> Result<Vec<BlobRef>, UserRepositoryError> {
        let mut orphaned = Vec::new();
        if self.lock().cascade_user(id, &mut orphaned).is_none() {
            return Err(UserRepositoryError::missing_user(id));
        }
        debug!(user_id = %id, blobs = orphaned.len(), "deleted user");
        Ok(orphaned)
    }

    async fn insert_profile(&self, profile: &UserProfile) -> Result<(), UserRepositoryError> {
        let mut state = self.lock();
        if !state.user_exists(profile.user_id) {
            return Err(UserRepositoryError::missing_user(profile.user_id));
        }
        if state.profiles.contains_key(&profile.user_id) {
            return Err(UserRepositoryError::duplicate_profile(profile.user_id));
        }
        state.profiles.insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn find_profile(
        &self,
        user_id: UserId,
    ) -> Result<Option<UserProfile>, UserRepositoryError> {
        Ok(self.lock().profiles.get(&user_id).cloned())
    }

    async fn update_profile(&self, profile: &UserProfile) -> Result<(), UserRepositoryError> {
        let mut state = self.lock();
        let stored = state
            .profiles
            .get_mut(&profile.user_id)
            .ok_or_else(|| UserRepositoryError::missing_profile(profile.user_id))?;
        *stored = profile.clone();
        Ok(())
    }

    async fn delete_profile(&self, user_id: UserId) -> Result<(), UserRepositoryError> {
        self.lock()
            .profiles
            .remove(&user_id)
            .map(|_| ())
            .ok_or_else(|| UserRepositoryError::missing_profile(user_id))
    }

    async fn list_profiles(&self) -> Result<Vec<UserProfile>, UserRepositoryError> {
        Ok(self.lock().profiles.values().cloned().collect())
    }
}

#[async_trait]
impl SettingsRepository for InMemoryStore {
    async fn find(&self, user_id: UserId) -> Result<Option<Settings>, SettingsRepositoryError> {
        Ok(self.lock().settings.get(&user_id).cloned())
    }

    async fn merge(
        &self,
        user_id: UserId,
        update: &Settings,
    ) -> Result<Settings, SettingsRepositoryError> {
        let mut state = self.lock();
        if !state.user_exists(user_id) {
            return Err(SettingsRepositoryError::missing_user(user_id));
        }
        let stored = state.settings.entry(user_id).or_default();
        stored.merge(update.clone());
        Ok(stored.clone())
    }

    async fn delete(&self, user_id: UserId) -> Result<bool, SettingsRepositoryError> {
        Ok(self.lock().settings.remove(&user_id).is_some())
    }
}
