//! Ownership and admin checks shared by every mutating operation.
//!
//! The guard functions are pure: services load the owning row, then ask the
//! guard whether the resolved [`Caller`] may act on it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ports::{AuthContext, UserRepository, UserRepositoryError};
use super::{Error, User, UserId};

/// Authenticated principal performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caller {
    /// Authenticated user.
    pub id: UserId,
    /// Whether the user holds the admin flag.
    pub is_admin: bool,
}

impl Caller {
    /// Caller without admin rights.
    pub fn user(id: UserId) -> Self {
        Self {
            id,
            is_admin: false,
        }
    }

    /// Caller with admin rights.
    pub fn admin(id: UserId) -> Self {
        Self { id, is_admin: true }
    }
}

impl From<&User> for Caller {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            is_admin: user.is_admin,
        }
    }
}

/// Whether an admin may act on a row they do not own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminOverride {
    /// Admins may act on any row.
    Allowed,
    /// Only the owner may act.
    NotApplicable,
}

/// Allow the owner, or an admin when the override applies.
///
/// # Examples
/// ```
/// use postboard::domain::{AdminOverride, Caller, UserId, authorize};
///
/// let owner = UserId::new(1).unwrap();
/// let admin = Caller::admin(UserId::new(2).unwrap());
/// assert!(authorize(&admin, owner, AdminOverride::Allowed).is_ok());
/// assert!(authorize(&admin, owner, AdminOverride::NotApplicable).is_err());
/// ```
pub fn authorize(caller: &Caller, owner_id: UserId, admin: AdminOverride) -> Result<(), Error> {
    if caller.id == owner_id {
        return Ok(());
    }
    if admin == AdminOverride::Allowed && caller.is_admin {
        debug!(caller = %caller.id, owner = %owner_id, "admin override applied");
        return Ok(());
    }
    Err(Error::forbidden(format!(
        "user {} may not act on a resource owned by user {owner_id}",
        caller.id
    )))
}

/// Allow admins only.
pub fn require_admin(caller: &Caller) -> Result<(), Error> {
    if caller.is_admin {
        Ok(())
    } else {
        Err(Error::forbidden("admin privileges required"))
    }
}

/// Load the [`Caller`] behind the current authentication context.
///
/// An anonymous context and a token whose user no longer exists are both
/// `Unauthorized`.
pub async fn resolve_caller<A, U>(auth: &A, users: &U) -> Result<Caller, Error>
where
    A: AuthContext + ?Sized,
    U: UserRepository + ?Sized,
{
    let user_id = auth
        .current_user_id()
        .ok_or_else(|| Error::unauthorized("authentication required"))?;
    let user = users
        .find_user(user_id)
        .await
        .map_err(map_lookup_error)?
        .ok_or_else(|| Error::unauthorized(format!("user {user_id} is no longer registered")))?;
    Ok(Caller::from(&user))
}

fn map_lookup_error(error: UserRepositoryError) -> Error {
    match error {
        UserRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("user repository unavailable: {message}"))
        }
        other => Error::internal(format!("user repository error: {other}")),
    }
}
