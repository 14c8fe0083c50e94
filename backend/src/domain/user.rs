//! User accounts and profiles.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::UserId;

/// Validation errors returned by the account value constructors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserValidationError {
    /// Username was blank once trimmed.
    #[error("username must not be empty")]
    EmptyUsername,
    /// Username is shorter than [`USERNAME_MIN`].
    #[error("username must be at least {min} characters")]
    UsernameTooShort {
        /// Minimum accepted length.
        min: usize,
    },
    /// Username is longer than [`USERNAME_MAX`].
    #[error("username must be at most {max} characters")]
    UsernameTooLong {
        /// Maximum accepted length.
        max: usize,
    },
    /// Username contains characters outside `[A-Za-z0-9_.-]`.
    #[error("username may only contain letters, numbers, '_', '.' or '-'")]
    UsernameInvalidCharacters,
    /// Email does not have a `local@domain` shape.
    #[error("email address is malformed")]
    InvalidEmail,
    /// Password was empty.
    #[error("password must not be empty")]
    EmptyPassword,
}

/// Minimum allowed length for a username.
pub const USERNAME_MIN: usize = 3;
/// Maximum allowed length for a username.
pub const USERNAME_MAX: usize = 80;

/// Unique login handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Validate and construct a [`Username`].
    ///
    /// # Examples
    /// ```
    /// use postboard::domain::Username;
    ///
    /// assert!(Username::new("ada_l").is_ok());
    /// assert!(Username::new("a b").is_err());
    /// ```
    pub fn new(raw: impl Into<String>) -> Result<Self, UserValidationError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(UserValidationError::EmptyUsername);
        }
        let length = trimmed.chars().count();
        if length < USERNAME_MIN {
            return Err(UserValidationError::UsernameTooShort { min: USERNAME_MIN });
        }
        if length > USERNAME_MAX {
            return Err(UserValidationError::UsernameTooLong { max: USERNAME_MAX });
        }
        let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-');
        if !trimmed.chars().all(allowed) {
            return Err(UserValidationError::UsernameInvalidCharacters);
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

impl TryFrom<String> for Username {
    type Error = UserValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Unique contact address, stored lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Validate and normalise an email address.
    pub fn new(raw: impl Into<String>) -> Result<Self, UserValidationError> {
        let raw = raw.into();
        let normalised = raw.trim().to_lowercase();
        let Some((local, domain)) = normalised.split_once('@') else {
            return Err(UserValidationError::InvalidEmail);
        };
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(UserValidationError::InvalidEmail);
        }
        if normalised.chars().any(char::is_whitespace) {
            return Err(UserValidationError::InvalidEmail);
        }
        Ok(Self(normalised))
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = UserValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Opaque credential hash produced by a
/// [`CredentialHasher`](crate::domain::ports::CredentialHasher).
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Wrap an encoded hash string.
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Encoded hash string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(..)")
    }
}

/// Application user.
///
/// ## Invariants
/// - `followers_count` and `following_count` mirror the follow edge set and
///   are only moved by the follow operations or a recount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Store-assigned identifier.
    pub id: UserId,
    /// Unique login handle.
    pub username: Username,
    /// Unique contact address.
    pub email: EmailAddress,
    /// Hashed credential.
    pub password_hash: PasswordHash,
    /// Optional avatar reference.
    pub profile_pic: Option<String>,
    /// Number of users following this user.
    pub followers_count: u32,
    /// Number of users this user follows.
    pub following_count: u32,
    /// Grants the admin override and admin-only operations.
    pub is_admin: bool,
}

/// Public projection of a [`User`] without the credential hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    /// Store-assigned identifier.
    pub id: UserId,
    /// Unique login handle.
    pub username: Username,
    /// Optional avatar reference.
    pub profile_pic: Option<String>,
    /// Number of followers.
    pub followers_count: u32,
    /// Number of followed users.
    pub following_count: u32,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            profile_pic: user.profile_pic.clone(),
            followers_count: user.followers_count,
            following_count: user.following_count,
        }
    }
}

/// Validated account fields ready for insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Requested login handle.
    pub username: Username,
    /// Contact address.
    pub email: EmailAddress,
    /// Hashed credential.
    pub password_hash: PasswordHash,
    /// Optional avatar reference.
    pub profile_pic: Option<String>,
}

/// Partial update of account fields. Counters are deliberately absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    /// New login handle.
    pub username: Option<Username>,
    /// New contact address.
    pub email: Option<EmailAddress>,
    /// New credential hash.
    pub password_hash: Option<PasswordHash>,
    /// New avatar reference; `Some(None)` clears it.
    pub profile_pic: Option<Option<String>>,
}

impl UserChanges {
    /// True when no field would change.
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.profile_pic.is_none()
    }
}

/// Extended profile, at most one per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Owning user; doubles as the profile key.
    pub user_id: UserId,
    /// Free-form biography.
    pub bio: Option<String>,
    /// Free-form social links.
    pub social_links: Option<String>,
    /// Optional avatar reference.
    pub profile_pic: Option<String>,
}

/// Profile fields supplied on create or update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFields {
    /// Biography text.
    pub bio: Option<String>,
    /// Social links text.
    pub social_links: Option<String>,
    /// Avatar reference.
    pub profile_pic: Option<String>,
}

impl ProfileFields {
    /// True when no field is supplied.
    pub fn is_empty(&self) -> bool {
        self.bio.is_none() && self.social_links.is_none() && self.profile_pic.is_none()
    }

    /// Overlay the supplied fields onto an existing profile.
    pub fn apply_to(self, profile: &mut UserProfile) {
        if let Some(bio) = self.bio {
            profile.bio = Some(bio);
        }
        if let Some(links) = self.social_links {
            profile.social_links = Some(links);
        }
        if let Some(pic) = self.profile_pic {
            profile.profile_pic = Some(pic);
        }
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", UserValidationError::EmptyUsername)]
    #[case("  ", UserValidationError::EmptyUsername)]
    #[case("ab", UserValidationError::UsernameTooShort { min: USERNAME_MIN })]
    #[case("bad name", UserValidationError::UsernameInvalidCharacters)]
    #[case("emoji🙂", UserValidationError::UsernameInvalidCharacters)]
    fn invalid_usernames_are_rejected(#[case] raw: &str, #[case] expected: UserValidationError) {
        assert_eq!(Username::new(raw), Err(expected));
    }

    #[rstest]
    fn username_is_trimmed() {
        let name = Username::new("  grace.h  ").expect("valid username");
        assert_eq!(name.as_ref(), "grace.h");
    }

    #[rstest]
    fn overlong_username_is_rejected() {
        let raw = "a".repeat(USERNAME_MAX + 1);
        assert_eq!(
            Username::new(raw),
            Err(UserValidationError::UsernameTooLong { max: USERNAME_MAX })
        );
    }

    #[rstest]
    #[case("no-at-sign")]
    #[case("@example.com")]
    #[case("user@")]
    #[case("a@b@c")]
    #[case("sp ace@example.com")]
    fn malformed_emails_are_rejected(#[case] raw: &str) {
        assert_eq!(EmailAddress::new(raw), Err(UserValidationError::InvalidEmail));
    }

    #[rstest]
    fn email_is_normalised_to_lower_case() {
        let email = EmailAddress::new(" Ada@Example.COM ").expect("valid email");
        assert_eq!(email.as_ref(), "ada@example.com");
    }

    #[rstest]
    fn password_hash_debug_is_redacted() {
        let hash = PasswordHash::new("$argon2id$secret");
        assert_eq!(format!("{hash:?}"), "PasswordHash(..)");
    }

    #[rstest]
    fn profile_fields_overlay_only_supplied_values() {
        let mut profile = UserProfile {
            user_id: UserId::new(1).expect("id"),
            bio: Some("old".to_owned()),
            social_links: Some("links".to_owned()),
            profile_pic: None,
        };
        ProfileFields {
            bio: Some("new".to_owned()),
            ..ProfileFields::default()
        }
        .apply_to(&mut profile);

        assert_eq!(profile.bio.as_deref(), Some("new"));
        assert_eq!(profile.social_links.as_deref(), Some("links"));
    }
}
