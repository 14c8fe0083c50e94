//! Authentication primitives: plaintext passwords and registration input.
//!
//! Keep inbound payload parsing outside the domain by exposing constructors
//! that validate string inputs before a handler talks to a service.

use std::fmt;

use zeroize::Zeroizing;

use super::user::{EmailAddress, UserValidationError, Username};

/// Caller-supplied plaintext password.
///
/// ## Invariants
/// - Must be non-empty. Whitespace is preserved to avoid surprising
///   credential comparisons.
/// - The buffer is wiped on drop and never printed.
///
/// # Examples
/// ```
/// use postboard::domain::PlainPassword;
///
/// let password = PlainPassword::new("correct horse").unwrap();
/// assert_eq!(password.expose(), "correct horse");
/// assert_eq!(format!("{password:?}"), "PlainPassword(..)");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct PlainPassword(Zeroizing<String>);

impl PlainPassword {
    /// Validate a raw password.
    pub fn new(raw: impl Into<String>) -> Result<Self, UserValidationError> {
        let raw = Zeroizing::new(raw.into());
        if raw.is_empty() {
            return Err(UserValidationError::EmptyPassword);
        }
        Ok(Self(raw))
    }

    /// Plaintext for handing to a credential hasher.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for PlainPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PlainPassword(..)")
    }
}

/// Validated registration payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    /// Requested login handle.
    pub username: Username,
    /// Contact address.
    pub email: EmailAddress,
    /// Plaintext password, hashed before storage.
    pub password: PlainPassword,
    /// Optional avatar reference.
    pub profile_pic: Option<String>,
}

impl NewAccount {
    /// Construct a registration payload from raw inputs.
    pub fn try_from_parts(
        username: &str,
        email: &str,
        password: &str,
        profile_pic: Option<String>,
    ) -> Result<Self, UserValidationError> {
        Ok(Self {
            username: Username::new(username)?,
            email: EmailAddress::new(email)?,
            password: PlainPassword::new(password)?,
            profile_pic,
        })
    }
}

/// Raw partial account update, validated by the account service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountChanges {
    /// New login handle.
    pub username: Option<Username>,
    /// New contact address.
    pub email: Option<EmailAddress>,
    /// New plaintext password; rehashed before storage.
    pub password: Option<PlainPassword>,
    /// New avatar reference; `Some(None)` clears it.
    pub profile_pic: Option<Option<String>>,
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", "a@b.c", "pw", UserValidationError::EmptyUsername)]
    #[case("ada", "nope", "pw", UserValidationError::InvalidEmail)]
    #[case("ada", "a@b.c", "", UserValidationError::EmptyPassword)]
    fn invalid_registration_inputs(
        #[case] username: &str,
        #[case] email: &str,
        #[case] password: &str,
        #[case] expected: UserValidationError,
    ) {
        let err = NewAccount::try_from_parts(username, email, password, None)
            .expect_err("invalid inputs must fail");
        assert_eq!(err, expected);
    }

    #[rstest]
    #[case("  ada  ", " pass word ")]
    #[case("grace", "correct horse battery staple")]
    fn valid_registration_keeps_password_whitespace(
        #[case] username: &str,
        #[case] password: &str,
    ) {
        let account = NewAccount::try_from_parts(username, "x@example.com", password, None)
            .expect("valid inputs should succeed");
        assert_eq!(account.username.as_ref(), username.trim());
        assert_eq!(account.password.expose(), password);
    }

    #[rstest]
    fn debug_output_hides_the_password() {
        let account = NewAccount::try_from_parts("ada", "a@b.c", "hunter2", None)
            .expect("valid inputs");
        assert!(!format!("{account:?}").contains("hunter2"));
    }
}
