//! Port exposing the authenticated identity of the current request.
//!
//! Token issuance, verification and revocation happen outside the core; an
//! adapter only reports which user, if any, the request is acting as.

use crate::domain::UserId;

/// Source of the authenticated user identifier.
#[cfg_attr(test, mockall::automock)]
pub trait AuthContext: Send + Sync {
    /// Identifier of the signed-in user, or `None` for anonymous requests.
    fn current_user_id(&self) -> Option<UserId>;
}

/// Context with a fixed identity, for tests and maintenance tools.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FixedAuthContext(Option<UserId>);

impl FixedAuthContext {
    /// Context with no signed-in user.
    pub fn anonymous() -> Self {
        Self(None)
    }

    /// Context signed in as `user_id`.
    pub fn signed_in(user_id: UserId) -> Self {
        Self(Some(user_id))
    }
}

impl AuthContext for FixedAuthContext {
    fn current_user_id(&self) -> Option<UserId> {
        self.0
    }
}
