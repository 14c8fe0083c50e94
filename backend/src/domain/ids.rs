//! Store-assigned identifiers.
//!
//! Every entity is keyed by a positive 64-bit integer allocated by the
//! store. Each entity family gets its own newtype so a `PostId` can never be
//! passed where a `UserId` is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when an identifier is zero or negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{kind} must be a positive integer, got {value}")]
pub struct InvalidIdError {
    /// Name of the identifier type that rejected the value.
    pub kind: &'static str,
    /// The rejected raw value.
    pub value: i64,
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "i64", into = "i64")]
        pub struct $name(i64);

        impl $name {
            /// Validate and wrap a raw identifier.
            pub fn new(value: i64) -> Result<Self, InvalidIdError> {
                if value <= 0 {
                    return Err(InvalidIdError {
                        kind: stringify!($name),
                        value,
                    });
                }
                Ok(Self(value))
            }

            /// Wrap a value read back from the store, which only hands out
            /// positive keys.
            pub(crate) fn from_store(value: i64) -> Self {
                Self(value)
            }

            /// Raw integer value.
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl TryFrom<i64> for $name {
            type Error = InvalidIdError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }
    };
}

define_id!(
    /// Identifier of a registered user.
    UserId
);
define_id!(
    /// Identifier of a post.
    PostId
);
define_id!(
    /// Identifier of a post category.
    CategoryId
);
define_id!(
    /// Identifier of a tag.
    TagId
);
define_id!(
    /// Identifier of a comment.
    CommentId
);
define_id!(
    /// Identifier of a rating row.
    RatingId
);
define_id!(
    /// Identifier of a notification.
    NotificationId
);
define_id!(
    /// Identifier of a private message.
    MessageId
);
define_id!(
    /// Identifier of an attachment metadata row.
    AttachmentId
);
