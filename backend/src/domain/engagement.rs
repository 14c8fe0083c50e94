//! Ratings, favourites and the rating state machine.
//!
//! Each `(post, user)` pair is in one of three states: absent, liked or
//! disliked. [`RatingTransition::plan`] is the single transition table used by
//! both the rate and the update-rating operations; persistence adapters apply
//! a planned transition atomically together with its [`CounterDelta`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{PostCounters, PostId, RatingId, UserId};

/// Persisted rating status. There is no neutral state: removal deletes the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingStatus {
    /// Counts towards `likes_count`.
    Like,
    /// Counts towards `dislikes_count`.
    Dislike,
}

impl RatingStatus {
    /// Returns the stored string representation.
    ///
    /// # Examples
    /// ```
    /// use postboard::domain::RatingStatus;
    ///
    /// assert_eq!(RatingStatus::Like.as_str(), "like");
    /// assert_eq!("dislike".parse::<RatingStatus>().unwrap(), RatingStatus::Dislike);
    /// ```
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
        }
    }

    /// Counter movement caused by adding one rating with this status.
    fn increment(self) -> CounterDelta {
        match self {
            Self::Like => CounterDelta { likes: 1, dislikes: 0 },
            Self::Dislike => CounterDelta { likes: 0, dislikes: 1 },
        }
    }
}

impl fmt::Display for RatingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown rating status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown rating status: {input}")]
pub struct ParseRatingStatusError {
    /// The unrecognised input value.
    pub input: String,
}

impl FromStr for RatingStatus {
    type Err = ParseRatingStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Self::Like),
            "dislike" => Ok(Self::Dislike),
            _ => Err(ParseRatingStatusError {
                input: s.to_owned(),
            }),
        }
    }
}

/// One user's rating of one post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    /// Store-assigned identifier.
    pub id: RatingId,
    /// Rated post.
    pub post_id: PostId,
    /// Rating owner.
    pub user_id: UserId,
    /// Current status.
    pub status: RatingStatus,
}

/// Signed adjustment to a post's like and dislike counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterDelta {
    /// Change to `likes_count`.
    pub likes: i32,
    /// Change to `dislikes_count`.
    pub dislikes: i32,
}

impl CounterDelta {
    fn negate(self) -> Self {
        Self {
            likes: -self.likes,
            dislikes: -self.dislikes,
        }
    }

    fn plus(self, other: Self) -> Self {
        Self {
            likes: self.likes + other.likes,
            dislikes: self.dislikes + other.dislikes,
        }
    }
}

/// Returned by [`RatingTransition::plan`] when the requested status is
/// already held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("post is already rated '{status}' by this user")]
pub struct AlreadyRated {
    /// The status already held.
    pub status: RatingStatus,
}

/// A planned change to the rating row of one `(post, user)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingTransition {
    /// absent → `status`.
    Insert {
        /// Status of the new row.
        status: RatingStatus,
    },
    /// `from` → `to` on an existing row.
    Switch {
        /// Status observed before the change.
        from: RatingStatus,
        /// Status after the change.
        to: RatingStatus,
    },
}

impl RatingTransition {
    /// Plan the transition from the observed state to the requested status.
    ///
    /// # Examples
    /// ```
    /// use postboard::domain::{RatingStatus, RatingTransition};
    ///
    /// let plan = RatingTransition::plan(Some(RatingStatus::Like), RatingStatus::Dislike)
    ///     .expect("switching is allowed");
    /// assert_eq!(
    ///     plan,
    ///     RatingTransition::Switch { from: RatingStatus::Like, to: RatingStatus::Dislike }
    /// );
    /// assert!(RatingTransition::plan(Some(RatingStatus::Like), RatingStatus::Like).is_err());
    /// ```
    pub fn plan(
        current: Option<RatingStatus>,
        requested: RatingStatus,
    ) -> Result<Self, AlreadyRated> {
        match current {
            None => Ok(Self::Insert { status: requested }),
            Some(status) if status == requested => Err(AlreadyRated { status }),
            Some(from) => Ok(Self::Switch {
                from,
                to: requested,
            }),
        }
    }

    /// State the row must be in for this transition to apply.
    pub fn expected_current(self) -> Option<RatingStatus> {
        match self {
            Self::Insert { .. } => None,
            Self::Switch { from, .. } => Some(from),
        }
    }

    /// Status the row holds after the transition.
    pub fn target(self) -> RatingStatus {
        match self {
            Self::Insert { status } => status,
            Self::Switch { to, .. } => to,
        }
    }

    /// Counter movement that must be co-committed with the row change.
    pub fn delta(self) -> CounterDelta {
        match self {
            Self::Insert { status } => status.increment(),
            Self::Switch { from, to } => from.increment().negate().plus(to.increment()),
        }
    }
}

/// Counter movement for deleting a rating with the given status.
pub fn removal_delta(status: RatingStatus) -> CounterDelta {
    status.increment().negate()
}

/// A favourited post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favourite {
    /// Favouriting user.
    pub user_id: UserId,
    /// Favourited post.
    pub post_id: PostId,
}

/// Result of reconciling a post's cached counters with its rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecount {
    /// Reconciled post.
    pub post_id: PostId,
    /// Cached values before the recount.
    pub before: PostCounters,
    /// Values recomputed from ratings and comments.
    pub after: PostCounters,
}

impl PostRecount {
    /// True when the cached counters had drifted.
    pub fn drifted(&self) -> bool {
        self.before != self.after
    }
}
