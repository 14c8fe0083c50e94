//! Follow graph values.

use serde::{Deserialize, Serialize};

use super::UserId;

/// Returned when a user tries to follow themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("user {0} cannot follow themselves")]
pub struct SelfFollowError(pub UserId);

/// Directed follow edge `follower → followed`.
///
/// ## Invariants
/// - `follower_id != followed_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowEdge {
    follower_id: UserId,
    followed_id: UserId,
}

impl FollowEdge {
    /// Build an edge, rejecting self-loops.
    ///
    /// # Examples
    /// ```
    /// use postboard::domain::{FollowEdge, UserId};
    ///
    /// let a = UserId::new(1).unwrap();
    /// let b = UserId::new(2).unwrap();
    /// assert!(FollowEdge::new(a, b).is_ok());
    /// assert!(FollowEdge::new(a, a).is_err());
    /// ```
    pub fn new(follower_id: UserId, followed_id: UserId) -> Result<Self, SelfFollowError> {
        if follower_id == followed_id {
            return Err(SelfFollowError(follower_id));
        }
        Ok(Self {
            follower_id,
            followed_id,
        })
    }

    /// The following user.
    pub fn follower_id(&self) -> UserId {
        self.follower_id
    }

    /// The followed user.
    pub fn followed_id(&self) -> UserId {
        self.followed_id
    }
}

/// Cached follow counters of one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowCounts {
    /// Users following this user.
    pub followers: u32,
    /// Users this user follows.
    pub following: u32,
}

/// Result of reconciling a user's follow counters with the edge set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowRecount {
    /// Reconciled user.
    pub user_id: UserId,
    /// Cached values before the recount.
    pub before: FollowCounts,
    /// Values recomputed from edges.
    pub after: FollowCounts,
}

/// Whether a decrement hit the zero floor.
///
/// A clamped decrement means the cached counter had drifted below the row
/// count it summarises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterFloor {
    /// Every decrement had room.
    Respected,
    /// At least one counter was already zero and stayed there.
    Clamped,
}

impl CounterFloor {
    /// Combine the outcome of two decrements.
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::Respected, Self::Respected) => Self::Respected,
            _ => Self::Clamped,
        }
    }

    /// Floor outcome for decrementing `current` by one.
    pub fn of(current: u32) -> Self {
        if current == 0 {
            Self::Clamped
        } else {
            Self::Respected
        }
    }
}
