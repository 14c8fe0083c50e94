//! Port for the follow graph and its cached counters.
use async_trait::async_trait;

use crate::domain::{CounterFloor, FollowEdge, FollowRecount, UserId, UserSummary};

use super::define_port_error;

define_port_error! {
    /// Errors raised by follow repository adapters.
    pub enum FollowRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "follow repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "follow repository query failed: {message}",
        /// The followed user does not exist.
        MissingUser { user_id: UserId } => "user {user_id} does not exist",
        /// The edge is already present.
        DuplicateEdge { follower_id: UserId, followed_id: UserId } =>
            "user {follower_id} already follows user {followed_id}",
        /// The edge is not present.
        MissingEdge { follower_id: UserId, followed_id: UserId } =>
            "user {follower_id} does not follow user {followed_id}",
        /// Concurrent transaction invalidated the observed state.
        StaleState { message: String } => "follow graph changed concurrently: {message}",
    }
}

/// Follow edges plus the `followers_count`/`following_count` projections.
///
/// Every mutating method commits the edge change and both counter deltas
/// atomically.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Insert `edge` and increment both counters.
    async fn insert_edge(&self, edge: &FollowEdge) -> Result<(), FollowRepositoryError>;

    /// Delete `edge` and decrement both counters, floored at zero.
    async fn remove_edge(&self, edge: &FollowEdge) -> Result<CounterFloor, FollowRepositoryError>;

    /// Users following `user_id`, by ascending id.
    async fn list_followers(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UserSummary>, FollowRepositoryError>;

    /// Users followed by `user_id`, by ascending id.
    async fn list_following(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UserSummary>, FollowRepositoryError>;

    /// Overwrite both counters of `user_id` with values counted from edges.
    async fn recount(&self, user_id: UserId) -> Result<FollowRecount, FollowRepositoryError>;
}
