//! Follow graph service.
//!
//! Owns the follow edges and the `followers_count`/`following_count`
//! projections on users. Each mutation is a single repository call so the edge
//! and both counters commit together.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::ports::{FollowRepository, FollowRepositoryError};
use crate::domain::{
    Caller, CounterFloor, Error, FollowEdge, FollowRecount, ServiceResult, UserId, UserSummary,
};

/// Relationship service implementing follow, unfollow and recount.
#[derive(Clone)]
pub struct RelationshipService<R> {
    follows: Arc<R>,
}

impl<R> RelationshipService<R> {
    /// Create a new service with the given repository.
    pub fn new(follows: Arc<R>) -> Self {
        Self { follows }
    }
}

impl<R> RelationshipService<R>
where
    R: FollowRepository,
{
    fn map_follow_error(error: FollowRepositoryError) -> Error {
        match error {
            FollowRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("follow repository unavailable: {message}"))
            }
            FollowRepositoryError::Query { message } => {
                Error::internal(format!("follow repository error: {message}"))
            }
            FollowRepositoryError::StaleState { message } => {
                Error::conflict(format!("follow graph changed concurrently: {message}"))
            }
            err @ FollowRepositoryError::MissingUser { .. } => Error::not_found(err.to_string()),
            err @ FollowRepositoryError::DuplicateEdge { .. } => {
                Error::already_exists(err.to_string())
            }
            err @ FollowRepositoryError::MissingEdge { .. } => Error::not_found(err.to_string()),
        }
    }

    /// Make `caller` follow `followed_id`.
    pub async fn follow(&self, caller: &Caller, followed_id: UserId) -> ServiceResult<()> {
        let edge = FollowEdge::new(caller.id, followed_id)
            .map_err(|err| Error::invalid_operation(err.to_string()))?;
        self.follows
            .insert_edge(&edge)
            .await
            .map_err(Self::map_follow_error)?;
        debug!(follower = %caller.id, followed = %followed_id, "follow edge created");
        Ok(())
    }

    /// Remove the edge `caller → followed_id`.
    ///
    /// A self edge can never exist, so asking to remove one is `NotFound`.
    pub async fn unfollow(&self, caller: &Caller, followed_id: UserId) -> ServiceResult<()> {
        let edge = FollowEdge::new(caller.id, followed_id).map_err(|_| {
            Error::not_found(format!("user {} does not follow {followed_id}", caller.id))
        })?;
        let floor = self
            .follows
            .remove_edge(&edge)
            .await
            .map_err(Self::map_follow_error)?;
        if floor == CounterFloor::Clamped {
            warn!(
                follower = %caller.id,
                followed = %followed_id,
                "follow counter was already zero; recount advised"
            );
        }
        debug!(follower = %caller.id, followed = %followed_id, "follow edge removed");
        Ok(())
    }

    /// Users following `user_id`, by ascending id.
    pub async fn list_followers(&self, user_id: UserId) -> ServiceResult<Vec<UserSummary>> {
        self.follows
            .list_followers(user_id)
            .await
            .map_err(Self::map_follow_error)
    }

    /// Users followed by `user_id`, by ascending id.
    pub async fn list_following(&self, user_id: UserId) -> ServiceResult<Vec<UserSummary>> {
        self.follows
            .list_following(user_id)
            .await
            .map_err(Self::map_follow_error)
    }

    /// Rebuild the follow counters of `user_id` from the edge set.
    pub async fn recount_follows(&self, user_id: UserId) -> ServiceResult<FollowRecount> {
        let recount = self
            .follows
            .recount(user_id)
            .await
            .map_err(Self::map_follow_error)?;
        if recount.before != recount.after {
            warn!(
                user = %user_id,
                before = ?recount.before,
                after = ?recount.after,
                "follow counters drifted and were repaired"
            );
        }
        Ok(recount)
    }
}

#[cfg(test)]
#[path = "relationship_service_tests.rs"]
mod tests;
