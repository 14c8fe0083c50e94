//! Follow graph port over [`InMemoryStore`].

use async_trait::async_trait;
use tracing::debug;

use crate::domain::ports::{FollowRepository, FollowRepositoryError};
use crate::domain::{
    CounterFloor, FollowCounts, FollowEdge, FollowRecount, UserId, UserSummary,
};

use super::{InMemoryStore, State, count, shift};

fn require_user(state: &State, user_id: UserId) -> Result<(), FollowRepositoryError> {
    if state.user_exists(user_id) {
        Ok(())
    } else {
        Err(FollowRepositoryError::missing_user(user_id))
    }
}

fn summaries(state: &State, ids: impl Iterator<Item = UserId>) -> Vec<UserSummary> {
    let mut listed: Vec<UserSummary> = ids
        .filter_map(|id| state.users.get(&id))
        .map(UserSummary::from)
        .collect();
    listed.sort_by_key(|summary| summary.id);
    listed
}

#[async_trait]
impl FollowRepository for InMemoryStore {
    async fn insert_edge(&self, edge: &FollowEdge) -> Result<(), FollowRepositoryError> {
        let mut state = self.lock();
        require_user(&state, edge.followed_id())?;
        require_user(&state, edge.follower_id())?;

        if !state
            .follows
            .insert((edge.follower_id(), edge.followed_id()))
        {
            return Err(FollowRepositoryError::duplicate_edge(
                edge.follower_id(),
                edge.followed_id(),
            ));
        }
        if let Some(followed) = state.users.get_mut(&edge.followed_id()) {
            followed.followers_count = shift(followed.followers_count, 1);
        }
        if let Some(follower) = state.users.get_mut(&edge.follower_id()) {
            follower.following_count = shift(follower.following_count, 1);
        }

        debug!(
            follower_id = %edge.follower_id(),
            followed_id = %edge.followed_id(),
            "inserted follow edge"
        );
        Ok(())
    }

    async fn remove_edge(&self, edge: &FollowEdge) -> Result<CounterFloor, FollowRepositoryError> {
        let mut state = self.lock();
        if !state
            .follows
            .remove(&(edge.follower_id(), edge.followed_id()))
        {
            return Err(FollowRepositoryError::missing_edge(
                edge.follower_id(),
                edge.followed_id(),
            ));
        }

        let mut floor = CounterFloor::Respected;
        match state.users.get_mut(&edge.followed_id()) {
            Some(followed) => {
                floor = floor.and(CounterFloor::of(followed.followers_count));
                followed.followers_count = shift(followed.followers_count, -1);
            }
            None => floor = CounterFloor::Clamped,
        }
        match state.users.get_mut(&edge.follower_id()) {
            Some(follower) => {
                floor = floor.and(CounterFloor::of(follower.following_count));
                follower.following_count = shift(follower.following_count, -1);
            }
            None => floor = CounterFloor::Clamped,
        }
        Ok(floor)
    }

    async fn list_followers(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UserSummary>, FollowRepositoryError> {
        let state = self.lock();
        require_user(&state, user_id)?;
        let ids = state
            .follows
            .iter()
            .filter(|(_, followed)| *followed == user_id)
            .map(|(follower, _)| *follower);
        Ok(summaries(&state, ids))
    }

    async fn list_following(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UserSummary>, FollowRepositoryError> {
        let state = self.lock();
        require_user(&state, user_id)?;
        let ids = state
            .follows
            .iter()
            .filter(|(follower, _)| *follower == user_id)
            .map(|(_, followed)| *followed);
        Ok(summaries(&state, ids))
    }

    async fn recount(&self, user_id: UserId) -> Result<FollowRecount, FollowRepositoryError> {
        let mut state = self.lock();
        let after = FollowCounts {
            followers: count(
                state
                    .follows
                    .iter()
                    .filter(|(_, followed)| *followed == user_id)
                    .count(),
            ),
            following: count(
                state
                    .follows
                    .iter()
                    .filter(|(follower, _)| *follower == user_id)
                    .count(),
            ),
        };
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| FollowRepositoryError::missing_user(user_id))?;
        let before = FollowCounts {
            followers: user.followers_count,
            following: user.following_count,
        };
        user.followers_count = after.followers;
        user.following_count = after.following;

        Ok(FollowRecount {
            user_id,
            before,
            after,
        })
    }
}
