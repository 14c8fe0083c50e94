//! Ratings, favourites and post counters over [`InMemoryStore`].

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::ports::{EngagementRepository, EngagementRepositoryError};
use crate::domain::{
    CounterDelta, CounterFloor, Favourite, Post, PostCounters, PostId, PostRecount, Rating,
    RatingId, RatingStatus, RatingTransition, UserId, removal_delta,
};

use super::{InMemoryStore, count, next, shift};

fn floor_for(current: PostCounters, delta: CounterDelta) -> CounterFloor {
    let clamps = |value: u32, step: i32| step < 0 && i64::from(value) + i64::from(step) < 0;
    if clamps(current.likes, delta.likes) || clamps(current.dislikes, delta.dislikes) {
        CounterFloor::Clamped
    } else {
        CounterFloor::Respected
    }
}

/// Apply `delta` to the post's like counters and report whether it clamped.
fn apply_delta(post: &mut Post, delta: CounterDelta) -> CounterFloor {
    let floor = floor_for(post.counters, delta);
    post.counters.likes = shift(post.counters.likes, delta.likes);
    post.counters.dislikes = shift(post.counters.dislikes, delta.dislikes);
    floor
}

#[async_trait]
impl EngagementRepository for InMemoryStore {
    async fn find_rating(
        &self,
        post_id: PostId,
        user_id: UserId,
    ) -> Result<Option<Rating>, EngagementRepositoryError> {
        Ok(self
            .lock()
            .ratings
            .values()
            .find(|rating| rating.post_id == post_id && rating.user_id == user_id)
            .cloned())
    }

    async fn find_rating_by_id(
        &self,
        rating_id: RatingId,
    ) -> Result<Option<Rating>, EngagementRepositoryError> {
        Ok(self.lock().ratings.get(&rating_id).cloned())
    }

    async fn list_ratings(&self, post_id: PostId) -> Result<Vec<Rating>, EngagementRepositoryError> {
        Ok(self
            .lock()
            .ratings
            .values()
            .filter(|rating| rating.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn apply_rating(
        &self,
        post_id: PostId,
        user_id: UserId,
        transition: RatingTransition,
    ) -> Result<Rating, EngagementRepositoryError> {
        let mut state = self.lock();
        if !state.posts.contains_key(&post_id) {
            return Err(EngagementRepositoryError::missing_post(post_id));
        }

        let current = state
            .ratings
            .values()
            .find(|rating| rating.post_id == post_id && rating.user_id == user_id)
            .cloned();
        let observed = current.as_ref().map(|rating| rating.status);
        if observed != transition.expected_current() {
            return Err(EngagementRepositoryError::stale_state(format!(
                "expected {:?} but found {:?}",
                transition.expected_current(),
                observed
            )));
        }

        let id = match current {
            Some(existing) => existing.id,
            None => RatingId::from_store(next(&mut state.sequences.ratings)),
        };
        let rating = Rating {
            id,
            post_id,
            user_id,
            status: transition.target(),
        };
        state.ratings.insert(id, rating.clone());

        let delta = transition.delta();
        let floor = state
            .posts
            .get_mut(&post_id)
            .map_or(CounterFloor::Clamped, |post| apply_delta(post, delta));
        if floor == CounterFloor::Clamped {
            warn!(post_id = %post_id, ?delta, "rating counter floor hit");
        }
        debug!(rating_id = %rating.id, status = %rating.status, "applied rating");
        Ok(rating)
    }

    async fn remove_rating(
        &self,
        rating_id: RatingId,
        expected: RatingStatus,
    ) -> Result<CounterFloor, EngagementRepositoryError> {
        let mut state = self.lock();
        let rating = state
            .ratings
            .get(&rating_id)
            .cloned()
            .ok_or_else(|| EngagementRepositoryError::missing_rating(rating_id))?;
        if rating.status != expected {
            return Err(EngagementRepositoryError::stale_state(format!(
                "rating {rating_id} is now '{}'",
                rating.status
            )));
        }

        state.ratings.remove(&rating_id);
        let floor = match state.posts.get_mut(&rating.post_id) {
            Some(post) => apply_delta(post, removal_delta(rating.status)),
            None => CounterFloor::Clamped,
        };
        Ok(floor)
    }

    async fn insert_favourite(
        &self,
        favourite: &Favourite,
    ) -> Result<(), EngagementRepositoryError> {
        let mut state = self.lock();
        let post = state
            .posts
            .get(&favourite.post_id)
            .ok_or_else(|| EngagementRepositoryError::missing_post(favourite.post_id))?;
        if post.author_id == favourite.user_id {
            return Err(EngagementRepositoryError::own_post(favourite.post_id));
        }
        if !state
            .favourites
            .insert((favourite.user_id, favourite.post_id))
        {
            return Err(EngagementRepositoryError::duplicate_favourite(
                favourite.user_id,
                favourite.post_id,
            ));
        }
        Ok(())
    }

    async fn delete_favourite(
        &self,
        favourite: &Favourite,
    ) -> Result<(), EngagementRepositoryError> {
        if !self
            .lock()
            .favourites
            .remove(&(favourite.user_id, favourite.post_id))
        {
            return Err(EngagementRepositoryError::missing_favourite(
                favourite.user_id,
                favourite.post_id,
            ));
        }
        Ok(())
    }

    async fn favourite_exists(
        &self,
        favourite: &Favourite,
    ) -> Result<bool, EngagementRepositoryError> {
        Ok(self
            .lock()
            .favourites
            .contains(&(favourite.user_id, favourite.post_id)))
    }

    async fn list_favourites(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Post>, EngagementRepositoryError> {
        let state = self.lock();
        let mut posts: Vec<Post> = state
            .favourites
            .iter()
            .filter(|(user, _)| *user == user_id)
            .filter_map(|(_, post_id)| state.posts.get(post_id).cloned())
            .collect();
        posts.sort_by_key(|post| post.id);
        Ok(posts)
    }

    async fn recount_post(&self, post_id: PostId) -> Result<PostRecount, EngagementRepositoryError> {
        let mut state = self.lock();
        let tally = |status: RatingStatus| {
            count(
                state
                    .ratings
                    .values()
                    .filter(|rating| rating.post_id == post_id && rating.status == status)
                    .count(),
            )
        };
        let after = PostCounters {
            likes: tally(RatingStatus::Like),
            dislikes: tally(RatingStatus::Dislike),
            comments: count(
                state
                    .comments
                    .values()
                    .filter(|comment| comment.post_id == post_id)
                    .count(),
            ),
        };
        let post = state
            .posts
            .get_mut(&post_id)
            .ok_or_else(|| EngagementRepositoryError::missing_post(post_id))?;
        let before = post.counters;
        post.counters = after;

        Ok(PostRecount {
            post_id,
            before,
            after,
        })
    }
}
