//! Ratings and favourites service.
//!
//! All rating mutations go through [`RatingTransition::plan`]: the service
//! reads the current row, plans the transition, and hands the plan to the
//! repository, which re-checks the prior state inside its transaction and
//! commits the row together with the counter delta.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use crate::domain::ports::{EngagementRepository, EngagementRepositoryError};
use crate::domain::{
    AdminOverride, AlreadyRated, Caller, CounterFloor, Error, Favourite, Post, PostId,
    PostRecount, Rating, RatingId, RatingStatus, RatingTransition, ServiceResult, authorize,
};

/// Engagement service owning ratings, favourites and post counters.
#[derive(Clone)]
pub struct EngagementService<R> {
    engagement: Arc<R>,
}

impl<R> EngagementService<R> {
    /// Create a new service with the given repository.
    pub fn new(engagement: Arc<R>) -> Self {
        Self { engagement }
    }
}

impl<R> EngagementService<R>
where
    R: EngagementRepository,
{
    fn map_engagement_error(error: EngagementRepositoryError) -> Error {
        match error {
            EngagementRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("engagement repository unavailable: {message}"))
            }
            EngagementRepositoryError::Query { message } => {
                Error::internal(format!("engagement repository error: {message}"))
            }
            EngagementRepositoryError::StaleState { message } => {
                Error::conflict(format!("rating changed concurrently: {message}"))
                    .with_details(json!({ "code": "stale_state" }))
            }
            err @ (EngagementRepositoryError::MissingPost { .. }
            | EngagementRepositoryError::MissingRating { .. }
            | EngagementRepositoryError::MissingFavourite { .. }) => {
                Error::not_found(err.to_string())
            }
            err @ EngagementRepositoryError::OwnPost { .. } => {
                Error::invalid_operation(format!("cannot favourite own post: {err}"))
            }
            err @ EngagementRepositoryError::DuplicateFavourite { .. } => {
                Error::already_exists(err.to_string())
            }
        }
    }

    fn parse_status(raw: &str) -> ServiceResult<RatingStatus> {
        raw.parse::<RatingStatus>().map_err(|err| {
            Error::invalid_argument(format!("{err}; expected 'like' or 'dislike'"))
                .with_details(json!({ "field": "status", "value": err.input }))
        })
    }

    fn already_rated(err: AlreadyRated) -> Error {
        Error::already_rated(err.to_string()).with_details(json!({ "status": err.status }))
    }

    fn log_floor(floor: CounterFloor, rating_id: RatingId) {
        if floor == CounterFloor::Clamped {
            warn!(rating = %rating_id, "rating counter was already zero; recount advised");
        }
    }

    async fn transition(
        &self,
        post_id: PostId,
        caller: &Caller,
        current: Option<RatingStatus>,
        requested: RatingStatus,
    ) -> ServiceResult<Rating> {
        let plan = RatingTransition::plan(current, requested).map_err(Self::already_rated)?;
        let rating = self
            .engagement
            .apply_rating(post_id, caller.id, plan)
            .await
            .map_err(Self::map_engagement_error)?;
        debug!(post = %post_id, user = %caller.id, status = %requested, "rating applied");
        Ok(rating)
    }

    /// Rate `post_id` as `status` (`like` or `dislike`).
    pub async fn rate(
        &self,
        caller: &Caller,
        post_id: PostId,
        status: &str,
    ) -> ServiceResult<Rating> {
        let requested = Self::parse_status(status)?;
        let current = self
            .engagement
            .find_rating(post_id, caller.id)
            .await
            .map_err(Self::map_engagement_error)?;
        self.transition(post_id, caller, current.map(|r| r.status), requested)
            .await
    }

    /// Change the status of an existing rating owned by `caller`.
    pub async fn update_rating(
        &self,
        caller: &Caller,
        rating_id: RatingId,
        status: &str,
    ) -> ServiceResult<Rating> {
        let requested = Self::parse_status(status)?;
        let rating = self.get_rating(rating_id).await?;
        authorize(caller, rating.user_id, AdminOverride::NotApplicable)?;
        self.transition(rating.post_id, caller, Some(rating.status), requested)
            .await
    }

    async fn remove(&self, caller: &Caller, rating: Rating) -> ServiceResult<()> {
        authorize(caller, rating.user_id, AdminOverride::NotApplicable)?;
        let floor = self
            .engagement
            .remove_rating(rating.id, rating.status)
            .await
            .map_err(Self::map_engagement_error)?;
        Self::log_floor(floor, rating.id);
        debug!(rating = %rating.id, post = %rating.post_id, "rating removed");
        Ok(())
    }

    /// Remove the caller's rating of `post_id`.
    pub async fn unrate(&self, caller: &Caller, post_id: PostId) -> ServiceResult<()> {
        let rating = self
            .engagement
            .find_rating(post_id, caller.id)
            .await
            .map_err(Self::map_engagement_error)?
            .ok_or_else(|| {
                Error::not_found(format!("user {} has not rated post {post_id}", caller.id))
            })?;
        self.remove(caller, rating).await
    }

    /// Remove a rating addressed by id.
    pub async fn delete_rating(&self, caller: &Caller, rating_id: RatingId) -> ServiceResult<()> {
        let rating = self.get_rating(rating_id).await?;
        self.remove(caller, rating).await
    }

    /// Fetch a rating.
    pub async fn get_rating(&self, rating_id: RatingId) -> ServiceResult<Rating> {
        self.engagement
            .find_rating_by_id(rating_id)
            .await
            .map_err(Self::map_engagement_error)?
            .ok_or_else(|| Error::not_found(format!("rating {rating_id} does not exist")))
    }

    /// Ratings of a post by ascending id; empty when none exist.
    pub async fn list_ratings(&self, post_id: PostId) -> ServiceResult<Vec<Rating>> {
        self.engagement
            .list_ratings(post_id)
            .await
            .map_err(Self::map_engagement_error)
    }

    /// Favourite somebody else's post.
    pub async fn favourite(&self, caller: &Caller, post_id: PostId) -> ServiceResult<Favourite> {
        let favourite = Favourite {
            user_id: caller.id,
            post_id,
        };
        self.engagement
            .insert_favourite(&favourite)
            .await
            .map_err(Self::map_engagement_error)?;
        debug!(post = %post_id, user = %caller.id, "post favourited");
        Ok(favourite)
    }

    /// Remove a favourite.
    pub async fn unfavourite(&self, caller: &Caller, post_id: PostId) -> ServiceResult<()> {
        let favourite = Favourite {
            user_id: caller.id,
            post_id,
        };
        self.engagement
            .delete_favourite(&favourite)
            .await
            .map_err(Self::map_engagement_error)?;
        debug!(post = %post_id, user = %caller.id, "favourite removed");
        Ok(())
    }

    /// Whether the caller has favourited `post_id`.
    pub async fn is_favourited(&self, caller: &Caller, post_id: PostId) -> ServiceResult<bool> {
        self.engagement
            .favourite_exists(&Favourite {
                user_id: caller.id,
                post_id,
            })
            .await
            .map_err(Self::map_engagement_error)
    }

    /// Posts the caller has favourited.
    pub async fn list_favourites(&self, caller: &Caller) -> ServiceResult<Vec<Post>> {
        self.engagement
            .list_favourites(caller.id)
            .await
            .map_err(Self::map_engagement_error)
    }

    /// Rebuild a post's cached counters from its ratings and comments.
    pub async fn recount_post(&self, post_id: PostId) -> ServiceResult<PostRecount> {
        let recount = self
            .engagement
            .recount_post(post_id)
            .await
            .map_err(Self::map_engagement_error)?;
        if recount.drifted() {
            warn!(
                post = %post_id,
                before = ?recount.before,
                after = ?recount.after,
                "post counters drifted and were repaired"
            );
        }
        Ok(recount)
    }
}

#[cfg(test)]
#[path = "engagement_service_tests.rs"]
mod tests;
