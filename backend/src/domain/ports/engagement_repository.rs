//! Port for ratings, favourites and the post engagement counters.
use async_trait::async_trait;

use crate::domain::{
    CounterFloor, Favourite, Post, PostId, PostRecount, Rating, RatingId, RatingStatus,
    RatingTransition, UserId,
};

use super::define_port_error;

define_port_error! {
    /// Errors raised by engagement repository adapters.
    pub enum EngagementRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "engagement repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "engagement repository query failed: {message}",
        /// The post does not exist.
        MissingPost { post_id: PostId } => "post {post_id} does not exist",
        /// The rating does not exist.
        MissingRating { rating_id: RatingId } => "rating {rating_id} does not exist",
        /// The user tried to favourite their own post.
        OwnPost { post_id: PostId } => "post {post_id} belongs to the user",
        /// The favourite already exists.
        DuplicateFavourite { user_id: UserId, post_id: PostId } =>
            "user {user_id} already favourited post {post_id}",
        /// The favourite does not exist.
        MissingFavourite { user_id: UserId, post_id: PostId } =>
            "user {user_id} has not favourited post {post_id}",
        /// The row no longer matches the state the caller planned against.
        StaleState { message: String } => "rating state changed concurrently: {message}",
    }
}

/// Ratings, favourites and the like/dislike projections on posts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EngagementRepository: Send + Sync {
    /// Rating of `post_id` by `user_id`, if any.
    async fn find_rating(
        &self,
        post_id: PostId,
        user_id: UserId,
    ) -> Result<Option<Rating>, EngagementRepositoryError>;

    /// Rating by identifier.
    async fn find_rating_by_id(
        &self,
        rating_id: RatingId,
    ) -> Result<Option<Rating>, EngagementRepositoryError>;

    /// Ratings of a post by ascending rating id.
    async fn list_ratings(&self, post_id: PostId) -> Result<Vec<Rating>, EngagementRepositoryError>;

    /// Apply a planned transition and its counter delta in one transaction.
    ///
    /// The adapter re-reads the row inside the transaction and fails with
    /// [`EngagementRepositoryError::StaleState`] when it no longer matches
    /// [`RatingTransition::expected_current`].
    async fn apply_rating(
        &self,
        post_id: PostId,
        user_id: UserId,
        transition: RatingTransition,
    ) -> Result<Rating, EngagementRepositoryError>;

    /// Delete a rating and decrement its counter, floored at zero.
    ///
    /// Fails with [`EngagementRepositoryError::StaleState`] when the row is
    /// gone or its status differs from `expected`.
    async fn remove_rating(
        &self,
        rating_id: RatingId,
        expected: RatingStatus,
    ) -> Result<CounterFloor, EngagementRepositoryError>;

    /// Insert a favourite after checking the post exists and is not the
    /// user's own.
    async fn insert_favourite(&self, favourite: &Favourite)
    -> Result<(), EngagementRepositoryError>;

    /// Delete a favourite.
    async fn delete_favourite(&self, favourite: &Favourite)
    -> Result<(), EngagementRepositoryError>;

    /// Whether the favourite exists.
    async fn favourite_exists(
        &self,
        favourite: &Favourite,
    ) -> Result<bool, EngagementRepositoryError>;

    /// Posts favourited by `user_id`, by ascending post id.
    async fn list_favourites(&self, user_id: UserId)
    -> Result<Vec<Post>, EngagementRepositoryError>;

    /// Overwrite the cached counters of a post with values counted from its
    /// ratings and comments.
    async fn recount_post(&self, post_id: PostId) -> Result<PostRecount, EngagementRepositoryError>;
}
