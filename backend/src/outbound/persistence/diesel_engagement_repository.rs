//! PostgreSQL-backed `EngagementRepository` implementation using Diesel ORM.
//!
//! Rating rows and the post counters they feed are written in one
//! serializable transaction. The prior rating state a transition was planned
//! against is re-read under the post row lock; a mismatch aborts with
//! `StaleState` and writes nothing.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use tracing::{debug, warn};

use crate::domain::ports::{EngagementRepository, EngagementRepositoryError};
use crate::domain::{
    CounterDelta, CounterFloor, Favourite, Post, PostCounters, PostId, PostRecount, Rating,
    RatingId, RatingStatus, RatingTransition, UserId, removal_delta,
};

use super::diesel_helpers::{
    TxError, collect_rows, counter, map_basic_diesel_error, map_basic_pool_error, shift_counter,
};
use super::models::{FavouriteRow, NewRatingRow, PostRow, RatingRow};
use super::pool::{DbPool, PoolError};
use super::schema::{comments, posts, ratings, user_favourites};

/// Diesel-backed implementation of the `EngagementRepository` port.
#[derive(Clone)]
pub struct DieselEngagementRepository {
    pool: DbPool,
}

impl DieselEngagementRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

type EngagementTx = TxError<EngagementRepositoryError>;

fn map_pool_error(error: PoolError) -> EngagementRepositoryError {
    map_basic_pool_error(error, EngagementRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> EngagementRepositoryError {
    map_basic_diesel_error(
        error,
        EngagementRepositoryError::query,
        EngagementRepositoryError::connection,
        EngagementRepositoryError::stale_state,
    )
}

fn convert_rating(row: RatingRow) -> Result<Rating, EngagementTx> {
    row.into_domain()
        .map_err(|message| TxError::Domain(EngagementRepositoryError::query(message)))
}

/// Lock the post row and return it, failing with `MissingPost`.
async fn lock_post(conn: &mut AsyncPgConnection, post_id: PostId) -> Result<PostRow, EngagementTx> {
    posts::table
        .find(post_id.get())
        .select(PostRow::as_select())
        .for_update()
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| TxError::Domain(EngagementRepositoryError::missing_post(post_id)))
}

/// Whether applying `delta` to `current` would dip below zero.
fn floor_for(current: PostCounters, delta: CounterDelta) -> CounterFloor {
    let clamps = |value: u32, shift: i32| shift < 0 && i64::from(value) + i64::from(shift) < 0;
    if clamps(current.likes, delta.likes) || clamps(current.dislikes, delta.dislikes) {
        CounterFloor::Clamped
    } else {
        CounterFloor::Respected
    }
}

async fn apply_delta(
    conn: &mut AsyncPgConnection,
    post_id: PostId,
    delta: CounterDelta,
) -> Result<(), diesel::result::Error> {
    diesel::update(posts::table.find(post_id.get()))
        .set((
            posts::likes_count.eq(shift_counter("likes_count", delta.likes)),
            posts::dislikes_count.eq(shift_counter("dislikes_count", delta.dislikes)),
        ))
        .execute(conn)
        .await
        .map(|_| ())
}

async fn count_ratings(
    conn: &mut AsyncPgConnection,
    post_id: PostId,
    status: RatingStatus,
) -> Result<i64, diesel::result::Error> {
    ratings::table
        .filter(ratings::post_id.eq(post_id.get()))
        .filter(ratings::status.eq(status.as_str()))
        .count()
        .get_result(conn)
        .await
}

fn clamp_count(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[async_trait]
impl EngagementRepository for DieselEngagementRepository {
    async fn find_rating(
        &self,
        post_id: PostId,
        user_id: UserId,
    ) -> Result<Option<Rating>, EngagementRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<RatingRow> = ratings::table
            .filter(ratings::post_id.eq(post_id.get()))
            .filter(ratings::user_id.eq(user_id.get()))
            .select(RatingRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(convert_rating)
            .transpose()
            .map_err(|err| err.resolve(map_diesel_error))
    }

    async fn find_rating_by_id(
        &self,
        rating_id: RatingId,
    ) -> Result<Option<Rating>, EngagementRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<RatingRow> = ratings::table
            .find(rating_id.get())
            .select(RatingRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(convert_rating)
            .transpose()
            .map_err(|err| err.resolve(map_diesel_error))
    }

    async fn list_ratings(&self, post_id: PostId) -> Result<Vec<Rating>, EngagementRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<RatingRow> = ratings::table
            .filter(ratings::post_id.eq(post_id.get()))
            .select(RatingRow::as_select())
            .order_by(ratings::id.asc())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        collect_rows(
            rows.into_iter().map(RatingRow::into_domain),
            EngagementRepositoryError::query,
        )
    }

    async fn apply_rating(
        &self,
        post_id: PostId,
        user_id: UserId,
        transition: RatingTransition,
    ) -> Result<Rating, EngagementRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rating = conn
            .build_transaction()
            .serializable()
            .run(|conn| {
                async move {
                    let post = lock_post(conn, post_id).await?;

                    let current: Option<RatingRow> = ratings::table
                        .filter(ratings::post_id.eq(post_id.get()))
                        .filter(ratings::user_id.eq(user_id.get()))
                        .select(RatingRow::as_select())
                        .first(conn)
                        .await
                        .optional()?;
                    let current = current.map(convert_rating).transpose()?;

                    let observed = current.as_ref().map(|rating| rating.status);
                    if observed != transition.expected_current() {
                        return Err(TxError::Domain(EngagementRepositoryError::stale_state(
                            format!(
                                "expected {:?} but found {:?}",
                                transition.expected_current(),
                                observed
                            ),
                        )));
                    }

                    let target = transition.target();
                    let row: RatingRow = match current {
                        None => {
                            diesel::insert_into(ratings::table)
                                .values(NewRatingRow {
                                    post_id: post_id.get(),
                                    user_id: user_id.get(),
                                    status: target.as_str(),
                                })
                                .returning(RatingRow::as_returning())
                                .get_result(conn)
                                .await?
                        }
                        Some(existing) => {
                            diesel::update(ratings::table.find(existing.id.get()))
                                .set(ratings::status.eq(target.as_str()))
                                .returning(RatingRow::as_returning())
                                .get_result(conn)
                                .await?
                        }
                    };

                    let delta = transition.delta();
                    if floor_for(post.counters(), delta) == CounterFloor::Clamped {
                        warn!(post_id = %post_id, ?delta, "rating counter floor hit");
                    }
                    apply_delta(conn, post_id, delta).await?;
                    convert_rating(row)
                }
                .scope_boxed()
            })
            .await
            .map_err(|err: EngagementTx| err.resolve(map_diesel_error))?;

        debug!(rating_id = %rating.id, status = %rating.status, "applied rating");
        Ok(rating)
    }

    async fn remove_rating(
        &self,
        rating_id: RatingId,
        expected: RatingStatus,
    ) -> Result<CounterFloor, EngagementRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        conn.build_transaction()
            .serializable()
            .run(|conn| {
                async move {
                    let row: RatingRow = ratings::table
                        .find(rating_id.get())
                        .select(RatingRow::as_select())
                        .first(conn)
                        .await
                        .optional()?
                        .ok_or_else(|| {
                            TxError::Domain(EngagementRepositoryError::missing_rating(rating_id))
                        })?;
                    let rating = convert_rating(row)?;
                    if rating.status != expected {
                        return Err(TxError::Domain(EngagementRepositoryError::stale_state(
                            format!("rating {rating_id} is now '{}'", rating.status),
                        )));
                    }

                    let post = lock_post(conn, rating.post_id).await?;
                    diesel::delete(ratings::table.find(rating_id.get()))
                        .execute(conn)
                        .await?;

                    let delta = removal_delta(rating.status);
                    let floor = floor_for(post.counters(), delta);
                    apply_delta(conn, rating.post_id, delta).await?;
                    Ok(floor)
                }
                .scope_boxed()
            })
            .await
            .map_err(|err: EngagementTx| err.resolve(map_diesel_error))
    }

    async fn insert_favourite(
        &self,
        favourite: &Favourite,
    ) -> Result<(), EngagementRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let favourite = *favourite;

        conn.build_transaction()
            .serializable()
            .run(|conn| {
                async move {
                    let post = lock_post(conn, favourite.post_id).await?;
                    if post.author_id == favourite.user_id.get() {
                        return Err(TxError::Domain(EngagementRepositoryError::own_post(
                            favourite.post_id,
                        )));
                    }

                    let inserted = diesel::insert_into(user_favourites::table)
                        .values(FavouriteRow {
                            user_id: favourite.user_id.get(),
                            post_id: favourite.post_id.get(),
                        })
                        .on_conflict_do_nothing()
                        .execute(conn)
                        .await?;
                    if inserted == 0 {
                        return Err(TxError::Domain(
                            EngagementRepositoryError::duplicate_favourite(
                                favourite.user_id,
                                favourite.post_id,
                            ),
                        ));
                    }
                    Ok(())
                }
                .scope_boxed()
            })
            .await
            .map_err(|err: EngagementTx| err.resolve(map_diesel_error))
    }

    async fn delete_favourite(
        &self,
        favourite: &Favourite,
    ) -> Result<(), EngagementRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let deleted = diesel::delete(
            user_favourites::table.find((favourite.user_id.get(), favourite.post_id.get())),
        )
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;

        if deleted == 0 {
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
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::select(diesel::dsl::exists(
            user_favourites::table.find((favourite.user_id.get(), favourite.post_id.get())),
        ))
        .get_result(&mut conn)
        .await
        .map_err(map_diesel_error)
    }

    async fn list_favourites(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Post>, EngagementRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<PostRow> = user_favourites::table
            .inner_join(posts::table)
            .filter(user_favourites::user_id.eq(user_id.get()))
            .select(PostRow::as_select())
            .order_by(posts::id.asc())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(rows.into_iter().map(Post::from).collect())
    }

    async fn recount_post(&self, post_id: PostId) -> Result<PostRecount, EngagementRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        conn.build_transaction()
            .serializable()
            .run(|conn| {
                async move {
                    let before = lock_post(conn, post_id).await?.counters();
                    let likes = count_ratings(conn, post_id, RatingStatus::Like).await?;
                    let dislikes = count_ratings(conn, post_id, RatingStatus::Dislike).await?;
                    let comment_count: i64 = comments::table
                        .filter(comments::post_id.eq(post_id.get()))
                        .count()
                        .get_result(conn)
                        .await?;

                    let (likes, dislikes, comment_count) = (
                        clamp_count(likes),
                        clamp_count(dislikes),
                        clamp_count(comment_count),
                    );
                    diesel::update(posts::table.find(post_id.get()))
                        .set((
                            posts::likes_count.eq(likes),
                            posts::dislikes_count.eq(dislikes),
                            posts::comments_count.eq(comment_count),
                        ))
                        .execute(conn)
                        .await?;

                    Ok(PostRecount {
                        post_id,
                        before,
                        after: PostCounters {
                            likes: counter(likes),
                            dislikes: counter(dislikes),
                            comments: counter(comment_count),
                        },
                    })
                }
                .scope_boxed()
            })
            .await
            .map_err(|err: EngagementTx| err.resolve(map_diesel_error))
    }
}
