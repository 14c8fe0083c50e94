//! PostgreSQL-backed `FollowRepository` implementation using Diesel ORM.
//!
//! Edge writes and both counter adjustments run in one serializable
//! transaction. Decrements are floored at zero with `GREATEST`; the values
//! observed beforehand decide whether the floor was hit.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use tracing::debug;

use crate::domain::ports::{FollowRepository, FollowRepositoryError};
use crate::domain::{CounterFloor, FollowCounts, FollowEdge, FollowRecount, UserId, UserSummary};

use super::diesel_helpers::{
    DieselFailure, TxError, classify, collect_rows, counter, map_basic_diesel_error,
    map_basic_pool_error, shift_counter,
};
use super::models::{FollowRow, UserRow};
use super::pool::{DbPool, PoolError};
use super::schema::{follows, users};

/// Diesel-backed implementation of the `FollowRepository` port.
#[derive(Clone)]
pub struct DieselFollowRepository {
    pool: DbPool,
}

impl DieselFollowRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

type FollowTx = TxError<FollowRepositoryError>;

fn map_pool_error(error: PoolError) -> FollowRepositoryError {
    map_basic_pool_error(error, FollowRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> FollowRepositoryError {
    map_basic_diesel_error(
        error,
        FollowRepositoryError::query,
        FollowRepositoryError::connection,
        FollowRepositoryError::stale_state,
    )
}

fn edge_row(edge: &FollowEdge) -> FollowRow {
    FollowRow {
        follower_id: edge.follower_id().get(),
        followed_id: edge.followed_id().get(),
    }
}

/// Read `(followers_count, following_count)` of `user_id` inside a transaction.
async fn read_counts(
    conn: &mut AsyncPgConnection,
    user_id: UserId,
) -> Result<Option<FollowCounts>, diesel::result::Error> {
    let counts: Option<(i32, i32)> = users::table
        .find(user_id.get())
        .select((users::followers_count, users::following_count))
        .first(conn)
        .await
        .optional()?;

    Ok(counts.map(|(followers, following)| FollowCounts {
        followers: counter(followers),
        following: counter(following),
    }))
}

async fn require_user(conn: &mut AsyncPgConnection, user_id: UserId) -> Result<(), FollowTx> {
    let exists: bool = diesel::select(diesel::dsl::exists(users::table.find(user_id.get())))
        .get_result(conn)
        .await?;
    if exists {
        Ok(())
    } else {
        Err(TxError::Domain(FollowRepositoryError::missing_user(user_id)))
    }
}

#[async_trait]
impl FollowRepository for DieselFollowRepository {
    async fn insert_edge(&self, edge: &FollowEdge) -> Result<(), FollowRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let edge = *edge;

        conn.build_transaction()
            .serializable()
            .run(|conn| {
                async move {
                    require_user(conn, edge.followed_id()).await?;
                    require_user(conn, edge.follower_id()).await?;

                    let inserted = diesel::insert_into(follows::table)
                        .values(edge_row(&edge))
                        .on_conflict_do_nothing()
                        .execute(conn)
                        .await?;
                    if inserted == 0 {
                        return Err(TxError::Domain(FollowRepositoryError::duplicate_edge(
                            edge.follower_id(),
                            edge.followed_id(),
                        )));
                    }

                    diesel::update(users::table.find(edge.followed_id().get()))
                        .set(users::followers_count.eq(users::followers_count + 1))
                        .execute(conn)
                        .await?;
                    diesel::update(users::table.find(edge.follower_id().get()))
                        .set(users::following_count.eq(users::following_count + 1))
                        .execute(conn)
                        .await?;
                    Ok(())
                }
                .scope_boxed()
            })
            .await
            .map_err(|err: FollowTx| err.resolve(map_diesel_error))?;

        debug!(
            follower_id = %edge.follower_id(),
            followed_id = %edge.followed_id(),
            "inserted follow edge"
        );
        Ok(())
    }

    async fn remove_edge(&self, edge: &FollowEdge) -> Result<CounterFloor, FollowRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let edge = *edge;

        conn.build_transaction()
            .serializable()
            .run(|conn| {
                async move {
                    let deleted = diesel::delete(
                        follows::table.find((edge.follower_id().get(), edge.followed_id().get())),
                    )
                    .execute(conn)
                    .await?;
                    if deleted == 0 {
                        return Err(TxError::Domain(FollowRepositoryError::missing_edge(
                            edge.follower_id(),
                            edge.followed_id(),
                        )));
                    }

                    let followed = read_counts(conn, edge.followed_id()).await?;
                    let follower = read_counts(conn, edge.follower_id()).await?;
                    let floor = CounterFloor::of(followed.map_or(0, |c| c.followers))
                        .and(CounterFloor::of(follower.map_or(0, |c| c.following)));

                    diesel::update(users::table.find(edge.followed_id().get()))
                        .set(users::followers_count.eq(shift_counter("followers_count", -1)))
                        .execute(conn)
                        .await?;
                    diesel::update(users::table.find(edge.follower_id().get()))
                        .set(users::following_count.eq(shift_counter("following_count", -1)))
                        .execute(conn)
                        .await?;
                    Ok(floor)
                }
                .scope_boxed()
            })
            .await
            .map_err(|err: FollowTx| err.resolve(map_diesel_error))
    }

    async fn list_followers(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UserSummary>, FollowRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        require_user(&mut conn, user_id)
            .await
            .map_err(|err| err.resolve(map_diesel_error))?;

        let rows: Vec<UserRow> = follows::table
            .inner_join(users::table.on(users::id.eq(follows::follower_id)))
            .filter(follows::followed_id.eq(user_id.get()))
            .select(UserRow::as_select())
            .order_by(users::id.asc())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        collect_rows(
            rows.into_iter().map(UserRow::into_summary),
            FollowRepositoryError::query,
        )
    }

    async fn list_following(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UserSummary>, FollowRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        require_user(&mut conn, user_id)
            .await
            .map_err(|err| err.resolve(map_diesel_error))?;

        let rows: Vec<UserRow> = follows::table
            .inner_join(users::table.on(users::id.eq(follows::followed_id)))
            .filter(follows::follower_id.eq(user_id.get()))
            .select(UserRow::as_select())
            .order_by(users::id.asc())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        collect_rows(
            rows.into_iter().map(UserRow::into_summary),
            FollowRepositoryError::query,
        )
    }

    async fn recount(&self, user_id: UserId) -> Result<FollowRecount, FollowRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        conn.build_transaction()
            .serializable()
            .run(|conn| {
                async move {
                    let before = read_counts(conn, user_id).await?.ok_or_else(|| {
                        TxError::Domain(FollowRepositoryError::missing_user(user_id))
                    })?;

                    let followers: i64 = follows::table
                        .filter(follows::followed_id.eq(user_id.get()))
                        .count()
                        .get_result(conn)
                        .await?;
                    let following: i64 = follows::table
                        .filter(follows::follower_id.eq(user_id.get()))
                        .count()
                        .get_result(conn)
                        .await?;
                    let followers = i32::try_from(followers).unwrap_or(i32::MAX);
                    let following = i32::try_from(following).unwrap_or(i32::MAX);

                    diesel::update(users::table.find(user_id.get()))
                        .set((
                            users::followers_count.eq(followers),
                            users::following_count.eq(following),
                        ))
                        .execute(conn)
                        .await?;

                    Ok(FollowRecount {
                        user_id,
                        before,
                        after: FollowCounts {
                            followers: counter(followers),
                            following: counter(following),
                        },
                    })
                }
                .scope_boxed()
            })
            .await
            .map_err(|err: FollowTx| err.resolve(map_diesel_error))
    }
}
