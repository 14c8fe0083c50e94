//! PostgreSQL-backed `UserRepository` implementation using Diesel ORM.
//!
//! Accounts and their 1:1 profiles. Deleting a user releases, in the same
//! transaction as the cascading delete, the follow counters held by the
//! user's neighbours and the rating and comment counters of posts the user
//! engaged with, and collects the blob references of doomed attachments.

use std::collections::BTreeMap;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use tracing::debug;

use crate::domain::ports::{UserRepository, UserRepositoryError};
use crate::domain::{BlobRef, NewUser, RatingStatus, User, UserChanges, UserId, UserProfile};

use super::diesel_helpers::{
    DieselFailure, TxError, classify, collect_rows, map_basic_diesel_error, map_basic_pool_error,
    shift_counter,
};
use super::models::{NewUserRow, ProfileRow, UserRow, UserUpdate};
use super::pool::{DbPool, PoolError};
use super::schema::{attachments, comments, follows, posts, ratings, user_profiles, users};

/// Give back the follow counters the user's edges hold on their neighbours.
async fn release_follow_counters(
    conn: &mut AsyncPgConnection,
    raw: i64,
) -> Result<(), diesel::result::Error> {
    let followed: Vec<i64> = follows::table
        .filter(follows::follower_id.eq(raw))
        .select(follows::followed_id)
        .load(conn)
        .await?;
    let followers: Vec<i64> = follows::table
        .filter(follows::followed_id.eq(raw))
        .select(follows::follower_id)
        .load(conn)
        .await?;

    diesel::update(users::table.filter(users::id.eq_any(&followed)))
        .set(users::followers_count.eq(shift_counter("followers_count", -1)))
        .execute(conn)
        .await?;
    diesel::update(users::table.filter(users::id.eq_any(&followers)))
        .set(users::following_count.eq(shift_counter("following_count", -1)))
        .execute(conn)
        .await?;
    Ok(())
}

async fn rated_posts(
    conn: &mut AsyncPgConnection,
    raw: i64,
    status: RatingStatus,
) -> Result<Vec<i64>, diesel::result::Error> {
    ratings::table
        .filter(ratings::user_id.eq(raw))
        .filter(ratings::status.eq(status.as_str()))
        .select(ratings::post_id)
        .load(conn)
        .await
}

/// Take the user's ratings and comments off the counters of the posts they
/// were left on. One rating per post and user keeps the like deltas at one.
async fn release_post_counters(
    conn: &mut AsyncPgConnection,
    raw: i64,
) -> Result<(), diesel::result::Error> {
    let liked = rated_posts(conn, raw, RatingStatus::Like).await?;
    diesel::update(posts::table.filter(posts::id.eq_any(&liked)))
        .set(posts::likes_count.eq(shift_counter("likes_count", -1)))
        .execute(conn)
        .await?;
    let disliked = rated_posts(conn, raw, RatingStatus::Dislike).await?;
    diesel::update(posts::table.filter(posts::id.eq_any(&disliked)))
        .set(posts::dislikes_count.eq(shift_counter("dislikes_count", -1)))
        .execute(conn)
        .await?;

    let commented: Vec<i64> = comments::table
        .filter(comments::author_id.eq(raw))
        .select(comments::post_id)
        .load(conn)
        .await?;
    let mut per_post: BTreeMap<i64, i32> = BTreeMap::new();
    for post_id in commented {
        *per_post.entry(post_id).or_default() += 1;
    }
    for (post_id, removed) in per_post {
        diesel::update(posts::table.find(post_id))
            .set(posts::comments_count.eq(shift_counter("comments_count", -removed)))
            .execute(conn)
            .await?;
    }
    Ok(())
}

/// Blob references of every attachment the cascade will remove: the user's
/// own, those on the user's posts, and those on comments that go with them.
async fn doomed_blob_refs(
    conn: &mut AsyncPgConnection,
    raw: i64,
) -> Result<Vec<BlobRef>, diesel::result::Error> {
    let own_posts: Vec<i64> = posts::table
        .filter(posts::author_id.eq(raw))
        .select(posts::id)
        .load(conn)
        .await?;
    let doomed_comments: Vec<i64> = comments::table
        .filter(
            comments::author_id
                .eq(raw)
                .or(comments::post_id.eq_any(own_posts.clone())),
        )
        .select(comments::id)
        .load(conn)
        .await?;
    let refs: Vec<String> = attachments::table
        .filter(
            attachments::user_id
                .eq(raw)
                .or(attachments::post_id.eq_any(own_posts))
                .or(attachments::comment_id.eq_any(doomed_comments)),
        )
        .select(attachments::blob_ref)
        .load(conn)
        .await?;
    Ok(refs.into_iter().map(BlobRef::new).collect())
}

/// Diesel-backed implementation of the `UserRepository` port.
#[derive(Clone)]
pub struct DieselUserRepository {
    pool: DbPool,
}

impl DieselUserRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> UserRepositoryError {
    map_basic_pool_error(error, UserRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> UserRepositoryError {
    match classify(&error) {
        DieselFailure::UniqueViolation { constraint } => {
            let field = match constraint.as_deref() {
                Some(name) if name.contains("email") => "email",
                _ => "username",
            };
            UserRepositoryError::duplicate(field)
        }
        _ => map_basic_diesel_error(
            error,
            UserRepositoryError::query,
            UserRepositoryError::connection,
            UserRepositoryError::stale_state,
        ),
    }
}

fn map_profile_insert_error(error: diesel::result::Error, user_id: UserId) -> UserRepositoryError {
    match classify(&error) {
        DieselFailure::UniqueViolation { .. } => UserRepositoryError::duplicate_profile(user_id),
        DieselFailure::ForeignKeyViolation { .. } => UserRepositoryError::missing_user(user_id),
        _ => map_diesel_error(error),
    }
}

fn convert_user(row: UserRow) -> Result<User, UserRepositoryError> {
    row.into_domain().map_err(UserRepositoryError::query)
}

#[async_trait]
impl UserRepository for DieselUserRepository {
    async fn insert_user(&self, user: &NewUser) -> Result<User, UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = NewUserRow {
            username: user.username.as_ref(),
            email: user.email.as_ref(),
            password_hash: user.password_hash.as_str(),
            profile_pic: user.profile_pic.as_deref(),
        };

        let inserted: UserRow = diesel::insert_into(users::table)
            .values(&row)
            .returning(UserRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        debug!(user_id = inserted.id, "inserted user");
        convert_user(inserted)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<UserRow> = users::table
            .find(id.get())
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(convert_user).transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>, UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<UserRow> = users::table
            .select(UserRow::as_select())
            .order_by(users::id.asc())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        collect_rows(
            rows.into_iter().map(UserRow::into_domain),
            UserRepositoryError::query,
        )
    }

    async fn update_user(
        &self,
        id: UserId,
        changes: &UserChanges,
    ) -> Result<User, UserRepositoryError> {
        if changes.is_empty() {
            return self
                .find_user(id)
                .await?
                .ok_or_else(|| UserRepositoryError::missing_user(id));
        }

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let update = UserUpdate {
            username: changes.username.as_ref().map(AsRef::as_ref),
            email: changes.email.as_ref().map(AsRef::as_ref),
            password_hash: changes.password_hash.as_ref().map(|hash| hash.as_str()),
            profile_pic: changes.profile_pic.as_ref().map(Option::as_deref),
        };

        let updated: Option<UserRow> = diesel::update(users::table.find(id.get()))
            .set(&update)
            .returning(UserRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        updated
            .ok_or_else(|| UserRepositoryError::missing_user(id))
            .and_then(convert_user)
    }

    async fn delete_user(&self, id: UserId) -> Result<Vec<BlobRef>, UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let raw = id.get();

        let orphaned = conn
            .build_transaction()
            .serializable()
            .run(|conn| {
                async move {
                    let exists: bool =
                        diesel::select(diesel::dsl::exists(users::table.find(raw)))
                            .get_result(conn)
                            .await?;
                    if !exists {
                        return Err(TxError::Domain(UserRepositoryError::missing_user(id)));
                    }

                    release_follow_counters(conn, raw).await?;
                    release_post_counters(conn, raw).await?;
                    let orphaned = doomed_blob_refs(conn, raw).await?;
                    diesel::delete(users::table.find(raw)).execute(conn).await?;
                    Ok(orphaned)
                }
                .scope_boxed()
            })
            .await
            .map_err(|err: TxError<UserRepositoryError>| err.resolve(map_diesel_error))?;

        debug!(user_id = raw, blobs = orphaned.len(), "deleted user");
        Ok(orphaned)
    }

    async fn insert_profile(&self, profile: &UserProfile) -> Result<(), UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(user_profiles::table)
            .values(ProfileRow::from(profile))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| map_profile_insert_error(err, profile.user_id))
    }

    async fn find_profile(
        &self,
        user_id: UserId,
    ) -> Result<Option<UserProfile>, UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<ProfileRow> = user_profiles::table
            .find(user_id.get())
            .select(ProfileRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        Ok(row.map(UserProfile::from))
    }

    async fn update_profile(&self, profile: &UserProfile) -> Result<(), UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated = diesel::update(user_profiles::table.find(profile.user_id.get()))
            .set(ProfileRow::from(profile))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        if updated == 0 {
            return Err(UserRepositoryError::missing_profile(profile.user_id));
        }
        Ok(())
    }

    async fn delete_profile(&self, user_id: UserId) -> Result<(), UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let deleted = diesel::delete(user_profiles::table.find(user_id.get()))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        if deleted == 0 {
            return Err(UserRepositoryError::missing_profile(user_id));
        }
        Ok(())
    }

    async fn list_profiles(&self) -> Result<Vec<UserProfile>, UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<ProfileRow> = user_profiles::table
            .select(ProfileRow::as_select())
            .order_by(user_profiles::user_id.asc())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(rows.into_iter().map(UserProfile::from).collect())
    }
}
