//! PostgreSQL-backed `ContentRepository` implementation using Diesel ORM.
//!
//! Posts, categories, tags, post tags and comments. Comment writes adjust the
//! parent post's `comments_count` in the same transaction. Post deletion
//! relies on `ON DELETE CASCADE` for comments, ratings, favourites, tag links
//! and attachment rows; the attachment blob references are read first, in the
//! same transaction, so the service can delete the bytes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use tracing::debug;

use crate::domain::ports::{ContentRepository, ContentRepositoryError};
use crate::domain::{
    BlobRef, Category, CategoryId, Comment, CommentBody, CommentId, CommentRemoval, CounterFloor,
    Label, Post, PostChanges, PostDraft, PostId, Tag, TagId, UserId,
};

use super::diesel_helpers::{
    DieselFailure, TxError, classify, collect_rows, counter, map_basic_diesel_error,
    map_basic_pool_error, shift_counter,
};
use super::models::{
    CategoryRow, CommentRow, NewCategoryRow, NewCommentRow, NewPostRow, NewTagRow, PostRow,
    PostTagRow, PostUpdate, TagRow,
};
use super::pool::{DbPool, PoolError};
use super::schema::{attachments, categories, comments, follows, post_tags, posts, tags};

/// Diesel-backed implementation of the `ContentRepository` port.
#[derive(Clone)]
pub struct DieselContentRepository {
    pool: DbPool,
}

impl DieselContentRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

type ContentTx = TxError<ContentRepositoryError>;

fn map_pool_error(error: PoolError) -> ContentRepositoryError {
    map_basic_pool_error(error, ContentRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> ContentRepositoryError {
    map_basic_diesel_error(
        error,
        ContentRepositoryError::query,
        ContentRepositoryError::connection,
        ContentRepositoryError::stale_state,
    )
}

/// Map a write that may collide on a unique `name` column.
fn map_name_write_error(error: diesel::result::Error, name: &Label) -> ContentRepositoryError {
    match classify(&error) {
        DieselFailure::UniqueViolation { .. } => {
            ContentRepositoryError::duplicate_name(name.as_ref())
        }
        _ => map_diesel_error(error),
    }
}

/// Map a post write that references a category.
fn map_post_write_error(
    error: diesel::result::Error,
    category_id: Option<CategoryId>,
) -> ContentRepositoryError {
    match (classify(&error), category_id) {
        (DieselFailure::ForeignKeyViolation { .. }, Some(category_id)) => {
            ContentRepositoryError::missing_category(category_id)
        }
        _ => map_diesel_error(error),
    }
}

async fn lock_post(conn: &mut AsyncPgConnection, post_id: PostId) -> Result<PostRow, ContentTx> {
    posts::table
        .find(post_id.get())
        .select(PostRow::as_select())
        .for_update()
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| TxError::Domain(ContentRepositoryError::missing_post(post_id)))
}

/// Blob references of the attachments on a post or on any of its comments.
async fn post_blob_refs(
    conn: &mut AsyncPgConnection,
    post_id: i64,
) -> Result<Vec<BlobRef>, diesel::result::Error> {
    let comment_ids: Vec<i64> = comments::table
        .filter(comments::post_id.eq(post_id))
        .select(comments::id)
        .load(conn)
        .await?;
    let raw: Vec<String> = attachments::table
        .filter(
            attachments::post_id
                .eq(post_id)
                .or(attachments::comment_id.eq_any(comment_ids)),
        )
        .select(attachments::blob_ref)
        .load(conn)
        .await?;
    Ok(raw.into_iter().map(BlobRef::new).collect())
}

async fn post_exists(
    conn: &mut AsyncPgConnection,
    post_id: PostId,
) -> Result<bool, diesel::result::Error> {
    diesel::select(diesel::dsl::exists(posts::table.find(post_id.get())))
        .get_result(conn)
        .await
}

async fn tag_exists(
    conn: &mut AsyncPgConnection,
    tag_id: TagId,
) -> Result<bool, diesel::result::Error> {
    diesel::select(diesel::dsl::exists(tags::table.find(tag_id.get())))
        .get_result(conn)
        .await
}

fn convert_categories(rows: Vec<CategoryRow>) -> Result<Vec<Category>, ContentRepositoryError> {
    collect_rows(
        rows.into_iter().map(CategoryRow::into_domain),
        ContentRepositoryError::query,
    )
}

fn convert_tags(rows: Vec<TagRow>) -> Result<Vec<Tag>, ContentRepositoryError> {
    collect_rows(
        rows.into_iter().map(TagRow::into_domain),
        ContentRepositoryError::query,
    )
}

fn convert_posts(rows: Vec<PostRow>) -> Vec<Post> {
    rows.into_iter().map(Post::from).collect()
}

#[async_trait]
impl ContentRepository for DieselContentRepository {
    async fn insert_post(
        &self,
        author_id: UserId,
        draft: &PostDraft,
        now: DateTime<Utc>,
    ) -> Result<Post, ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: PostRow = diesel::insert_into(posts::table)
            .values(NewPostRow {
                author_id: author_id.get(),
                category_id: draft.category_id.get(),
                title: &draft.title,
                content: &draft.content,
                created_at: now,
                updated_at: now,
            })
            .returning(PostRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(|err| map_post_write_error(err, Some(draft.category_id)))?;

        debug!(post_id = row.id, author_id = %author_id, "inserted post");
        Ok(Post::from(row))
    }

    async fn find_post(&self, post_id: PostId) -> Result<Option<Post>, ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<PostRow> = posts::table
            .find(post_id.get())
            .select(PostRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        Ok(row.map(Post::from))
    }

    async fn update_post(
        &self,
        post_id: PostId,
        changes: &PostChanges,
        now: DateTime<Utc>,
    ) -> Result<Post, ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let update = PostUpdate {
            category_id: changes.category_id.map(CategoryId::get),
            title: changes.title.as_deref(),
            content: changes.content.as_deref(),
            updated_at: now,
        };

        let row: Option<PostRow> = diesel::update(posts::table.find(post_id.get()))
            .set(&update)
            .returning(PostRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(|err| map_post_write_error(err, changes.category_id))?;

        row.map(Post::from)
            .ok_or_else(|| ContentRepositoryError::missing_post(post_id))
    }

    async fn delete_post(&self, post_id: PostId) -> Result<Vec<BlobRef>, ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let orphaned = conn
            .build_transaction()
            .serializable()
            .run(|conn| {
                async move {
                    lock_post(conn, post_id).await?;
                    let orphaned = post_blob_refs(conn, post_id.get()).await?;
                    diesel::delete(posts::table.find(post_id.get()))
                        .execute(conn)
                        .await?;
                    Ok(orphaned)
                }
                .scope_boxed()
            })
            .await
            .map_err(|err: ContentTx| err.resolve(map_diesel_error))?;

        debug!(post_id = %post_id, blobs = orphaned.len(), "deleted post");
        Ok(orphaned)
    }

    async fn list_posts(&self) -> Result<Vec<Post>, ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<PostRow> = posts::table
            .select(PostRow::as_select())
            .order_by(posts::id.asc())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(convert_posts(rows))
    }

    async fn list_posts_by_author(
        &self,
        author_id: UserId,
    ) -> Result<Vec<Post>, ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<PostRow> = posts::table
            .filter(posts::author_id.eq(author_id.get()))
            .select(PostRow::as_select())
            .order_by(posts::id.asc())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(convert_posts(rows))
    }

    async fn list_posts_by_followed(
        &self,
        follower_id: UserId,
    ) -> Result<Vec<Post>, ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let followed = follows::table
            .filter(follows::follower_id.eq(follower_id.get()))
            .select(follows::followed_id);

        let rows: Vec<PostRow> = posts::table
            .filter(posts::author_id.eq_any(followed))
            .select(PostRow::as_select())
            .order_by((posts::created_at.desc(), posts::id.desc()))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(convert_posts(rows))
    }

    async fn trending_posts(&self, limit: u32) -> Result<Vec<Post>, ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<PostRow> = posts::table
            .select(PostRow::as_select())
            .order_by((
                posts::likes_count.desc(),
                posts::comments_count.desc(),
                posts::id.asc(),
            ))
            .limit(i64::from(limit))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(convert_posts(rows))
    }

    async fn insert_category(&self, name: &Label) -> Result<Category, ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: CategoryRow = diesel::insert_into(categories::table)
            .values(NewCategoryRow {
                name: name.as_ref(),
            })
            .returning(CategoryRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(|err| map_name_write_error(err, name))?;

        row.into_domain().map_err(ContentRepositoryError::query)
    }

    async fn rename_category(
        &self,
        category_id: CategoryId,
        name: &Label,
    ) -> Result<Category, ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<CategoryRow> = diesel::update(categories::table.find(category_id.get()))
            .set(categories::name.eq(name.as_ref()))
            .returning(CategoryRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(|err| map_name_write_error(err, name))?;

        row.ok_or_else(|| ContentRepositoryError::missing_category(category_id))?
            .into_domain()
            .map_err(ContentRepositoryError::query)
    }

    async fn delete_category(&self, category_id: CategoryId) -> Result<(), ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        conn.build_transaction()
            .serializable()
            .run(|conn| {
                async move {
                    let in_use: bool = diesel::select(diesel::dsl::exists(
                        posts::table.filter(posts::category_id.eq(category_id.get())),
                    ))
                    .get_result(conn)
                    .await?;
                    if in_use {
                        return Err(TxError::Domain(ContentRepositoryError::category_in_use(
                            category_id,
                        )));
                    }

                    let deleted = diesel::delete(categories::table.find(category_id.get()))
                        .execute(conn)
                        .await?;
                    if deleted == 0 {
                        return Err(TxError::Domain(ContentRepositoryError::missing_category(
                            category_id,
                        )));
                    }
                    Ok(())
                }
                .scope_boxed()
            })
            .await
            .map_err(|err: ContentTx| err.resolve(map_diesel_error))
    }

    async fn find_category(
        &self,
        category_id: CategoryId,
    ) -> Result<Option<Category>, ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<CategoryRow> = categories::table
            .find(category_id.get())
            .select(CategoryRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(|row| row.into_domain().map_err(ContentRepositoryError::query))
            .transpose()
    }

    async fn list_categories(&self) -> Result<Vec<Category>, ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<CategoryRow> = categories::table
            .select(CategoryRow::as_select())
            .order_by(categories::id.asc())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        convert_categories(rows)
    }

    async fn insert_tag(&self, name: &Label) -> Result<Tag, ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: TagRow = diesel::insert_into(tags::table)
            .values(NewTagRow {
                name: name.as_ref(),
            })
            .returning(TagRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(|err| map_name_write_error(err, name))?;

        row.into_domain().map_err(ContentRepositoryError::query)
    }

    async fn rename_tag(&self, tag_id: TagId, name: &Label) -> Result<Tag, ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<TagRow> = diesel::update(tags::table.find(tag_id.get()))
            .set(tags::name.eq(name.as_ref()))
            .returning(TagRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(|err| map_name_write_error(err, name))?;

        row.ok_or_else(|| ContentRepositoryError::missing_tag(tag_id))?
            .into_domain()
            .map_err(ContentRepositoryError::query)
    }

    async fn delete_tag(&self, tag_id: TagId) -> Result<(), ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let deleted = diesel::delete(tags::table.find(tag_id.get()))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        if deleted == 0 {
            return Err(ContentRepositoryError::missing_tag(tag_id));
        }
        Ok(())
    }

    async fn find_tag(&self, tag_id: TagId) -> Result<Option<Tag>, ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<TagRow> = tags::table
            .find(tag_id.get())
            .select(TagRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(|row| row.into_domain().map_err(ContentRepositoryError::query))
            .transpose()
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<TagRow> = tags::table
            .select(TagRow::as_select())
            .order_by(tags::id.asc())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        convert_tags(rows)
    }

    async fn attach_tag(
        &self,
        post_id: PostId,
        tag_id: TagId,
    ) -> Result<(), ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        conn.transaction(|conn| {
            async move {
                if !post_exists(conn, post_id).await? {
                    return Err(TxError::Domain(ContentRepositoryError::missing_post(post_id)));
                }
                if !tag_exists(conn, tag_id).await? {
                    return Err(TxError::Domain(ContentRepositoryError::missing_tag(tag_id)));
                }

                let inserted = diesel::insert_into(post_tags::table)
                    .values(PostTagRow {
                        post_id: post_id.get(),
                        tag_id: tag_id.get(),
                    })
                    .on_conflict_do_nothing()
                    .execute(conn)
                    .await?;
                if inserted == 0 {
                    return Err(TxError::Domain(ContentRepositoryError::duplicate_link(
                        post_id, tag_id,
                    )));
                }
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .map_err(|err: ContentTx| err.resolve(map_diesel_error))
    }

    async fn detach_tag(
        &self,
        post_id: PostId,
        tag_id: TagId,
    ) -> Result<(), ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let deleted = diesel::delete(post_tags::table.find((post_id.get(), tag_id.get())))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        if deleted == 0 {
            return Err(ContentRepositoryError::missing_link(post_id, tag_id));
        }
        Ok(())
    }

    async fn list_post_tags(&self, post_id: PostId) -> Result<Vec<Tag>, ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        if !post_exists(&mut conn, post_id)
            .await
            .map_err(map_diesel_error)?
        {
            return Err(ContentRepositoryError::missing_post(post_id));
        }

        let rows: Vec<TagRow> = post_tags::table
            .inner_join(tags::table)
            .filter(post_tags::post_id.eq(post_id.get()))
            .select(TagRow::as_select())
            .order_by(tags::id.asc())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        convert_tags(rows)
    }

    async fn list_tag_posts(&self, tag_id: TagId) -> Result<Vec<Post>, ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        if !tag_exists(&mut conn, tag_id)
            .await
            .map_err(map_diesel_error)?
        {
            return Err(ContentRepositoryError::missing_tag(tag_id));
        }

        let rows: Vec<PostRow> = post_tags::table
            .inner_join(posts::table)
            .filter(post_tags::tag_id.eq(tag_id.get()))
            .select(PostRow::as_select())
            .order_by(posts::id.asc())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(convert_posts(rows))
    }

    async fn insert_comment(
        &self,
        post_id: PostId,
        author_id: UserId,
        body: &CommentBody,
        now: DateTime<Utc>,
    ) -> Result<Comment, ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let content = body.clone().into_inner();

        let comment = conn
            .build_transaction()
            .serializable()
            .run(|conn| {
                async move {
                    lock_post(conn, post_id).await?;
                    let row: CommentRow = diesel::insert_into(comments::table)
                        .values(NewCommentRow {
                            post_id: post_id.get(),
                            author_id: author_id.get(),
                            content: &content,
                            created_at: now,
                            updated_at: now,
                        })
                        .returning(CommentRow::as_returning())
                        .get_result(conn)
                        .await?;

                    diesel::update(posts::table.find(post_id.get()))
                        .set(posts::comments_count.eq(posts::comments_count + 1))
                        .execute(conn)
                        .await?;
                    Ok(Comment::from(row))
                }
                .scope_boxed()
            })
            .await
            .map_err(|err: ContentTx| err.resolve(map_diesel_error))?;

        debug!(comment_id = %comment.id, post_id = %post_id, "inserted comment");
        Ok(comment)
    }

    async fn update_comment(
        &self,
        comment_id: CommentId,
        body: &CommentBody,
        now: DateTime<Utc>,
    ) -> Result<Comment, ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let content = body.clone().into_inner();
        let row: Option<CommentRow> = diesel::update(comments::table.find(comment_id.get()))
            .set((comments::content.eq(content), comments::updated_at.eq(now)))
            .returning(CommentRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(Comment::from)
            .ok_or_else(|| ContentRepositoryError::missing_comment(comment_id))
    }

    async fn delete_comment(
        &self,
        comment_id: CommentId,
    ) -> Result<CommentRemoval, ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        conn.build_transaction()
            .serializable()
            .run(|conn| {
                async move {
                    let post_id: i64 = comments::table
                        .find(comment_id.get())
                        .select(comments::post_id)
                        .first(conn)
                        .await
                        .optional()?
                        .ok_or_else(|| {
                            TxError::Domain(ContentRepositoryError::missing_comment(comment_id))
                        })?;
                    let post = lock_post(conn, PostId::from_store(post_id)).await?;
                    let orphaned: Vec<String> = attachments::table
                        .filter(attachments::comment_id.eq(comment_id.get()))
                        .select(attachments::blob_ref)
                        .load(conn)
                        .await?;

                    diesel::delete(comments::table.find(comment_id.get()))
                        .execute(conn)
                        .await?;
                    diesel::update(posts::table.find(post_id))
                        .set(posts::comments_count.eq(shift_counter("comments_count", -1)))
                        .execute(conn)
                        .await?;
                    Ok(CommentRemoval {
                        floor: CounterFloor::of(counter(post.comments_count)),
                        orphaned_blobs: orphaned.into_iter().map(BlobRef::new).collect(),
                    })
                }
                .scope_boxed()
            })
            .await
            .map_err(|err: ContentTx| err.resolve(map_diesel_error))
    }

    async fn find_comment(
        &self,
        comment_id: CommentId,
    ) -> Result<Option<Comment>, ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<CommentRow> = comments::table
            .find(comment_id.get())
            .select(CommentRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        Ok(row.map(Comment::from))
    }

    async fn list_comments(&self, post_id: PostId) -> Result<Vec<Comment>, ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<CommentRow> = comments::table
            .filter(comments::post_id.eq(post_id.get()))
            .select(CommentRow::as_select())
            .order_by(comments::id.asc())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(rows.into_iter().map(Comment::from).collect())
    }
}
