//! Posts, categories, tags and comments.
//!
//! Post edits are author-only. Category, tag and post-tag administration
//! requires the admin flag. Comment creation and deletion move the parent
//! post's `comments_count` inside the same repository transaction. Post and
//! comment deletes release the blobs of the attachment rows they cascade to.

use std::sync::Arc;

use mockable::Clock;
use serde_json::json;
use tracing::{debug, warn};

use crate::domain::attachment_service::release_orphaned_blobs;
use crate::domain::ports::{BlobStore, ContentRepository, ContentRepositoryError};
use crate::domain::{
    AdminOverride, Caller, Category, CategoryId, Comment, CommentBody, CommentId,
    ContentValidationError, CounterFloor, Error, Label, Post, PostChanges, PostDraft, PostId,
    ServiceResult, Tag, TagId, authorize, require_admin,
};

/// Upper bound applied to trending queries.
pub const TRENDING_LIMIT_MAX: u32 = 100;

/// Content service implementing the post, taxonomy and comment operations.
#[derive(Clone)]
pub struct ContentService<R, B> {
    content: Arc<R>,
    blobs: Arc<B>,
    clock: Arc<dyn Clock>,
}

impl<R, B> ContentService<R, B> {
    /// Create a new service over the content repository and the blob store
    /// holding attachment bytes.
    pub fn new(content: Arc<R>, blobs: Arc<B>, clock: Arc<dyn Clock>) -> Self {
        Self {
            content,
            blobs,
            clock,
        }
    }
}

fn map_validation_error(err: ContentValidationError) -> Error {
    Error::invalid_argument(err.to_string()).with_details(json!({ "field": err.field() }))
}

impl<R, B> ContentService<R, B>
where
    R: ContentRepository,
    B: BlobStore,
{
    fn map_content_error(error: ContentRepositoryError) -> Error {
        match error {
            ContentRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("content repository unavailable: {message}"))
            }
            ContentRepositoryError::Query { message } => {
                Error::internal(format!("content repository error: {message}"))
            }
            ContentRepositoryError::StaleState { message } => {
                Error::conflict(format!("content changed concurrently: {message}"))
            }
            err @ (ContentRepositoryError::MissingPost { .. }
            | ContentRepositoryError::MissingCategory { .. }
            | ContentRepositoryError::MissingTag { .. }
            | ContentRepositoryError::MissingComment { .. }
            | ContentRepositoryError::MissingLink { .. }) => Error::not_found(err.to_string()),
            err @ (ContentRepositoryError::DuplicateName { .. }
            | ContentRepositoryError::DuplicateLink { .. }) => {
                Error::already_exists(err.to_string())
            }
            err @ ContentRepositoryError::CategoryInUse { .. } => {
                Error::invalid_operation(err.to_string())
            }
        }
    }

    // Posts

    /// Publish a post authored by `caller`.
    pub async fn create_post(
        &self,
        caller: &Caller,
        category_id: CategoryId,
        title: String,
        content: String,
    ) -> ServiceResult<Post> {
        let draft = PostDraft::new(category_id, title, content).map_err(map_validation_error)?;
        let post = self
            .content
            .insert_post(caller.id, &draft, self.clock.utc())
            .await
            .map_err(Self::map_content_error)?;
        debug!(post = %post.id, author = %caller.id, "post created");
        Ok(post)
    }

    /// Fetch a post.
    pub async fn get_post(&self, post_id: PostId) -> ServiceResult<Post> {
        self.content
            .find_post(post_id)
            .await
            .map_err(Self::map_content_error)?
            .ok_or_else(|| Error::not_found(format!("post {post_id} does not exist")))
    }

    /// Edit a post. Only the author may edit; admins have no override.
    pub async fn update_post(
        &self,
        caller: &Caller,
        post_id: PostId,
        category_id: Option<CategoryId>,
        title: Option<String>,
        content: Option<String>,
    ) -> ServiceResult<Post> {
        let changes =
            PostChanges::new(category_id, title, content).map_err(map_validation_error)?;
        if changes.is_empty() {
            return Err(Error::invalid_argument("no post fields supplied"));
        }
        let post = self.get_post(post_id).await?;
        authorize(caller, post.author_id, AdminOverride::NotApplicable)?;
        let updated = self
            .content
            .update_post(post_id, &changes, self.clock.utc())
            .await
            .map_err(Self::map_content_error)?;
        debug!(post = %post_id, "post updated");
        Ok(updated)
    }

    /// Delete a post together with its dependants. Author only.
    pub async fn delete_post(&self, caller: &Caller, post_id: PostId) -> ServiceResult<()> {
        let post = self.get_post(post_id).await?;
        authorize(caller, post.author_id, AdminOverride::NotApplicable)?;
        let orphaned = self
            .content
            .delete_post(post_id)
            .await
            .map_err(Self::map_content_error)?;
        release_orphaned_blobs(self.blobs.as_ref(), &orphaned).await;
        debug!(post = %post_id, attachments = orphaned.len(), "post deleted");
        Ok(())
    }

    /// All posts, newest first.
    pub async fn list_posts(&self) -> ServiceResult<Vec<Post>> {
        self.content
            .list_posts()
            .await
            .map_err(Self::map_content_error)
    }

    /// Posts authored by the caller, newest first.
    pub async fn list_my_posts(&self, caller: &Caller) -> ServiceResult<Vec<Post>> {
        self.content
            .list_posts_by_author(caller.id)
            .await
            .map_err(Self::map_content_error)
    }

    /// Posts by authors the caller follows, newest first.
    pub async fn list_followed_authors_posts(&self, caller: &Caller) -> ServiceResult<Vec<Post>> {
        self.content
            .list_posts_by_followed(caller.id)
            .await
            .map_err(Self::map_content_error)
    }

    /// Most-liked posts. `limit` is clamped to `1..=TRENDING_LIMIT_MAX`.
    pub async fn trending_posts(&self, limit: u32) -> ServiceResult<Vec<Post>> {
        let limit = limit.clamp(1, TRENDING_LIMIT_MAX);
        self.content
            .trending_posts(limit)
            .await
            .map_err(Self::map_content_error)
    }

    // Categories

    /// Create a category. Admin only.
    pub async fn create_category(&self, caller: &Caller, name: &str) -> ServiceResult<Category> {
        require_admin(caller)?;
        let name = Label::new(name).map_err(map_validation_error)?;
        let category = self
            .content
            .insert_category(&name)
            .await
            .map_err(Self::map_content_error)?;
        debug!(category = %category.id, "category created");
        Ok(category)
    }

    /// Rename a category. Admin only.
    pub async fn update_category(
        &self,
        caller: &Caller,
        category_id: CategoryId,
        name: &str,
    ) -> ServiceResult<Category> {
        require_admin(caller)?;
        let name = Label::new(name).map_err(map_validation_error)?;
        self.content
            .rename_category(category_id, &name)
            .await
            .map_err(Self::map_content_error)
    }

    /// Delete a category that no post uses. Admin only.
    pub async fn delete_category(
        &self,
        caller: &Caller,
        category_id: CategoryId,
    ) -> ServiceResult<()> {
        require_admin(caller)?;
        self.content
            .delete_category(category_id)
            .await
            .map_err(Self::map_content_error)
    }

    /// Fetch a category.
    pub async fn get_category(&self, category_id: CategoryId) -> ServiceResult<Category> {
        self.content
            .find_category(category_id)
            .await
            .map_err(Self::map_content_error)?
            .ok_or_else(|| Error::not_found(format!("category {category_id} does not exist")))
    }

    /// All categories.
    pub async fn list_categories(&self) -> ServiceResult<Vec<Category>> {
        self.content
            .list_categories()
            .await
            .map_err(Self::map_content_error)
    }

    // Tags

    /// Create a tag. Admin only.
    pub async fn create_tag(&self, caller: &Caller, name: &str) -> ServiceResult<Tag> {
        require_admin(caller)?;
        let name = Label::new(name).map_err(map_validation_error)?;
        let tag = self
            .content
            .insert_tag(&name)
            .await
            .map_err(Self::map_content_error)?;
        debug!(tag = %tag.id, "tag created");
        Ok(tag)
    }

    /// Rename a tag. Admin only.
    pub async fn update_tag(
        &self,
        caller: &Caller,
        tag_id: TagId,
        name: &str,
    ) -> ServiceResult<Tag> {
        require_admin(caller)?;
        let name = Label::new(name).map_err(map_validation_error)?;
        self.content
            .rename_tag(tag_id, &name)
            .await
            .map_err(Self::map_content_error)
    }

    /// Delete a tag and its post links. Admin only.
    pub async fn delete_tag(&self, caller: &Caller, tag_id: TagId) -> ServiceResult<()> {
        require_admin(caller)?;
        self.content
            .delete_tag(tag_id)
            .await
            .map_err(Self::map_content_error)
    }

    /// Fetch a tag.
    pub async fn get_tag(&self, tag_id: TagId) -> ServiceResult<Tag> {
        self.content
            .find_tag(tag_id)
            .await
            .map_err(Self::map_content_error)?
            .ok_or_else(|| Error::not_found(format!("tag {tag_id} does not exist")))
    }

    /// All tags.
    pub async fn list_tags(&self) -> ServiceResult<Vec<Tag>> {
        self.content
            .list_tags()
            .await
            .map_err(Self::map_content_error)
    }

    /// Tag a post. Admin only.
    pub async fn attach_tag(
        &self,
        caller: &Caller,
        post_id: PostId,
        tag_id: TagId,
    ) -> ServiceResult<()> {
        require_admin(caller)?;
        self.content
            .attach_tag(post_id, tag_id)
            .await
            .map_err(Self::map_content_error)?;
        debug!(post = %post_id, tag = %tag_id, "tag attached");
        Ok(())
    }

    /// Untag a post. Admin only.
    pub async fn detach_tag(
        &self,
        caller: &Caller,
        post_id: PostId,
        tag_id: TagId,
    ) -> ServiceResult<()> {
        require_admin(caller)?;
        self.content
            .detach_tag(post_id, tag_id)
            .await
            .map_err(Self::map_content_error)?;
        debug!(post = %post_id, tag = %tag_id, "tag detached");
        Ok(())
    }

    /// Tags on a post.
    pub async fn list_post_tags(&self, post_id: PostId) -> ServiceResult<Vec<Tag>> {
        self.content
            .list_post_tags(post_id)
            .await
            .map_err(Self::map_content_error)
    }

    /// Posts carrying a tag, newest first.
    pub async fn list_tag_posts(&self, tag_id: TagId) -> ServiceResult<Vec<Post>> {
        self.content
            .list_tag_posts(tag_id)
            .await
            .map_err(Self::map_content_error)
    }

    // Comments

    /// Comment on a post.
    pub async fn create_comment(
        &self,
        caller: &Caller,
        post_id: PostId,
        content: String,
    ) -> ServiceResult<Comment> {
        let body = CommentBody::new(content).map_err(map_validation_error)?;
        let comment = self
            .content
            .insert_comment(post_id, caller.id, &body, self.clock.utc())
            .await
            .map_err(Self::map_content_error)?;
        debug!(comment = %comment.id, post = %post_id, "comment created");
        Ok(comment)
    }

    /// Replace a comment body. Author only.
    pub async fn update_comment(
        &self,
        caller: &Caller,
        comment_id: CommentId,
        content: String,
    ) -> ServiceResult<Comment> {
        let body = CommentBody::new(content).map_err(map_validation_error)?;
        let comment = self.get_comment(comment_id).await?;
        authorize(caller, comment.author_id, AdminOverride::NotApplicable)?;
        self.content
            .update_comment(comment_id, &body, self.clock.utc())
            .await
            .map_err(Self::map_content_error)
    }

    /// Delete a comment. Author or admin.
    pub async fn delete_comment(
        &self,
        caller: &Caller,
        comment_id: CommentId,
    ) -> ServiceResult<()> {
        let comment = self.get_comment(comment_id).await?;
        authorize(caller, comment.author_id, AdminOverride::Allowed)?;
        let removal = self
            .content
            .delete_comment(comment_id)
            .await
            .map_err(Self::map_content_error)?;
        release_orphaned_blobs(self.blobs.as_ref(), &removal.orphaned_blobs).await;
        if removal.floor == CounterFloor::Clamped {
            warn!(
                comment = %comment_id,
                post = %comment.post_id,
                "comment counter was already zero; recount advised"
            );
        }
        debug!(comment = %comment_id, post = %comment.post_id, "comment deleted");
        Ok(())
    }

    /// Fetch a comment.
    pub async fn get_comment(&self, comment_id: CommentId) -> ServiceResult<Comment> {
        self.content
            .find_comment(comment_id)
            .await
            .map_err(Self::map_content_error)?
            .ok_or_else(|| Error::not_found(format!("comment {comment_id} does not exist")))
    }

    /// Comments on a post, oldest first.
    pub async fn list_comments(&self, post_id: PostId) -> ServiceResult<Vec<Comment>> {
        self.content
            .list_comments(post_id)
            .await
            .map_err(Self::map_content_error)
    }
}

#[cfg(test)]
#[path = "content_service_tests.rs"]
mod tests;
