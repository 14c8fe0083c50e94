//! Port for posts, categories, tags, post tags and comments.
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    BlobRef, Category, CategoryId, Comment, CommentBody, CommentId, CommentRemoval, Label, Post,
    PostChanges, PostDraft, PostId, Tag, TagId, UserId,
};

use super::define_port_error;

define_port_error! {
    /// Errors raised by content repository adapters.
    pub enum ContentRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "content repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "content repository query failed: {message}",
        /// The post does not exist.
        MissingPost { post_id: PostId } => "post {post_id} does not exist",
        /// The category does not exist.
        MissingCategory { category_id: CategoryId } => "category {category_id} does not exist",
        /// The tag does not exist.
        MissingTag { tag_id: TagId } => "tag {tag_id} does not exist",
        /// The comment does not exist.
        MissingComment { comment_id: CommentId } => "comment {comment_id} does not exist",
        /// A category or tag with this name exists.
        DuplicateName { name: String } => "the name '{name}' is already taken",
        /// Posts are still filed under the category.
        CategoryInUse { category_id: CategoryId } => "category {category_id} still has posts",
        /// The post already carries the tag.
        DuplicateLink { post_id: PostId, tag_id: TagId } =>
            "post {post_id} is already tagged with {tag_id}",
        /// The post does not carry the tag.
        MissingLink { post_id: PostId, tag_id: TagId } =>
            "post {post_id} is not tagged with {tag_id}",
        /// Concurrent transaction invalidated the observed state.
        StaleState { message: String } => "content changed concurrently: {message}",
    }
}

/// Content storage.
///
/// Comment insertion and deletion co-commit the `comments_count` delta.
/// Deleting a post removes its comments, ratings, favourites, tag links and
/// attachment rows. Deletes report the blob references of the attachment rows
/// they removed so the caller can release the bytes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Insert a post with zeroed counters, checking the category exists.
    async fn insert_post(
        &self,
        author_id: UserId,
        draft: &PostDraft,
        now: DateTime<Utc>,
    ) -> Result<Post, ContentRepositoryError>;

    /// Fetch a post.
    async fn find_post(&self, post_id: PostId) -> Result<Option<Post>, ContentRepositoryError>;

    /// Apply a partial update and bump `updated_at`.
    async fn update_post(
        &self,
        post_id: PostId,
        changes: &PostChanges,
        now: DateTime<Utc>,
    ) -> Result<Post, ContentRepositoryError>;

    /// Delete a post and its dependants, returning the orphaned blobs.
    async fn delete_post(&self, post_id: PostId) -> Result<Vec<BlobRef>, ContentRepositoryError>;

    /// All posts, newest first.
    async fn list_posts(&self) -> Result<Vec<Post>, ContentRepositoryError>;

    /// Posts by one author, newest first.
    async fn list_posts_by_author(
        &self,
        author_id: UserId,
    ) -> Result<Vec<Post>, ContentRepositoryError>;

    /// Posts whose author `follower_id` follows, newest first.
    async fn list_posts_by_followed(
        &self,
        follower_id: UserId,
    ) -> Result<Vec<Post>, ContentRepositoryError>;

    /// Top posts by likes, then comments, then ascending id.
    async fn trending_posts(&self, limit: u32) -> Result<Vec<Post>, ContentRepositoryError>;

    /// Insert a category.
    async fn insert_category(&self, name: &Label) -> Result<Category, ContentRepositoryError>;

    /// Rename a category.
    async fn rename_category(
        &self,
        category_id: CategoryId,
        name: &Label,
    ) -> Result<Category, ContentRepositoryError>;

    /// Delete an unused category.
    async fn delete_category(&self, category_id: CategoryId) -> Result<(), ContentRepositoryError>;

    /// Fetch a category.
    async fn find_category(
        &self,
        category_id: CategoryId,
    ) -> Result<Option<Category>, ContentRepositoryError>;

    /// All categories by name.
    async fn list_categories(&self) -> Result<Vec<Category>, ContentRepositoryError>;

    /// Insert a tag.
    async fn insert_tag(&self, name: &Label) -> Result<Tag, ContentRepositoryError>;

    /// Rename a tag.
    async fn rename_tag(&self, tag_id: TagId, name: &Label) -> Result<Tag, ContentRepositoryError>;

    /// Delete a tag and its post links.
    async fn delete_tag(&self, tag_id: TagId) -> Result<(), ContentRepositoryError>;

    /// Fetch a tag.
    async fn find_tag(&self, tag_id: TagId) -> Result<Option<Tag>, ContentRepositoryError>;

    /// All tags by name.
    async fn list_tags(&self) -> Result<Vec<Tag>, ContentRepositoryError>;

    /// Link a tag to a post, checking both exist.
    async fn attach_tag(&self, post_id: PostId, tag_id: TagId)
    -> Result<(), ContentRepositoryError>;

    /// Unlink a tag from a post.
    async fn detach_tag(&self, post_id: PostId, tag_id: TagId)
    -> Result<(), ContentRepositoryError>;

    /// Tags of a post by name.
    async fn list_post_tags(&self, post_id: PostId) -> Result<Vec<Tag>, ContentRepositoryError>;

    /// Posts carrying a tag, newest first.
    async fn list_tag_posts(&self, tag_id: TagId) -> Result<Vec<Post>, ContentRepositoryError>;

    /// Insert a comment and increment `comments_count` of its post.
    async fn insert_comment(
        &self,
        post_id: PostId,
        author_id: UserId,
        body: &CommentBody,
        now: DateTime<Utc>,
    ) -> Result<Comment, ContentRepositoryError>;

    /// Replace a comment body and bump `updated_at`.
    async fn update_comment(
        &self,
        comment_id: CommentId,
        body: &CommentBody,
        now: DateTime<Utc>,
    ) -> Result<Comment, ContentRepositoryError>;

    /// Delete a comment and its attachment rows and decrement
    /// `comments_count`, floored at zero.
    async fn delete_comment(
        &self,
        comment_id: CommentId,
    ) -> Result<CommentRemoval, ContentRepositoryError>;

    /// Fetch a comment.
    async fn find_comment(
        &self,
        comment_id: CommentId,
    ) -> Result<Option<Comment>, ContentRepositoryError>;

    /// Comments on a post, oldest first.
    async fn list_comments(&self, post_id: PostId) -> Result<Vec<Comment>, ContentRepositoryError>;
}
