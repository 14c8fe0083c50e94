//! Port for attachment metadata.
use async_trait::async_trait;

use crate::domain::{Attachment, AttachmentId, AttachmentTarget, CommentId, NewAttachment, PostId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by attachment repository adapters.
    pub enum AttachmentRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "attachment repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "attachment repository query failed: {message}",
        /// The targeted post does not exist.
        MissingPost { post_id: PostId } => "post {post_id} does not exist",
        /// The targeted comment does not exist.
        MissingComment { comment_id: CommentId } => "comment {comment_id} does not exist",
        /// The attachment does not exist.
        MissingAttachment { attachment_id: AttachmentId } =>
            "attachment {attachment_id} does not exist",
    }
}

/// Attachment metadata storage. Blob bytes live behind
/// [`BlobStore`](super::BlobStore).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttachmentRepository: Send + Sync {
    /// Check every target named by `target` exists.
    async fn check_targets(&self, target: &AttachmentTarget)
    -> Result<(), AttachmentRepositoryError>;

    /// Insert a metadata row, re-checking the targets in the same
    /// transaction.
    async fn insert(&self, attachment: &NewAttachment)
    -> Result<Attachment, AttachmentRepositoryError>;

    /// Fetch an attachment.
    async fn find(
        &self,
        attachment_id: AttachmentId,
    ) -> Result<Option<Attachment>, AttachmentRepositoryError>;

    /// Delete a metadata row.
    async fn delete(&self, attachment_id: AttachmentId) -> Result<(), AttachmentRepositoryError>;

    /// Attachments of a post, by ascending id.
    async fn list_for_post(
        &self,
        post_id: PostId,
    ) -> Result<Vec<Attachment>, AttachmentRepositoryError>;

    /// Attachments of a comment, by ascending id.
    async fn list_for_comment(
        &self,
        comment_id: CommentId,
    ) -> Result<Vec<Attachment>, AttachmentRepositoryError>;
}
