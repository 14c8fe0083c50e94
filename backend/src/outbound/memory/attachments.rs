//! Attachment metadata over [`InMemoryStore`].

use async_trait::async_trait;
use tracing::debug;

use crate::domain::ports::{AttachmentRepository, AttachmentRepositoryError};
use crate::domain::{
    Attachment, AttachmentId, AttachmentTarget, CommentId, NewAttachment, PostId,
};

use super::{InMemoryStore, State, next};

/// Post first, then comment, as the database adapter checks them.
fn verify_targets(state: &State, target: AttachmentTarget) -> Result<(), AttachmentRepositoryError> {
    if let Some(post_id) = target.post_id() {
        if !state.posts.contains_key(&post_id) {
            return Err(AttachmentRepositoryError::missing_post(post_id));
        }
    }
    if let Some(comment_id) = target.comment_id() {
        if !state.comments.contains_key(&comment_id) {
            return Err(AttachmentRepositoryError::missing_comment(comment_id));
        }
    }
    Ok(())
}

#[async_trait]
impl AttachmentRepository for InMemoryStore {
    async fn check_targets(
        &self,
        target: &AttachmentTarget,
    ) -> Result<(), AttachmentRepositoryError> {
        verify_targets(&self.lock(), *target)
    }

    async fn insert(
        &self,
        attachment: &NewAttachment,
    ) -> Result<Attachment, AttachmentRepositoryError> {
        let mut state = self.lock();
        verify_targets(&state, attachment.target)?;

        let id = AttachmentId::from_store(next(&mut state.sequences.attachments));
        let stored = Attachment {
            id,
            user_id: attachment.user_id,
            post_id: attachment.target.post_id(),
            comment_id: attachment.target.comment_id(),
            file_name: attachment.file_name.clone(),
            content_type: attachment.content_type.clone(),
            size_bytes: attachment.size_bytes,
            blob_ref: attachment.blob_ref.clone(),
            created_at: attachment.created_at,
        };
        state.attachments.insert(id, stored.clone());
        debug!(attachment_id = %id, blob_ref = %stored.blob_ref, "inserted attachment");
        Ok(stored)
    }

    async fn find(
        &self,
        attachment_id: AttachmentId,
    ) -> Result<Option<Attachment>, AttachmentRepositoryError> {
        Ok(self.lock().attachments.get(&attachment_id).cloned())
    }

    async fn delete(&self, attachment_id: AttachmentId) -> Result<(), AttachmentRepositoryError> {
        self.lock()
            .attachments
            .remove(&attachment_id)
            .map(|_| ())
            .ok_or_else(|| AttachmentRepositoryError::missing_attachment(attachment_id))
    }

    async fn list_for_post(
        &self,
        post_id: PostId,
    ) -> Result<Vec<Attachment>, AttachmentRepositoryError> {
        Ok(self
            .lock()
            .attachments
            .values()
            .filter(|attachment| attachment.post_id == Some(post_id))
            .cloned()
            .collect())
    }

    async fn list_for_comment(
        &self,
        comment_id: CommentId,
    ) -> Result<Vec<Attachment>, AttachmentRepositoryError> {
        Ok(self
            .lock()
            .attachments
            .values()
            .filter(|attachment| attachment.comment_id == Some(comment_id))
            .cloned()
            .collect())
    }
}
