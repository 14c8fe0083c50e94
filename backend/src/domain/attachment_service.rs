//! Attachment upload and removal across the blob store and the metadata
//! repository.
//!
//! The two stores cannot share a transaction, so upload runs as a short saga:
//! validate, check targets, save the blob, insert the row, and delete the blob
//! again if the insert fails. Deletion removes the blob first so a failure
//! never leaves a row pointing at nothing.

use std::sync::Arc;

use mockable::Clock;
use serde_json::json;
use tracing::{debug, error, warn};

use crate::domain::ports::{
    AttachmentRepository, AttachmentRepositoryError, BlobStore, BlobStoreError,
};
use crate::domain::{
    AdminOverride, Attachment, AttachmentId, BlobRef, Caller, CommentId, Error, NewAttachment,
    PostId, ServiceResult, UploadRequest, authorize,
};

/// Saga step that failed without being rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailedStep {
    CompensateBlob,
    BlobDelete,
    MetadataDelete,
}

impl FailedStep {
    fn as_str(self) -> &'static str {
        match self {
            Self::CompensateBlob => "compensate_blob",
            Self::BlobDelete => "blob_delete",
            Self::MetadataDelete => "metadata_delete",
        }
    }
}

/// Attachment service coordinating blob and metadata storage.
#[derive(Clone)]
pub struct AttachmentService<R, B> {
    attachments: Arc<R>,
    blobs: Arc<B>,
    clock: Arc<dyn Clock>,
}

impl<R, B> AttachmentService<R, B> {
    /// Create a new service with the given repository, blob store and clock.
    pub fn new(attachments: Arc<R>, blobs: Arc<B>, clock: Arc<dyn Clock>) -> Self {
        Self {
            attachments,
            blobs,
            clock,
        }
    }
}

impl<R, B> AttachmentService<R, B>
where
    R: AttachmentRepository,
    B: BlobStore,
{
    fn map_attachment_error(error: AttachmentRepositoryError) -> Error {
        match error {
            AttachmentRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("attachment repository unavailable: {message}"))
            }
            AttachmentRepositoryError::Query { message } => {
                Error::internal(format!("attachment repository error: {message}"))
            }
            err @ (AttachmentRepositoryError::MissingPost { .. }
            | AttachmentRepositoryError::MissingComment { .. }
            | AttachmentRepositoryError::MissingAttachment { .. }) => {
                Error::not_found(err.to_string())
            }
        }
    }

    fn map_blob_error(error: BlobStoreError) -> Error {
        Error::internal(error.to_string())
    }

    fn partial_failure(
        step: FailedStep,
        blob_ref: &BlobRef,
        attachment_id: Option<AttachmentId>,
        cause: &dyn std::fmt::Display,
    ) -> Error {
        Error::partial_failure(format!("attachment {} failed: {cause}", step.as_str()))
            .with_details(json!({
                "failedStep": step.as_str(),
                "blobRef": blob_ref.as_str(),
                "attachmentId": attachment_id,
                "cause": cause.to_string(),
            }))
    }

    /// Store a file and record it against a post and/or comment.
    pub async fn upload(
        &self,
        caller: &Caller,
        request: UploadRequest,
    ) -> ServiceResult<Attachment> {
        let (file, target) = request
            .validate()
            .map_err(|err| Error::invalid_argument(err.to_string()))?;
        self.attachments
            .check_targets(&target)
            .await
            .map_err(Self::map_attachment_error)?;

        let blob_ref = self
            .blobs
            .save(file.bytes(), file.file_name())
            .await
            .map_err(Self::map_blob_error)?;

        let row = NewAttachment {
            user_id: caller.id,
            target,
            file_name: file.file_name().to_owned(),
            content_type: file.content_type().to_owned(),
            size_bytes: file.size_bytes(),
            blob_ref: blob_ref.clone(),
            created_at: self.clock.utc(),
        };
        match self.attachments.insert(&row).await {
            Ok(attachment) => {
                debug!(attachment = %attachment.id, blob = %blob_ref, "attachment stored");
                Ok(attachment)
            }
            Err(insert_error) => {
                let mapped = Self::map_attachment_error(insert_error);
                match self.blobs.delete(&blob_ref).await {
                    Ok(()) => {
                        warn!(
                            blob = %blob_ref,
                            error = %mapped,
                            "metadata insert failed; blob removed"
                        );
                        Err(mapped)
                    }
                    Err(compensation_error) => {
                        error!(
                            blob = %blob_ref,
                            error = %mapped,
                            compensation = %compensation_error,
                            kind = compensation_error.label(),
                            "metadata insert failed and the blob could not be removed"
                        );
                        Err(Self::partial_failure(
                            FailedStep::CompensateBlob,
                            &blob_ref,
                            None,
                            &compensation_error,
                        ))
                    }
                }
            }
        }
    }

    /// Remove an attachment's blob and then its row. Owner or admin.
    pub async fn delete(
        &self,
        caller: &Caller,
        attachment_id: AttachmentId,
    ) -> ServiceResult<()> {
        let attachment = self.get(attachment_id).await?;
        authorize(caller, attachment.user_id, AdminOverride::Allowed)?;

        if let Err(blob_error) = self.blobs.delete(&attachment.blob_ref).await {
            error!(
                attachment = %attachment_id,
                blob = %attachment.blob_ref,
                error = %blob_error,
                kind = blob_error.label(),
                "blob delete failed; metadata kept"
            );
            return Err(Self::partial_failure(
                FailedStep::BlobDelete,
                &attachment.blob_ref,
                Some(attachment_id),
                &blob_error,
            ));
        }

        if let Err(row_error) = self.attachments.delete(attachment_id).await {
            error!(
                attachment = %attachment_id,
                blob = %attachment.blob_ref,
                error = %row_error,
                kind = row_error.label(),
                "blob deleted but metadata delete failed"
            );
            return Err(Self::partial_failure(
                FailedStep::MetadataDelete,
                &attachment.blob_ref,
                Some(attachment_id),
                &row_error,
            ));
        }
        debug!(attachment = %attachment_id, "attachment deleted");
        Ok(())
    }

    /// Fetch attachment metadata.
    pub async fn get(&self, attachment_id: AttachmentId) -> ServiceResult<Attachment> {
        self.attachments
            .find(attachment_id)
            .await
            .map_err(Self::map_attachment_error)?
            .ok_or_else(|| Error::not_found(format!("attachment {attachment_id} does not exist")))
    }

    /// Attachments of a post.
    pub async fn list_for_post(&self, post_id: PostId) -> ServiceResult<Vec<Attachment>> {
        self.attachments
            .list_for_post(post_id)
            .await
            .map_err(Self::map_attachment_error)
    }

    /// Attachments of a comment.
    pub async fn list_for_comment(&self, comment_id: CommentId) -> ServiceResult<Vec<Attachment>> {
        self.attachments
            .list_for_comment(comment_id)
            .await
            .map_err(Self::map_attachment_error)
    }
}

/// Delete the blobs behind attachment rows a cascading delete removed.
///
/// The rows are already gone, so a failed delete cannot be rolled back; it is
/// logged with the reference and counted in the return value.
pub(crate) async fn release_orphaned_blobs<B>(blobs: &B, orphaned: &[BlobRef]) -> usize
where
    B: BlobStore + ?Sized,
{
    let mut failed = 0;
    for blob_ref in orphaned {
        if let Err(blob_error) = blobs.delete(blob_ref).await {
            failed += 1;
            warn!(
                blob = %blob_ref,
                kind = blob_error.label(),
                error = %blob_error,
                "orphaned attachment blob could not be deleted"
            );
        }
    }
    if !orphaned.is_empty() {
        debug!(released = orphaned.len() - failed, failed, "released orphaned blobs");
    }
    failed
}

#[cfg(test)]
#[path = "attachment_service_tests.rs"]
mod tests;
