//! File attachments on posts and comments.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AttachmentId, CommentId, PostId, UserId};

/// Validation errors for upload requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttachmentValidationError {
    /// Neither a post nor a comment was named.
    #[error("an attachment must target a post or a comment")]
    MissingTarget,
    /// File name was blank once trimmed.
    #[error("file name must not be empty")]
    EmptyFileName,
    /// Content type was blank once trimmed.
    #[error("content type must not be empty")]
    EmptyContentType,
}

/// Post and/or comment an attachment hangs off.
///
/// ## Invariants
/// - At least one of `post_id` or `comment_id` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentTarget {
    post_id: Option<PostId>,
    comment_id: Option<CommentId>,
}

impl AttachmentTarget {
    /// Build a target from optional identifiers.
    ///
    /// # Examples
    /// ```
    /// use postboard::domain::{AttachmentTarget, PostId};
    ///
    /// assert!(AttachmentTarget::new(None, None).is_err());
    /// let target = AttachmentTarget::new(Some(PostId::new(9).unwrap()), None).unwrap();
    /// assert_eq!(target.post_id().map(PostId::get), Some(9));
    /// ```
    pub fn new(
        post_id: Option<PostId>,
        comment_id: Option<CommentId>,
    ) -> Result<Self, AttachmentValidationError> {
        if post_id.is_none() && comment_id.is_none() {
            return Err(AttachmentValidationError::MissingTarget);
        }
        Ok(Self {
            post_id,
            comment_id,
        })
    }

    /// Targeted post.
    pub fn post_id(&self) -> Option<PostId> {
        self.post_id
    }

    /// Targeted comment.
    pub fn comment_id(&self) -> Option<CommentId> {
        self.comment_id
    }
}

/// Opaque handle returned by a [`BlobStore`](crate::domain::ports::BlobStore).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(String);

impl BlobRef {
    /// Wrap a store-specific reference.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the reference.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// File payload received for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedFile {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

impl UploadedFile {
    /// Validate upload metadata. Empty payloads are allowed.
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, AttachmentValidationError> {
        let file_name = file_name.into().trim().to_owned();
        if file_name.is_empty() {
            return Err(AttachmentValidationError::EmptyFileName);
        }
        let content_type = content_type.into().trim().to_owned();
        if content_type.is_empty() {
            return Err(AttachmentValidationError::EmptyContentType);
        }
        Ok(Self {
            file_name,
            content_type,
            bytes,
        })
    }

    /// Client-supplied file name.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Declared MIME type.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// File contents.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Payload length in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

/// Raw upload request as received from a client.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Client-supplied file name.
    pub file_name: String,
    /// Declared MIME type.
    pub content_type: String,
    /// File contents.
    pub bytes: Vec<u8>,
    /// Post to attach to.
    pub post_id: Option<PostId>,
    /// Comment to attach to.
    pub comment_id: Option<CommentId>,
}

impl UploadRequest {
    /// Validate into a file payload and its target.
    pub fn validate(self) -> Result<(UploadedFile, AttachmentTarget), AttachmentValidationError> {
        let target = AttachmentTarget::new(self.post_id, self.comment_id)?;
        let file = UploadedFile::new(self.file_name, self.content_type, self.bytes)?;
        Ok((file, target))
    }
}

impl fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size_bytes", &self.bytes.len())
            .field("post_id", &self.post_id)
            .field("comment_id", &self.comment_id)
            .finish()
    }
}

/// Metadata row for a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Store-assigned identifier.
    pub id: AttachmentId,
    /// Uploader, who may delete it.
    pub user_id: UserId,
    /// Targeted post.
    pub post_id: Option<PostId>,
    /// Targeted comment.
    pub comment_id: Option<CommentId>,
    /// Client-supplied file name.
    pub file_name: String,
    /// Declared MIME type.
    pub content_type: String,
    /// Stored size.
    pub size_bytes: u64,
    /// Where the bytes live.
    pub blob_ref: BlobRef,
    /// Upload timestamp.
    pub created_at: DateTime<Utc>,
}

/// Metadata to insert once the blob is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttachment {
    /// Uploader.
    pub user_id: UserId,
    /// Post and/or comment.
    pub target: AttachmentTarget,
    /// Client-supplied file name.
    pub file_name: String,
    /// Declared MIME type.
    pub content_type: String,
    /// Stored size.
    pub size_bytes: u64,
    /// Where the bytes live.
    pub blob_ref: BlobRef,
    /// Upload timestamp.
    pub created_at: DateTime<Utc>,
}
