//! Posts, comments, categories and tags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BlobRef, CategoryId, CommentId, CounterFloor, PostId, TagId, UserId};

/// Validation errors raised by content constructors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentValidationError {
    /// A required text field was blank once trimmed.
    #[error("{field} must not be empty")]
    Blank {
        /// Name of the offending field.
        field: &'static str,
    },
    /// A text field exceeded its maximum length.
    #[error("{field} must be at most {max} characters")]
    TooLong {
        /// Name of the offending field.
        field: &'static str,
        /// Maximum accepted length in characters.
        max: usize,
    },
}

impl ContentValidationError {
    /// Field that failed validation.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Blank { field } | Self::TooLong { field, .. } => field,
        }
    }
}

/// Maximum length of a post title.
pub const TITLE_MAX: usize = 200;
/// Maximum length of a category or tag name.
pub const LABEL_MAX: usize = 50;

fn required_text(
    field: &'static str,
    raw: impl Into<String>,
    max: Option<usize>,
) -> Result<String, ContentValidationError> {
    let raw = raw.into();
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ContentValidationError::Blank { field });
    }
    if let Some(max) = max
        && trimmed.chars().count() > max
    {
        return Err(ContentValidationError::TooLong { field, max });
    }
    Ok(trimmed.to_owned())
}

/// Unique label shared by categories and tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Label(String);

impl Label {
    /// Validate a category or tag name.
    ///
    /// # Examples
    /// ```
    /// use postboard::domain::Label;
    ///
    /// assert_eq!(Label::new("  rust ").unwrap().as_ref(), "rust");
    /// assert!(Label::new("").is_err());
    /// ```
    pub fn new(raw: impl Into<String>) -> Result<Self, ContentValidationError> {
        required_text("name", raw, Some(LABEL_MAX)).map(Self)
    }
}

impl AsRef<str> for Label {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl From<Label> for String {
    fn from(value: Label) -> Self {
        value.0
    }
}

impl TryFrom<String> for Label {
    type Error = ContentValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Cached engagement counters on a post.
///
/// These are projections of the rating and comment rows and are never
/// authoritative on their own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostCounters {
    /// Number of `like` ratings.
    pub likes: u32,
    /// Number of `dislike` ratings.
    pub dislikes: u32,
    /// Number of comments.
    pub comments: u32,
}

/// What a comment delete removed besides the row itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRemoval {
    /// Whether the `comments_count` decrement was clamped at zero.
    pub floor: CounterFloor,
    /// Blobs of the attachment rows that went with the comment.
    pub orphaned_blobs: Vec<BlobRef>,
}

/// A published post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Store-assigned identifier.
    pub id: PostId,
    /// Author, the only user allowed to edit the post.
    pub author_id: UserId,
    /// Category the post is filed under.
    pub category_id: CategoryId,
    /// Headline.
    pub title: String,
    /// Body text.
    pub content: String,
    /// Cached engagement counters.
    pub counters: PostCounters,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last edit timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Validated fields for a new post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDraft {
    /// Category to file under.
    pub category_id: CategoryId,
    /// Trimmed, non-empty title.
    pub title: String,
    /// Trimmed, non-empty body.
    pub content: String,
}

impl PostDraft {
    /// Validate raw post fields.
    pub fn new(
        category_id: CategoryId,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Self, ContentValidationError> {
        Ok(Self {
            category_id,
            title: required_text("title", title, Some(TITLE_MAX))?,
            content: required_text("content", content, None)?,
        })
    }
}

/// Validated partial update of a post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostChanges {
    /// New category.
    pub category_id: Option<CategoryId>,
    /// New title.
    pub title: Option<String>,
    /// New body.
    pub content: Option<String>,
}

impl PostChanges {
    /// Validate the supplied fields; absent fields are left untouched.
    pub fn new(
        category_id: Option<CategoryId>,
        title: Option<String>,
        content: Option<String>,
    ) -> Result<Self, ContentValidationError> {
        Ok(Self {
            category_id,
            title: title
                .map(|t| required_text("title", t, Some(TITLE_MAX)))
                .transpose()?,
            content: content
                .map(|c| required_text("content", c, None))
                .transpose()?,
        })
    }

    /// True when no field would change.
    pub fn is_empty(&self) -> bool {
        self.category_id.is_none() && self.title.is_none() && self.content.is_none()
    }
}

/// Post category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// Store-assigned identifier.
    pub id: CategoryId,
    /// Unique name.
    pub name: Label,
}

/// Curated tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    /// Store-assigned identifier.
    pub id: TagId,
    /// Unique name.
    pub name: Label,
}

/// A comment on a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Store-assigned identifier.
    pub id: CommentId,
    /// Parent post.
    pub post_id: PostId,
    /// Author.
    pub author_id: UserId,
    /// Body text.
    pub content: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last edit timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Validated comment body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentBody(String);

impl CommentBody {
    /// Validate a comment body.
    pub fn new(raw: impl Into<String>) -> Result<Self, ContentValidationError> {
        required_text("content", raw, None).map(Self)
    }

    /// Consume the wrapper.
    pub fn into_inner(self) -> String {
        self.0
    }
}
