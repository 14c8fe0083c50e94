//! Domain primitives, aggregates and services.
//!
//! Purpose: define strongly typed entities and the services that keep the
//! derived counters and ownership rules consistent. Persistence and crypto
//! sit behind the traits in [`ports`].
//!
//! Public surface:
//! - Error (alias to `error::Error`): error payload with a stable code.
//! - ErrorCode (alias to `error::ErrorCode`): stable error identifier.
//! - Caller, authorize, require_admin, resolve_caller: the authorization
//!   guard.
//! - RelationshipService, EngagementService, ContentService,
//!   MessagingService, AttachmentService, AccountService: driving services.

pub mod account_service;
pub mod attachment;
pub mod attachment_service;
pub mod auth;
pub mod authorization;
pub mod content;
pub mod content_service;
pub mod engagement;
pub mod engagement_service;
pub mod error;
pub mod ids;
pub mod messaging;
pub mod messaging_service;
pub mod ports;
pub mod relationship_service;
pub mod relationships;
pub mod settings;
pub mod user;

pub use self::account_service::AccountService;
pub use self::attachment::{
    Attachment, AttachmentTarget, AttachmentValidationError, BlobRef, NewAttachment, UploadRequest,
    UploadedFile,
};
pub use self::attachment_service::AttachmentService;
pub use self::auth::{AccountChanges, NewAccount, PlainPassword};
pub use self::authorization::{AdminOverride, Caller, authorize, require_admin, resolve_caller};
pub use self::content::{
    Category, Comment, CommentBody, CommentRemoval, ContentValidationError, LABEL_MAX, Label, Post, PostChanges,
    PostCounters, PostDraft, TITLE_MAX, Tag,
};
pub use self::content_service::{ContentService, TRENDING_LIMIT_MAX};
pub use self::engagement::{
    AlreadyRated, CounterDelta, Favourite, ParseRatingStatusError, PostRecount, Rating,
    RatingStatus, RatingTransition, removal_delta,
};
pub use self::engagement_service::EngagementService;
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::ids::{
    AttachmentId, CategoryId, CommentId, InvalidIdError, MessageId, NotificationId, PostId,
    RatingId, TagId, UserId,
};
pub use self::messaging::{EmptyTextError, Message, MessageText, Notification, StoredMessage};
pub use self::messaging_service::MessagingService;
pub use self::relationship_service::RelationshipService;
pub use self::relationships::{
    CounterFloor, FollowCounts, FollowEdge, FollowRecount, SelfFollowError,
};
pub use self::settings::{
    SettingKey, SettingKind, SettingValue, Settings, SettingsValidationError, Theme, TimeOfDay,
};
pub use self::user::{
    EmailAddress, NewUser, PasswordHash, ProfileFields, USERNAME_MAX, USERNAME_MIN, User,
    UserChanges, UserProfile, UserSummary, UserValidationError, Username,
};

/// Convenient service result alias.
///
/// # Examples
/// ```
/// use postboard::domain::{Error, ServiceResult};
///
/// fn guarded() -> ServiceResult<()> {
///     Err(Error::forbidden("nope"))
/// }
/// assert!(guarded().is_err());
/// ```
pub type ServiceResult<T> = Result<T, Error>;
