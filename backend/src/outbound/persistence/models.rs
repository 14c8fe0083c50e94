//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. Rows holding validated domain values
//! convert fallibly; a failure means the table holds data the domain would
//! never have written and is reported as a query error by the caller.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::domain::{
    Attachment, AttachmentId, BlobRef, Category, CategoryId, Comment, CommentId, EmailAddress,
    Label, MessageId, Notification, NotificationId, PasswordHash, Post, PostCounters, PostId,
    Rating, RatingId, RatingStatus, StoredMessage, Tag, TagId, User, UserId, UserProfile,
    UserSummary, Username,
};

use super::diesel_helpers::{counter, size_from_db};
use super::schema::{
    attachments, categories, comments, follows, messages, notifications, post_tags, posts,
    ratings, tags, user_favourites, user_profiles, user_settings, users,
};

// ---------------------------------------------------------------------------
// Users, profiles and settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub profile_pic: Option<String>,
    pub followers_count: i32,
    pub following_count: i32,
    pub is_admin: bool,
}

impl UserRow {
    pub(crate) fn into_domain(self) -> Result<User, String> {
        let username = Username::new(self.username)
            .map_err(|err| format!("stored username for user {} is invalid: {err}", self.id))?;
        let email = EmailAddress::new(self.email)
            .map_err(|err| format!("stored email for user {} is invalid: {err}", self.id))?;
        Ok(User {
            id: UserId::from_store(self.id),
            username,
            email,
            password_hash: PasswordHash::new(self.password_hash),
            profile_pic: self.profile_pic,
            followers_count: counter(self.followers_count),
            following_count: counter(self.following_count),
            is_admin: self.is_admin,
        })
    }

    pub(crate) fn into_summary(self) -> Result<UserSummary, String> {
        self.into_domain().map(|user| UserSummary::from(&user))
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub(crate) struct NewUserRow<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub profile_pic: Option<&'a str>,
}

/// Partial account update; `None` fields are left untouched.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = users)]
pub(crate) struct UserUpdate<'a> {
    pub username: Option<&'a str>,
    pub email: Option<&'a str>,
    pub password_hash: Option<&'a str>,
    pub profile_pic: Option<Option<&'a str>>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = user_profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub(crate) struct ProfileRow {
    pub user_id: i64,
    pub bio: Option<String>,
    pub social_links: Option<String>,
    pub profile_pic: Option<String>,
}

impl From<&UserProfile> for ProfileRow {
    fn from(profile: &UserProfile) -> Self {
        Self {
            user_id: profile.user_id.get(),
            bio: profile.bio.clone(),
            social_links: profile.social_links.clone(),
            profile_pic: profile.profile_pic.clone(),
        }
    }
}

impl From<ProfileRow> for UserProfile {
    fn from(row: ProfileRow) -> Self {
        Self {
            user_id: UserId::from_store(row.user_id),
            bio: row.bio,
            social_links: row.social_links,
            profile_pic: row.profile_pic,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = user_settings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct SettingsRow {
    pub user_id: i64,
    pub settings: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Follow graph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Queryable, Selectable, Insertable)]
#[diesel(table_name = follows)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct FollowRow {
    pub follower_id: i64,
    pub followed_id: i64,
}

// ---------------------------------------------------------------------------
// Categories and tags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct CategoryRow {
    pub id: i64,
    pub name: String,
}

impl CategoryRow {
    pub(crate) fn into_domain(self) -> Result<Category, String> {
        let name = Label::new(self.name)
            .map_err(|err| format!("stored name for category {} is invalid: {err}", self.id))?;
        Ok(Category {
            id: CategoryId::from_store(self.id),
            name,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = categories)]
pub(crate) struct NewCategoryRow<'a> {
    pub name: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tags)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct TagRow {
    pub id: i64,
    pub name: String,
}

impl TagRow {
    pub(crate) fn into_domain(self) -> Result<Tag, String> {
        let name = Label::new(self.name)
            .map_err(|err| format!("stored name for tag {} is invalid: {err}", self.id))?;
        Ok(Tag {
            id: TagId::from_store(self.id),
            name,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tags)]
pub(crate) struct NewTagRow<'a> {
    pub name: &'a str,
}

#[derive(Debug, Clone, Copy, Insertable)]
#[diesel(table_name = post_tags)]
pub(crate) struct PostTagRow {
    pub post_id: i64,
    pub tag_id: i64,
}

// ---------------------------------------------------------------------------
// Posts and comments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = posts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct PostRow {
    pub id: i64,
    pub author_id: i64,
    pub category_id: i64,
    pub title: String,
    pub content: String,
    pub likes_count: i32,
    pub dislikes_count: i32,
    pub comments_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PostRow {
    pub(crate) fn counters(&self) -> PostCounters {
        PostCounters {
            likes: counter(self.likes_count),
            dislikes: counter(self.dislikes_count),
            comments: counter(self.comments_count),
        }
    }
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        let counters = row.counters();
        Self {
            id: PostId::from_store(row.id),
            author_id: UserId::from_store(row.author_id),
            category_id: CategoryId::from_store(row.category_id),
            title: row.title,
            content: row.content,
            counters,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = posts)]
pub(crate) struct NewPostRow<'a> {
    pub author_id: i64,
    pub category_id: i64,
    pub title: &'a str,
    pub content: &'a str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = posts)]
pub(crate) struct PostUpdate<'a> {
    pub category_id: Option<i64>,
    pub title: Option<&'a str>,
    pub content: Option<&'a str>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = comments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct CommentRow {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Self {
            id: CommentId::from_store(row.id),
            post_id: PostId::from_store(row.post_id),
            author_id: UserId::from_store(row.author_id),
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = comments)]
pub(crate) struct NewCommentRow<'a> {
    pub post_id: i64,
    pub author_id: i64,
    pub content: &'a str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Ratings and favourites
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = ratings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct RatingRow {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub status: String,
}

impl RatingRow {
    pub(crate) fn into_domain(self) -> Result<Rating, String> {
        let status = self
            .status
            .parse::<RatingStatus>()
            .map_err(|err| format!("rating {} holds an invalid status: {err}", self.id))?;
        Ok(Rating {
            id: RatingId::from_store(self.id),
            post_id: PostId::from_store(self.post_id),
            user_id: UserId::from_store(self.user_id),
            status,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = ratings)]
pub(crate) struct NewRatingRow<'a> {
    pub post_id: i64,
    pub user_id: i64,
    pub status: &'a str,
}

#[derive(Debug, Clone, Copy, Insertable)]
#[diesel(table_name = user_favourites)]
pub(crate) struct FavouriteRow {
    pub user_id: i64,
    pub post_id: i64,
}

// ---------------------------------------------------------------------------
// Notifications and messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct NotificationRow {
    pub id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: NotificationId::from_store(row.id),
            receiver_id: UserId::from_store(row.receiver_id),
            content: row.content,
            read: row.is_read,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = notifications)]
pub(crate) struct NewNotificationRow<'a> {
    pub receiver_id: i64,
    pub content: &'a str,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct MessageRow {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub ciphertext: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MessageRow> for StoredMessage {
    fn from(row: MessageRow) -> Self {
        Self {
            id: MessageId::from_store(row.id),
            sender_id: UserId::from_store(row.sender_id),
            recipient_id: UserId::from_store(row.recipient_id),
            ciphertext: row.ciphertext,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = messages)]
pub(crate) struct NewMessageRow<'a> {
    pub sender_id: i64,
    pub recipient_id: i64,
    pub ciphertext: &'a [u8],
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Attachments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = attachments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct AttachmentRow {
    pub id: i64,
    pub user_id: i64,
    pub post_id: Option<i64>,
    pub comment_id: Option<i64>,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub blob_ref: String,
    pub created_at: DateTime<Utc>,
}

impl From<AttachmentRow> for Attachment {
    fn from(row: AttachmentRow) -> Self {
        Self {
            id: AttachmentId::from_store(row.id),
            user_id: UserId::from_store(row.user_id),
            post_id: row.post_id.map(PostId::from_store),
            comment_id: row.comment_id.map(CommentId::from_store),
            file_name: row.file_name,
            content_type: row.content_type,
            size_bytes: size_from_db(row.size_bytes),
            blob_ref: BlobRef::new(row.blob_ref),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = attachments)]
pub(crate) struct NewAttachmentRow<'a> {
    pub user_id: i64,
    pub post_id: Option<i64>,
    pub comment_id: Option<i64>,
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub size_bytes: i64,
    pub blob_ref: &'a str,
    pub created_at: DateTime<Utc>,
}
