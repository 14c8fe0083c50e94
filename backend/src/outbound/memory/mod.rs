//! In-process adapter implementing every repository port.
//!
//! [`InMemoryStore`] keeps all rows behind one `Mutex` and applies each port
//! call while holding it, so a call is atomic with respect to every other
//! call. Ordering, cascades, counter floors and the stale-state checks match
//! the PostgreSQL adapters in [`crate::outbound::persistence`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use postboard::domain::RelationshipService;
//! use postboard::outbound::memory::InMemoryStore;
//!
//! let store = Arc::new(InMemoryStore::new());
//! let relationships = RelationshipService::new(Arc::clone(&store));
//! # let _ = relationships;
//! ```

mod attachments;
mod content;
mod engagement;
mod messaging;
mod relationships;
mod users;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::{
    Attachment, AttachmentId, BlobRef, Category, CategoryId, Comment, CommentId, MessageId,
    Notification, NotificationId, Post, PostId, Rating, RatingId, Settings, StoredMessage, Tag,
    TagId, User, UserId, UserProfile, removal_delta,
};

/// Rows held by the store.
#[derive(Debug, Default)]
pub(crate) struct State {
    sequences: Sequences,
    users: BTreeMap<UserId, User>,
    profiles: BTreeMap<UserId, UserProfile>,
    settings: BTreeMap<UserId, Settings>,
    /// `(follower, followed)` pairs.
    follows: BTreeSet<(UserId, UserId)>,
    categories: BTreeMap<CategoryId, Category>,
    posts: BTreeMap<PostId, Post>,
    tags: BTreeMap<TagId, Tag>,
    post_tags: BTreeSet<(PostId, TagId)>,
    comments: BTreeMap<CommentId, Comment>,
    ratings: BTreeMap<RatingId, Rating>,
    /// `(user, post)` pairs.
    favourites: BTreeSet<(UserId, PostId)>,
    notifications: BTreeMap<NotificationId, Notification>,
    messages: BTreeMap<MessageId, StoredMessage>,
    attachments: BTreeMap<AttachmentId, Attachment>,
}

/// One identity sequence per table, mirroring `BIGSERIAL` columns.
#[derive(Debug, Default)]
struct Sequences {
    users: i64,
    categories: i64,
    posts: i64,
    tags: i64,
    comments: i64,
    ratings: i64,
    notifications: i64,
    messages: i64,
    attachments: i64,
}

fn next(sequence: &mut i64) -> i64 {
    *sequence += 1;
    *sequence
}

/// Shift a counter by `delta`, clamping at zero.
fn shift(value: u32, delta: i32) -> u32 {
    let shifted = (i64::from(value) + i64::from(delta)).max(0);
    u32::try_from(shifted).unwrap_or(u32::MAX)
}

fn count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

impl State {
    fn user_exists(&self, user_id: UserId) -> bool {
        self.users.contains_key(&user_id)
    }

    /// Remove the attachment rows matching `doomed`, collecting their blobs.
    fn drop_attachments(
        &mut self,
        orphaned: &mut Vec<BlobRef>,
        doomed: impl Fn(&Attachment) -> bool,
    ) {
        self.attachments.retain(|_, attachment| {
            if doomed(attachment) {
                orphaned.push(attachment.blob_ref.clone());
                false
            } else {
                true
            }
        });
    }

    /// Remove a comment and the attachments hanging off it. The parent's
    /// `comments_count` is left to the caller.
    fn cascade_comment(
        &mut self,
        comment_id: CommentId,
        orphaned: &mut Vec<BlobRef>,
    ) -> Option<Comment> {
        let comment = self.comments.remove(&comment_id)?;
        self.drop_attachments(orphaned, |attachment| {
            attachment.comment_id == Some(comment_id)
        });
        Some(comment)
    }

    /// Remove a post and every row that references it.
    fn cascade_post(&mut self, post_id: PostId, orphaned: &mut Vec<BlobRef>) -> Option<Post> {
        let post = self.posts.remove(&post_id)?;
        let comment_ids: Vec<CommentId> = self
            .comments
            .values()
            .filter(|comment| comment.post_id == post_id)
            .map(|comment| comment.id)
            .collect();
        for comment_id in comment_ids {
            self.cascade_comment(comment_id, orphaned);
        }
        self.ratings.retain(|_, rating| rating.post_id != post_id);
        self.favourites.retain(|(_, post)| *post != post_id);
        self.post_tags.retain(|(post, _)| *post != post_id);
        self.drop_attachments(orphaned, |attachment| attachment.post_id == Some(post_id));
        Some(post)
    }

    /// Remove a user and everything they own.
    ///
    /// Follow neighbours lose one from the matching counter. Posts by other
    /// authors lose the user's ratings and comments from their counters.
    fn cascade_user(&mut self, user_id: UserId, orphaned: &mut Vec<BlobRef>) -> Option<User> {
        let user = self.users.remove(&user_id)?;

        let edges: Vec<(UserId, UserId)> = self
            .follows
            .iter()
            .copied()
            .filter(|(follower, followed)| *follower == user_id || *followed == user_id)
            .collect();
        for (follower, followed) in edges {
            self.follows.remove(&(follower, followed));
            if follower == user_id {
                if let Some(neighbour) = self.users.get_mut(&followed) {
                    neighbour.followers_count = shift(neighbour.followers_count, -1);
                }
            } else if let Some(neighbour) = self.users.get_mut(&follower) {
                neighbour.following_count = shift(neighbour.following_count, -1);
            }
        }

        let post_ids: Vec<PostId> = self
            .posts
            .values()
            .filter(|post| post.author_id == user_id)
            .map(|post| post.id)
            .collect();
        for post_id in post_ids {
            self.cascade_post(post_id, orphaned);
        }

        let comments: Vec<(CommentId, PostId)> = self
            .comments
            .values()
            .filter(|comment| comment.author_id == user_id)
            .map(|comment| (comment.id, comment.post_id))
            .collect();
        for (comment_id, post_id) in comments {
            self.cascade_comment(comment_id, orphaned);
            if let Some(post) = self.posts.get_mut(&post_id) {
                post.counters.comments = shift(post.counters.comments, -1);
            }
        }

        let ratings: Vec<Rating> = self
            .ratings
            .values()
            .filter(|rating| rating.user_id == user_id)
            .cloned()
            .collect();
        for rating in ratings {
            self.ratings.remove(&rating.id);
            if let Some(post) = self.posts.get_mut(&rating.post_id) {
                let delta = removal_delta(rating.status);
                post.counters.likes = shift(post.counters.likes, delta.likes);
                post.counters.dislikes = shift(post.counters.dislikes, delta.dislikes);
            }
        }

        self.profiles.remove(&user_id);
        self.settings.remove(&user_id);
        self.favourites.retain(|(user, _)| *user != user_id);
        self.notifications
            .retain(|_, notification| notification.receiver_id != user_id);
        self.messages.retain(|_, message| !message.involves(user_id));
        self.drop_attachments(orphaned, |attachment| attachment.user_id == user_id);
        Some(user)
    }
}

/// Thread-safe in-memory implementation of the repository ports.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Grant or revoke the admin flag. Returns `false` when the user is
    /// unknown.
    pub fn set_admin(&self, user_id: UserId, is_admin: bool) -> bool {
        let mut state = self.lock();
        match state.users.get_mut(&user_id) {
            Some(user) => {
                user.is_admin = is_admin;
                true
            }
            None => false,
        }
    }

    /// Overwrite a post's cached counters without touching its rows.
    #[cfg(any(test, feature = "test-support"))]
    pub fn force_post_counters(&self, post_id: PostId, counters: crate::domain::PostCounters) {
        if let Some(post) = self.lock().posts.get_mut(&post_id) {
            post.counters = counters;
        }
    }

    /// Overwrite a user's cached follow counters without touching edges.
    #[cfg(any(test, feature = "test-support"))]
    pub fn force_follow_counts(&self, user_id: UserId, counts: crate::domain::FollowCounts) {
        if let Some(user) = self.lock().users.get_mut(&user_id) {
            user.followers_count = counts.followers;
            user.following_count = counts.following;
        }
    }
}

#[cfg(test)]
mod tests {
    //! Shared helper coverage.
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(3, -1, 2)]
    #[case(0, -1, 0)]
    #[case(1, -3, 0)]
    #[case(0, 1, 1)]
    #[case(u32::MAX, 1, u32::MAX)]
    fn shift_clamps_at_both_ends(#[case] value: u32, #[case] delta: i32, #[case] expected: u32) {
        assert_eq!(shift(value, delta), expected);
    }

    #[rstest]
    fn sequences_start_at_one() {
        let mut sequence = 0;
        assert_eq!(next(&mut sequence), 1);
        assert_eq!(next(&mut sequence), 2);
    }

    #[rstest]
    fn set_admin_reports_unknown_users() {
        let store = InMemoryStore::new();
        assert!(!store.set_admin(UserId::from_store(9), true));
    }
}
