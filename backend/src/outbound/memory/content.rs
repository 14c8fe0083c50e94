//! Posts, categories, tags and comments over [`InMemoryStore`].

use std::cmp::Reverse;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::domain::ports::{ContentRepository, ContentRepositoryError};
use crate::domain::{
    BlobRef, Category, CategoryId, Comment, CommentBody, CommentId, CommentRemoval, CounterFloor,
    Label, Post, PostChanges, PostCounters, PostDraft, PostId, Tag, TagId, UserId,
};

use super::{InMemoryStore, State, next, shift};

fn require_post(state: &State, post_id: PostId) -> Result<(), ContentRepositoryError> {
    if state.posts.contains_key(&post_id) {
        Ok(())
    } else {
        Err(ContentRepositoryError::missing_post(post_id))
    }
}

fn require_category(state: &State, category_id: CategoryId) -> Result<(), ContentRepositoryError> {
    if state.categories.contains_key(&category_id) {
        Ok(())
    } else {
        Err(ContentRepositoryError::missing_category(category_id))
    }
}

fn require_tag(state: &State, tag_id: TagId) -> Result<(), ContentRepositoryError> {
    if state.tags.contains_key(&tag_id) {
        Ok(())
    } else {
        Err(ContentRepositoryError::missing_tag(tag_id))
    }
}

fn category_name_taken(state: &State, name: &Label, except: Option<CategoryId>) -> bool {
    state
        .categories
        .values()
        .any(|category| Some(category.id) != except && category.name == *name)
}

fn tag_name_taken(state: &State, name: &Label, except: Option<TagId>) -> bool {
    state
        .tags
        .values()
        .any(|tag| Some(tag.id) != except && tag.name == *name)
}

fn posts_where(state: &State, keep: impl Fn(&Post) -> bool) -> Vec<Post> {
    state.posts.values().filter(|post| keep(post)).cloned().collect()
}

#[async_trait]
impl ContentRepository for InMemoryStore {
    async fn insert_post(
        &self,
        author_id: UserId,
        draft: &PostDraft,
        now: DateTime<Utc>,
    ) -> Result<Post, ContentRepositoryError> {
        let mut state = self.lock();
        require_category(&state, draft.category_id)?;

        let id = PostId::from_store(next(&mut state.sequences.posts));
        let post = Post {
            id,
            author_id,
            category_id: draft.category_id,
            title: draft.title.clone(),
            content: draft.content.clone(),
            counters: PostCounters::default(),
            created_at: now,
            updated_at: now,
        };
        state.posts.insert(id, post.clone());
        debug!(post_id = %id, author_id = %author_id, "inserted post");
        Ok(post)
    }

    async fn find_post(&self, post_id: PostId) -> Result<Option<Post>, ContentRepositoryError> {
        Ok(self.lock().posts.get(&post_id).cloned())
    }

    async fn update_post(
        &self,
        post_id: PostId,
        changes: &PostChanges,
        now: DateTime<Utc>,
    ) -> Result<Post, ContentRepositoryError> {
        let mut state = self.lock();
        if let Some(category_id) = changes.category_id {
            require_category(&state, category_id)?;
        }
        let post = state
            .posts
            .get_mut(&post_id)
            .ok_or_else(|| ContentRepositoryError::missing_post(post_id))?;
        if let Some(category_id) = changes.category_id {
            post.category_id = category_id;
        }
        if let Some(title) = &changes.title {
            post.title = title.clone();
        }
        if let Some(content) = &changes.content {
            post.content = content.clone();
        }
        post.updated_at = now;
        Ok(post.clone())
    }

    async fn delete_post(&self, post_id: PostId) -> Result<Vec<BlobRef>, ContentRepositoryError> {
        let mut orphaned = Vec::new();
        if self.lock().cascade_post(post_id, &mut orphaned).is_none() {
            return Err(ContentRepositoryError::missing_post(post_id));
        }
        debug!(post_id = %post_id, blobs = orphaned.len(), "deleted post");
        Ok(orphaned)
    }

    async fn list_posts(&self) -> Result<Vec<Post>, ContentRepositoryError> {
        Ok(posts_where(&self.lock(), |_| true))
    }

    async fn list_posts_by_author(
        &self,
        author_id: UserId,
    ) -> Result<Vec<Post>, ContentRepositoryError> {
        Ok(posts_where(&self.lock(), |post| post.author_id == author_id))
    }

    async fn list_posts_by_followed(
        &self,
        follower_id: UserId,
    ) -> Result<Vec<Post>, ContentRepositoryError> {
        let state = self.lock();
        let mut posts = posts_where(&state, |post| {
            state.follows.contains(&(follower_id, post.author_id))
        });
        posts.sort_by_key(|post| Reverse((post.created_at, post.id)));
        Ok(posts)
    }

    async fn trending_posts(&self, limit: u32) -> Result<Vec<Post>, ContentRepositoryError> {
        let mut posts = posts_where(&self.lock(), |_| true);
        posts.sort_by_key(|post| {
            (
                Reverse(post.counters.likes),
                Reverse(post.counters.comments),
                post.id,
            )
        });
        posts.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(posts)
    }

    async fn insert_category(&self, name: &Label) -> Result<Category, ContentRepositoryError> {
        let mut state = self.lock();
        if category_name_taken(&state, name, None) {
            return Err(ContentRepositoryError::duplicate_name(name.as_ref()));
        }
        let id = CategoryId::from_store(next(&mut state.sequences.categories));
        let category = Category {
            id,
            name: name.clone(),
        };
        state.categories.insert(id, category.clone());
        Ok(category)
    }

    async fn rename_category(
        &self,
        category_id: CategoryId,
        name: &Label,
    ) -> Result<Category, ContentRepositoryError> {
        let mut state = self.lock();
        require_category(&state, category_id)?;
        if category_name_taken(&state, name, Some(category_id)) {
            return Err(ContentRepositoryError::duplicate_name(name.as_ref()));
        }
        let category = state
            .categories
            .get_mut(&category_id)
            .ok_or_else(|| ContentRepositoryError::missing_category(category_id))?;
        category.name = name.clone();
        Ok(category.clone())
    }

    async fn delete_category(&self, category_id: CategoryId) -> Result<(), ContentRepositoryError> {
        let mut state = self.lock();
        if state
            .posts
            .values()
            .any(|post| post.category_id == category_id)
        {
            return Err(ContentRepositoryError::category_in_use(category_id));
        }
        state
            .categories
            .remove(&category_id)
            .map(|_| ())
            .ok_or_else(|| ContentRepositoryError::missing_category(category_id))
    }

    async fn find_category(
        &self,
        category_id: CategoryId,
    ) -> Result<Option<Category>, ContentRepositoryError> {
        Ok(self.lock().categories.get(&category_id).cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, ContentRepositoryError> {
        Ok(self.lock().categories.values().cloned().collect())
    }

    async fn insert_tag(&self, name: &Label) -> Result<Tag, ContentRepositoryError> {
        let mut state = self.lock();
        if tag_name_taken(&state, name, None) {
            return Err(ContentRepositoryError::duplicate_name(name.as_ref()));
        }
        let id = TagId::from_store(next(&mut state.sequences.tags));
        let tag = Tag {
            id,
            name: name.clone(),
        };
        state.tags.insert(id, tag.clone());
        Ok(tag)
    }

    async fn rename_tag(&self, tag_id: TagId, name: &Label) -> Result<Tag, ContentRepositoryError> {
        let mut state = self.lock();
        require_tag(&state, tag_id)?;
        if tag_name_taken(&state, name, Some(tag_id)) {
            return Err(ContentRepositoryError::duplicate_name(name.as_ref()));
        }
        let tag = state
            .tags
            .get_mut(&tag_id)
            .ok_or_else(|| ContentRepositoryError::missing_tag(tag_id))?;
        tag.name = name.clone();
        Ok(tag.clone())
    }

    async fn delete_tag(&self, tag_id: TagId) -> Result<(), ContentRepositoryError> {
        let mut state = self.lock();
        if state.tags.remove(&tag_id).is_none() {
            return Err(ContentRepositoryError::missing_tag(tag_id));
        }
        state.post_tags.retain(|(_, tag)| *tag != tag_id);
        Ok(())
    }

    async fn find_tag(&self, tag_id: TagId) -> Result<Option<Tag>, ContentRepositoryError> {
        Ok(self.lock().tags.get(&tag_id).cloned())
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, ContentRepositoryError> {
        Ok(self.lock().tags.values().cloned().collect())
    }

    async fn attach_tag(
        &self,
        post_id: PostId,
        tag_id: TagId,
    ) -> Result<(), ContentRepositoryError> {
        let mut state = self.lock();
        require_post(&state, post_id)?;
        require_tag(&state, tag_id)?;
        if !state.post_tags.insert((post_id, tag_id)) {
            return Err(ContentRepositoryError::duplicate_link(post_id, tag_id));
        }
        Ok(())
    }

    async fn detach_tag(
        &self,
        post_id: PostId,
        tag_id: TagId,
    ) -> Result<(), ContentRepositoryError> {
        if !self.lock().post_tags.remove(&(post_id, tag_id)) {
            return Err(ContentRepositoryError::missing_link(post_id, tag_id));
        }
        Ok(())
    }

    async fn list_post_tags(&self, post_id: PostId) -> Result<Vec<Tag>, ContentRepositoryError> {
        let state = self.lock();
        require_post(&state, post_id)?;
        Ok(state
            .post_tags
            .iter()
            .filter(|(post, _)| *post == post_id)
            .filter_map(|(_, tag_id)| state.tags.get(tag_id).cloned())
            .collect())
    }

    async fn list_tag_posts(&self, tag_id: TagId) -> Result<Vec<Post>, ContentRepositoryError> {
        let state = self.lock();
        require_tag(&state, tag_id)?;
        Ok(posts_where(&state, |post| {
            state.post_tags.contains(&(post.id, tag_id))
        }))
    }

    async fn insert_comment(
        &self,
        post_id: PostId,
        author_id: UserId,
        body: &CommentBody,
        now: DateTime<Utc>,
    ) -> Result<Comment, ContentRepositoryError> {
        let mut state = self.lock();
        require_post(&state, post_id)?;

        let id = CommentId::from_store(next(&mut state.sequences.comments));
        let comment = Comment {
            id,
            post_id,
            author_id,
            content: body.clone().into_inner(),
            created_at: now,
            updated_at: now,
        };
        state.comments.insert(id, comment.clone());
        if let Some(post) = state.posts.get_mut(&post_id) {
            post.counters.comments = shift(post.counters.comments, 1);
        }
        debug!(comment_id = %id, post_id = %post_id, "inserted comment");
        Ok(comment)
    }

    async fn update_comment(
        &self,
        comment_id: CommentId,
        body: &CommentBody,
        now: DateTime<Utc>,
    ) -> Result<Comment, ContentRepositoryError> {
        let mut state = self.lock();
        let comment = state
            .comments
            .get_mut(&comment_id)
            .ok_or_else(|| ContentRepositoryError::missing_comment(comment_id))?;
        comment.content = body.clone().into_inner();
        comment.updated_at = now;
        Ok(comment.clone())
    }

    async fn delete_comment(
        &self,
        comment_id: CommentId,
    ) -> Result<CommentRemoval, ContentRepositoryError> {
        let mut state = self.lock();
        let mut orphaned_blobs = Vec::new();
        let comment = state
            .cascade_comment(comment_id, &mut orphaned_blobs)
            .ok_or_else(|| ContentRepositoryError::missing_comment(comment_id))?;

        let floor = match state.posts.get_mut(&comment.post_id) {
            Some(post) => {
                let floor = CounterFloor::of(post.counters.comments);
                post.counters.comments = shift(post.counters.comments, -1);
                floor
            }
            None => CounterFloor::Clamped,
        };
        if floor == CounterFloor::Clamped {
            warn!(post_id = %comment.post_id, "comment counter floor hit");
        }
        Ok(CommentRemoval {
            floor,
            orphaned_blobs,
        })
    }

    async fn find_comment(
        &self,
        comment_id: CommentId,
    ) -> Result<Option<Comment>, ContentRepositoryError> {
        Ok(self.lock().comments.get(&comment_id).cloned())
    }

    async fn list_comments(&self, post_id: PostId) -> Result<Vec<Comment>, ContentRepositoryError> {
        Ok(self
            .lock()
            .comments
            .values()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use chrono::TimeZone;
    use rstest::{fixture, rstest};

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0)
            .single()
            .expect("timestamp")
    }

    fn label(raw: &str) -> Label {
        Label::new(raw).expect("label")
    }

    #[fixture]
    fn store() -> InMemoryStore {
        InMemoryStore::new()
    }

    async fn post_in(store: &InMemoryStore, category: CategoryId, author: i64, at_s: i64) -> Post {
        let draft = PostDraft::new(category, "title", "body").expect("draft");
        store
            .insert_post(UserId::from_store(author), &draft, at(at_s))
            .await
            .expect("post")
    }

    #[rstest]
    #[tokio::test]
    async fn category_names_are_unique(store: InMemoryStore) {
        store.insert_category(&label("news")).await.expect("first");
        assert_eq!(
            store.insert_category(&label("news")).await,
            Err(ContentRepositoryError::duplicate_name("news"))
        );
        store
            .insert_tag(&label("news"))
            .await
            .expect("tags use their own namespace");
    }

    #[rstest]
    #[tokio::test]
    async fn categories_in_use_cannot_be_deleted(store: InMemoryStore) {
        let category = store.insert_category(&label("news")).await.expect("category");
        post_in(&store, category.id, 1, 0).await;

        assert_eq!(
            store.delete_category(category.id).await,
            Err(ContentRepositoryError::category_in_use(category.id))
        );
    }

    #[rstest]
    #[tokio::test]
    async fn trending_orders_by_likes_then_comments_then_id(store: InMemoryStore) {
        let category = store.insert_category(&label("news")).await.expect("category");
        let first = post_in(&store, category.id, 1, 0).await;
        let second = post_in(&store, category.id, 1, 1).await;
        let third = post_in(&store, category.id, 1, 2).await;
        store.force_post_counters(
            second.id,
            PostCounters {
                likes: 2,
                dislikes: 0,
                comments: 0,
            },
        );
        store.force_post_counters(
            third.id,
            PostCounters {
                likes: 2,
                dislikes: 0,
                comments: 5,
            },
        );

        let ids: Vec<PostId> = store
            .trending_posts(10)
            .await
            .expect("trending")
            .into_iter()
            .map(|post| post.id)
            .collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);

        let top = store.trending_posts(1).await.expect("trending");
        assert_eq!(top.len(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn comment_counter_tracks_inserts_and_deletes(store: InMemoryStore) {
        let category = store.insert_category(&label("news")).await.expect("category");
        let post = post_in(&store, category.id, 1, 0).await;
        let body = CommentBody::new("nice").expect("body");

        let comment = store
            .insert_comment(post.id, UserId::from_store(2), &body, at(5))
            .await
            .expect("comment");
        let counted = store.find_post(post.id).await.expect("find").expect("post");
        assert_eq!(counted.counters.comments, 1);

        let removal = store.delete_comment(comment.id).await.expect("delete");
        assert_eq!(removal.floor, CounterFloor::Respected);
        assert!(removal.orphaned_blobs.is_empty());
        let counted = store.find_post(post.id).await.expect("find").expect("post");
        assert_eq!(counted.counters.comments, 0);
    }

    #[rstest]
    #[tokio::test]
    async fn deleting_a_post_drops_its_comments_and_links(store: InMemoryStore) {
        let category = store.insert_category(&label("news")).await.expect("category");
        let tag = store.insert_tag(&label("rust")).await.expect("tag");
        let post = post_in(&store, category.id, 1, 0).await;
        let body = CommentBody::new("nice").expect("body");
        let comment = store
            .insert_comment(post.id, UserId::from_store(2), &body, at(5))
            .await
            .expect("comment");
        store.attach_tag(post.id, tag.id).await.expect("attach");

        store.delete_post(post.id).await.expect("delete");

        assert!(store.find_comment(comment.id).await.expect("find").is_none());
        assert!(store.list_tag_posts(tag.id).await.expect("list").is_empty());
    }
}
