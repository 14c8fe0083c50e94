//! Shared wiring for the service scenario tests.
//!
//! Integration tests compile as separate crates under `backend/tests/`, so
//! the board fixture lives here and each test file pulls it in with
//! `mod support;`. Not every test crate uses every helper.
#![allow(dead_code, reason = "each test crate uses a different subset")]

use std::sync::Arc;

use postboard::domain::ports::{FixtureBlobStore, FixtureCredentialHasher, FixtureMessageCipher};
use postboard::domain::{
    AccountService, Caller, Category, ContentService, EngagementService, MessagingService, Post,
    RelationshipService,
};
use postboard::outbound::memory::InMemoryStore;
use postboard::test_support::clock::fixture_clock;

/// Every service wired over one in-memory store.
pub struct Board {
    pub store: Arc<InMemoryStore>,
    pub accounts:
        AccountService<InMemoryStore, InMemoryStore, FixtureCredentialHasher, FixtureBlobStore>,
    pub content: ContentService<InMemoryStore, FixtureBlobStore>,
    pub engagement: EngagementService<InMemoryStore>,
    pub relationships: RelationshipService<InMemoryStore>,
    pub messaging: MessagingService<InMemoryStore, FixtureMessageCipher>,
}

impl Board {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let clock = fixture_clock();
        Self {
            accounts: AccountService::new(
                Arc::clone(&store),
                Arc::clone(&store),
                Arc::new(FixtureCredentialHasher),
                Arc::new(FixtureBlobStore),
            ),
            content: ContentService::new(
                Arc::clone(&store),
                Arc::new(FixtureBlobStore),
                Arc::clone(&clock),
            ),
            engagement: EngagementService::new(Arc::clone(&store)),
            relationships: RelationshipService::new(Arc::clone(&store)),
            messaging: MessagingService::new(
                Arc::clone(&store),
                Arc::new(FixtureMessageCipher),
                clock,
            ),
            store,
        }
    }

    /// Register `name` and act as them.
    pub async fn member(&self, name: &str) -> Caller {
        let user = self
            .accounts
            .register(name, &format!("{name}@example.com"), "pw", None)
            .await
            .expect("register member");
        Caller::from(&user)
    }

    /// Register `name` and grant them the admin flag.
    pub async fn admin(&self, name: &str) -> Caller {
        let member = self.member(name).await;
        assert!(self.store.set_admin(member.id, true), "grant admin");
        Caller::admin(member.id)
    }

    pub async fn category(&self, admin: &Caller, name: &str) -> Category {
        self.content
            .create_category(admin, name)
            .await
            .expect("create category")
    }

    pub async fn post(&self, author: &Caller, category: &Category, title: &str) -> Post {
        self.content
            .create_post(author, category.id, title.to_owned(), format!("{title} body"))
            .await
            .expect("create post")
    }

    pub async fn reload(&self, post: &Post) -> Post {
        self.content.get_post(post.id).await.expect("reload post")
    }
}
