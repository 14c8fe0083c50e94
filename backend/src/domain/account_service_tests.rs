//! Tests for the account service.

use std::sync::Arc;

use rstest::rstest;
use serde_json::json;

use super::*;
use crate::domain::ports::{
    BlobStoreError, FixtureCredentialHasher, MockBlobStore, MockSettingsRepository,
    MockUserRepository,
};
use crate::domain::{
    BlobRef, EmailAddress, ErrorCode, PasswordHash, SettingKey, SettingValue, Theme, Username,
};

type Service = AccountService<
    MockUserRepository,
    MockSettingsRepository,
    FixtureCredentialHasher,
    MockBlobStore,
>;

fn id(raw: i64) -> UserId {
    UserId::new(raw).expect("valid id")
}

fn stored_user(raw: i64, password: &str) -> User {
    User {
        id: id(raw),
        username: Username::new("ada").expect("username"),
        email: EmailAddress::new("ada@example.com").expect("email"),
        password_hash: PasswordHash::new(format!("fixture${password}")),
        profile_pic: None,
        followers_count: 0,
        following_count: 0,
        is_admin: false,
    }
}

fn make_service(users: MockUserRepository, settings: MockSettingsRepository) -> Service {
    with_blobs(users, settings, MockBlobStore::new())
}

fn with_blobs(
    users: MockUserRepository,
    settings: MockSettingsRepository,
    blobs: MockBlobStore,
) -> Service {
    AccountService::new(
        Arc::new(users),
        Arc::new(settings),
        Arc::new(FixtureCredentialHasher),
        Arc::new(blobs),
    )
}

#[tokio::test]
async fn register_hashes_the_password_before_storage() {
    let mut users = MockUserRepository::new();
    users
        .expect_insert_user()
        .withf(|new| {
            new.password_hash.as_str() == "fixture$s3cret" && new.username.as_ref() == "ada"
        })
        .times(1)
        .return_once(|_| Ok(stored_user(1, "s3cret")));

    let user = make_service(users, MockSettingsRepository::new())
        .register("ada", "ada@example.com", "s3cret", None)
        .await
        .expect("registered");
    assert_eq!(user.followers_count, 0);
    assert!(!user.is_admin);
}

#[rstest]
#[case("ab", "ada@example.com", "pw")]
#[case("ada", "not-an-email", "pw")]
#[case("ada", "ada@example.com", "")]
#[tokio::test]
async fn invalid_registration_is_rejected(
    #[case] username: &str,
    #[case] email: &str,
    #[case] password: &str,
) {
    let mut users = MockUserRepository::new();
    users.expect_insert_user().never();

    let err = make_service(users, MockSettingsRepository::new())
        .register(username, email, password, None)
        .await
        .expect_err("invalid");
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
}

#[tokio::test]
async fn duplicate_username_is_already_exists() {
    let mut users = MockUserRepository::new();
    users
        .expect_insert_user()
        .return_once(|_| Err(UserRepositoryError::duplicate("username")));

    let err = make_service(users, MockSettingsRepository::new())
        .register("ada", "ada@example.com", "pw", None)
        .await
        .expect_err("duplicate");
    assert_eq!(err.code(), ErrorCode::AlreadyExists);
}

#[rstest]
#[case(Some("pw"), "pw", true)]
#[case(Some("pw"), "nope", false)]
#[case(None, "pw", false)]
#[tokio::test]
async fn check_password_outcomes(
    #[case] stored: Option<&'static str>,
    #[case] attempt: &str,
    #[case] accepted: bool,
) {
    let mut users = MockUserRepository::new();
    users
        .expect_find_user()
        .return_once(move |user_id| Ok(stored.map(|pw| stored_user(user_id.get(), pw))));

    let result = make_service(users, MockSettingsRepository::new())
        .check_password(id(1), attempt)
        .await;
    match result {
        Ok(()) => assert!(accepted),
        Err(err) => {
            assert!(!accepted);
            assert_eq!(err.code(), ErrorCode::Unauthorized);
        }
    }
}

#[tokio::test]
async fn other_users_cannot_update_an_account() {
    let mut users = MockUserRepository::new();
    users.expect_update_user().never();

    let err = make_service(users, MockSettingsRepository::new())
        .update_user(
            &Caller::user(id(2)),
            id(1),
            AccountChanges {
                profile_pic: Some(None),
                ..AccountChanges::default()
            },
        )
        .await
        .expect_err("not the owner");
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[tokio::test]
async fn admins_can_update_any_account_and_passwords_are_rehashed() {
    let mut users = MockUserRepository::new();
    users
        .expect_update_user()
        .withf(|_, changes| {
            changes
                .password_hash
                .as_ref()
                .is_some_and(|hash| hash.as_str() == "fixture$new-pass")
        })
        .times(1)
        .return_once(|user_id, _| Ok(stored_user(user_id.get(), "new-pass")));

    make_service(users, MockSettingsRepository::new())
        .update_user(
            &Caller::admin(id(9)),
            id(1),
            AccountChanges {
                password: Some(PlainPassword::new("new-pass").expect("password")),
                ..AccountChanges::default()
            },
        )
        .await
        .expect("admin override");
}

#[tokio::test]
async fn second_profile_is_already_exists() {
    let mut users = MockUserRepository::new();
    users
        .expect_insert_profile()
        .return_once(|profile| Err(UserRepositoryError::duplicate_profile(profile.user_id)));

    let err = make_service(users, MockSettingsRepository::new())
        .create_profile(
            &Caller::user(id(1)),
            ProfileFields {
                bio: Some("hi".to_owned()),
                ..ProfileFields::default()
            },
        )
        .await
        .expect_err("duplicate profile");
    assert_eq!(err.code(), ErrorCode::AlreadyExists);
}

#[tokio::test]
async fn empty_profile_update_is_invalid() {
    let err = make_service(MockUserRepository::new(), MockSettingsRepository::new())
        .update_profile(&Caller::user(id(1)), id(1), ProfileFields::default())
        .await
        .expect_err("no fields");
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
}

#[tokio::test]
async fn missing_settings_read_as_empty() {
    let mut settings = MockSettingsRepository::new();
    settings.expect_find().return_once(|_| Ok(None));

    let stored = make_service(MockUserRepository::new(), settings)
        .get_settings(&Caller::user(id(1)))
        .await
        .expect("settings");
    assert!(stored.is_empty());
}

#[rstest]
#[case(json!({"colour": "red"}), "unknown_key")]
#[case(json!({"theme": "neon"}), "wrong_kind")]
#[case(json!("dark"), "not_an_object")]
#[tokio::test]
async fn invalid_settings_never_reach_storage(#[case] raw: Value, #[case] code: &str) {
    let mut settings = MockSettingsRepository::new();
    settings.expect_merge().never();

    let err = make_service(MockUserRepository::new(), settings)
        .upsert_settings(&Caller::user(id(1)), &raw)
        .await
        .expect_err("invalid settings");
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
    assert_eq!(
        err.details().and_then(|d| d.get("code")).and_then(|c| c.as_str()),
        Some(code)
    );
}

#[tokio::test]
async fn valid_settings_are_merged() {
    let mut settings = MockSettingsRepository::new();
    settings
        .expect_merge()
        .withf(|_, update| update.get(SettingKey::Theme) == Some(SettingValue::Theme(Theme::Dark)))
        .times(1)
        .return_once(|_, update| Ok(update.clone()));

    let merged = make_service(MockUserRepository::new(), settings)
        .upsert_settings(&Caller::user(id(1)), &json!({"theme": "dark"}))
        .await
        .expect("merged");
    assert_eq!(merged.len(), 1);
}

#[tokio::test]
async fn deleting_absent_settings_is_not_found() {
    let mut settings = MockSettingsRepository::new();
    settings.expect_delete().return_once(|_| Ok(false));

    let err = make_service(MockUserRepository::new(), settings)
        .delete_settings(&Caller::user(id(1)))
        .await
        .expect_err("nothing stored");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn deleting_an_account_releases_its_attachment_blobs() {
    let mut users = MockUserRepository::new();
    users
        .expect_delete_user()
        .with(mockall::predicate::eq(id(4)))
        .times(1)
        .return_once(|_| Ok(vec![BlobRef::new("a"), BlobRef::new("b")]));
    let mut blobs = MockBlobStore::new();
    blobs
        .expect_delete()
        .withf(|blob_ref| blob_ref.as_str() == "a")
        .times(1)
        .return_once(|_| Err(BlobStoreError::io("volume offline")));
    blobs
        .expect_delete()
        .withf(|blob_ref| blob_ref.as_str() == "b")
        .times(1)
        .return_once(|_| Ok(()));

    with_blobs(users, MockSettingsRepository::new(), blobs)
        .delete_user(&Caller::user(id(4)), id(4))
        .await
        .expect("row delete stands even when a blob lingers");
}
