//! Tests for the relationship service.

use std::sync::Arc;

use rstest::rstest;

use super::*;
use crate::domain::ports::MockFollowRepository;
use crate::domain::{ErrorCode, FollowCounts};

fn id(raw: i64) -> UserId {
    UserId::new(raw).expect("valid id")
}

fn make_service(repo: MockFollowRepository) -> RelationshipService<MockFollowRepository> {
    RelationshipService::new(Arc::new(repo))
}

#[tokio::test]
async fn self_follow_is_rejected_before_touching_storage() {
    let mut repo = MockFollowRepository::new();
    repo.expect_insert_edge().never();

    let err = make_service(repo)
        .follow(&Caller::user(id(1)), id(1))
        .await
        .expect_err("self follow");
    assert_eq!(err.code(), ErrorCode::InvalidOperation);
}

#[tokio::test]
async fn unfollowing_yourself_finds_no_edge() {
    let mut repo = MockFollowRepository::new();
    repo.expect_remove_edge().never();

    let err = make_service(repo)
        .unfollow(&Caller::user(id(3)), id(3))
        .await
        .expect_err("self unfollow");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn follow_inserts_the_directed_edge() {
    let mut repo = MockFollowRepository::new();
    repo.expect_insert_edge()
        .withf(|edge| edge.follower_id().get() == 1 && edge.followed_id().get() == 2)
        .times(1)
        .return_once(|_| Ok(()));

    make_service(repo)
        .follow(&Caller::user(id(1)), id(2))
        .await
        .expect("follow succeeds");
}

#[rstest]
#[case(FollowRepositoryError::missing_user(id(2)), ErrorCode::NotFound)]
#[case(FollowRepositoryError::duplicate_edge(id(1), id(2)), ErrorCode::AlreadyExists)]
#[case(FollowRepositoryError::stale_state("serialization"), ErrorCode::Conflict)]
#[case(FollowRepositoryError::connection("refused"), ErrorCode::ServiceUnavailable)]
#[case(FollowRepositoryError::query("syntax"), ErrorCode::InternalError)]
#[tokio::test]
async fn follow_maps_repository_errors(
    #[case] failure: FollowRepositoryError,
    #[case] expected: ErrorCode,
) {
    let mut repo = MockFollowRepository::new();
    repo.expect_insert_edge().return_once(move |_| Err(failure));

    let err = make_service(repo)
        .follow(&Caller::user(id(1)), id(2))
        .await
        .expect_err("mapped error");
    assert_eq!(err.code(), expected);
}

#[tokio::test]
async fn unfollow_of_missing_edge_is_not_found() {
    let mut repo = MockFollowRepository::new();
    repo.expect_remove_edge()
        .return_once(|_| Err(FollowRepositoryError::missing_edge(id(1), id(2))));

    let err = make_service(repo)
        .unfollow(&Caller::user(id(1)), id(2))
        .await
        .expect_err("missing edge");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn clamped_unfollow_still_succeeds() {
    let mut repo = MockFollowRepository::new();
    repo.expect_remove_edge()
        .times(1)
        .return_once(|_| Ok(CounterFloor::Clamped));

    make_service(repo)
        .unfollow(&Caller::user(id(1)), id(2))
        .await
        .expect("floor hits are not surfaced");
}

#[tokio::test]
async fn recount_returns_before_and_after() {
    let mut repo = MockFollowRepository::new();
    repo.expect_recount().times(1).return_once(|user| {
        Ok(FollowRecount {
            user_id: user,
            before: FollowCounts {
                followers: 5,
                following: 0,
            },
            after: FollowCounts {
                followers: 2,
                following: 0,
            },
        })
    });

    let recount = make_service(repo)
        .recount_follows(id(3))
        .await
        .expect("recount");
    assert_eq!(recount.after.followers, 2);
    assert_eq!(recount.user_id, id(3));
}
