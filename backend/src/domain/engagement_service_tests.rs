//! Tests for the engagement service.

use std::sync::Arc;

use mockall::predicate::eq;
use rstest::rstest;

use super::*;
use crate::domain::ports::MockEngagementRepository;
use crate::domain::{ErrorCode, PostCounters, UserId};

fn user(raw: i64) -> UserId {
    UserId::new(raw).expect("valid user id")
}

fn post(raw: i64) -> PostId {
    PostId::new(raw).expect("valid post id")
}

fn rating(id: i64, post_id: i64, owner: i64, status: RatingStatus) -> Rating {
    Rating {
        id: RatingId::new(id).expect("valid rating id"),
        post_id: post(post_id),
        user_id: user(owner),
        status,
    }
}

fn make_service(repo: MockEngagementRepository) -> EngagementService<MockEngagementRepository> {
    EngagementService::new(Arc::new(repo))
}

#[rstest]
#[case("neutral")]
#[case("LIKE")]
#[case("")]
#[tokio::test]
async fn unknown_status_is_rejected_before_any_read(#[case] raw: &str) {
    let mut repo = MockEngagementRepository::new();
    repo.expect_find_rating().never();

    let err = make_service(repo)
        .rate(&Caller::user(user(1)), post(1), raw)
        .await
        .expect_err("invalid status");
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
}

#[tokio::test]
async fn first_rating_plans_an_insert() {
    let mut repo = MockEngagementRepository::new();
    repo.expect_find_rating().return_once(|_, _| Ok(None));
    repo.expect_apply_rating()
        .with(
            eq(post(5)),
            eq(user(1)),
            eq(RatingTransition::Insert {
                status: RatingStatus::Like,
            }),
        )
        .times(1)
        .return_once(|_, _, _| Ok(rating(10, 5, 1, RatingStatus::Like)));

    let stored = make_service(repo)
        .rate(&Caller::user(user(1)), post(5), "like")
        .await
        .expect("rating stored");
    assert_eq!(stored.status, RatingStatus::Like);
}

#[tokio::test]
async fn repeating_a_rating_is_already_rated_without_writes() {
    let mut repo = MockEngagementRepository::new();
    repo.expect_find_rating()
        .return_once(|_, _| Ok(Some(rating(10, 5, 1, RatingStatus::Like))));
    repo.expect_apply_rating().never();

    let err = make_service(repo)
        .rate(&Caller::user(user(1)), post(5), "like")
        .await
        .expect_err("duplicate vote");
    assert_eq!(err.code(), ErrorCode::AlreadyRated);
}

#[tokio::test]
async fn switching_plans_a_switch_from_the_observed_status() {
    let mut repo = MockEngagementRepository::new();
    repo.expect_find_rating()
        .return_once(|_, _| Ok(Some(rating(10, 5, 1, RatingStatus::Like))));
    repo.expect_apply_rating()
        .with(
            eq(post(5)),
            eq(user(1)),
            eq(RatingTransition::Switch {
                from: RatingStatus::Like,
                to: RatingStatus::Dislike,
            }),
        )
        .times(1)
        .return_once(|_, _, _| Ok(rating(10, 5, 1, RatingStatus::Dislike)));

    make_service(repo)
        .rate(&Caller::user(user(1)), post(5), "dislike")
        .await
        .expect("switch succeeds");
}

#[tokio::test]
async fn stale_state_surfaces_as_retryable_conflict() {
    let mut repo = MockEngagementRepository::new();
    repo.expect_find_rating().return_once(|_, _| Ok(None));
    repo.expect_apply_rating()
        .return_once(|_, _, _| Err(EngagementRepositoryError::stale_state("row appeared")));

    let err = make_service(repo)
        .rate(&Caller::user(user(1)), post(5), "like")
        .await
        .expect_err("raced");
    assert_eq!(err.code(), ErrorCode::Conflict);
    assert!(err.code().is_retryable());
}

#[tokio::test]
async fn rating_missing_post_is_not_found() {
    let mut repo = MockEngagementRepository::new();
    repo.expect_find_rating().return_once(|_, _| Ok(None));
    repo.expect_apply_rating()
        .return_once(|post_id, _, _| Err(EngagementRepositoryError::missing_post(post_id)));

    let err = make_service(repo)
        .rate(&Caller::user(user(1)), post(999), "like")
        .await
        .expect_err("missing post");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn update_rating_by_non_owner_is_forbidden_even_for_admins() {
    let mut repo = MockEngagementRepository::new();
    repo.expect_find_rating_by_id()
        .return_once(|_| Ok(Some(rating(10, 5, 1, RatingStatus::Like))));
    repo.expect_apply_rating().never();

    let err = make_service(repo)
        .update_rating(
            &Caller::admin(user(2)),
            RatingId::new(10).expect("id"),
            "dislike",
        )
        .await
        .expect_err("not the owner");
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[tokio::test]
async fn delete_rating_removes_with_the_observed_status() {
    let mut repo = MockEngagementRepository::new();
    repo.expect_find_rating_by_id()
        .return_once(|_| Ok(Some(rating(10, 5, 1, RatingStatus::Dislike))));
    repo.expect_remove_rating()
        .with(eq(RatingId::new(10).expect("id")), eq(RatingStatus::Dislike))
        .times(1)
        .return_once(|_, _| Ok(CounterFloor::Respected));

    make_service(repo)
        .delete_rating(&Caller::user(user(1)), RatingId::new(10).expect("id"))
        .await
        .expect("deleted");
}

#[tokio::test]
async fn unrate_without_rating_is_not_found() {
    let mut repo = MockEngagementRepository::new();
    repo.expect_find_rating().return_once(|_, _| Ok(None));
    repo.expect_remove_rating().never();

    let err = make_service(repo)
        .unrate(&Caller::user(user(1)), post(5))
        .await
        .expect_err("nothing to remove");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[case(EngagementRepositoryError::own_post(post(5)), ErrorCode::InvalidOperation)]
#[case(
    EngagementRepositoryError::duplicate_favourite(user(1), post(5)),
    ErrorCode::AlreadyExists
)]
#[case(EngagementRepositoryError::missing_post(post(5)), ErrorCode::NotFound)]
#[tokio::test]
async fn favourite_maps_repository_errors(
    #[case] failure: EngagementRepositoryError,
    #[case] expected: ErrorCode,
) {
    let mut repo = MockEngagementRepository::new();
    repo.expect_insert_favourite().return_once(move |_| Err(failure));

    let err = make_service(repo)
        .favourite(&Caller::user(user(1)), post(5))
        .await
        .expect_err("mapped");
    assert_eq!(err.code(), expected);
}

#[tokio::test]
async fn recount_reports_drift() {
    let mut repo = MockEngagementRepository::new();
    repo.expect_recount_post().return_once(|post_id| {
        Ok(PostRecount {
            post_id,
            before: PostCounters {
                likes: 3,
                dislikes: 0,
                comments: 1,
            },
            after: PostCounters {
                likes: 2,
                dislikes: 0,
                comments: 1,
            },
        })
    });

    let recount = make_service(repo)
        .recount_post(post(5))
        .await
        .expect("recount");
    assert!(recount.drifted());
    assert_eq!(recount.after.likes, 2);
}
