//! Tests for the attachment saga.

use std::sync::Arc;

use rstest::rstest;

use super::*;
use crate::domain::ports::{MockAttachmentRepository, MockBlobStore};
use crate::domain::{ErrorCode, UserId};
use crate::test_support::clock::{fixture_clock, fixture_timestamp};

fn user(raw: i64) -> UserId {
    UserId::new(raw).expect("valid user id")
}

fn post(raw: i64) -> PostId {
    PostId::new(raw).expect("valid post id")
}

fn request(post_id: Option<PostId>, file_name: &str) -> UploadRequest {
    UploadRequest {
        file_name: file_name.to_owned(),
        content_type: "image/png".to_owned(),
        bytes: vec![1, 2, 3],
        post_id,
        comment_id: None,
    }
}

fn stored(id: i64, owner: i64) -> Attachment {
    Attachment {
        id: AttachmentId::new(id).expect("valid id"),
        user_id: user(owner),
        post_id: Some(post(1)),
        comment_id: None,
        file_name: "cat.png".to_owned(),
        content_type: "image/png".to_owned(),
        size_bytes: 3,
        blob_ref: BlobRef::new("blob-1"),
        created_at: fixture_timestamp(),
    }
}

fn make_service(
    repo: MockAttachmentRepository,
    blobs: MockBlobStore,
) -> AttachmentService<MockAttachmentRepository, MockBlobStore> {
    AttachmentService::new(Arc::new(repo), Arc::new(blobs), fixture_clock())
}

fn failed_step(err: &Error) -> Option<&str> {
    err.details()
        .and_then(|d| d.get("failedStep"))
        .and_then(|s| s.as_str())
}

#[rstest]
#[case(None, "cat.png")]
#[case(Some(post(1)), "  ")]
#[tokio::test]
async fn invalid_requests_touch_nothing(#[case] target: Option<PostId>, #[case] name: &str) {
    let mut repo = MockAttachmentRepository::new();
    repo.expect_check_targets().never();
    let mut blobs = MockBlobStore::new();
    blobs.expect_save().never();

    let err = make_service(repo, blobs)
        .upload(&Caller::user(user(1)), request(target, name))
        .await
        .expect_err("invalid request");
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
}

#[tokio::test]
async fn missing_target_is_not_found_before_any_blob_is_saved() {
    let mut repo = MockAttachmentRepository::new();
    repo.expect_check_targets()
        .return_once(|_| Err(AttachmentRepositoryError::missing_post(post(999))));
    let mut blobs = MockBlobStore::new();
    blobs.expect_save().never();

    let err = make_service(repo, blobs)
        .upload(&Caller::user(user(1)), request(Some(post(999)), "cat.png"))
        .await
        .expect_err("missing post");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn successful_upload_records_blob_and_size() {
    let mut repo = MockAttachmentRepository::new();
    repo.expect_check_targets().return_once(|_| Ok(()));
    repo.expect_insert()
        .withf(|row| row.size_bytes == 3 && row.blob_ref.as_str() == "blob-1")
        .times(1)
        .return_once(|_| Ok(stored(1, 1)));
    let mut blobs = MockBlobStore::new();
    blobs
        .expect_save()
        .times(1)
        .return_once(|_, _| Ok(BlobRef::new("blob-1")));
    blobs.expect_delete().never();

    let attachment = make_service(repo, blobs)
        .upload(&Caller::user(user(1)), request(Some(post(1)), "cat.png"))
        .await
        .expect("uploaded");
    assert_eq!(attachment.blob_ref, BlobRef::new("blob-1"));
}

#[tokio::test]
async fn failed_insert_removes_the_blob_and_returns_the_insert_error() {
    let mut repo = MockAttachmentRepository::new();
    repo.expect_check_targets().return_once(|_| Ok(()));
    repo.expect_insert()
        .return_once(|_| Err(AttachmentRepositoryError::missing_post(post(1))));
    let mut blobs = MockBlobStore::new();
    blobs
        .expect_save()
        .return_once(|_, _| Ok(BlobRef::new("blob-1")));
    blobs
        .expect_delete()
        .withf(|blob| blob.as_str() == "blob-1")
        .times(1)
        .return_once(|_| Ok(()));

    let err = make_service(repo, blobs)
        .upload(&Caller::user(user(1)), request(Some(post(1)), "cat.png"))
        .await
        .expect_err("post vanished between check and insert");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn failed_compensation_is_a_partial_failure() {
    let mut repo = MockAttachmentRepository::new();
    repo.expect_check_targets().return_once(|_| Ok(()));
    repo.expect_insert()
        .return_once(|_| Err(AttachmentRepositoryError::connection("reset")));
    let mut blobs = MockBlobStore::new();
    blobs
        .expect_save()
        .return_once(|_, _| Ok(BlobRef::new("blob-1")));
    blobs
        .expect_delete()
        .return_once(|_| Err(BlobStoreError::io("disk gone")));

    let err = make_service(repo, blobs)
        .upload(&Caller::user(user(1)), request(Some(post(1)), "cat.png"))
        .await
        .expect_err("orphaned blob");
    assert_eq!(err.code(), ErrorCode::PartialFailure);
    assert_eq!(failed_step(&err), Some("compensate_blob"));
}

#[tokio::test]
async fn non_owner_cannot_delete() {
    let mut repo = MockAttachmentRepository::new();
    repo.expect_find().return_once(|_| Ok(Some(stored(1, 1))));
    let mut blobs = MockBlobStore::new();
    blobs.expect_delete().never();

    let err = make_service(repo, blobs)
        .delete(&Caller::user(user(2)), AttachmentId::new(1).expect("id"))
        .await
        .expect_err("not the owner");
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[tokio::test]
async fn blob_delete_failure_keeps_the_row() {
    let mut repo = MockAttachmentRepository::new();
    repo.expect_find().return_once(|_| Ok(Some(stored(1, 1))));
    repo.expect_delete().never();
    let mut blobs = MockBlobStore::new();
    blobs
        .expect_delete()
        .return_once(|_| Err(BlobStoreError::io("read-only")));

    let err = make_service(repo, blobs)
        .delete(&Caller::admin(user(9)), AttachmentId::new(1).expect("id"))
        .await
        .expect_err("blob delete failed");
    assert_eq!(err.code(), ErrorCode::PartialFailure);
    assert_eq!(failed_step(&err), Some("blob_delete"));
}

#[tokio::test]
async fn metadata_delete_failure_is_reported() {
    let mut repo = MockAttachmentRepository::new();
    repo.expect_find().return_once(|_| Ok(Some(stored(1, 1))));
    repo.expect_delete()
        .return_once(|_| Err(AttachmentRepositoryError::query("deadlock")));
    let mut blobs = MockBlobStore::new();
    blobs.expect_delete().times(1).return_once(|_| Ok(()));

    let err = make_service(repo, blobs)
        .delete(&Caller::user(user(1)), AttachmentId::new(1).expect("id"))
        .await
        .expect_err("row delete failed");
    assert_eq!(failed_step(&err), Some("metadata_delete"));
}

#[tokio::test]
async fn orphan_release_counts_failures_and_keeps_going() {
    let mut blobs = MockBlobStore::new();
    blobs
        .expect_delete()
        .times(3)
        .returning(|blob_ref| match blob_ref.as_str() {
            "stuck" => Err(BlobStoreError::io("permission denied")),
            _ => Ok(()),
        });
    let orphaned = [
        BlobRef::new("first"),
        BlobRef::new("stuck"),
        BlobRef::new("last"),
    ];

    assert_eq!(release_orphaned_blobs(&blobs, &orphaned).await, 1);
}

#[tokio::test]
async fn nothing_to_release_touches_no_blobs() {
    let mut blobs = MockBlobStore::new();
    blobs.expect_delete().never();

    assert_eq!(release_orphaned_blobs(&blobs, &[]).await, 0);
}
