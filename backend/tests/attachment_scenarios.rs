//! Attachment uploads across a capability-scoped blob directory and the
//! in-memory metadata store, including the compensation paths.
use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use postboard::domain::ports::{
    AttachmentRepository, AttachmentRepositoryError, BlobStore, BlobStoreError,
    FixtureCredentialHasher,
};
use postboard::domain::{
    AccountService, Attachment, AttachmentId, AttachmentService, AttachmentTarget, BlobRef,
    Caller, CommentId, ContentService, ErrorCode, NewAttachment, Post, PostId, UploadRequest,
};
use postboard::outbound::blob::CapStdBlobStore;
use postboard::outbound::memory::InMemoryStore;
use postboard::test_support::clock::fixture_clock;
use rstest::{fixture, rstest};
use serde_json::json;
use tempfile::TempDir;

mod support;

use support::Board;

/// Metadata store whose inserts always fail.
struct RefusingInserts(Arc<InMemoryStore>);

#[async_trait]
impl AttachmentRepository for RefusingInserts {
    async fn check_targets(
        &self,
        target: &AttachmentTarget,
    ) -> Result<(), AttachmentRepositoryError> {
        self.0.check_targets(target).await
    }

    async fn insert(
        &self,
        _attachment: &NewAttachment,
    ) -> Result<Attachment, AttachmentRepositoryError> {
        Err(AttachmentRepositoryError::query("disk full"))
    }

    async fn find(
        &self,
        attachment_id: AttachmentId,
    ) -> Result<Option<Attachment>, AttachmentRepositoryError> {
        self.0.find(attachment_id).await
    }

    async fn delete(&self, attachment_id: AttachmentId) -> Result<(), AttachmentRepositoryError> {
        AttachmentRepository::delete(self.0.as_ref(), attachment_id).await
    }

    async fn list_for_post(
        &self,
        post_id: PostId,
    ) -> Result<Vec<Attachment>, AttachmentRepositoryError> {
        self.0.list_for_post(post_id).await
    }

    async fn list_for_comment(
        &self,
        comment_id: CommentId,
    ) -> Result<Vec<Attachment>, AttachmentRepositoryError> {
        self.0.list_for_comment(comment_id).await
    }
}

/// Blob store that saves but never deletes.
struct StickyBlobs(CapStdBlobStore);

#[async_trait]
impl BlobStore for StickyBlobs {
    async fn save(&self, bytes: &[u8], name: &str) -> Result<BlobRef, BlobStoreError> {
        self.0.save(bytes, name).await
    }

    async fn delete(&self, _blob_ref: &BlobRef) -> Result<(), BlobStoreError> {
        Err(BlobStoreError::io("read-only volume"))
    }
}

struct Harness {
    board: Board,
    blobs_dir: TempDir,
}

impl Harness {
    fn blob_store(&self) -> CapStdBlobStore {
        CapStdBlobStore::open(self.blobs_dir.path()).expect("open blob dir")
    }

    fn stored_blobs(&self) -> usize {
        count_files(self.blobs_dir.path())
    }

    fn attachments(&self) -> AttachmentService<InMemoryStore, CapStdBlobStore> {
        AttachmentService::new(
            Arc::clone(&self.board.store),
            Arc::new(self.blob_store()),
            fixture_clock(),
        )
    }

    fn content(&self) -> ContentService<InMemoryStore, CapStdBlobStore> {
        ContentService::new(
            Arc::clone(&self.board.store),
            Arc::new(self.blob_store()),
            fixture_clock(),
        )
    }

    fn accounts(
        &self,
    ) -> AccountService<InMemoryStore, InMemoryStore, FixtureCredentialHasher, CapStdBlobStore>
    {
        AccountService::new(
            Arc::clone(&self.board.store),
            Arc::clone(&self.board.store),
            Arc::new(FixtureCredentialHasher),
            Arc::new(self.blob_store()),
        )
    }
}

fn count_files(path: &Path) -> usize {
    fs::read_dir(path).expect("read blob dir").count()
}

#[fixture]
fn harness() -> Harness {
    Harness {
        board: Board::new(),
        blobs_dir: tempfile::tempdir().expect("tempdir"),
    }
}

fn upload_for(post_id: PostId) -> UploadRequest {
    UploadRequest {
        file_name: "notes.txt".to_owned(),
        content_type: "text/plain".to_owned(),
        bytes: b"hello attachments".to_vec(),
        post_id: Some(post_id),
        comment_id: None,
    }
}

async fn seed_authored_post(board: &Board) -> (Caller, Post) {
    let admin = board.admin("root").await;
    let author = board.member("ada").await;
    let news = board.category(&admin, "news").await;
    let post = board.post(&author, &news, "launch").await;
    (author, post)
}

async fn seed_post(board: &Board) -> Post {
    seed_authored_post(board).await.1
}

#[rstest]
#[tokio::test]
async fn upload_stores_bytes_and_metadata(harness: Harness) {
    let post = seed_post(&harness.board).await;
    let uploader = harness.board.member("bob").await;
    let blobs = Arc::new(harness.blob_store());
    let service = AttachmentService::new(
        Arc::clone(&harness.board.store),
        Arc::clone(&blobs),
        fixture_clock(),
    );

    let attachment = service
        .upload(&uploader, upload_for(post.id))
        .await
        .expect("upload");

    assert_eq!(attachment.user_id, uploader.id);
    assert_eq!(attachment.size_bytes, 17);
    assert_eq!(
        blobs.read(&attachment.blob_ref).expect("read blob"),
        b"hello attachments".to_vec()
    );
    let listed = service.list_for_post(post.id).await.expect("list");
    assert_eq!(listed, vec![attachment]);
}

#[rstest]
#[tokio::test]
async fn missing_target_is_not_found_and_leaves_no_blob(harness: Harness) {
    let uploader = harness.board.member("bob").await;
    let service = AttachmentService::new(
        Arc::clone(&harness.board.store),
        Arc::new(harness.blob_store()),
        fixture_clock(),
    );

    let err = service
        .upload(&uploader, upload_for(PostId::new(404).expect("id")))
        .await
        .expect_err("missing post");

    assert_eq!(err.code(), ErrorCode::NotFound);
    assert_eq!(harness.stored_blobs(), 0);
}

#[rstest]
#[tokio::test]
async fn request_without_target_is_invalid(harness: Harness) {
    let uploader = harness.board.member("bob").await;
    let service = AttachmentService::new(
        Arc::clone(&harness.board.store),
        Arc::new(harness.blob_store()),
        fixture_clock(),
    );
    let mut request = upload_for(PostId::new(1).expect("id"));
    request.post_id = None;

    let err = service
        .upload(&uploader, request)
        .await
        .expect_err("no target");
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
    assert_eq!(harness.stored_blobs(), 0);
}

#[rstest]
#[tokio::test]
async fn failed_insert_removes_the_saved_blob(harness: Harness) {
    let post = seed_post(&harness.board).await;
    let uploader = harness.board.member("bob").await;
    let service = AttachmentService::new(
        Arc::new(RefusingInserts(Arc::clone(&harness.board.store))),
        Arc::new(harness.blob_store()),
        fixture_clock(),
    );

    let err = service
        .upload(&uploader, upload_for(post.id))
        .await
        .expect_err("insert fails");

    assert_eq!(err.code(), ErrorCode::InternalError);
    assert_eq!(harness.stored_blobs(), 0);
}

#[rstest]
#[tokio::test]
async fn failed_compensation_is_a_partial_failure(harness: Harness) {
    let post = seed_post(&harness.board).await;
    let uploader = harness.board.member("bob").await;
    let service = AttachmentService::new(
        Arc::new(RefusingInserts(Arc::clone(&harness.board.store))),
        Arc::new(StickyBlobs(harness.blob_store())),
        fixture_clock(),
    );

    let err = service
        .upload(&uploader, upload_for(post.id))
        .await
        .expect_err("insert and compensation fail");

    assert_eq!(err.code(), ErrorCode::PartialFailure);
    let details = err.details().expect("details");
    assert_eq!(details["failedStep"], json!("compensate_blob"));
    assert_eq!(harness.stored_blobs(), 1);
}

#[rstest]
#[tokio::test]
async fn delete_is_owner_or_admin(harness: Harness) {
    let post = seed_post(&harness.board).await;
    let uploader = harness.board.member("bob").await;
    let stranger = harness.board.member("cyd").await;
    let moderator = harness.board.admin("mod").await;
    let service = AttachmentService::new(
        Arc::clone(&harness.board.store),
        Arc::new(harness.blob_store()),
        fixture_clock(),
    );
    let first = service
        .upload(&uploader, upload_for(post.id))
        .await
        .expect("upload");
    let second = service
        .upload(&uploader, upload_for(post.id))
        .await
        .expect("upload");

    let err = service
        .delete(&stranger, first.id)
        .await
        .expect_err("stranger");
    assert_eq!(err.code(), ErrorCode::Forbidden);

    service.delete(&uploader, first.id).await.expect("owner");
    service.delete(&moderator, second.id).await.expect("admin");
    assert_eq!(harness.stored_blobs(), 0);
    assert!(service.list_for_post(post.id).await.expect("list").is_empty());
}

#[rstest]
#[tokio::test]
async fn blob_delete_failure_keeps_the_metadata(harness: Harness) {
    let post = seed_post(&harness.board).await;
    let uploader = harness.board.member("bob").await;
    let service = AttachmentService::new(
        Arc::clone(&harness.board.store),
        Arc::new(StickyBlobs(harness.blob_store())),
        fixture_clock(),
    );
    let attachment = service
        .upload(&uploader, upload_for(post.id))
        .await
        .expect("upload");

    let err = service
        .delete(&uploader, attachment.id)
        .await
        .expect_err("blob delete fails");

    assert_eq!(err.code(), ErrorCode::PartialFailure);
    assert_eq!(
        err.details().expect("details")["failedStep"],
        json!("blob_delete")
    );
    assert_eq!(service.get(attachment.id).await.expect("kept"), attachment);
}

fn upload_for_comment(comment_id: CommentId) -> UploadRequest {
    UploadRequest {
        comment_id: Some(comment_id),
        post_id: None,
        ..upload_for(PostId::new(1).expect("id"))
    }
}

#[rstest]
#[tokio::test]
async fn deleting_a_post_removes_the_blobs_of_its_attachments(harness: Harness) {
    let (author, post) = seed_authored_post(&harness.board).await;
    let commenter = harness.board.member("bob").await;
    let comment = harness
        .board
        .content
        .create_comment(&commenter, post.id, "see attached".to_owned())
        .await
        .expect("comment");
    let attachments = harness.attachments();
    let on_post = attachments
        .upload(&commenter, upload_for(post.id))
        .await
        .expect("post upload");
    attachments
        .upload(&commenter, upload_for_comment(comment.id))
        .await
        .expect("comment upload");
    assert_eq!(harness.stored_blobs(), 2);

    harness
        .content()
        .delete_post(&author, post.id)
        .await
        .expect("delete post");

    assert_eq!(harness.stored_blobs(), 0);
    let err = attachments.get(on_post.id).await.expect_err("row gone");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn deleting_a_comment_removes_only_its_blobs(harness: Harness) {
    let post = seed_post(&harness.board).await;
    let commenter = harness.board.member("bob").await;
    let comment = harness
        .board
        .content
        .create_comment(&commenter, post.id, "draft".to_owned())
        .await
        .expect("comment");
    let attachments = harness.attachments();
    let kept = attachments
        .upload(&commenter, upload_for(post.id))
        .await
        .expect("post upload");
    attachments
        .upload(&commenter, upload_for_comment(comment.id))
        .await
        .expect("comment upload");

    harness
        .content()
        .delete_comment(&commenter, comment.id)
        .await
        .expect("delete comment");

    assert_eq!(harness.stored_blobs(), 1);
    assert_eq!(attachments.list_for_post(post.id).await.expect("list"), vec![kept]);
}

#[rstest]
#[tokio::test]
async fn deleting_an_account_removes_the_blobs_it_leaves_behind(harness: Harness) {
    let post = seed_post(&harness.board).await;
    let uploader = harness.board.member("bob").await;
    let bystander = harness.board.member("cyd").await;
    let attachments = harness.attachments();
    attachments
        .upload(&uploader, upload_for(post.id))
        .await
        .expect("bob upload");
    let kept = attachments
        .upload(&bystander, upload_for(post.id))
        .await
        .expect("cyd upload");

    harness
        .accounts()
        .delete_user(&uploader, uploader.id)
        .await
        .expect("delete account");

    assert_eq!(harness.stored_blobs(), 1);
    assert_eq!(attachments.list_for_post(post.id).await.expect("list"), vec![kept]);
}
