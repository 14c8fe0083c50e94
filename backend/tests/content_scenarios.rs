//! Posts, taxonomy, comments and the ownership guard over the in-memory
//! store.
use postboard::domain::ports::FixedAuthContext;
use postboard::domain::{ErrorCode, UserId, resolve_caller};
use rstest::{fixture, rstest};

mod support;

use support::Board;

#[fixture]
fn board() -> Board {
    Board::new()
}

#[rstest]
#[tokio::test]
async fn resolved_callers_carry_the_stored_admin_flag(board: Board) {
    let admin = board.admin("root").await;
    let member = board.member("ada").await;

    let resolved = resolve_caller(&FixedAuthContext::signed_in(admin.id), board.store.as_ref())
        .await
        .expect("admin");
    assert!(resolved.is_admin);
    let resolved = resolve_caller(&FixedAuthContext::signed_in(member.id), board.store.as_ref())
        .await
        .expect("member");
    assert!(!resolved.is_admin);

    let ghost = UserId::new(404).expect("id");
    let err = resolve_caller(&FixedAuthContext::signed_in(ghost), board.store.as_ref())
        .await
        .expect_err("unknown");
    assert_eq!(err.code(), ErrorCode::Unauthorized);
}

#[rstest]
#[tokio::test]
async fn taxonomy_writes_are_admin_only(board: Board) {
    let admin = board.admin("root").await;
    let member = board.member("ada").await;

    let err = board
        .content
        .create_category(&member, "news")
        .await
        .expect_err("member");
    assert_eq!(err.code(), ErrorCode::Forbidden);
    let err = board
        .content
        .create_tag(&member, "rust")
        .await
        .expect_err("member");
    assert_eq!(err.code(), ErrorCode::Forbidden);

    board.category(&admin, "news").await;
    let err = board
        .content
        .create_category(&admin, "news")
        .await
        .expect_err("duplicate");
    assert_eq!(err.code(), ErrorCode::AlreadyExists);
}

#[rstest]
#[tokio::test]
async fn categories_in_use_cannot_be_deleted(board: Board) {
    let admin = board.admin("root").await;
    let author = board.member("ada").await;
    let news = board.category(&admin, "news").await;
    let post = board.post(&author, &news, "launch").await;

    let err = board
        .content
        .delete_category(&admin, news.id)
        .await
        .expect_err("in use");
    assert_eq!(err.code(), ErrorCode::InvalidOperation);

    board
        .content
        .delete_post(&author, post.id)
        .await
        .expect("delete post");
    board
        .content
        .delete_category(&admin, news.id)
        .await
        .expect("delete category");
}

#[rstest]
#[tokio::test]
async fn posts_are_edited_by_their_author_only(board: Board) {
    let admin = board.admin("root").await;
    let author = board.member("ada").await;
    let other = board.member("bob").await;
    let news = board.category(&admin, "news").await;
    let post = board.post(&author, &news, "launch").await;

    for caller in [&other, &admin] {
        let err = board
            .content
            .update_post(caller, post.id, None, Some("hijack".to_owned()), None)
            .await
            .expect_err("not the author");
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    let updated = board
        .content
        .update_post(&author, post.id, None, Some("relaunch".to_owned()), None)
        .await
        .expect("author edit");
    assert_eq!(updated.title, "relaunch");
    assert_eq!(updated.content, post.content);
}

#[rstest]
#[tokio::test]
async fn comments_move_the_counter_and_admins_may_moderate(board: Board) {
    let admin = board.admin("root").await;
    let author = board.member("ada").await;
    let reader = board.member("bob").await;
    let news = board.category(&admin, "news").await;
    let post = board.post(&author, &news, "launch").await;

    let comment = board
        .content
        .create_comment(&reader, post.id, "nice".to_owned())
        .await
        .expect("comment");
    assert_eq!(board.reload(&post).await.counters.comments, 1);

    let err = board
        .content
        .update_comment(&admin, comment.id, "edited".to_owned())
        .await
        .expect_err("admins cannot edit");
    assert_eq!(err.code(), ErrorCode::Forbidden);
    let err = board
        .content
        .delete_comment(&author, comment.id)
        .await
        .expect_err("post author is not the commenter");
    assert_eq!(err.code(), ErrorCode::Forbidden);

    board
        .content
        .delete_comment(&admin, comment.id)
        .await
        .expect("admin removes comment");
    assert_eq!(board.reload(&post).await.counters.comments, 0);
    assert!(
        board
            .content
            .list_comments(post.id)
            .await
            .expect("comments")
            .is_empty()
    );
}

#[rstest]
#[tokio::test]
async fn comments_on_missing_posts_are_not_found(board: Board) {
    let reader = board.member("bob").await;
    let missing = postboard::domain::PostId::new(77).expect("id");

    let err = board
        .content
        .create_comment(&reader, missing, "hello".to_owned())
        .await
        .expect_err("missing post");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn tags_link_posts_both_ways(board: Board) {
    let admin = board.admin("root").await;
    let author = board.member("ada").await;
    let news = board.category(&admin, "news").await;
    let post = board.post(&author, &news, "launch").await;
    let rust = board.content.create_tag(&admin, "rust").await.expect("tag");

    board
        .content
        .attach_tag(&admin, post.id, rust.id)
        .await
        .expect("attach");
    let err = board
        .content
        .attach_tag(&admin, post.id, rust.id)
        .await
        .expect_err("duplicate link");
    assert_eq!(err.code(), ErrorCode::AlreadyExists);

    let tags = board.content.list_post_tags(post.id).await.expect("tags");
    assert_eq!(tags.iter().map(|t| t.id).collect::<Vec<_>>(), vec![rust.id]);
    let posts = board.content.list_tag_posts(rust.id).await.expect("posts");
    assert_eq!(posts.iter().map(|p| p.id).collect::<Vec<_>>(), vec![post.id]);

    board
        .content
        .detach_tag(&admin, post.id, rust.id)
        .await
        .expect("detach");
    assert!(
        board
            .content
            .list_post_tags(post.id)
            .await
            .expect("tags")
            .is_empty()
    );
}

#[rstest]
#[tokio::test]
async fn followed_feed_only_shows_followed_authors(board: Board) {
    let admin = board.admin("root").await;
    let ada = board.member("ada").await;
    let bob = board.member("bob").await;
    let reader = board.member("cyd").await;
    let news = board.category(&admin, "news").await;
    let first = board.post(&ada, &news, "first").await;
    board.post(&bob, &news, "unrelated").await;
    let second = board.post(&ada, &news, "second").await;
    board
        .relationships
        .follow(&reader, ada.id)
        .await
        .expect("follow");

    let feed = board
        .content
        .list_followed_authors_posts(&reader)
        .await
        .expect("feed");
    assert_eq!(
        feed.iter().map(|p| p.id).collect::<Vec<_>>(),
        vec![second.id, first.id]
    );
    let mine = board.content.list_my_posts(&ada).await.expect("mine");
    assert_eq!(mine.len(), 2);
}

#[rstest]
#[tokio::test]
async fn trending_orders_by_likes_then_comments(board: Board) {
    let admin = board.admin("root").await;
    let author = board.member("ada").await;
    let fans = [
        board.member("bob").await,
        board.member("cyd").await,
    ];
    let news = board.category(&admin, "news").await;
    let quiet = board.post(&author, &news, "quiet").await;
    let chatty = board.post(&author, &news, "chatty").await;
    let loved = board.post(&author, &news, "loved").await;

    for fan in &fans {
        board
            .engagement
            .rate(fan, loved.id, "like")
            .await
            .expect("like");
    }
    board
        .engagement
        .rate(&fans[0], chatty.id, "like")
        .await
        .expect("like");
    board
        .content
        .create_comment(&fans[1], chatty.id, "hm".to_owned())
        .await
        .expect("comment");
    board
        .engagement
        .rate(&fans[1], quiet.id, "like")
        .await
        .expect("like");

    let trending = board.content.trending_posts(10).await.expect("trending");
    assert_eq!(
        trending.iter().map(|p| p.id).collect::<Vec<_>>(),
        vec![loved.id, chatty.id, quiet.id]
    );
    let top = board.content.trending_posts(1).await.expect("trending");
    assert_eq!(top.len(), 1);
}

#[rstest]
#[tokio::test]
async fn deleting_a_post_removes_its_comments_and_ratings(board: Board) {
    let admin = board.admin("root").await;
    let author = board.member("ada").await;
    let reader = board.member("bob").await;
    let news = board.category(&admin, "news").await;
    let post = board.post(&author, &news, "launch").await;
    let comment = board
        .content
        .create_comment(&reader, post.id, "nice".to_owned())
        .await
        .expect("comment");
    let rating = board
        .engagement
        .rate(&reader, post.id, "like")
        .await
        .expect("like");

    board
        .content
        .delete_post(&author, post.id)
        .await
        .expect("delete");

    for err in [
        board.content.get_post(post.id).await.expect_err("post"),
        board.content.get_comment(comment.id).await.expect_err("comment"),
        board.engagement.get_rating(rating.id).await.expect_err("rating"),
    ] {
        assert_eq!(err.code(), ErrorCode::NotFound);
    }
}
