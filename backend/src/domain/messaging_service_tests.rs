//! Tests for the messaging service.

use std::sync::Arc;

use rstest::rstest;

use super::*;
use crate::domain::ports::{FixtureMessageCipher, MockMessageCipher, MockMessagingRepository};
use crate::domain::ErrorCode;
use crate::test_support::clock::{fixture_clock, fixture_timestamp};

fn user(raw: i64) -> UserId {
    UserId::new(raw).expect("valid user id")
}

fn notification(id: i64, receiver: i64) -> Notification {
    Notification {
        id: NotificationId::new(id).expect("valid id"),
        receiver_id: user(receiver),
        content: "ping".to_owned(),
        read: false,
        created_at: fixture_timestamp(),
    }
}

fn stored(id: i64, sender: i64, recipient: i64, body: &str) -> StoredMessage {
    StoredMessage {
        id: MessageId::new(id).expect("valid id"),
        sender_id: user(sender),
        recipient_id: user(recipient),
        ciphertext: body.as_bytes().to_vec(),
        created_at: fixture_timestamp(),
        updated_at: fixture_timestamp(),
    }
}

fn make_service(
    repo: MockMessagingRepository,
) -> MessagingService<MockMessagingRepository, FixtureMessageCipher> {
    MessagingService::new(Arc::new(repo), Arc::new(FixtureMessageCipher), fixture_clock())
}

#[tokio::test]
async fn empty_notification_is_invalid() {
    let mut repo = MockMessagingRepository::new();
    repo.expect_insert_notification().never();

    let err = make_service(repo)
        .notify(&Caller::user(user(1)), user(2), "  ".to_owned())
        .await
        .expect_err("blank");
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
}

#[tokio::test]
async fn notifying_a_missing_user_is_not_found() {
    let mut repo = MockMessagingRepository::new();
    repo.expect_insert_notification()
        .return_once(|receiver, _, _| Err(MessagingRepositoryError::missing_user(receiver)));

    let err = make_service(repo)
        .notify(&Caller::user(user(1)), user(99), "hello".to_owned())
        .await
        .expect_err("missing receiver");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[case(Caller::user(user(3)))]
#[case(Caller::admin(user(3)))]
#[tokio::test]
async fn other_users_notifications_are_forbidden(#[case] caller: Caller) {
    let mut repo = MockMessagingRepository::new();
    repo.expect_find_notification()
        .returning(|_| Ok(Some(notification(1, 2))));
    repo.expect_set_notification_read().never();
    repo.expect_delete_notification().never();
    let service = make_service(repo);
    let id = NotificationId::new(1).expect("id");

    for err in [
        service.get_notification(&caller, id).await.err(),
        service.mark_read(&caller, id, true).await.err(),
        service.delete_notification(&caller, id).await.err(),
    ] {
        assert_eq!(err.map(|e| e.code()), Some(ErrorCode::Forbidden));
    }
}

#[tokio::test]
async fn receiver_can_mark_read() {
    let mut repo = MockMessagingRepository::new();
    repo.expect_find_notification()
        .return_once(|_| Ok(Some(notification(1, 2))));
    repo.expect_set_notification_read()
        .withf(|_, read| *read)
        .times(1)
        .return_once(|_, _| {
            let mut updated = notification(1, 2);
            updated.read = true;
            Ok(updated)
        });

    let updated = make_service(repo)
        .mark_read(&Caller::user(user(2)), NotificationId::new(1).expect("id"), true)
        .await
        .expect("marked");
    assert!(updated.read);
}

#[tokio::test]
async fn send_message_stores_ciphertext_from_the_cipher() {
    let mut cipher = MockMessageCipher::new();
    cipher
        .expect_encrypt()
        .times(1)
        .return_once(|_| Ok(vec![0xde, 0xad]));
    let mut repo = MockMessagingRepository::new();
    repo.expect_insert_message()
        .withf(|_, _, ciphertext, _| ciphertext == [0xde, 0xad])
        .times(1)
        .return_once(|sender, recipient, ciphertext, now| {
            Ok(StoredMessage {
                id: MessageId::new(4).expect("id"),
                sender_id: sender,
                recipient_id: recipient,
                ciphertext: ciphertext.to_vec(),
                created_at: now,
                updated_at: now,
            })
        });
    let service = MessagingService::new(Arc::new(repo), Arc::new(cipher), fixture_clock());

    let message = service
        .send_message(&Caller::user(user(1)), user(2), "secret".to_owned())
        .await
        .expect("sent");
    assert_eq!(message.content, "secret");
}

#[rstest]
#[case(1, true)]
#[case(2, true)]
#[case(3, false)]
#[tokio::test]
async fn only_participants_can_read_a_message(#[case] reader: i64, #[case] allowed: bool) {
    let mut repo = MockMessagingRepository::new();
    repo.expect_find_message()
        .return_once(|_| Ok(Some(stored(5, 1, 2, "hi there"))));

    let result = make_service(repo)
        .get_message(&Caller::user(user(reader)), MessageId::new(5).expect("id"))
        .await;
    match result {
        Ok(message) => {
            assert!(allowed);
            assert_eq!(message.content, "hi there");
        }
        Err(err) => {
            assert!(!allowed);
            assert_eq!(err.code(), ErrorCode::Forbidden);
        }
    }
}

#[tokio::test]
async fn recipient_cannot_edit_a_message() {
    let mut repo = MockMessagingRepository::new();
    repo.expect_find_message()
        .return_once(|_| Ok(Some(stored(5, 1, 2, "hi"))));
    repo.expect_update_message().never();

    let err = make_service(repo)
        .update_message(
            &Caller::user(user(2)),
            MessageId::new(5).expect("id"),
            "edited".to_owned(),
        )
        .await
        .expect_err("sender only");
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[tokio::test]
async fn undecryptable_messages_are_internal_errors() {
    let mut repo = MockMessagingRepository::new();
    repo.expect_find_message().return_once(|_| {
        let mut message = stored(5, 1, 2, "");
        message.ciphertext = vec![0xff];
        Ok(Some(message))
    });

    let err = make_service(repo)
        .get_message(&Caller::user(user(1)), MessageId::new(5).expect("id"))
        .await
        .expect_err("garbled");
    assert_eq!(err.code(), ErrorCode::InternalError);
}

#[tokio::test]
async fn conversation_is_decrypted_in_order() {
    let mut repo = MockMessagingRepository::new();
    repo.expect_list_conversation()
        .return_once(|_, _| Ok(vec![stored(1, 1, 2, "first"), stored(2, 2, 1, "second")]));

    let conversation = make_service(repo)
        .list_conversation(&Caller::user(user(1)), user(2))
        .await
        .expect("conversation");
    let bodies: Vec<_> = conversation.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(bodies, ["first", "second"]);
}
