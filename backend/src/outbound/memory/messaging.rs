//! Notifications and messages over [`InMemoryStore`].

use std::cmp::Reverse;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::ports::{MessagingRepository, MessagingRepositoryError};
use crate::domain::{MessageId, Notification, NotificationId, StoredMessage, UserId};

use super::{InMemoryStore, next};

#[async_trait]
impl MessagingRepository for InMemoryStore {
    async fn insert_notification(
        &self,
        receiver_id: UserId,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Notification, MessagingRepositoryError> {
        let mut state = self.lock();
        if !state.user_exists(receiver_id) {
            return Err(MessagingRepositoryError::missing_user(receiver_id));
        }
        let id = NotificationId::from_store(next(&mut state.sequences.notifications));
        let notification = Notification {
            id,
            receiver_id,
            content: content.to_owned(),
            read: false,
            created_at: now,
        };
        state.notifications.insert(id, notification.clone());
        debug!(notification_id = %id, receiver_id = %receiver_id, "inserted notification");
        Ok(notification)
    }

    async fn find_notification(
        &self,
        notification_id: NotificationId,
    ) -> Result<Option<Notification>, MessagingRepositoryError> {
        Ok(self.lock().notifications.get(&notification_id).cloned())
    }

    async fn set_notification_read(
        &self,
        notification_id: NotificationId,
        read: bool,
    ) -> Result<Notification, MessagingRepositoryError> {
        let mut state = self.lock();
        let notification = state
            .notifications
            .get_mut(&notification_id)
            .ok_or_else(|| MessagingRepositoryError::missing_notification(notification_id))?;
        notification.read = read;
        Ok(notification.clone())
    }

    async fn delete_notification(
        &self,
        notification_id: NotificationId,
    ) -> Result<(), MessagingRepositoryError> {
        self.lock()
            .notifications
            .remove(&notification_id)
            .map(|_| ())
            .ok_or_else(|| MessagingRepositoryError::missing_notification(notification_id))
    }

    async fn list_notifications(
        &self,
        receiver_id: UserId,
    ) -> Result<Vec<Notification>, MessagingRepositoryError> {
        let mut listed: Vec<Notification> = self
            .lock()
            .notifications
            .values()
            .filter(|notification| notification.receiver_id == receiver_id)
            .cloned()
            .collect();
        listed.sort_by_key(|notification| Reverse((notification.created_at, notification.id)));
        Ok(listed)
    }

    async fn insert_message(
        &self,
        sender_id: UserId,
        recipient_id: UserId,
        ciphertext: &[u8],
        now: DateTime<Utc>,
    ) -> Result<StoredMessage, MessagingRepositoryError> {
        let mut state = self.lock();
        for user_id in [sender_id, recipient_id] {
            if !state.user_exists(user_id) {
                return Err(MessagingRepositoryError::missing_user(user_id));
            }
        }
        let id = MessageId::from_store(next(&mut state.sequences.messages));
        let message = StoredMessage {
            id,
            sender_id,
            recipient_id,
            ciphertext: ciphertext.to_vec(),
            created_at: now,
            updated_at: now,
        };
        state.messages.insert(id, message.clone());
        debug!(message_id = %id, sender_id = %sender_id, "inserted message");
        Ok(message)
    }

    async fn find_message(
        &self,
        message_id: MessageId,
    ) -> Result<Option<StoredMessage>, MessagingRepositoryError> {
        Ok(self.lock().messages.get(&message_id).cloned())
    }

    async fn update_message(
        &self,
        message_id: MessageId,
        ciphertext: &[u8],
        now: DateTime<Utc>,
    ) -> Result<StoredMessage, MessagingRepositoryError> {
        let mut state = self.lock();
        let message = state
            .messages
            .get_mut(&message_id)
            .ok_or_else(|| MessagingRepositoryError::missing_message(message_id))?;
        message.ciphertext = ciphertext.to_vec();
        message.updated_at = now;
        Ok(message.clone())
    }

    async fn delete_message(&self, message_id: MessageId) -> Result<(), MessagingRepositoryError> {
        self.lock()
            .messages
            .remove(&message_id)
            .map(|_| ())
            .ok_or_else(|| MessagingRepositoryError::missing_message(message_id))
    }

    async fn list_conversation(
        &self,
        user_a: UserId,
        user_b: UserId,
    ) -> Result<Vec<StoredMessage>, MessagingRepositoryError> {
        let mut listed: Vec<StoredMessage> = self
            .lock()
            .messages
            .values()
            .filter(|message| {
                (message.sender_id == user_a && message.recipient_id == user_b)
                    || (message.sender_id == user_b && message.recipient_id == user_a)
            })
            .cloned()
            .collect();
        listed.sort_by_key(|message| (message.created_at, message.id));
        Ok(listed)
    }
}
