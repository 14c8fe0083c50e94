//! Port for notifications and encrypted messages.
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{MessageId, Notification, NotificationId, StoredMessage, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by messaging repository adapters.
    pub enum MessagingRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "messaging repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "messaging repository query failed: {message}",
        /// Receiver or recipient does not exist.
        MissingUser { user_id: UserId } => "user {user_id} does not exist",
        /// The notification does not exist.
        MissingNotification { notification_id: NotificationId } =>
            "notification {notification_id} does not exist",
        /// The message does not exist.
        MissingMessage { message_id: MessageId } => "message {message_id} does not exist",
    }
}

/// Notification and message storage. Message bodies arrive already
/// encrypted and are stored as opaque bytes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagingRepository: Send + Sync {
    /// Insert an unread notification, checking the receiver exists.
    async fn insert_notification(
        &self,
        receiver_id: UserId,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Notification, MessagingRepositoryError>;

    /// Fetch a notification.
    async fn find_notification(
        &self,
        notification_id: NotificationId,
    ) -> Result<Option<Notification>, MessagingRepositoryError>;

    /// Set the read flag.
    async fn set_notification_read(
        &self,
        notification_id: NotificationId,
        read: bool,
    ) -> Result<Notification, MessagingRepositoryError>;

    /// Delete a notification.
    async fn delete_notification(
        &self,
        notification_id: NotificationId,
    ) -> Result<(), MessagingRepositoryError>;

    /// Notifications of one receiver, newest first.
    async fn list_notifications(
        &self,
        receiver_id: UserId,
    ) -> Result<Vec<Notification>, MessagingRepositoryError>;

    /// Insert a message, checking the recipient exists.
    async fn insert_message(
        &self,
        sender_id: UserId,
        recipient_id: UserId,
        ciphertext: &[u8],
        now: DateTime<Utc>,
    ) -> Result<StoredMessage, MessagingRepositoryError>;

    /// Fetch a message.
    async fn find_message(
        &self,
        message_id: MessageId,
    ) -> Result<Option<StoredMessage>, MessagingRepositoryError>;

    /// Replace a message body and bump `updated_at`.
    async fn update_message(
        &self,
        message_id: MessageId,
        ciphertext: &[u8],
        now: DateTime<Utc>,
    ) -> Result<StoredMessage, MessagingRepositoryError>;

    /// Delete a message.
    async fn delete_message(&self, message_id: MessageId) -> Result<(), MessagingRepositoryError>;

    /// Messages exchanged between two users in either direction, oldest
    /// first.
    async fn list_conversation(
        &self,
        user_a: UserId,
        user_b: UserId,
    ) -> Result<Vec<StoredMessage>, MessagingRepositoryError>;
}
