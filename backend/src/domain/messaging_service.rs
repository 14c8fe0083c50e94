//! Notifications and private messages.
//!
//! Notifications are visible to their receiver only. Message bodies are
//! sealed with the injected [`MessageCipher`] before storage and opened only
//! for the sender or the recipient.

use std::sync::Arc;

use mockable::Clock;
use tracing::debug;

use crate::domain::ports::{
    MessageCipher, MessageCipherError, MessagingRepository, MessagingRepositoryError,
};
use crate::domain::{
    AdminOverride, Caller, Error, Message, MessageId, MessageText, Notification,
    NotificationId, ServiceResult, StoredMessage, UserId, authorize,
};

/// Messaging service implementing notification and message operations.
#[derive(Clone)]
pub struct MessagingService<R, C> {
    messaging: Arc<R>,
    cipher: Arc<C>,
    clock: Arc<dyn Clock>,
}

impl<R, C> MessagingService<R, C> {
    /// Create a new service with the given repository, cipher and clock.
    pub fn new(messaging: Arc<R>, cipher: Arc<C>, clock: Arc<dyn Clock>) -> Self {
        Self {
            messaging,
            cipher,
            clock,
        }
    }
}

impl<R, C> MessagingService<R, C>
where
    R: MessagingRepository,
    C: MessageCipher,
{
    fn map_messaging_error(error: MessagingRepositoryError) -> Error {
        match error {
            MessagingRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("messaging repository unavailable: {message}"))
            }
            MessagingRepositoryError::Query { message } => {
                Error::internal(format!("messaging repository error: {message}"))
            }
            err @ (MessagingRepositoryError::MissingUser { .. }
            | MessagingRepositoryError::MissingNotification { .. }
            | MessagingRepositoryError::MissingMessage { .. }) => Error::not_found(err.to_string()),
        }
    }

    fn map_cipher_error(error: MessageCipherError) -> Error {
        Error::internal(error.to_string())
    }

    fn text(raw: String) -> ServiceResult<MessageText> {
        MessageText::new(raw).map_err(|err| Error::invalid_argument(err.to_string()))
    }

    fn open(&self, stored: StoredMessage) -> ServiceResult<Message> {
        let plaintext = self
            .cipher
            .decrypt(&stored.ciphertext)
            .map_err(Self::map_cipher_error)?;
        Ok(stored.with_plaintext(plaintext))
    }

    // Notifications

    /// Send a notification to `receiver_id`.
    pub async fn notify(
        &self,
        caller: &Caller,
        receiver_id: UserId,
        content: String,
    ) -> ServiceResult<Notification> {
        let text = Self::text(content)?;
        let notification = self
            .messaging
            .insert_notification(receiver_id, text.as_str(), self.clock.utc())
            .await
            .map_err(Self::map_messaging_error)?;
        debug!(
            notification = %notification.id,
            sender = %caller.id,
            receiver = %receiver_id,
            "notification created"
        );
        Ok(notification)
    }

    /// Fetch one of the caller's notifications.
    pub async fn get_notification(
        &self,
        caller: &Caller,
        notification_id: NotificationId,
    ) -> ServiceResult<Notification> {
        let notification = self
            .messaging
            .find_notification(notification_id)
            .await
            .map_err(Self::map_messaging_error)?
            .ok_or_else(|| {
                Error::not_found(format!("notification {notification_id} does not exist"))
            })?;
        authorize(caller, notification.receiver_id, AdminOverride::NotApplicable)?;
        Ok(notification)
    }

    /// Set the read flag of one of the caller's notifications.
    pub async fn mark_read(
        &self,
        caller: &Caller,
        notification_id: NotificationId,
        read: bool,
    ) -> ServiceResult<Notification> {
        self.get_notification(caller, notification_id).await?;
        self.messaging
            .set_notification_read(notification_id, read)
            .await
            .map_err(Self::map_messaging_error)
    }

    /// Delete one of the caller's notifications.
    pub async fn delete_notification(
        &self,
        caller: &Caller,
        notification_id: NotificationId,
    ) -> ServiceResult<()> {
        self.get_notification(caller, notification_id).await?;
        self.messaging
            .delete_notification(notification_id)
            .await
            .map_err(Self::map_messaging_error)?;
        debug!(notification = %notification_id, "notification deleted");
        Ok(())
    }

    /// The caller's notifications, newest first.
    pub async fn list_notifications(&self, caller: &Caller) -> ServiceResult<Vec<Notification>> {
        self.messaging
            .list_notifications(caller.id)
            .await
            .map_err(Self::map_messaging_error)
    }

    // Messages

    /// Encrypt and store a message from the caller to `recipient_id`.
    pub async fn send_message(
        &self,
        caller: &Caller,
        recipient_id: UserId,
        content: String,
    ) -> ServiceResult<Message> {
        let text = Self::text(content)?;
        let sealed = self
            .cipher
            .encrypt(text.as_str())
            .map_err(Self::map_cipher_error)?;
        let stored = self
            .messaging
            .insert_message(caller.id, recipient_id, &sealed, self.clock.utc())
            .await
            .map_err(Self::map_messaging_error)?;
        debug!(
            message = %stored.id,
            sender = %caller.id,
            recipient = %recipient_id,
            "message sent"
        );
        Ok(stored.with_plaintext(text.into_inner()))
    }

    async fn find_message(&self, message_id: MessageId) -> ServiceResult<StoredMessage> {
        self.messaging
            .find_message(message_id)
            .await
            .map_err(Self::map_messaging_error)?
            .ok_or_else(|| Error::not_found(format!("message {message_id} does not exist")))
    }

    /// Decrypt a message for its sender or recipient.
    pub async fn get_message(
        &self,
        caller: &Caller,
        message_id: MessageId,
    ) -> ServiceResult<Message> {
        let stored = self.find_message(message_id).await?;
        if !stored.involves(caller.id) {
            return Err(Error::forbidden(format!(
                "user {} is not a participant of message {message_id}",
                caller.id
            )));
        }
        self.open(stored)
    }

    /// Replace a message body. Sender only.
    pub async fn update_message(
        &self,
        caller: &Caller,
        message_id: MessageId,
        content: String,
    ) -> ServiceResult<Message> {
        let text = Self::text(content)?;
        let stored = self.find_message(message_id).await?;
        authorize(caller, stored.sender_id, AdminOverride::NotApplicable)?;
        let sealed = self
            .cipher
            .encrypt(text.as_str())
            .map_err(Self::map_cipher_error)?;
        let updated = self
            .messaging
            .update_message(message_id, &sealed, self.clock.utc())
            .await
            .map_err(Self::map_messaging_error)?;
        Ok(updated.with_plaintext(text.into_inner()))
    }

    /// Delete a message. Sender only.
    pub async fn delete_message(
        &self,
        caller: &Caller,
        message_id: MessageId,
    ) -> ServiceResult<()> {
        let stored = self.find_message(message_id).await?;
        authorize(caller, stored.sender_id, AdminOverride::NotApplicable)?;
        self.messaging
            .delete_message(message_id)
            .await
            .map_err(Self::map_messaging_error)?;
        debug!(message = %message_id, "message deleted");
        Ok(())
    }

    /// Messages between the caller and `other`, oldest first, decrypted.
    pub async fn list_conversation(
        &self,
        caller: &Caller,
        other: UserId,
    ) -> ServiceResult<Vec<Message>> {
        self.messaging
            .list_conversation(caller.id, other)
            .await
            .map_err(Self::map_messaging_error)?
            .into_iter()
            .map(|stored| self.open(stored))
            .collect()
    }
}

#[cfg(test)]
#[path = "messaging_service_tests.rs"]
mod tests;
