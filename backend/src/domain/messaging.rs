//! Notifications and private messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MessageId, NotificationId, UserId};

/// Returned when notification or message text is blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{field} must not be empty")]
pub struct EmptyTextError {
    /// Name of the rejected field.
    pub field: &'static str,
}

/// Non-blank text body shared by notifications and messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageText(String);

impl MessageText {
    /// Validate a raw body. Surrounding whitespace is kept.
    pub fn new(raw: impl Into<String>) -> Result<Self, EmptyTextError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(EmptyTextError { field: "content" });
        }
        Ok(Self(raw))
    }

    /// Borrow the text.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Consume the wrapper.
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// A notification addressed to one receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Store-assigned identifier.
    pub id: NotificationId,
    /// The only user allowed to read or modify this notification.
    pub receiver_id: UserId,
    /// Body text.
    pub content: String,
    /// Read flag, false on creation.
    pub read: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A message as persisted, with its body encrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    /// Store-assigned identifier.
    pub id: MessageId,
    /// Author, the only user allowed to edit or delete.
    pub sender_id: UserId,
    /// Addressee.
    pub recipient_id: UserId,
    /// Opaque ciphertext produced by a
    /// [`MessageCipher`](crate::domain::ports::MessageCipher).
    pub ciphertext: Vec<u8>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last edit timestamp.
    pub updated_at: DateTime<Utc>,
}

impl StoredMessage {
    /// True when `user` is the sender or the recipient.
    pub fn involves(&self, user: UserId) -> bool {
        self.sender_id == user || self.recipient_id == user
    }

    /// Attach decrypted text, producing the participant view.
    pub fn with_plaintext(self, content: String) -> Message {
        Message {
            id: self.id,
            sender_id: self.sender_id,
            recipient_id: self.recipient_id,
            content,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Decrypted message, shown only to its participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Store-assigned identifier.
    pub id: MessageId,
    /// Author.
    pub sender_id: UserId,
    /// Addressee.
    pub recipient_id: UserId,
    /// Plaintext body.
    pub content: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last edit timestamp.
    pub updated_at: DateTime<Utc>,
}
