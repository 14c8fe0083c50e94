//! PostgreSQL-backed `MessagingRepository` implementation using Diesel ORM.
//!
//! Notifications and messages. Message bodies arrive already encrypted and
//! are stored as opaque `bytea`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;

use crate::domain::ports::{MessagingRepository, MessagingRepositoryError};
use crate::domain::{MessageId, Notification, NotificationId, StoredMessage, UserId};

use super::diesel_helpers::{DieselFailure, classify, map_basic_pool_error};
use super::models::{MessageRow, NewMessageRow, NewNotificationRow, NotificationRow};
use super::pool::{DbPool, PoolError};
use super::schema::{messages, notifications};

/// Diesel-backed implementation of the `MessagingRepository` port.
#[derive(Clone)]
pub struct DieselMessagingRepository {
    pool: DbPool,
}

impl DieselMessagingRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> MessagingRepositoryError {
    map_basic_pool_error(error, MessagingRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> MessagingRepositoryError {
    match classify(&error) {
        DieselFailure::ClosedConnection => {
            MessagingRepositoryError::connection("database connection error")
        }
        DieselFailure::NotFound => MessagingRepositoryError::query("record not found"),
        _ => MessagingRepositoryError::query("database error"),
    }
}

/// Map an insert whose only foreign key is the addressed user.
fn map_addressed_insert_error(
    error: diesel::result::Error,
    user_id: UserId,
) -> MessagingRepositoryError {
    match classify(&error) {
        DieselFailure::ForeignKeyViolation { .. } => MessagingRepositoryError::missing_user(user_id),
        _ => map_diesel_error(error),
    }
}

/// Map a message insert, attributing foreign key failures by constraint name.
fn map_message_insert_error(
    error: diesel::result::Error,
    sender_id: UserId,
    recipient_id: UserId,
) -> MessagingRepositoryError {
    match classify(&error) {
        DieselFailure::ForeignKeyViolation { constraint } => {
            let sender_missing = constraint
                .as_deref()
                .is_some_and(|name| name.contains("sender"));
            let user_id = if sender_missing {
                sender_id
            } else {
                recipient_id
            };
            MessagingRepositoryError::missing_user(user_id)
        }
        _ => map_diesel_error(error),
    }
}

#[async_trait]
impl MessagingRepository for DieselMessagingRepository {
    async fn insert_notification(
        &self,
        receiver_id: UserId,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Notification, MessagingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: NotificationRow = diesel::insert_into(notifications::table)
            .values(NewNotificationRow {
                receiver_id: receiver_id.get(),
                content,
                is_read: false,
                created_at: now,
            })
            .returning(NotificationRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(|err| map_addressed_insert_error(err, receiver_id))?;

        debug!(notification_id = row.id, receiver_id = %receiver_id, "inserted notification");
        Ok(Notification::from(row))
    }

    async fn find_notification(
        &self,
        notification_id: NotificationId,
    ) -> Result<Option<Notification>, MessagingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<NotificationRow> = notifications::table
            .find(notification_id.get())
            .select(NotificationRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        Ok(row.map(Notification::from))
    }

    async fn set_notification_read(
        &self,
        notification_id: NotificationId,
        read: bool,
    ) -> Result<Notification, MessagingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<NotificationRow> =
            diesel::update(notifications::table.find(notification_id.get()))
                .set(notifications::is_read.eq(read))
                .returning(NotificationRow::as_returning())
                .get_result(&mut conn)
                .await
                .optional()
                .map_err(map_diesel_error)?;

        row.map(Notification::from)
            .ok_or_else(|| MessagingRepositoryError::missing_notification(notification_id))
    }

    async fn delete_notification(
        &self,
        notification_id: NotificationId,
    ) -> Result<(), MessagingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let deleted = diesel::delete(notifications::table.find(notification_id.get()))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        if deleted == 0 {
            return Err(MessagingRepositoryError::missing_notification(
                notification_id,
            ));
        }
        Ok(())
    }

    async fn list_notifications(
        &self,
        receiver_id: UserId,
    ) -> Result<Vec<Notification>, MessagingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<NotificationRow> = notifications::table
            .filter(notifications::receiver_id.eq(receiver_id.get()))
            .select(NotificationRow::as_select())
            .order_by((notifications::created_at.desc(), notifications::id.desc()))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn insert_message(
        &self,
        sender_id: UserId,
        recipient_id: UserId,
        ciphertext: &[u8],
        now: DateTime<Utc>,
    ) -> Result<StoredMessage, MessagingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: MessageRow = diesel::insert_into(messages::table)
            .values(NewMessageRow {
                sender_id: sender_id.get(),
                recipient_id: recipient_id.get(),
                ciphertext,
                created_at: now,
                updated_at: now,
            })
            .returning(MessageRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(|err| map_message_insert_error(err, sender_id, recipient_id))?;

        debug!(message_id = row.id, sender_id = %sender_id, "inserted message");
        Ok(StoredMessage::from(row))
    }

    async fn find_message(
        &self,
        message_id: MessageId,
    ) -> Result<Option<StoredMessage>, MessagingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<MessageRow> = messages::table
            .find(message_id.get())
            .select(MessageRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        Ok(row.map(StoredMessage::from))
    }

    async fn update_message(
        &self,
        message_id: MessageId,
        ciphertext: &[u8],
        now: DateTime<Utc>,
    ) -> Result<StoredMessage, MessagingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<MessageRow> = diesel::update(messages::table.find(message_id.get()))
            .set((
                messages::ciphertext.eq(ciphertext),
                messages::updated_at.eq(now),
            ))
            .returning(MessageRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(StoredMessage::from)
            .ok_or_else(|| MessagingRepositoryError::missing_message(message_id))
    }

    async fn delete_message(&self, message_id: MessageId) -> Result<(), MessagingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let deleted = diesel::delete(messages::table.find(message_id.get()))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        if deleted == 0 {
            return Err(MessagingRepositoryError::missing_message(message_id));
        }
        Ok(())
    }

    async fn list_conversation(
        &self,
        user_a: UserId,
        user_b: UserId,
    ) -> Result<Vec<StoredMessage>, MessagingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let (a, b) = (user_a.get(), user_b.get());
        let rows: Vec<MessageRow> = messages::table
            .filter(
                messages::sender_id
                    .eq(a)
                    .and(messages::recipient_id.eq(b))
                    .or(messages::sender_id.eq(b).and(messages::recipient_id.eq(a))),
            )
            .select(MessageRow::as_select())
            .order_by((messages::created_at.asc(), messages::id.asc()))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(rows.into_iter().map(StoredMessage::from).collect())
    }
}
