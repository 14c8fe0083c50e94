//! PostgreSQL-backed `AttachmentRepository` implementation using Diesel ORM.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use tracing::debug;

use crate::domain::ports::{AttachmentRepository, AttachmentRepositoryError};
use crate::domain::{Attachment, AttachmentId, AttachmentTarget, CommentId, NewAttachment, PostId};

use super::diesel_helpers::{
    DieselFailure, TxError, classify, map_basic_pool_error, size_for_db,
};
use super::models::{AttachmentRow, NewAttachmentRow};
use super::pool::{DbPool, PoolError};
use super::schema::{attachments, comments, posts};

/// Diesel-backed implementation of the `AttachmentRepository` port.
#[derive(Clone)]
pub struct DieselAttachmentRepository {
    pool: DbPool,
}

impl DieselAttachmentRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

type AttachmentTx = TxError<AttachmentRepositoryError>;

fn map_pool_error(error: PoolError) -> AttachmentRepositoryError {
    map_basic_pool_error(error, AttachmentRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> AttachmentRepositoryError {
    match classify(&error) {
        DieselFailure::ClosedConnection => {
            AttachmentRepositoryError::connection("database connection error")
        }
        DieselFailure::NotFound => AttachmentRepositoryError::query("record not found"),
        _ => AttachmentRepositoryError::query("database error"),
    }
}

/// Verify every referenced target exists, post first.
async fn verify_targets(
    conn: &mut AsyncPgConnection,
    target: AttachmentTarget,
) -> Result<(), AttachmentTx> {
    if let Some(post_id) = target.post_id() {
        let exists: bool = diesel::select(diesel::dsl::exists(posts::table.find(post_id.get())))
            .get_result(conn)
            .await?;
        if !exists {
            return Err(TxError::Domain(AttachmentRepositoryError::missing_post(
                post_id,
            )));
        }
    }
    if let Some(comment_id) = target.comment_id() {
        let exists: bool =
            diesel::select(diesel::dsl::exists(comments::table.find(comment_id.get())))
                .get_result(conn)
                .await?;
        if !exists {
            return Err(TxError::Domain(AttachmentRepositoryError::missing_comment(
                comment_id,
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl AttachmentRepository for DieselAttachmentRepository {
    async fn check_targets(
        &self,
        target: &AttachmentTarget,
    ) -> Result<(), AttachmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        verify_targets(&mut conn, *target)
            .await
            .map_err(|err| err.resolve(map_diesel_error))
    }

    async fn insert(
        &self,
        attachment: &NewAttachment,
    ) -> Result<Attachment, AttachmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let attachment = attachment.clone();

        let stored = conn
            .build_transaction()
            .serializable()
            .run(|conn| {
                async move {
                    verify_targets(conn, attachment.target).await?;
                    let row: AttachmentRow = diesel::insert_into(attachments::table)
                        .values(NewAttachmentRow {
                            user_id: attachment.user_id.get(),
                            post_id: attachment.target.post_id().map(PostId::get),
                            comment_id: attachment.target.comment_id().map(CommentId::get),
                            file_name: &attachment.file_name,
                            content_type: &attachment.content_type,
                            size_bytes: size_for_db(attachment.size_bytes),
                            blob_ref: attachment.blob_ref.as_str(),
                            created_at: attachment.created_at,
                        })
                        .returning(AttachmentRow::as_returning())
                        .get_result(conn)
                        .await?;
                    Ok(Attachment::from(row))
                }
                .scope_boxed()
            })
            .await
            .map_err(|err: AttachmentTx| err.resolve(map_diesel_error))?;

        debug!(attachment_id = %stored.id, blob_ref = %stored.blob_ref, "inserted attachment");
        Ok(stored)
    }

    async fn find(
        &self,
        attachment_id: AttachmentId,
    ) -> Result<Option<Attachment>, AttachmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<AttachmentRow> = attachments::table
            .find(attachment_id.get())
            .select(AttachmentRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        Ok(row.map(Attachment::from))
    }

    async fn delete(&self, attachment_id: AttachmentId) -> Result<(), AttachmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let deleted = diesel::delete(attachments::table.find(attachment_id.get()))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        if deleted == 0 {
            return Err(AttachmentRepositoryError::missing_attachment(attachment_id));
        }
        Ok(())
    }

    async fn list_for_post(
        &self,
        post_id: PostId,
    ) -> Result<Vec<Attachment>, AttachmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<AttachmentRow> = attachments::table
            .filter(attachments::post_id.eq(post_id.get()))
            .select(AttachmentRow::as_select())
            .order_by(attachments::id.asc())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(rows.into_iter().map(Attachment::from).collect())
    }

    async fn list_for_comment(
        &self,
        comment_id: CommentId,
    ) -> Result<Vec<Attachment>, AttachmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<AttachmentRow> = attachments::table
            .filter(attachments::comment_id.eq(comment_id.get()))
            .select(AttachmentRow::as_select())
            .order_by(attachments::id.asc())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(rows.into_iter().map(Attachment::from).collect())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn pool_error_maps_to_connection_error() {
        let err = map_pool_error(PoolError::build("invalid URL"));
        assert!(matches!(err, AttachmentRepositoryError::Connection { .. }));
        assert!(err.to_string().contains("invalid URL"));
    }

    #[rstest]
    fn missing_rows_map_to_query_errors() {
        let err = map_diesel_error(diesel::result::Error::NotFound);
        assert_eq!(err, AttachmentRepositoryError::query("record not found"));
    }
}
