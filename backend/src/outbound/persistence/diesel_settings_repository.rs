//! PostgreSQL-backed `SettingsRepository` implementation using Diesel ORM.
//!
//! Settings are stored as one JSONB document per user. Merges read, overlay
//! and write the document inside one serializable transaction.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use tracing::debug;

use crate::domain::ports::{SettingsRepository, SettingsRepositoryError};
use crate::domain::{Settings, UserId};

use super::diesel_helpers::{
    DieselFailure, TxError, classify, map_basic_diesel_error, map_basic_pool_error,
};
use super::models::SettingsRow;
use super::pool::{DbPool, PoolError};
use super::schema::user_settings;

/// Diesel-backed implementation of the `SettingsRepository` port.
#[derive(Clone)]
pub struct DieselSettingsRepository {
    pool: DbPool,
}

impl DieselSettingsRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> SettingsRepositoryError {
    map_basic_pool_error(error, SettingsRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> SettingsRepositoryError {
    map_basic_diesel_error(
        error,
        SettingsRepositoryError::query,
        SettingsRepositoryError::connection,
        SettingsRepositoryError::stale_state,
    )
}

fn decode(row: &SettingsRow) -> Result<Settings, SettingsRepositoryError> {
    Settings::from_json(&row.settings).map_err(|err| {
        SettingsRepositoryError::query(format!(
            "stored settings for user {} are invalid: {err}",
            row.user_id
        ))
    })
}

#[async_trait]
impl SettingsRepository for DieselSettingsRepository {
    async fn find(&self, user_id: UserId) -> Result<Option<Settings>, SettingsRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<SettingsRow> = user_settings::table
            .find(user_id.get())
            .select(SettingsRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.as_ref().map(decode).transpose()
    }

    async fn merge(
        &self,
        user_id: UserId,
        update: &Settings,
    ) -> Result<Settings, SettingsRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let update = update.clone();

        let merged = conn
            .build_transaction()
            .serializable()
            .run(|conn| {
                async move {
                    let current: Option<SettingsRow> = user_settings::table
                        .find(user_id.get())
                        .select(SettingsRow::as_select())
                        .first(conn)
                        .await
                        .optional()?;

                    let mut merged = match current.as_ref() {
                        Some(row) => decode(row).map_err(TxError::Domain)?,
                        None => Settings::default(),
                    };
                    merged.merge(update);

                    let row = SettingsRow {
                        user_id: user_id.get(),
                        settings: merged.to_json(),
                    };
                    let written = diesel::insert_into(user_settings::table)
                        .values(&row)
                        .on_conflict(user_settings::user_id)
                        .do_update()
                        .set(user_settings::settings.eq(excluded(user_settings::settings)))
                        .execute(conn)
                        .await;

                    match written {
                        Ok(_) => Ok(merged),
                        Err(err) => match classify(&err) {
                            DieselFailure::ForeignKeyViolation { .. } => Err(TxError::Domain(
                                SettingsRepositoryError::missing_user(user_id),
                            )),
                            _ => Err(TxError::Diesel(err)),
                        },
                    }
                }
                .scope_boxed()
            })
            .await
            .map_err(|err: TxError<SettingsRepositoryError>| err.resolve(map_diesel_error))?;

        debug!(user_id = %user_id, keys = merged.len(), "merged settings");
        Ok(merged)
    }

    async fn delete(&self, user_id: UserId) -> Result<bool, SettingsRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let deleted = diesel::delete(user_settings::table.find(user_id.get()))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn stored_documents_decode_into_settings() {
        let row = SettingsRow {
            user_id: 3,
            settings: json!({"notifyLikes": true}),
        };

        let settings = decode(&row).expect("valid document");
        assert_eq!(settings.len(), 1);
    }

    #[rstest]
    fn corrupt_documents_surface_as_query_errors() {
        let row = SettingsRow {
            user_id: 3,
            settings: json!({"volume": 11}),
        };

        let err = decode(&row).expect_err("unknown key");
        assert!(matches!(err, SettingsRepositoryError::Query { .. }));
        assert!(err.to_string().contains("user 3"));
    }
}
