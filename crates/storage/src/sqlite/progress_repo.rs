use chrono::Utc;
use curriculum_core::model::{ProgressRecord, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{from_document, to_document, user_id_to_i64};
use crate::repository::{ProgressStore, StorageError};

#[async_trait::async_trait]
impl ProgressStore for SqliteRepository {
    async fn get_progress(&self, user: UserId) -> Result<Option<ProgressRecord>, StorageError> {
        let row = sqlx::query("SELECT document FROM progress_records WHERE user_id = ?1")
            .bind(user_id_to_i64(user)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let document: String = row
            .try_get("document")
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        from_document(&document).map(Some)
    }

    async fn save_progress(
        &self,
        user: UserId,
        record: &ProgressRecord,
    ) -> Result<(), StorageError> {
        let document = to_document(record)?;

        sqlx::query(
            r"
            INSERT INTO progress_records (user_id, document, free_tries, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id) DO UPDATE SET
                document = excluded.document,
                free_tries = excluded.free_tries,
                updated_at = excluded.updated_at
            ",
        )
        .bind(user_id_to_i64(user)?)
        .bind(document)
        .bind(i64::from(record.free_tries))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        tracing::debug!(user = %user, free_tries = record.free_tries, "progress stored");
        Ok(())
    }
}
