use chrono::Utc;
use curriculum_core::model::Curriculum;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{from_document, to_document};
use crate::repository::{CurriculumSource, StorageError};

#[async_trait::async_trait]
impl CurriculumSource for SqliteRepository {
    async fn curriculum(&self, learning_type: &str) -> Result<Option<Curriculum>, StorageError> {
        let row = sqlx::query("SELECT document FROM curricula WHERE learning_type = ?1")
            .bind(learning_type)
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

    async fn upsert_curriculum(
        &self,
        learning_type: &str,
        curriculum: &Curriculum,
    ) -> Result<(), StorageError> {
        let document = to_document(curriculum)?;

        sqlx::query(
            r"
            INSERT INTO curricula (learning_type, document, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(learning_type) DO UPDATE SET
                document = excluded.document,
                updated_at = excluded.updated_at
            ",
        )
        .bind(learning_type)
        .bind(document)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        tracing::debug!(learning_type, "curriculum stored");
        Ok(())
    }
}
