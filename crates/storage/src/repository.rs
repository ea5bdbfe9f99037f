use async_trait::async_trait;
use curriculum_core::model::{Curriculum, ProgressRecord, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Source of authored curricula, keyed by learning type (e.g. `student`).
#[async_trait]
pub trait CurriculumSource: Send + Sync {
    /// Fetch the curriculum for a learning type.
    ///
    /// Returns `Ok(None)` when nothing is published for that learning type.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn curriculum(&self, learning_type: &str) -> Result<Option<Curriculum>, StorageError>;

    /// Publish or replace the curriculum for a learning type.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the curriculum cannot be stored.
    async fn upsert_curriculum(
        &self,
        learning_type: &str,
        curriculum: &Curriculum,
    ) -> Result<(), StorageError>;
}

/// Per-user progress persistence.
///
/// Writes replace the whole record; callers serialize read-modify-write
/// cycles per user.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Fetch a learner's progress record.
    ///
    /// Returns `Ok(None)` for a learner without a stored record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read or the stored
    /// document does not deserialize.
    async fn get_progress(&self, user: UserId) -> Result<Option<ProgressRecord>, StorageError>;

    /// Persist a learner's progress record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn save_progress(&self, user: UserId, record: &ProgressRecord)
    -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    curricula: Arc<Mutex<HashMap<String, Curriculum>>>,
    progress: Arc<Mutex<HashMap<UserId, ProgressRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            curricula: Arc::new(Mutex::new(HashMap::new())),
            progress: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl CurriculumSource for InMemoryRepository {
    async fn curriculum(&self, learning_type: &str) -> Result<Option<Curriculum>, StorageError> {
        let guard = self
            .curricula
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(learning_type).cloned())
    }

    async fn upsert_curriculum(
        &self,
        learning_type: &str,
        curriculum: &Curriculum,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .curricula
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(learning_type.to_owned(), curriculum.clone());
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for InMemoryRepository {
    async fn get_progress(&self, user: UserId) -> Result<Option<ProgressRecord>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&user).cloned())
    }

    async fn save_progress(
        &self,
        user: UserId,
        record: &ProgressRecord,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(user, record.clone());
        Ok(())
    }
}

/// Aggregates the collaborators behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub curricula: Arc<dyn CurriculumSource>,
    pub progress: Arc<dyn ProgressStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let curricula: Arc<dyn CurriculumSource> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressStore> = Arc::new(repo);
        Self {
            curricula,
            progress,
        }
    }
}
