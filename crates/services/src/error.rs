//! Shared error types for the services crate.

use thiserror::Error;

use curriculum_core::model::ValidationReport;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error("no curriculum published for learning type {0:?}")]
    CurriculumNotFound(String),
    #[error("progress record failed validation: {}", .0.errors.join("; "))]
    Invalid(ValidationReport),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
