#![forbid(unsafe_code)]

pub mod error;
pub mod progress;

pub use curriculum_core::Clock;

pub use error::{AppServicesError, ProgressServiceError};
pub use progress::{
    Entitlement, LearnerContext, LessonUpdate, LockMode, MergeOptions, ProgressService,
    ProgressView,
};
