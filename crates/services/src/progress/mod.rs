//! Progress engine: merge, locking, statistics, navigation and mutation over
//! a curriculum and one learner's progress record.

pub mod lock;
pub mod merge;
pub mod mutate;
pub mod navigation;
pub mod service;
pub mod stats;

pub use lock::{Entitlement, LockMode};
pub use merge::{MergeOptions, merge, merge_level};
pub use mutate::{LessonUpdate, update_lesson_in_progress, validate_progress_data};
pub use navigation::{
    CurrentLesson, NextItems, find_current_lesson, first_uncompleted_level,
    first_uncompleted_unit, last_unlocked_level, next_items,
};
pub use service::{DEFAULT_FREE_TRIES, LearnerContext, ProgressService, ProgressView};
pub use stats::{
    completed_percentage, lesson_accuracy, level_stats, overall_stats, unit_accuracy,
    unit_accuracy_at, unit_progress, unit_progress_at, unit_stats,
};
