pub mod curriculum;
mod ids;
mod progress;
pub mod validation;
mod view;

pub use curriculum::{Curriculum, LessonContent, LessonIcon, LevelContent, UnitContent};
pub use ids::{LESSON_ID_SEPARATOR, LessonId, LessonKey, LevelId, ParseIdError, UnitId, UserId};
pub use progress::{LessonProgress, LevelProgress, ProgressRecord, UnitProgress};
pub use validation::{ValidationReport, validate_progress_data};
pub use view::{
    AnnotatedLesson, AnnotatedLevel, AnnotatedUnit, AttemptEntry, LessonCoordinates, LevelStats,
    OverallStats, UnitAccuracy, UnitProgressSummary, UnitStats,
};
