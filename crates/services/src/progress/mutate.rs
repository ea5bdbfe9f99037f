use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use curriculum_core::model::{LessonCoordinates, LessonProgress, ProgressRecord};

pub use curriculum_core::model::{ValidationReport, validate_progress_data};

/// One lesson attempt reported by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonUpdate {
    pub complete: bool,
    /// Seconds spent in this attempt.
    #[serde(default)]
    pub time_spent: u64,
}

impl LessonUpdate {
    #[must_use]
    pub fn completed(time_spent: u64) -> Self {
        Self {
            complete: true,
            time_spent,
        }
    }

    #[must_use]
    pub fn attempted(time_spent: u64) -> Self {
        Self {
            complete: false,
            time_spent,
        }
    }
}

/// Apply one lesson event to a learner's record and return the new record.
///
/// Completion is sticky. Attempts only grow while the lesson is open and the
/// event is not itself a completion. A first completion spends one free try,
/// never going below zero. Record totals grow on every call.
#[must_use]
pub fn update_lesson_in_progress(
    mut record: ProgressRecord,
    at: &LessonCoordinates,
    update: LessonUpdate,
    today: NaiveDate,
) -> ProgressRecord {
    let key = at.lesson_id.key();
    let lessons = record.lessons_mut(at.level_id, at.unit_id);

    let was_complete = match lessons.get_mut(&key) {
        Some(lesson) => {
            let was_complete = lesson.complete;
            lesson.complete = was_complete || update.complete;
            if !update.complete && !lesson.complete {
                lesson.attempts = lesson.attempts.saturating_add(1);
            }
            lesson.time_spent = lesson.time_spent.saturating_add(update.time_spent);
            lesson.last_accessed = Some(today);
            was_complete
        }
        None => {
            lessons.insert(
                key.clone(),
                LessonProgress {
                    complete: update.complete,
                    attempts: 1,
                    time_spent: update.time_spent,
                    last_accessed: Some(today),
                },
            );
            false
        }
    };

    if !was_complete && update.complete {
        record.free_tries = record.free_tries.saturating_sub(1);
        debug!(lesson = %key, free_tries = record.free_tries, "lesson completed");
    }

    record.total_attempts = record.total_attempts.saturating_add(1);
    record.total_time_spent = record.total_time_spent.saturating_add(update.time_spent);
    record.mark_active(today);

    let report = record.validate();
    if !report.is_valid {
        warn!(errors = ?report.errors, "progress record failed validation after update");
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use curriculum_core::model::{LessonId, LessonKey, LevelId, UnitId};
    use curriculum_core::time::fixed_now;

    fn today() -> NaiveDate {
        fixed_now().date_naive()
    }

    fn coords(id: &str) -> LessonCoordinates {
        LessonCoordinates::new(LevelId::new(1), UnitId::new(2), LessonId::new(id))
    }

    fn stored<'a>(record: &'a ProgressRecord, id: &str) -> &'a LessonProgress {
        record
            .lesson(LevelId::new(1), UnitId::new(2), &LessonKey::normalize(id))
            .unwrap()
    }

    #[test]
    fn first_event_creates_entry_and_intermediate_maps() {
        let record = update_lesson_in_progress(
            ProgressRecord::new_learner(3),
            &coords("drop-event"),
            LessonUpdate::attempted(40),
            today(),
        );

        let lesson = stored(&record, "dropevent");
        assert!(!lesson.complete);
        assert_eq!(lesson.attempts, 1);
        assert_eq!(lesson.time_spent, 40);
        assert_eq!(lesson.last_accessed, Some(today()));
        assert_eq!(record.free_tries, 3);
        assert_eq!(record.total_attempts, 1);
        assert_eq!(record.total_time_spent, 40);
        assert!(record.active_days.contains("2023-11-14"));
    }

    #[test]
    fn completion_is_sticky() {
        let at = coords("hello");
        let record = update_lesson_in_progress(
            ProgressRecord::new_learner(3),
            &at,
            LessonUpdate::completed(10),
            today(),
        );
        let record = update_lesson_in_progress(record, &at, LessonUpdate::attempted(5), today());

        let lesson = stored(&record, "hello");
        assert!(lesson.complete);
        assert_eq!(lesson.attempts, 1);
        assert_eq!(lesson.time_spent, 15);
        assert_eq!(record.total_attempts, 2);
        assert_eq!(record.total_time_spent, 15);
    }

    #[test]
    fn attempts_grow_only_on_failed_tries_of_open_lessons() {
        let at = coords("hello");
        let mut record = ProgressRecord::new_learner(3);
        for _ in 0..3 {
            record = update_lesson_in_progress(record, &at, LessonUpdate::attempted(1), today());
        }
        assert_eq!(stored(&record, "hello").attempts, 3);

        record = update_lesson_in_progress(record, &at, LessonUpdate::completed(1), today());
        assert_eq!(stored(&record, "hello").attempts, 3);
        assert!(stored(&record, "hello").complete);
    }

    #[test]
    fn free_tries_drop_once_per_first_completion_and_floor_at_zero() {
        let mut record = ProgressRecord::new_learner(1);
        record =
            update_lesson_in_progress(record, &coords("a"), LessonUpdate::completed(0), today());
        assert_eq!(record.free_tries, 0);

        record =
            update_lesson_in_progress(record, &coords("a"), LessonUpdate::completed(0), today());
        assert_eq!(record.free_tries, 0);

        record =
            update_lesson_in_progress(record, &coords("b"), LessonUpdate::completed(0), today());
        assert_eq!(record.free_tries, 0);
        assert_eq!(record.total_attempts, 3);
    }

    #[test]
    fn repeat_completion_keeps_free_tries() {
        let mut record = ProgressRecord::new_learner(5);
        record =
            update_lesson_in_progress(record, &coords("a"), LessonUpdate::completed(0), today());
        record =
            update_lesson_in_progress(record, &coords("a"), LessonUpdate::completed(0), today());
        record =
            update_lesson_in_progress(record, &coords("b"), LessonUpdate::attempted(0), today());
        assert_eq!(record.free_tries, 4);
    }

    #[test]
    fn existing_active_day_is_not_duplicated() {
        let mut record = ProgressRecord::new_learner(3);
        record.active_days.insert("2023-11-14T08:00:00Z".to_string());
        let record =
            update_lesson_in_progress(record, &coords("a"), LessonUpdate::attempted(0), today());
        assert_eq!(record.active_days.len(), 1);
    }

    #[test]
    fn input_record_is_untouched_when_cloned_in() {
        let original = ProgressRecord::new_learner(3);
        let updated = update_lesson_in_progress(
            original.clone(),
            &coords("a"),
            LessonUpdate::completed(30),
            today(),
        );
        assert_ne!(original, updated);
        assert!(original.levels.is_empty());
        assert!(updated.validate().is_valid);
    }
}
