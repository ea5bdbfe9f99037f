//! Completion, accuracy, attempt and time statistics over an annotated tree.
//!
//! Accuracy of a completed lesson is `100 / attempts`: one attempt scores
//! 100, two score 50, and so on. Lessons with zero attempts score 0.

use curriculum_core::model::{
    AnnotatedLesson, AnnotatedLevel, AnnotatedUnit, AttemptEntry, LevelStats, OverallStats,
    UnitAccuracy, UnitId, UnitProgressSummary, UnitStats,
};
use curriculum_core::settings::{AverageAttempts, EngineSettings};
use tracing::warn;

/// `round(100 * completed / total)`, or `0` when `total` is zero.
#[must_use]
pub fn completed_percentage(completed: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    round_to_u32(100.0 * f64::from(completed) / f64::from(total))
}

/// Accuracy score of a single lesson.
#[must_use]
pub fn lesson_accuracy(lesson: &AnnotatedLesson) -> f64 {
    if lesson.attempts > 0 {
        100.0 / f64::from(lesson.attempts)
    } else {
        0.0
    }
}

#[must_use]
pub fn unit_stats(lessons: &[AnnotatedLesson]) -> UnitStats {
    let total_lessons = count_u32(lessons.len());
    let completed_lessons = count_u32(lessons.iter().filter(|l| l.complete).count());

    UnitStats {
        total_lessons,
        completed_lessons,
        completed_percentage: completed_percentage(completed_lessons, total_lessons),
        accuracy: completed_accuracy(lessons).accuracy,
    }
}

#[must_use]
pub fn level_stats(units: &[AnnotatedUnit]) -> LevelStats {
    let total_lessons = units.iter().map(|u| u.stats.total_lessons).sum();
    let completed_lessons = units.iter().map(|u| u.stats.completed_lessons).sum();

    LevelStats {
        total_lessons,
        completed_lessons,
        completed_percentage: completed_percentage(completed_lessons, total_lessons),
    }
}

/// Mean accuracy over the completed lessons of a unit.
fn completed_accuracy(lessons: &[AnnotatedLesson]) -> UnitAccuracy {
    let (sum, count) = lessons
        .iter()
        .filter(|l| l.complete)
        .fold((0.0, 0_u32), |(sum, count), lesson| {
            (sum + lesson_accuracy(lesson), count + 1)
        });

    if count == 0 {
        return UnitAccuracy::default();
    }

    UnitAccuracy {
        accuracy: round_to_u32(sum / f64::from(count)),
        completed_lessons: count,
    }
}

//
// ─── UNIT LOOKUPS ──────────────────────────────────────────────────────────────
//

/// Completion counts for a unit of `level`; zeroed when the unit is unknown.
#[must_use]
pub fn unit_progress(level: &AnnotatedLevel, unit_id: UnitId) -> UnitProgressSummary {
    match level.unit(unit_id) {
        Some(unit) => summarize(unit),
        None => {
            warn!(level_id = %level.level_id, unit_id = %unit_id, "unit not found");
            UnitProgressSummary::default()
        }
    }
}

/// Like [`unit_progress`], addressing the unit by its position in the level.
#[must_use]
pub fn unit_progress_at(level: &AnnotatedLevel, index: usize) -> UnitProgressSummary {
    level
        .units
        .get(index)
        .map(summarize)
        .unwrap_or_default()
}

/// Accuracy over the completed lessons of a unit; zeroed when the unit is unknown.
#[must_use]
pub fn unit_accuracy(level: &AnnotatedLevel, unit_id: UnitId) -> UnitAccuracy {
    level
        .unit(unit_id)
        .map(|unit| completed_accuracy(&unit.lessons))
        .unwrap_or_default()
}

#[must_use]
pub fn unit_accuracy_at(level: &AnnotatedLevel, index: usize) -> UnitAccuracy {
    level
        .units
        .get(index)
        .map(|unit| completed_accuracy(&unit.lessons))
        .unwrap_or_default()
}

fn summarize(unit: &AnnotatedUnit) -> UnitProgressSummary {
    let total = count_u32(unit.lessons.len());
    let completed = count_u32(unit.lessons.iter().filter(|l| l.complete).count());
    UnitProgressSummary {
        total,
        completed,
        percentage: completed_percentage(completed, total),
    }
}

//
// ─── OVERALL ───────────────────────────────────────────────────────────────────
//

/// Whole-curriculum statistics for the dashboard.
///
/// Expects level and unit `stats` to be populated, as `merge` leaves them.
#[must_use]
pub fn overall_stats(levels: &[AnnotatedLevel], settings: &EngineSettings) -> OverallStats {
    let mut stats = OverallStats::default();
    let mut accuracy_sum = 0.0;
    let mut scored_lessons = 0_u32;
    let mut completed_so_far = 0_u32;
    let mut running_average = 0.0;
    let mut attempted = Vec::new();

    for level in levels {
        stats.total_lessons += level.stats.total_lessons;
        stats.total_completed_lessons += level.stats.completed_lessons;
        completed_so_far += level.stats.completed_lessons;

        for unit in &level.units {
            stats.total_units += 1;
            if unit.stats.is_complete() {
                stats.completed_units += 1;
            }

            for lesson in &unit.lessons {
                stats.total_time_spent += lesson.time_spent;

                if !lesson.complete || lesson.attempts == 0 {
                    continue;
                }

                stats.total_attempts += u64::from(lesson.attempts);
                if completed_so_far > 0 {
                    running_average = as_f64(stats.total_attempts) / f64::from(completed_so_far);
                }
                accuracy_sum += lesson_accuracy(lesson);
                scored_lessons += 1;
                attempted.push(AttemptEntry {
                    level_id: level.level_id,
                    unit_id: unit.unit_id,
                    lesson: lesson.clone(),
                });
            }
        }
    }

    stats.completion_percentage =
        completed_percentage(stats.total_completed_lessons, stats.total_lessons);
    stats.accuracy = if scored_lessons > 0 {
        round_to_u32(accuracy_sum / f64::from(scored_lessons))
    } else {
        0
    };
    stats.average_attempts = match settings.average_attempts() {
        AverageAttempts::Running => running_average,
        AverageAttempts::Final if stats.total_completed_lessons > 0 => {
            as_f64(stats.total_attempts) / f64::from(stats.total_completed_lessons)
        }
        AverageAttempts::Final => 0.0,
    };

    // Stable sort keeps encounter order among equal attempt counts.
    attempted.sort_by(|a, b| b.lesson.attempts.cmp(&a.lesson.attempts));
    attempted.truncate(settings.top_attempts_limit());
    stats.top_attempts = attempted;

    stats
}

fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(n: u64) -> f64 {
    n as f64
}

// Inputs are percentages in [0, 100].
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_to_u32(value: f64) -> u32 {
    value.round() as u32
}
