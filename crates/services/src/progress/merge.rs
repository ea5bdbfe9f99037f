use curriculum_core::model::{
    AnnotatedLesson, AnnotatedLevel, AnnotatedUnit, Curriculum, LessonContent, LevelContent,
    ProgressRecord, UnitContent,
};
use curriculum_core::settings::{EngineSettings, SurveyAnswer};
use tracing::warn;

use super::lock::{Entitlement, LockMode};
use super::stats::{level_stats, unit_stats};

/// How `merge` locks the tree it builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeOptions {
    /// Extra incomplete lessons to unlock after the sequential pass.
    pub unlock_budget: Option<u32>,
    /// Lock every incomplete lesson; wins over `unlock_budget`.
    pub lock_all_incomplete: bool,
}

impl MergeOptions {
    /// Options for a learner's entitlement, remaining free tries and survey answer.
    #[must_use]
    pub fn for_learner(
        entitlement: Entitlement,
        free_tries: u32,
        survey: Option<SurveyAnswer>,
        settings: &EngineSettings,
    ) -> Self {
        let budget = survey.map(|answer| settings.unlock_budget(answer));
        match LockMode::resolve(entitlement, free_tries, budget) {
            LockMode::Lockdown => Self {
                unlock_budget: None,
                lock_all_incomplete: true,
            },
            LockMode::Survey { budget } => Self {
                unlock_budget: Some(budget),
                lock_all_incomplete: false,
            },
            LockMode::Sequential => Self::default(),
        }
    }

    #[must_use]
    pub fn lock_mode(&self) -> LockMode {
        if self.lock_all_incomplete {
            return LockMode::Lockdown;
        }
        match self.unlock_budget {
            Some(budget) => LockMode::Survey { budget },
            None => LockMode::Sequential,
        }
    }
}

/// Annotate the whole curriculum with a learner's progress and apply locking.
///
/// The result is a fresh tree; neither input is modified.
#[must_use]
pub fn merge(
    curriculum: &Curriculum,
    record: &ProgressRecord,
    options: MergeOptions,
) -> Vec<AnnotatedLevel> {
    let mut levels: Vec<AnnotatedLevel> = curriculum
        .levels
        .iter()
        .map(|level| merge_level(level, record))
        .collect();
    options.lock_mode().apply(&mut levels);
    levels
}

/// Annotate one level without applying any lock policy.
///
/// Lessons start locked unless complete; containers start locked unless one
/// of their children is open. Null or malformed entries are dropped.
#[must_use]
pub fn merge_level(level: &LevelContent, record: &ProgressRecord) -> AnnotatedLevel {
    let mut units = Vec::with_capacity(level.units.len());
    for (index, unit) in level.units.iter().enumerate() {
        match unit {
            Some(unit) => units.push(merge_unit(level, unit, record)),
            None => warn!(level_id = %level.level_id, index, "skipping malformed unit"),
        }
    }

    let locked = units.iter().all(|u| u.locked);

    AnnotatedLevel {
        level_id: level.level_id,
        title: level.title.clone(),
        stats: level_stats(&units),
        units,
        locked,
    }
}

fn merge_unit(level: &LevelContent, unit: &UnitContent, record: &ProgressRecord) -> AnnotatedUnit {
    let mut lessons = Vec::with_capacity(unit.lessons.len());
    for (index, lesson) in unit.lessons.iter().enumerate() {
        match lesson {
            Some(lesson) => lessons.push(merge_lesson(level, unit, lesson, record)),
            None => warn!(
                level_id = %level.level_id,
                unit_id = %unit.unit_id,
                index,
                "skipping malformed lesson"
            ),
        }
    }

    AnnotatedUnit {
        unit_id: unit.unit_id,
        title: unit.title.clone(),
        stats: unit_stats(&lessons),
        locked: lessons.iter().all(|l| l.locked),
        lessons,
    }
}

fn merge_lesson(
    level: &LevelContent,
    unit: &UnitContent,
    lesson: &LessonContent,
    record: &ProgressRecord,
) -> AnnotatedLesson {
    let progress = record
        .lesson(level.level_id, unit.unit_id, &lesson.id.key())
        .cloned()
        .unwrap_or_default();

    AnnotatedLesson {
        id: lesson.id.clone(),
        title: lesson.title.clone(),
        icon: lesson.icon.clone(),
        complete: progress.complete,
        attempts: progress.attempts,
        time_spent: progress.time_spent,
        locked: !progress.complete,
        current: false,
        last_accessed: progress.last_accessed,
    }
}
