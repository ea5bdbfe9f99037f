use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::curriculum::LessonIcon;
use crate::model::ids::{LessonId, LessonKey, LevelId, UnitId};

//
// ─── ANNOTATED TREE ────────────────────────────────────────────────────────────
//
// Derived, disposable view of the curriculum for one learner. Rebuilt from the
// curriculum and progress record on every read; never persisted.
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedLevel {
    pub level_id: LevelId,
    pub title: String,
    pub units: Vec<AnnotatedUnit>,
    pub locked: bool,
    pub stats: LevelStats,
}

impl AnnotatedLevel {
    /// Lessons of this level in canonical order.
    pub fn lessons(&self) -> impl Iterator<Item = &AnnotatedLesson> {
        self.units.iter().flat_map(|unit| unit.lessons.iter())
    }

    #[must_use]
    pub fn unit(&self, unit_id: UnitId) -> Option<&AnnotatedUnit> {
        self.units.iter().find(|unit| unit.unit_id == unit_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedUnit {
    pub unit_id: UnitId,
    pub title: String,
    pub lessons: Vec<AnnotatedLesson>,
    pub locked: bool,
    pub stats: UnitStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedLesson {
    pub id: LessonId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<LessonIcon>,
    pub complete: bool,
    pub attempts: u32,
    /// Seconds.
    pub time_spent: u64,
    pub locked: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub current: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<NaiveDate>,
}

impl AnnotatedLesson {
    #[must_use]
    pub fn key(&self) -> LessonKey {
        self.id.key()
    }

    /// Unlocked and not yet complete.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.locked && !self.complete
    }
}

//
// ─── STATS ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitStats {
    pub total_lessons: u32,
    pub completed_lessons: u32,
    pub completed_percentage: u32,
    pub accuracy: u32,
}

impl UnitStats {
    /// Every lesson complete, and there is at least one.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total_lessons > 0 && self.completed_lessons == self.total_lessons
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelStats {
    pub total_lessons: u32,
    pub completed_lessons: u32,
    pub completed_percentage: u32,
}

/// Whole-curriculum statistics for a learner's dashboard.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStats {
    pub total_lessons: u32,
    pub total_completed_lessons: u32,
    pub total_time_spent: u64,
    pub total_units: u32,
    pub completed_units: u32,
    pub completion_percentage: u32,
    pub accuracy: u32,
    pub average_attempts: f64,
    pub total_attempts: u64,
    pub top_attempts: Vec<AttemptEntry>,
}

/// A completed lesson together with the level and unit it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptEntry {
    pub level_id: LevelId,
    pub unit_id: UnitId,
    #[serde(flatten)]
    pub lesson: AnnotatedLesson,
}

/// Completion counts for one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnitProgressSummary {
    pub total: u32,
    pub completed: u32,
    pub percentage: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitAccuracy {
    pub accuracy: u32,
    pub completed_lessons: u32,
}

//
// ─── NAVIGATION TARGET ─────────────────────────────────────────────────────────
//

/// Position of a lesson in the tree, as used by routing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonCoordinates {
    pub level_id: LevelId,
    pub unit_id: UnitId,
    pub lesson_id: LessonId,
}

impl LessonCoordinates {
    #[must_use]
    pub fn new(level_id: LevelId, unit_id: UnitId, lesson_id: LessonId) -> Self {
        Self {
            level_id,
            unit_id,
            lesson_id,
        }
    }

    /// Parse coordinates from routing segments such as `"2"`, `"5"`, `"drop-event"`.
    ///
    /// # Errors
    ///
    /// Returns `Error::ParseId` if a segment is not a valid identifier.
    pub fn parse(level_id: &str, unit_id: &str, lesson_id: &str) -> Result<Self, Error> {
        Ok(Self::new(level_id.parse()?, unit_id.parse()?, lesson_id.parse()?))
    }
}
