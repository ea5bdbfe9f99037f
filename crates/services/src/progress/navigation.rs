use curriculum_core::model::{
    AnnotatedLesson, AnnotatedLevel, AnnotatedUnit, LessonCoordinates, LessonKey,
};
use curriculum_core::settings::EngineSettings;

//
// ─── CURRENT LESSON ────────────────────────────────────────────────────────────
//

/// Where a learner should resume inside one level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentLesson<'a> {
    pub lesson: &'a AnnotatedLesson,
    /// Index of the containing unit within the level.
    pub unit_index: usize,
}

/// Resume point of a level: the lesson flagged current, else the first open
/// lesson, else the very first lesson. `None` for a level without lessons.
#[must_use]
pub fn find_current_lesson(level: &AnnotatedLevel) -> Option<CurrentLesson<'_>> {
    let with_index = || {
        level
            .units
            .iter()
            .enumerate()
            .flat_map(|(unit_index, unit)| unit.lessons.iter().map(move |l| (unit_index, l)))
    };

    with_index()
        .find(|(_, l)| l.current)
        .or_else(|| with_index().find(|(_, l)| l.is_open()))
        .or_else(|| with_index().next())
        .map(|(unit_index, lesson)| CurrentLesson { lesson, unit_index })
}

//
// ─── NEXT ITEMS ────────────────────────────────────────────────────────────────
//

/// What to present after acting on a lesson.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NextItems<'a> {
    pub lesson: &'a AnnotatedLesson,
    pub unit: &'a AnnotatedUnit,
    pub level: &'a AnnotatedLevel,
}

impl NextItems<'_> {
    /// Routing target for the next lesson.
    #[must_use]
    pub fn target(&self) -> LessonCoordinates {
        LessonCoordinates::new(self.level.level_id, self.unit.unit_id, self.lesson.id.clone())
    }
}

/// Resolve the lesson to present after the one at `from`.
///
/// In order: an earlier open lesson of the same unit, the next lesson of the
/// unit, the first lesson of a later unit in the level, then the first lesson
/// of the next level while within `max_levels`. `None` when `from` is unknown
/// or nothing follows.
#[must_use]
pub fn next_items<'a>(
    levels: &'a [AnnotatedLevel],
    from: &LessonCoordinates,
    settings: &EngineSettings,
) -> Option<NextItems<'a>> {
    let level_index = levels.iter().position(|l| l.level_id == from.level_id)?;
    let level = &levels[level_index];
    let unit_index = level.units.iter().position(|u| u.unit_id == from.unit_id)?;
    let unit = &level.units[unit_index];
    let key = LessonKey::from(&from.lesson_id);
    let lesson_index = unit.lessons.iter().position(|l| l.key() == key)?;

    let within_unit = unit.lessons[..lesson_index]
        .iter()
        .find(|l| l.is_open())
        .or_else(|| unit.lessons.get(lesson_index + 1));
    if let Some(lesson) = within_unit {
        return Some(NextItems {
            lesson,
            unit,
            level,
        });
    }

    if let Some((unit, lesson)) = level.units[unit_index + 1..]
        .iter()
        .find_map(|u| u.lessons.first().map(|l| (u, l)))
    {
        return Some(NextItems {
            lesson,
            unit,
            level,
        });
    }

    let next_index = level_index + 1;
    if next_index >= settings.max_levels() {
        return None;
    }
    let level = levels.get(next_index)?;
    let unit = level.units.first()?;
    let lesson = unit.lessons.first()?;
    Some(NextItems {
        lesson,
        unit,
        level,
    })
}

//
// ─── DASHBOARD HELPERS ─────────────────────────────────────────────────────────
//

/// The last level that is not locked.
#[must_use]
pub fn last_unlocked_level(levels: &[AnnotatedLevel]) -> Option<&AnnotatedLevel> {
    levels.iter().rev().find(|l| !l.locked)
}

/// The first unlocked level with lessons left to complete.
#[must_use]
pub fn first_uncompleted_level(levels: &[AnnotatedLevel]) -> Option<&AnnotatedLevel> {
    levels
        .iter()
        .find(|l| !l.locked && l.stats.completed_lessons < l.stats.total_lessons)
}

/// The first unlocked unit of `level` with lessons left to complete.
#[must_use]
pub fn first_uncompleted_unit(level: &AnnotatedLevel) -> Option<&AnnotatedUnit> {
    level
        .units
        .iter()
        .find(|u| !u.locked && u.stats.completed_lessons < u.stats.total_lessons)
}
