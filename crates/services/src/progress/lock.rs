//! Locking policy over a merged tree.
//!
//! Every rule walks lessons in canonical order: levels, then units, then
//! lessons, in the order the curriculum lists them. Completed lessons are
//! unlocked in every mode.

use curriculum_core::model::{AnnotatedLesson, AnnotatedLevel};
use tracing::debug;

/// Facts about the learner's subscription, decided elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Entitlement {
    pub has_active_plan: bool,
}

impl Entitlement {
    #[must_use]
    pub fn active_plan() -> Self {
        Self {
            has_active_plan: true,
        }
    }

    #[must_use]
    pub fn trial() -> Self {
        Self {
            has_active_plan: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Unlock everything up to the lesson after the last completed one.
    Sequential,
    /// Trial exhausted: only completed lessons stay reachable.
    Lockdown,
    /// Sequential, then unlock up to `budget` further incomplete lessons.
    Survey { budget: u32 },
}

impl LockMode {
    /// Pick the mode for a learner.
    ///
    /// The survey budget only applies to learners with an active plan.
    #[must_use]
    pub fn resolve(entitlement: Entitlement, free_tries: u32, unlock_budget: Option<u32>) -> Self {
        if !entitlement.has_active_plan && free_tries == 0 {
            return LockMode::Lockdown;
        }
        match unlock_budget {
            Some(budget) if entitlement.has_active_plan => LockMode::Survey { budget },
            _ => LockMode::Sequential,
        }
    }

    /// Set `locked`/`current` flags across the whole tree.
    pub fn apply(self, levels: &mut [AnnotatedLevel]) {
        debug!(mode = ?self, "applying lock policy");
        match self {
            LockMode::Sequential => {
                apply_sequential(levels);
                leak_up(levels);
            }
            LockMode::Lockdown => apply_lockdown(levels),
            LockMode::Survey { budget } => {
                apply_sequential(levels);
                apply_survey(levels, budget);
                leak_up(levels);
            }
        }
    }
}

/// Lesson position in canonical order; derives lexicographic ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Position {
    level: usize,
    unit: usize,
    lesson: usize,
}

fn positions(levels: &[AnnotatedLevel]) -> Vec<Position> {
    let mut out = Vec::new();
    for (level, lvl) in levels.iter().enumerate() {
        for (unit, u) in lvl.units.iter().enumerate() {
            for lesson in 0..u.lessons.len() {
                out.push(Position {
                    level,
                    unit,
                    lesson,
                });
            }
        }
    }
    out
}

fn lesson_at(levels: &[AnnotatedLevel], at: Position) -> Option<&AnnotatedLesson> {
    levels
        .get(at.level)?
        .units
        .get(at.unit)?
        .lessons
        .get(at.lesson)
}

fn lesson_at_mut(levels: &mut [AnnotatedLevel], at: Position) -> Option<&mut AnnotatedLesson> {
    levels
        .get_mut(at.level)?
        .units
        .get_mut(at.unit)?
        .lessons
        .get_mut(at.lesson)
}

fn lessons_mut(levels: &mut [AnnotatedLevel]) -> impl Iterator<Item = &mut AnnotatedLesson> {
    levels
        .iter_mut()
        .flat_map(|level| level.units.iter_mut())
        .flat_map(|unit| unit.lessons.iter_mut())
}

fn apply_sequential(levels: &mut [AnnotatedLevel]) {
    for lesson in lessons_mut(levels) {
        lesson.current = false;
    }

    let order = positions(levels);
    let Some(&first) = order.first() else {
        lock_everything(levels);
        return;
    };

    let last_complete = order
        .iter()
        .rposition(|p| lesson_at(levels, *p).is_some_and(|l| l.complete));
    // Nothing complete, or nothing after the last completion: resume at the start.
    let boundary = last_complete
        .and_then(|index| order.get(index + 1).copied())
        .unwrap_or(first);
    if let Some(lesson) = lesson_at_mut(levels, boundary) {
        lesson.current = true;
    }

    for (li, level) in levels.iter_mut().enumerate() {
        level.locked = li > boundary.level;
        for (ui, unit) in level.units.iter_mut().enumerate() {
            unit.locked = (li, ui) > (boundary.level, boundary.unit);
            for (si, lesson) in unit.lessons.iter_mut().enumerate() {
                let at = Position {
                    level: li,
                    unit: ui,
                    lesson: si,
                };
                lesson.locked = at > boundary && !lesson.complete;
            }
        }
    }
}

fn apply_lockdown(levels: &mut [AnnotatedLevel]) {
    for level in levels.iter_mut() {
        for unit in &mut level.units {
            for lesson in &mut unit.lessons {
                lesson.current = false;
                lesson.locked = !lesson.complete;
            }
            unit.locked = !unit.lessons.iter().any(|l| l.complete);
        }
        level.locked = level.units.iter().all(|u| u.locked);
    }
}

fn apply_survey(levels: &mut [AnnotatedLevel], budget: u32) {
    let mut remaining = budget;
    for lesson in lessons_mut(levels) {
        if lesson.complete {
            lesson.locked = false;
        } else if remaining > 0 {
            lesson.locked = false;
            remaining -= 1;
        }
    }
}

/// A unit with an unlocked lesson is unlocked; a level with an unlocked unit is unlocked.
fn leak_up(levels: &mut [AnnotatedLevel]) {
    for level in levels.iter_mut() {
        for unit in &mut level.units {
            if unit.lessons.iter().any(|l| !l.locked) {
                unit.locked = false;
            }
        }
        if level.units.iter().any(|u| !u.locked) {
            level.locked = false;
        }
    }
}

fn lock_everything(levels: &mut [AnnotatedLevel]) {
    for level in levels.iter_mut() {
        level.locked = true;
        for unit in &mut level.units {
            unit.locked = true;
            for lesson in &mut unit.lessons {
                lesson.locked = true;
                lesson.current = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curriculum_core::model::{
        AnnotatedUnit, LessonId, LevelId, LevelStats, UnitId, UnitStats,
    };

    fn lesson(id: &str, complete: bool) -> AnnotatedLesson {
        AnnotatedLesson {
            id: LessonId::new(id),
            title: id.to_string(),
            icon: None,
            complete,
            attempts: u32::from(complete),
            time_spent: 0,
            locked: true,
            current: false,
            last_accessed: None,
        }
    }

    fn unit(id: u64, lessons: Vec<AnnotatedLesson>) -> AnnotatedUnit {
        AnnotatedUnit {
            unit_id: UnitId::new(id),
            title: String::new(),
            lessons,
            locked: true,
            stats: UnitStats::default(),
        }
    }

    fn level(id: u64, units: Vec<AnnotatedUnit>) -> AnnotatedLevel {
        AnnotatedLevel {
            level_id: LevelId::new(id),
            title: String::new(),
            units,
            locked: true,
            stats: LevelStats::default(),
        }
    }

    fn flags(levels: &[AnnotatedLevel]) -> Vec<(String, bool, bool)> {
        levels
            .iter()
            .flat_map(|l| l.units.iter())
            .flat_map(|u| u.lessons.iter())
            .map(|l| (l.id.to_string(), l.locked, l.current))
            .collect()
    }

    #[test]
    fn resolve_prefers_lockdown_for_exhausted_trials() {
        assert_eq!(LockMode::resolve(Entitlement::trial(), 0, Some(100)), LockMode::Lockdown);
        assert_eq!(LockMode::resolve(Entitlement::trial(), 2, Some(100)), LockMode::Sequential);
        assert_eq!(
            LockMode::resolve(Entitlement::active_plan(), 0, Some(100)),
            LockMode::Survey { budget: 100 }
        );
        assert_eq!(LockMode::resolve(Entitlement::active_plan(), 0, None), LockMode::Sequential);
    }

    #[test]
    fn sequential_marks_first_lesson_when_nothing_complete() {
        let mut levels = vec![level(
            1,
            vec![unit(1, vec![lesson("a", false), lesson("b", false)])],
        )];
        LockMode::Sequential.apply(&mut levels);

        assert_eq!(
            flags(&levels),
            vec![("a".to_string(), false, true), ("b".to_string(), true, false)]
        );
        assert!(!levels[0].locked);
        assert!(!levels[0].units[0].locked);
    }

    #[test]
    fn sequential_crosses_unit_and_level_boundaries() {
        let mut levels = vec![
            level(1, vec![unit(1, vec![lesson("a", true)]), unit(2, vec![lesson("b", true)])]),
            level(2, vec![unit(1, vec![lesson("c", false), lesson("d", false)])]),
            level(3, vec![unit(1, vec![lesson("e", false)])]),
        ];
        LockMode::Sequential.apply(&mut levels);

        assert_eq!(
            flags(&levels),
            vec![
                ("a".to_string(), false, false),
                ("b".to_string(), false, false),
                ("c".to_string(), false, true),
                ("d".to_string(), true, false),
                ("e".to_string(), true, false),
            ]
        );
        assert!(!levels[1].locked);
        assert!(levels[2].locked);
        assert!(levels[2].units[0].locked);
    }

    #[test]
    fn sequential_keeps_completed_lessons_past_the_boundary_unlocked() {
        let mut levels = vec![level(
            1,
            vec![
                unit(1, vec![lesson("a", false), lesson("b", false)]),
                unit(2, vec![lesson("c", true), lesson("d", false)]),
            ],
        )];
        // A stale flag from an earlier pass must not survive.
        levels[0].units[0].lessons[1].current = true;
        LockMode::Sequential.apply(&mut levels);

        assert_eq!(
            flags(&levels),
            vec![
                ("a".to_string(), false, false),
                ("b".to_string(), false, false),
                ("c".to_string(), false, false),
                ("d".to_string(), false, true),
            ]
        );
    }

    #[test]
    fn sequential_with_final_lesson_complete_resumes_at_first_lesson() {
        let mut levels = vec![level(
            1,
            vec![unit(1, vec![lesson("a", false), lesson("b", false), lesson("c", true)])],
        )];
        LockMode::Sequential.apply(&mut levels);

        assert_eq!(
            flags(&levels),
            vec![
                ("a".to_string(), false, true),
                ("b".to_string(), true, false),
                ("c".to_string(), false, false),
            ]
        );
        assert!(!levels[0].units[0].locked);
        assert!(!levels[0].locked);
    }

    #[test]
    fn empty_tree_stays_locked() {
        let mut levels = vec![level(1, vec![unit(1, vec![])]), level(2, vec![])];
        LockMode::Sequential.apply(&mut levels);
        assert!(levels.iter().all(|l| l.locked));
        assert!(levels[0].units[0].locked);

        LockMode::Survey { budget: 10 }.apply(&mut levels);
        assert!(levels.iter().all(|l| l.locked));
    }

    #[test]
    fn lockdown_only_unlocks_completed_lessons() {
        let mut levels = vec![
            level(
                1,
                vec![
                    unit(1, vec![lesson("a", true), lesson("b", false)]),
                    unit(2, vec![lesson("c", false)]),
                ],
            ),
            level(2, vec![unit(1, vec![lesson("d", false)])]),
        ];
        levels[0].units[0].lessons[1].current = true;
        LockMode::Lockdown.apply(&mut levels);

        assert_eq!(
            flags(&levels),
            vec![
                ("a".to_string(), false, false),
                ("b".to_string(), true, false),
                ("c".to_string(), true, false),
                ("d".to_string(), true, false),
            ]
        );
        assert!(!levels[0].units[0].locked);
        assert!(levels[0].units[1].locked);
        assert!(!levels[0].locked);
        assert!(levels[1].locked);
    }

    #[test]
    fn survey_budget_skips_completed_lessons() {
        let mut levels = vec![level(
            1,
            vec![
                unit(1, vec![lesson("a", true), lesson("b", false), lesson("c", false)]),
                unit(2, vec![lesson("d", true), lesson("e", false), lesson("f", false)]),
            ],
        )];
        LockMode::Survey { budget: 3 }.apply(&mut levels);

        let unlocked: Vec<String> = flags(&levels)
            .into_iter()
            .filter(|(_, locked, _)| !locked)
            .map(|(id, _, _)| id)
            .collect();
        assert_eq!(unlocked, vec!["a", "b", "c", "d", "e"]);
        assert!(!levels[0].units[1].locked);
    }
}
