use curriculum_core::EngineSettings;
use curriculum_core::model::{
    Curriculum, LessonContent, LessonCoordinates, LessonId, LevelContent, LevelId, ProgressRecord,
    UnitContent, UnitId, UserId,
};
use curriculum_core::time::fixed_clock;
use services::progress::{LessonUpdate, merge, update_lesson_in_progress};
use services::{Entitlement, LearnerContext, MergeOptions, ProgressService, ProgressServiceError};
use storage::repository::Storage;

fn scenario_curriculum() -> Curriculum {
    Curriculum::from_levels(vec![
        LevelContent::new(
            LevelId::new(1),
            "Level 1",
            vec![
                UnitContent::new(
                    UnitId::new(1),
                    "Unit A",
                    vec![
                        LessonContent::new("l-1", "L1"),
                        LessonContent::new("l-2", "L2"),
                        LessonContent::new("l-3", "L3"),
                    ],
                ),
                UnitContent::new(UnitId::new(2), "Unit B", vec![LessonContent::new("l-4", "L4")]),
            ],
        ),
        LevelContent::new(
            LevelId::new(2),
            "Level 2",
            vec![UnitContent::new(UnitId::new(1), "Unit C", vec![LessonContent::new("l-5", "L5")])],
        ),
    ])
}

fn large_curriculum() -> Curriculum {
    let levels = (1..=3)
        .map(|level| {
            let units = (1..=5)
                .map(|unit| {
                    let lessons = (1..=10)
                        .map(|n| {
                            LessonContent::new(format!("{level}-{unit}-{n}"), format!("Lesson {n}"))
                        })
                        .collect();
                    UnitContent::new(UnitId::new(unit), format!("Unit {unit}"), lessons)
                })
                .collect();
            LevelContent::new(LevelId::new(level), format!("Level {level}"), units)
        })
        .collect();
    Curriculum::from_levels(levels)
}

fn at(level: u64, unit: u64, lesson: &str) -> LessonCoordinates {
    LessonCoordinates::new(LevelId::new(level), UnitId::new(unit), LessonId::new(lesson))
}

fn service(storage: &Storage) -> ProgressService {
    ProgressService::from_storage(fixed_clock(), EngineSettings::default(), storage)
}

fn locked_ids(levels: &[curriculum_core::model::AnnotatedLevel], locked: bool) -> Vec<String> {
    levels
        .iter()
        .flat_map(|l| l.lessons())
        .filter(|l| l.locked == locked)
        .map(|l| l.id.to_string())
        .collect()
}

#[test]
fn sequential_mode_after_first_lesson() {
    let mut record = ProgressRecord::new_learner(3);
    record = update_lesson_in_progress(
        record,
        &at(1, 1, "l-1"),
        LessonUpdate::completed(30),
        fixed_clock().today(),
    );

    let levels = merge(&scenario_curriculum(), &record, MergeOptions::default());
    let level = &levels[0];

    assert!(level.units[0].lessons[1].current);
    assert_eq!(locked_ids(&levels, false), vec!["l-1", "l-2"]);
    assert_eq!(locked_ids(&levels, true), vec!["l-3", "l-4", "l-5"]);
    assert!(!level.units[0].locked);
    assert!(level.units[1].locked);
    assert!(!level.locked);
    assert!(levels[1].locked);
}

#[test]
fn exhausted_trial_locks_everything_incomplete() {
    let mut record = ProgressRecord::new_learner(1);
    record = update_lesson_in_progress(
        record,
        &at(1, 2, "l-4"),
        LessonUpdate::completed(30),
        fixed_clock().today(),
    );
    assert_eq!(record.free_tries, 0);

    let options = MergeOptions::for_learner(
        Entitlement::trial(),
        record.free_tries,
        None,
        &EngineSettings::default(),
    );
    let levels = merge(&scenario_curriculum(), &record, options);

    assert_eq!(locked_ids(&levels, false), vec!["l-4"]);
    assert!(levels.iter().flat_map(|l| l.lessons()).all(|l| !l.current));
    assert!(levels[0].units[0].locked);
    assert!(!levels[0].units[1].locked);
    assert!(!levels[0].locked);
    assert!(levels[1].locked);
}

#[test]
fn survey_budget_unlocks_a_prefix() {
    let curriculum = large_curriculum();
    assert_eq!(curriculum.lesson_count(), 150);

    let options = MergeOptions {
        unlock_budget: Some(100),
        lock_all_incomplete: false,
    };
    let levels = merge(&curriculum, &ProgressRecord::default(), options);

    let flags: Vec<bool> = levels.iter().flat_map(|l| l.lessons()).map(|l| l.locked).collect();
    assert!(flags[..100].iter().all(|locked| !locked));
    assert!(flags[100..].iter().all(|locked| *locked));

    for level in &levels {
        for unit in &level.units {
            assert_eq!(unit.locked, unit.lessons.iter().all(|l| l.locked));
        }
        assert_eq!(level.locked, level.units.iter().all(|u| u.locked));
    }
    assert!(!levels[1].locked);
    assert!(levels[2].locked);
}

#[tokio::test]
async fn service_records_and_reads_progress() {
    let storage = Storage::sqlite("sqlite:file:memdb_progress_flow?mode=memory&cache=shared")
        .await
        .expect("connect sqlite");
    storage
        .curricula
        .upsert_curriculum("student", &scenario_curriculum())
        .await
        .expect("publish curriculum");

    let service = service(&storage);
    let user = UserId::new(42);
    let learner = LearnerContext::new("student", Entitlement::trial());

    let view = service.load_view(user, &learner).await.expect("initial view");
    assert_eq!(view.free_tries, 3);
    assert_eq!(view.overall_stats.total_lessons, 5);
    assert_eq!(
        service.current_lesson(user, &learner, LevelId::new(1)).await.expect("current"),
        Some(at(1, 1, "l-1"))
    );

    service
        .record_lesson(user, &at(1, 1, "l-1"), LessonUpdate::attempted(20))
        .await
        .expect("attempt");
    let record = service
        .record_lesson(user, &at(1, 1, "l-1"), LessonUpdate::completed(40))
        .await
        .expect("complete");
    assert_eq!(record.free_tries, 2);

    let view = service.load_view(user, &learner).await.expect("view after completion");
    assert_eq!(view.total_attempts, 2);
    assert_eq!(view.total_time_spent, 60);
    assert_eq!(view.overall_stats.total_completed_lessons, 1);
    assert_eq!(view.overall_stats.accuracy, 100);
    assert_eq!(view.overall_stats.total_attempts, 1);
    assert_eq!(view.overall_stats.completion_percentage, 20);
    assert_eq!(view.active_days.len(), 1);

    let next = service
        .next_lesson(user, &learner, &at(1, 1, "l-1"))
        .await
        .expect("next lesson");
    assert_eq!(next, Some(at(1, 1, "l-2")));
    assert_eq!(
        service.current_lesson(user, &learner, LevelId::new(1)).await.expect("current"),
        Some(at(1, 1, "l-2"))
    );
    assert_eq!(
        service.current_lesson(user, &learner, LevelId::new(9)).await.expect("unknown level"),
        None
    );
}

#[tokio::test]
async fn next_unit_starts_after_last_lesson_of_unit() {
    let storage = Storage::in_memory();
    storage
        .curricula
        .upsert_curriculum("student", &scenario_curriculum())
        .await
        .expect("publish curriculum");
    let service = service(&storage);
    let user = UserId::new(1);
    let learner = LearnerContext::new("student", Entitlement::active_plan());

    for lesson in ["l-1", "l-2", "l-3"] {
        service
            .record_lesson(user, &at(1, 1, lesson), LessonUpdate::completed(10))
            .await
            .expect("complete lesson");
    }

    let next = service
        .next_lesson(user, &learner, &at(1, 1, "l-3"))
        .await
        .expect("next lesson");
    assert_eq!(next, Some(at(1, 2, "l-4")));
}

#[tokio::test]
async fn missing_curriculum_is_reported() {
    let storage = Storage::in_memory();
    let service = service(&storage);
    let learner = LearnerContext::new("tutor", Entitlement::trial());

    let err = service
        .load_view(UserId::new(1), &learner)
        .await
        .expect_err("no curriculum");
    assert!(matches!(err, ProgressServiceError::CurriculumNotFound(ref kind) if kind == "tutor"));
}

#[tokio::test]
async fn invalid_record_is_not_persisted() {
    let storage = Storage::in_memory();
    let user = UserId::new(5);
    let mut stored = ProgressRecord::new_learner(3);
    stored.active_days.insert("not a date".to_string());
    storage
        .progress
        .save_progress(user, &stored)
        .await
        .expect("seed record");

    let service = service(&storage);
    let err = service
        .record_lesson(user, &at(1, 1, "l-1"), LessonUpdate::completed(10))
        .await
        .expect_err("validation failure");
    match err {
        ProgressServiceError::Invalid(report) => {
            assert!(!report.is_valid);
            assert_eq!(report.errors, vec!["Invalid timestamp in activeDays: \"not a date\""]);
        }
        other => panic!("unexpected error: {other}"),
    }

    let unchanged = storage
        .progress
        .get_progress(user)
        .await
        .expect("read back")
        .expect("record exists");
    assert_eq!(unchanged, stored);
}
