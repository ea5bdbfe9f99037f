use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, info};

use curriculum_core::Clock;
use curriculum_core::model::{
    AnnotatedLevel, LessonCoordinates, LevelId, OverallStats, ProgressRecord, UserId,
};
use curriculum_core::settings::{EngineSettings, SurveyAnswer};
use storage::repository::{CurriculumSource, ProgressStore, Storage};

use super::lock::Entitlement;
use super::merge::{MergeOptions, merge};
use super::mutate::{LessonUpdate, update_lesson_in_progress};
use super::navigation::{find_current_lesson, next_items};
use super::stats::overall_stats;
use crate::error::{AppServicesError, ProgressServiceError};

/// Free tries granted to a learner without a stored record.
pub const DEFAULT_FREE_TRIES: u32 = 3;

/// Who is asking, as far as locking is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnerContext {
    pub learning_type: String,
    pub entitlement: Entitlement,
    pub survey: Option<SurveyAnswer>,
}

impl LearnerContext {
    #[must_use]
    pub fn new(learning_type: impl Into<String>, entitlement: Entitlement) -> Self {
        Self {
            learning_type: learning_type.into(),
            entitlement,
            survey: None,
        }
    }

    #[must_use]
    pub fn with_survey(mut self, survey: Option<SurveyAnswer>) -> Self {
        self.survey = survey;
        self
    }
}

/// Everything a dashboard renders for one learner.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
    pub levels: Vec<AnnotatedLevel>,
    pub overall_stats: OverallStats,
    pub free_tries: u32,
    pub total_attempts: u64,
    pub total_time_spent: u64,
    pub active_days: BTreeSet<String>,
}

type WriterLocks = Mutex<HashMap<UserId, Arc<tokio::sync::Mutex<()>>>>;

/// Fetch, merge and persist progress against the storage collaborators.
///
/// Reads rebuild the annotated tree from scratch. Writes for the same learner
/// are serialized so concurrent completions never lose an update.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    settings: EngineSettings,
    curricula: Arc<dyn CurriculumSource>,
    progress: Arc<dyn ProgressStore>,
    initial_free_tries: u32,
    writers: Arc<WriterLocks>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        settings: EngineSettings,
        curricula: Arc<dyn CurriculumSource>,
        progress: Arc<dyn ProgressStore>,
    ) -> Self {
        Self {
            clock,
            settings,
            curricula,
            progress,
            initial_free_tries: DEFAULT_FREE_TRIES,
            writers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[must_use]
    pub fn from_storage(clock: Clock, settings: EngineSettings, storage: &Storage) -> Self {
        Self::new(
            clock,
            settings,
            Arc::clone(&storage.curricula),
            Arc::clone(&storage.progress),
        )
    }

    /// Build a service backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        settings: EngineSettings,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(clock, settings, &storage))
    }

    /// Override the free tries given to learners without a stored record.
    #[must_use]
    pub fn with_initial_free_tries(mut self, free_tries: u32) -> Self {
        self.initial_free_tries = free_tries;
        self
    }

    /// Stored record of a learner, or a fresh one if none exists yet.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the store cannot be read.
    pub async fn record(&self, user: UserId) -> Result<ProgressRecord, ProgressServiceError> {
        let record = self.progress.get_progress(user).await?;
        Ok(record.unwrap_or_else(|| ProgressRecord::new_learner(self.initial_free_tries)))
    }

    /// Annotated tree and statistics for a learner.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::CurriculumNotFound` when nothing is
    /// published for the learning type, or `Storage` on read failures.
    pub async fn load_view(
        &self,
        user: UserId,
        learner: &LearnerContext,
    ) -> Result<ProgressView, ProgressServiceError> {
        let curriculum = self
            .curricula
            .curriculum(&learner.learning_type)
            .await?
            .ok_or_else(|| {
                ProgressServiceError::CurriculumNotFound(learner.learning_type.clone())
            })?;
        let record = self.record(user).await?;

        let options = MergeOptions::for_learner(
            learner.entitlement,
            record.free_tries,
            learner.survey,
            &self.settings,
        );
        let levels = merge(&curriculum, &record, options);
        let overall_stats = overall_stats(&levels, &self.settings);
        debug!(%user, levels = levels.len(), "built progress view");

        Ok(ProgressView {
            levels,
            overall_stats,
            free_tries: record.free_tries,
            total_attempts: record.total_attempts,
            total_time_spent: record.total_time_spent,
            active_days: record.active_days,
        })
    }

    /// Apply a lesson event and persist the updated record.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Invalid` without persisting when the
    /// updated record fails validation, or `Storage` on read/write failures.
    pub async fn record_lesson(
        &self,
        user: UserId,
        at: &LessonCoordinates,
        update: LessonUpdate,
    ) -> Result<ProgressRecord, ProgressServiceError> {
        let writer = self.writer(user);
        let result = {
            let _guard = writer.lock().await;
            self.apply_lesson_event(user, at, update).await
        };
        self.release_writer(user, writer);
        result
    }

    async fn apply_lesson_event(
        &self,
        user: UserId,
        at: &LessonCoordinates,
        update: LessonUpdate,
    ) -> Result<ProgressRecord, ProgressServiceError> {
        let record = self.record(user).await?;
        let updated = update_lesson_in_progress(record, at, update, self.clock.today());

        let report = updated.validate();
        if !report.is_valid {
            return Err(ProgressServiceError::Invalid(report));
        }

        self.progress.save_progress(user, &updated).await?;
        info!(
            %user,
            level_id = %at.level_id,
            unit_id = %at.unit_id,
            lesson_id = %at.lesson_id,
            complete = update.complete,
            "recorded lesson event"
        );
        Ok(updated)
    }

    /// Where to go after acting on the lesson at `from`.
    ///
    /// # Errors
    ///
    /// Same as [`ProgressService::load_view`].
    pub async fn next_lesson(
        &self,
        user: UserId,
        learner: &LearnerContext,
        from: &LessonCoordinates,
    ) -> Result<Option<LessonCoordinates>, ProgressServiceError> {
        let view = self.load_view(user, learner).await?;
        Ok(next_items(&view.levels, from, &self.settings).map(|next| next.target()))
    }

    /// Resume point of a level; `None` for an unknown or empty level.
    ///
    /// # Errors
    ///
    /// Same as [`ProgressService::load_view`].
    pub async fn current_lesson(
        &self,
        user: UserId,
        learner: &LearnerContext,
        level_id: LevelId,
    ) -> Result<Option<LessonCoordinates>, ProgressServiceError> {
        let view = self.load_view(user, learner).await?;
        let Some(level) = view.levels.iter().find(|l| l.level_id == level_id) else {
            return Ok(None);
        };
        Ok(find_current_lesson(level).map(|current| {
            LessonCoordinates::new(
                level.level_id,
                level.units[current.unit_index].unit_id,
                current.lesson.id.clone(),
            )
        }))
    }

    fn writer(&self, user: UserId) -> Arc<tokio::sync::Mutex<()>> {
        let mut writers = self.writers.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(writers.entry(user).or_default())
    }

    /// Drop the user's lock entry once no other writer holds or awaits it.
    fn release_writer(&self, user: UserId, writer: Arc<tokio::sync::Mutex<()>>) {
        let mut writers = self.writers.lock().unwrap_or_else(PoisonError::into_inner);
        let idle = writers
            .get(&user)
            .is_some_and(|entry| Arc::ptr_eq(entry, &writer) && Arc::strong_count(entry) == 2);
        if idle {
            writers.remove(&user);
        }
    }

    #[cfg(test)]
    fn writer_count(&self) -> usize {
        self.writers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use curriculum_core::model::{LessonId, UnitId};
    use curriculum_core::time::fixed_clock;

    fn service() -> ProgressService {
        ProgressService::from_storage(
            fixed_clock(),
            EngineSettings::default(),
            &Storage::in_memory(),
        )
    }

    fn at(lesson: &str) -> LessonCoordinates {
        LessonCoordinates::new(LevelId::new(1), UnitId::new(1), LessonId::new(lesson))
    }

    #[tokio::test]
    async fn writer_locks_are_released_after_each_write() {
        let service = service();
        for id in 0..200 {
            service
                .record_lesson(UserId::new(id), &at("a"), LessonUpdate::completed(5))
                .await
                .unwrap();
        }
        assert_eq!(service.writer_count(), 0);
    }

    #[tokio::test]
    async fn held_writer_lock_survives_release_by_another_writer() {
        let service = service();
        let user = UserId::new(7);
        let held = service.writer(user);
        let guard = held.lock().await;

        let other = service.clone();
        let pending = tokio::spawn(async move {
            other
                .record_lesson(user, &at("a"), LessonUpdate::completed(5))
                .await
        });
        tokio::task::yield_now().await;
        assert_eq!(service.writer_count(), 1);

        drop(guard);
        service.release_writer(user, held);
        let record = pending.await.unwrap().unwrap();
        assert_eq!(record.total_attempts, 1);
        assert_eq!(service.writer_count(), 0);
    }

    #[tokio::test]
    async fn failed_write_also_releases_its_lock() {
        let storage = Storage::in_memory();
        let user = UserId::new(3);
        let mut stored = ProgressRecord::new_learner(3);
        stored.active_days.insert("yesterday".to_string());
        storage.progress.save_progress(user, &stored).await.unwrap();

        let service =
            ProgressService::from_storage(fixed_clock(), EngineSettings::default(), &storage);
        let err = service
            .record_lesson(user, &at("a"), LessonUpdate::completed(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::Invalid(_)));
        assert_eq!(service.writer_count(), 0);
    }

    #[tokio::test]
    async fn new_learners_start_with_configured_free_tries() {
        let service = service().with_initial_free_tries(1);
        let user = UserId::new(9);
        assert_eq!(service.record(user).await.unwrap().free_tries, 1);

        let record = service
            .record_lesson(user, &at("a"), LessonUpdate::completed(5))
            .await
            .unwrap();
        assert_eq!(record.free_tries, 0);
        assert_eq!(self::service().record(user).await.unwrap().free_tries, DEFAULT_FREE_TRIES);
    }
}
