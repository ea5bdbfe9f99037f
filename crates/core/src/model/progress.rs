use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::model::ids::{LessonKey, LevelId, UnitId};
use crate::model::validation::{ValidationReport, validate_progress_data};

/// Per-user progress record as stored by the backend.
///
/// This is the only persisted state; every annotated view is derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    #[serde(default, deserialize_with = "lenient_map")]
    pub levels: BTreeMap<LevelId, LevelProgress>,
    #[serde(default)]
    pub free_tries: u32,
    #[serde(default)]
    pub total_attempts: u64,
    /// Seconds.
    #[serde(default)]
    pub total_time_spent: u64,
    /// ISO dates (or timestamps) on which the learner was active.
    #[serde(default)]
    pub active_days: BTreeSet<String>,
}

impl ProgressRecord {
    /// An empty record for a learner who has not started yet.
    #[must_use]
    pub fn new_learner(free_tries: u32) -> Self {
        Self {
            free_tries,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn lesson(&self, level: LevelId, unit: UnitId, key: &LessonKey) -> Option<&LessonProgress> {
        self.unit(level, unit)?.lessons.get(key)
    }

    #[must_use]
    pub fn unit(&self, level: LevelId, unit: UnitId) -> Option<&UnitProgress> {
        self.levels.get(&level)?.units.get(&unit)
    }

    /// Lesson map of a unit, creating the level and unit entries if absent.
    pub fn lessons_mut(
        &mut self,
        level: LevelId,
        unit: UnitId,
    ) -> &mut BTreeMap<LessonKey, LessonProgress> {
        &mut self
            .levels
            .entry(level)
            .or_default()
            .units
            .entry(unit)
            .or_default()
            .lessons
    }

    /// Record `day` as an active day unless an entry for that date exists.
    pub fn mark_active(&mut self, day: NaiveDate) {
        let iso = day.format("%Y-%m-%d").to_string();
        if !self.active_days.iter().any(|d| d.starts_with(&iso)) {
            self.active_days.insert(iso);
        }
    }

    /// Structural validation of this record as it would be persisted.
    #[must_use]
    pub fn validate(&self) -> ValidationReport {
        match serde_json::to_value(self) {
            Ok(value) => validate_progress_data(&value),
            Err(err) => ValidationReport::from_errors(vec![format!(
                "progress record cannot be serialized: {err}"
            )]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    #[serde(default, deserialize_with = "lenient_map")]
    pub units: BTreeMap<UnitId, UnitProgress>,
    /// Kept for round-tripping; annotated levels derive their lock from units.
    #[serde(default)]
    pub locked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitProgress {
    #[serde(default, deserialize_with = "lenient_map")]
    pub lessons: BTreeMap<LessonKey, LessonProgress>,
}

impl UnitProgress {
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.lessons.values().filter(|l| l.complete).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgress {
    #[serde(default, alias = "completed")]
    pub complete: bool,
    #[serde(default)]
    pub attempts: u32,
    /// Seconds.
    #[serde(default)]
    pub time_spent: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<NaiveDate>,
}

/// Deserialize a keyed map whose values may be null or malformed.
///
/// Such entries are dropped with a warning, which reads the same as absent
/// progress; a missing or null map becomes empty.
fn lenient_map<'de, D, K, V>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
where
    D: Deserializer<'de>,
    K: Deserialize<'de> + Ord + std::fmt::Debug,
    V: DeserializeOwned,
{
    let raw: Option<BTreeMap<K, serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, value)| match serde_json::from_value(value) {
            Ok(parsed) => Some((key, parsed)),
            Err(err) => {
                warn!(?key, %err, "dropping malformed progress entry");
                None
            }
        })
        .collect())
}
