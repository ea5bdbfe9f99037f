use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::model::ids::{LessonId, LevelId, UnitId};

//
// ─── AUTHORED TREE ─────────────────────────────────────────────────────────────
//

/// Read-only authored content tree: levels → units → lessons.
///
/// The order of every sequence is the canonical traversal order used by the
/// locking and navigation rules.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Curriculum {
    #[serde(default)]
    pub levels: Vec<LevelContent>,
}

impl Curriculum {
    #[must_use]
    pub fn from_levels(levels: Vec<LevelContent>) -> Self {
        Self { levels }
    }

    /// Count of well-formed lessons across all levels.
    #[must_use]
    pub fn lesson_count(&self) -> usize {
        self.levels
            .iter()
            .flat_map(LevelContent::units)
            .map(|unit| unit.lessons().count())
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelContent {
    pub level_id: LevelId,
    #[serde(default)]
    pub title: String,
    /// `None` marks an entry that was null or malformed in the source document.
    #[serde(default, deserialize_with = "lenient_entries")]
    pub units: Vec<Option<UnitContent>>,
}

impl LevelContent {
    #[must_use]
    pub fn new(level_id: LevelId, title: impl Into<String>, units: Vec<UnitContent>) -> Self {
        Self {
            level_id,
            title: title.into(),
            units: units.into_iter().map(Some).collect(),
        }
    }

    /// Well-formed units in canonical order.
    pub fn units(&self) -> impl Iterator<Item = &UnitContent> {
        self.units.iter().flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitContent {
    pub unit_id: UnitId,
    #[serde(default)]
    pub title: String,
    /// `None` marks an entry that was null or malformed in the source document.
    #[serde(default, deserialize_with = "lenient_entries")]
    pub lessons: Vec<Option<LessonContent>>,
}

impl UnitContent {
    #[must_use]
    pub fn new(unit_id: UnitId, title: impl Into<String>, lessons: Vec<LessonContent>) -> Self {
        Self {
            unit_id,
            title: title.into(),
            lessons: lessons.into_iter().map(Some).collect(),
        }
    }

    /// Well-formed lessons in canonical order.
    pub fn lessons(&self) -> impl Iterator<Item = &LessonContent> {
        self.lessons.iter().flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonContent {
    pub id: LessonId,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<LessonIcon>,
}

impl LessonContent {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: LessonId::new(id),
            title: title.into(),
            icon: None,
        }
    }
}

/// Icon metadata attached to a lesson by the content authors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonIcon {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

/// Deserialize a sequence where individual entries may be null or malformed.
///
/// Bad entries become `None` instead of failing the whole document; a missing
/// or null sequence becomes empty.
fn lenient_entries<'de, D, T>(deserializer: D) -> Result<Vec<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|value| {
            if value.is_null() {
                None
            } else {
                serde_json::from_value(value).ok()
            }
        })
        .collect())
}
