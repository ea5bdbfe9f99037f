use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default bound on how many levels "next lesson" navigation may cross into.
pub const DEFAULT_MAX_LEVELS: usize = 5;

/// Default length of the "most attempted lessons" list.
pub const DEFAULT_TOP_ATTEMPTS_LIMIT: usize = 6;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EngineSettingsError {
    #[error("max levels must be > 0")]
    InvalidMaxLevels,

    #[error("top attempts limit must be > 0")]
    InvalidTopAttemptsLimit,

    #[error("unknown survey answer: {0}")]
    UnknownSurveyAnswer(String),
}

//
// ─── SURVEY ────────────────────────────────────────────────────────────────────
//

/// Onboarding answer to "which units are you currently studying?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurveyAnswer {
    #[serde(rename = "unit-1-6")]
    Units1To6,
    #[serde(rename = "unit-7-12")]
    Units7To12,
    #[serde(rename = "unit-13-17")]
    Units13To17,
    #[serde(rename = "unit-18-25")]
    Units18To25,
}

impl SurveyAnswer {
    pub const ALL: [SurveyAnswer; 4] = [
        SurveyAnswer::Units1To6,
        SurveyAnswer::Units7To12,
        SurveyAnswer::Units13To17,
        SurveyAnswer::Units18To25,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SurveyAnswer::Units1To6 => "unit-1-6",
            SurveyAnswer::Units7To12 => "unit-7-12",
            SurveyAnswer::Units13To17 => "unit-13-17",
            SurveyAnswer::Units18To25 => "unit-18-25",
        }
    }
}

impl fmt::Display for SurveyAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SurveyAnswer {
    type Err = EngineSettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|answer| answer.as_str() == trimmed)
            .ok_or_else(|| EngineSettingsError::UnknownSurveyAnswer(s.to_owned()))
    }
}

/// How `averageAttempts` is derived in the overall statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AverageAttempts {
    /// Total attempts divided by total completed lessons, from final totals.
    #[default]
    Final,
    /// Historical dashboard value: the average as last updated while walking
    /// the tree, with the denominator counting completed lessons of every
    /// level reached so far.
    Running,
}

//
// ─── SETTINGS ──────────────────────────────────────────────────────────────────
//

/// Tunables for the progress engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    max_levels: usize,
    top_attempts_limit: usize,
    survey_budgets: [u32; 4],
    average_attempts: AverageAttempts,
}

/// Unvalidated settings; turn into [`EngineSettings`] with [`EngineSettingsDraft::validate`].
#[derive(Debug, Clone, Default)]
pub struct EngineSettingsDraft {
    pub max_levels: Option<usize>,
    pub top_attempts_limit: Option<usize>,
    /// Unlock budgets indexed like [`SurveyAnswer::ALL`].
    pub survey_budgets: Option<[u32; 4]>,
    pub average_attempts: Option<AverageAttempts>,
}

impl EngineSettingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill unset fields with defaults and check the rest.
    ///
    /// # Errors
    ///
    /// Returns `EngineSettingsError` if a limit is zero.
    pub fn validate(self) -> Result<EngineSettings, EngineSettingsError> {
        let defaults = EngineSettings::default();
        let max_levels = self.max_levels.unwrap_or(defaults.max_levels);
        let top_attempts_limit = self
            .top_attempts_limit
            .unwrap_or(defaults.top_attempts_limit);

        if max_levels == 0 {
            return Err(EngineSettingsError::InvalidMaxLevels);
        }
        if top_attempts_limit == 0 {
            return Err(EngineSettingsError::InvalidTopAttemptsLimit);
        }

        Ok(EngineSettings {
            max_levels,
            top_attempts_limit,
            survey_budgets: self.survey_budgets.unwrap_or(defaults.survey_budgets),
            average_attempts: self.average_attempts.unwrap_or(defaults.average_attempts),
        })
    }
}

impl EngineSettings {
    #[must_use]
    pub fn max_levels(&self) -> usize {
        self.max_levels
    }

    #[must_use]
    pub fn top_attempts_limit(&self) -> usize {
        self.top_attempts_limit
    }

    #[must_use]
    pub fn average_attempts(&self) -> AverageAttempts {
        self.average_attempts
    }

    /// Number of lessons a survey answer unlocks up front.
    #[must_use]
    pub fn unlock_budget(&self, answer: SurveyAnswer) -> u32 {
        let index = SurveyAnswer::ALL
            .iter()
            .position(|a| *a == answer)
            .unwrap_or_default();
        self.survey_budgets[index]
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_levels: DEFAULT_MAX_LEVELS,
            top_attempts_limit: DEFAULT_TOP_ATTEMPTS_LIMIT,
            survey_budgets: [100, 200, 300, 400],
            average_attempts: AverageAttempts::Final,
        }
    }
}
