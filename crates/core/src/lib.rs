#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod settings;
pub mod time;

pub use error::Error;
pub use settings::{
    AverageAttempts, EngineSettings, EngineSettingsDraft, EngineSettingsError, SurveyAnswer,
};
pub use time::Clock;
