use engine_config::{error::ReportGenerationError, settings::error::SettingsError};
use engine_core::error::StateStoreError;
use engine_runtime::error::SyncError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to load the environment: {0}")]
    Config(String),

    #[error("Invalid settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("Failed to run the sync: {0}")]
    Runner(#[from] SyncError),

    #[error("Failed to write the run report: {0}")]
    Report(#[from] ReportGenerationError),

    #[error("Failed to read run history: {0}")]
    State(#[from] StateStoreError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(serde_json::Error),
}
