use connectors::file::csv::error::SheetError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Sheet error: {0}")]
    Sheet(#[from] SheetError),

    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    #[error("Sink task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("Failed to open state store: {0}")]
    Open(String),

    #[error("Failed to save run: {0}")]
    SaveRun(String),

    #[error("Failed to load runs: {0}")]
    LoadRuns(String),
}
