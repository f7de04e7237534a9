use connectors::error::AdapterError;
use engine_config::settings::error::SettingsError;
use engine_core::error::{SinkError, StateStoreError};
use engine_processing::error::{FetchError, IndexError};
use model::core::window::WindowError;
use thiserror::Error;

/// Top-level errors for a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Initialization error.
    #[error("Initialization error: {0}")]
    InitializationError(String),

    /// Adapter-related error.
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// Setting error.
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    /// Fatal fetch error (auth, malformed response or unbuildable request).
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// The sink's contents could not be indexed.
    #[error("Sink index error: {0}")]
    Index(#[from] IndexError),

    /// Sink error that survived its retry.
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("State store error: {0}")]
    State(#[from] StateStoreError),
}
