use crate::error::StateStoreError;
use async_trait::async_trait;
use model::execution::summary::RunSummary;

pub mod sled_store;

/// Durable history of finished runs. The engine itself never reads it back;
/// it exists for operators.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn save_run(&self, summary: &RunSummary) -> Result<(), StateStoreError>;

    /// The most recent runs, newest first.
    async fn recent_runs(&self, limit: usize) -> Result<Vec<RunSummary>, StateStoreError>;
}
