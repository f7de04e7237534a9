use crate::{error::StateStoreError, state::StateStore};
use async_trait::async_trait;
use model::execution::summary::RunSummary;
use std::path::Path;

const RUN_PREFIX: &str = "run:";

pub struct SledStateStore {
    db: sled::Db,
}

impl SledStateStore {
    /// Opens (or creates) the store. sled locks the directory, so a second
    /// process pointing at the same path fails here.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StateStoreError> {
        let path = path.as_ref();
        let db = sled::open(path)
            .map_err(|e| StateStoreError::Open(format!("{}: {e}", path.display())))?;
        Ok(Self { db })
    }

    /// Keys sort chronologically: zero-padded start time, then run id.
    #[inline]
    fn run_key(summary: &RunSummary) -> String {
        let millis = summary.started_at.and_utc().timestamp_millis().max(0);
        format!("{RUN_PREFIX}{millis:020}:{}", summary.run_id)
    }
}

#[async_trait]
impl StateStore for SledStateStore {
    async fn save_run(&self, summary: &RunSummary) -> Result<(), StateStoreError> {
        let key = Self::run_key(summary);
        let value =
            bincode::serialize(summary).map_err(|e| StateStoreError::SaveRun(e.to_string()))?;

        self.db
            .insert(key, value)
            .map_err(|e| StateStoreError::SaveRun(e.to_string()))?;
        self.db
            .flush_async()
            .await
            .map_err(|e| StateStoreError::SaveRun(e.to_string()))?;
        Ok(())
    }

    async fn recent_runs(&self, limit: usize) -> Result<Vec<RunSummary>, StateStoreError> {
        let mut runs = Vec::new();

        for item in self.db.scan_prefix(RUN_PREFIX).rev().take(limit) {
            let (_key, value) = item.map_err(|e| StateStoreError::LoadRuns(e.to_string()))?;
            let summary: RunSummary = bincode::deserialize(&value)
                .map_err(|e| StateStoreError::LoadRuns(e.to_string()))?;
            runs.push(summary);
        }

        Ok(runs)
    }
}
