use crate::{error::SyncError, execution::executor::SyncExecutor};
use engine_core::clock::Clock;
use model::execution::summary::RunSummary;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runs passes back to back with a fixed pause in between. A pass never
/// starts while another is in progress.
pub struct TickScheduler {
    executor: SyncExecutor,
    clock: Arc<dyn Clock>,
    every: Duration,
    max_passes: Option<usize>,
}

impl TickScheduler {
    pub fn new(executor: SyncExecutor, clock: Arc<dyn Clock>, every: Duration) -> Self {
        Self {
            executor,
            clock,
            every,
            max_passes: None,
        }
    }

    /// Stop after `passes` runs instead of waiting for cancellation.
    pub fn with_max_passes(mut self, passes: usize) -> Self {
        self.max_passes = Some(passes);
        self
    }

    /// Loops until cancelled. Returns the number of passes run.
    pub async fn run<F>(&self, cancel: &CancellationToken, mut on_pass: F) -> Result<usize, SyncError>
    where
        F: FnMut(&RunSummary),
    {
        let mut passes = 0;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let summary = self.executor.execute(cancel).await?;
            passes += 1;
            if !summary.succeeded() {
                warn!("Pass {passes} ended {}; next pass still scheduled", summary.state);
            }
            on_pass(&summary);

            if self.max_passes.is_some_and(|max| passes >= max) {
                break;
            }

            info!("Next pass in {}s", self.every.as_secs());
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.clock.sleep(self.every) => {}
            }
        }

        info!("Scheduler stopped after {passes} passes");
        Ok(passes)
    }
}
