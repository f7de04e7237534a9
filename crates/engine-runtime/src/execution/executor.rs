use crate::{
    error::SyncError,
    execution::{factory, orchestrator::SyncOrchestrator},
};
use engine_config::{
    report::callback::send_report,
    settings::{ReportTarget, SyncSettings},
};
use engine_core::{
    clock::{Clock, SystemClock},
    metrics::Metrics,
    state::{StateStore, sled_store::SledStateStore},
};
use model::{execution::summary::RunSummary, pagination::cursor::PageCursor};
use std::{path::PathBuf, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const DEFAULT_STATE_DIR: &str = ".sales-sync/state";

pub async fn run(
    settings: &SyncSettings,
    dry_run: bool,
    cancel: CancellationToken,
) -> Result<RunSummary, SyncError> {
    SyncExecutor::new(settings, dry_run)
        .await?
        .execute(&cancel)
        .await
}

/// Runs passes and records each one in the run history.
pub struct SyncExecutor {
    orchestrator: SyncOrchestrator,
    state: Arc<dyn StateStore>,
    report: Option<ReportTarget>,
}

impl SyncExecutor {
    pub async fn new(settings: &SyncSettings, dry_run: bool) -> Result<Self, SyncError> {
        let state = Arc::new(open_state(settings)?);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let orchestrator =
            factory::create_orchestrator(settings, dry_run, clock, Metrics::new()).await?;

        Ok(Self::with_parts(orchestrator, state, settings.report.clone()))
    }

    pub fn with_parts(
        orchestrator: SyncOrchestrator,
        state: Arc<dyn StateStore>,
        report: Option<ReportTarget>,
    ) -> Self {
        SyncExecutor {
            orchestrator,
            state,
            report,
        }
    }

    pub fn orchestrator(&self) -> &SyncOrchestrator {
        &self.orchestrator
    }

    /// One pass. The summary is saved even when the run failed; only a
    /// history write failure is returned as `Err`.
    pub async fn execute(&self, cancel: &CancellationToken) -> Result<RunSummary, SyncError> {
        let summary = self.orchestrator.run(cancel).await;
        self.state.save_run(&summary).await?;

        if let Some(target) = &self.report {
            match send_report(&summary, target).await {
                Ok(()) => info!("Run report delivered to {}", target.url),
                Err(err) => warn!("Run report delivery failed: {err}"),
            }
        }

        Ok(summary)
    }
}

/// `SYNC_STATE_DIR`, or `~/.sales-sync/state`.
pub fn state_dir(settings: &SyncSettings) -> Result<PathBuf, SyncError> {
    if let Some(dir) = &settings.state_dir {
        return Ok(dir.clone());
    }
    let home_dir = dirs::home_dir().ok_or_else(|| {
        SyncError::InitializationError("Could not determine home directory".to_string())
    })?;
    Ok(home_dir.join(DEFAULT_STATE_DIR))
}

pub fn open_state(settings: &SyncSettings) -> Result<SledStateStore, SyncError> {
    Ok(SledStateStore::open(state_dir(settings)?)?)
}

/// What a single probe request returned.
#[derive(Debug, Clone)]
pub struct SourceCheck {
    pub endpoint: String,
    pub records: usize,
    pub took_ms: u128,
    /// The page was shorter than the page size.
    pub last_page: bool,
}

/// Fetches the first page of the current window and validates its envelope.
pub async fn check_source(settings: &SyncSettings) -> Result<SourceCheck, SyncError> {
    let source = factory::create_source(settings)?;
    let endpoint = source.name();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let window = clock.window(settings.retention_days)?;
    let fetcher = factory::create_fetcher(settings, source, clock, Metrics::new());

    let page = fetcher
        .fetch_page(&window, PageCursor::first(settings.page_size))
        .await?;

    Ok(SourceCheck {
        endpoint,
        records: page.len(),
        took_ms: page.took_ms,
        last_page: page.is_terminal(),
    })
}
