use crate::error::SyncError;
use engine_config::settings::{FilterRules, SortDirection, SyncSettings};
use engine_core::{
    clock::Clock,
    connectors::sink::TabularSink,
    error::SinkError,
    metrics::Metrics,
    retry::{RetryDisposition, RetryError, RetryPolicy},
};
use engine_processing::{
    dedup::{Deduplicator, Delta, SinkIndex},
    fetcher::PageFetcher,
    filter::RecordFilter,
    sorter::Sorter,
};
use model::{
    core::window::SyncWindow,
    execution::summary::{RunState, RunSummary, SkipReason},
    records::{
        row::{SheetContents, SheetRow},
        sale::{SALE_COLUMNS, SaleRecord, sale_header},
    },
};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Per-run knobs that are not owned by the fetcher.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub retention_days: u32,
    pub page_size: usize,
    pub rules: FilterRules,
    pub sort_direction: SortDirection,
    pub evict: bool,
    pub sink_retry: RetryPolicy,
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            retention_days: 14,
            page_size: 1000,
            rules: FilterRules::default(),
            sort_direction: SortDirection::default(),
            evict: false,
            sink_retry: RetryPolicy::for_sink(Duration::from_secs(2)),
            dry_run: false,
        }
    }
}

impl SyncOptions {
    pub fn from_settings(settings: &SyncSettings, dry_run: bool) -> Self {
        SyncOptions {
            retention_days: settings.retention_days,
            page_size: settings.page_size,
            rules: settings.rules.clone(),
            sort_direction: settings.sort_direction,
            evict: settings.evict,
            sink_retry: RetryPolicy::for_sink(settings.sink_retry_delay),
            dry_run,
        }
    }
}

/// How far the Writing stage got.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// The sheet had no header and was written from scratch.
    pub initialized: bool,
    pub appended: usize,
    pub pruned: usize,
}

/// Result of Merging and Sorting, ready to write.
struct Plan {
    contents: SheetContents,
    index: SinkIndex,
    delta: Delta,
}

/// Drives one end-to-end pass: fetch, filter, merge, sort, write.
pub struct SyncOrchestrator {
    fetcher: PageFetcher,
    sink: Arc<dyn TabularSink>,
    clock: Arc<dyn Clock>,
    options: SyncOptions,
    metrics: Metrics,
    state_tx: watch::Sender<RunState>,
}

impl SyncOrchestrator {
    pub fn new(
        fetcher: PageFetcher,
        sink: Arc<dyn TabularSink>,
        clock: Arc<dyn Clock>,
        options: SyncOptions,
    ) -> Self {
        let metrics = fetcher.metrics().clone();
        let (state_tx, _) = watch::channel(RunState::Idle);
        SyncOrchestrator {
            fetcher,
            sink,
            clock,
            options,
            metrics,
            state_tx,
        }
    }

    /// Follows state transitions of every subsequent run.
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> RunState {
        *self.state_tx.borrow()
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn sink_name(&self) -> String {
        self.sink.name()
    }

    /// Runs one pass. Failures end up in the summary rather than as `Err`.
    pub async fn run(&self, cancel: &CancellationToken) -> RunSummary {
        let started_at = self.clock.now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut summary = RunSummary::new(run_id, started_at, self.options.dry_run);

        info!(
            "Sync run {} started{}",
            summary.run_id,
            if summary.dry_run { " (dry run)" } else { "" }
        );
        self.publish(RunState::Idle);

        match self.execute(&mut summary, cancel).await {
            Ok(state) => self.transition(&mut summary, state),
            Err(err) => {
                error!("Sync run {} failed in {}: {err}", summary.run_id, summary.state);
                summary.error = Some(err.to_string());
                self.transition(&mut summary, RunState::Failed);
            }
        }

        summary.finished_at = self.clock.now();
        info!(
            "Sync run {} finished: state={} appended={} pruned={} skipped={}",
            summary.run_id,
            summary.state,
            summary.appended,
            summary.pruned,
            summary.skipped.total()
        );
        summary
    }

    async fn execute(
        &self,
        summary: &mut RunSummary,
        cancel: &CancellationToken,
    ) -> Result<RunState, SyncError> {
        let window = self.clock.window(self.options.retention_days)?;
        summary.window = Some(window);
        info!("Window {} .. {}", window.start(), window.end());

        if cancel.is_cancelled() {
            return Ok(self.cancelled(summary, "before fetching"));
        }

        self.transition(summary, RunState::Fetching);
        let Some(records) = self.fetch(summary, &window, cancel).await? else {
            return Ok(self.cancelled(summary, "while fetching"));
        };

        if cancel.is_cancelled() {
            return Ok(self.cancelled(summary, "before filtering"));
        }

        self.transition(summary, RunState::Filtering);
        let filter = RecordFilter::new(self.options.rules.clone(), window);
        let filtered = filter.filter_all(&records);
        summary.skipped.add(SkipReason::InvalidDate, filtered.skipped.invalid_date);
        summary.skipped.add(SkipReason::FilteredOut, filtered.skipped.filtered_out);
        summary.skipped.add(SkipReason::Malformed, filtered.skipped.malformed);
        if filtered.skipped.total() > 0 {
            warn!(
                "Skipped {} of {} records (invalid_date={}, filtered_out={}, malformed={})",
                filtered.skipped.total(),
                records.len(),
                filtered.skipped.invalid_date,
                filtered.skipped.filtered_out,
                filtered.skipped.malformed
            );
        }

        if cancel.is_cancelled() {
            return Ok(self.cancelled(summary, "before merging"));
        }

        self.transition(summary, RunState::Merging);
        let dedup = Deduplicator::new(self.options.evict);
        let (accepted, duplicates) = dedup.coalesce(filtered.accepted);
        summary.skipped.add(SkipReason::DuplicateInBatch, duplicates);
        summary.accepted = accepted.len() as u64;

        let contents = self.with_sink_retry(summary, "read", || self.sink.read_all()).await?;
        let index = SinkIndex::from_sheet(&contents, &self.options.rules.timestamp_format)?;
        let delta = dedup.compute_delta(&accepted, &index, &window);
        info!(
            "Sink holds {} transactions; {} new, {} to prune",
            index.len(),
            delta.to_append.len(),
            delta.to_prune.len()
        );

        if cancel.is_cancelled() {
            return Ok(self.cancelled(summary, "before sorting"));
        }

        self.transition(summary, RunState::Sorting);
        let delta = Delta {
            to_append: Sorter::new(self.options.sort_direction).order(delta.to_append),
            to_prune: delta.to_prune,
        };

        if cancel.is_cancelled() {
            return Ok(self.cancelled(summary, "before writing"));
        }

        if self.options.dry_run {
            summary.appended = delta.to_append.len() as u64;
            summary.pruned = delta.to_prune.len() as u64;
            info!(
                "Dry run: would append {} rows and prune {}",
                summary.appended, summary.pruned
            );
            return Ok(RunState::Idle);
        }

        self.transition(summary, RunState::Writing);
        let plan = Plan {
            contents,
            index,
            delta,
        };
        let mut report = WriteReport::default();
        let written = self.write(summary, &plan, &mut report).await;
        summary.appended = report.appended as u64;
        summary.pruned = report.pruned as u64;
        written?;

        Ok(RunState::Idle)
    }

    /// `None` when cancelled mid-pagination.
    async fn fetch(
        &self,
        summary: &mut RunSummary,
        window: &SyncWindow,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<serde_json::Value>>, SyncError> {
        let mut retries = 0u64;
        let outcome = self
            .fetcher
            .fetch_window(
                window,
                self.options.page_size,
                cancel,
                &mut |_| {
                    retries += 1;
                    self.publish(RunState::Retrying);
                },
                &mut |_| self.publish(RunState::Fetching),
            )
            .await?;

        summary.retries += retries;
        summary.pages_fetched = outcome.pages.len() as u64;
        summary.fetched = outcome.record_count() as u64;

        if outcome.cancelled {
            return Ok(None);
        }
        if let Some(stopped) = &outcome.stopped_by {
            warn!("Fetch ended early; continuing with partial results: {stopped}");
            summary.fetch_exhausted = true;
        }
        info!(
            "Fetched {} records in {} pages ({} requests)",
            summary.fetched, summary.pages_fetched, outcome.requests
        );

        Ok(Some(outcome.records().cloned().collect()))
    }

    /// Writes the delta. Appends first; pruning rewrites the sheet only after
    /// the append succeeded.
    async fn write(
        &self,
        summary: &mut RunSummary,
        plan: &Plan,
        report: &mut WriteReport,
    ) -> Result<(), SyncError> {
        let format = &self.options.rules.timestamp_format;
        let Plan {
            contents,
            index,
            delta,
        } = plan;

        if contents.is_uninitialized() {
            let header = sale_header();
            let rows = render_rows(&delta.to_append, &header, format);
            self.with_sink_retry(summary, "initialize", || {
                self.sink.clear_and_rewrite(&header, &rows)
            })
            .await?;
            report.initialized = true;
            report.appended = rows.len();
            self.metrics.increment_rows_written(rows.len() as u64);
            info!("Initialized {} with {} rows", self.sink.name(), rows.len());
            return Ok(());
        }

        let rows = render_rows(&delta.to_append, &contents.header, format);
        if !rows.is_empty() {
            self.with_sink_retry(summary, "append", || self.sink.append_rows(&rows))
                .await?;
            report.appended = rows.len();
            self.metrics.increment_rows_written(rows.len() as u64);
            info!("Appended {} rows to {}", rows.len(), self.sink.name());
        } else {
            info!("Nothing new to append");
        }

        if let Some(key_column) = index.key_column()
            && !delta.to_prune.is_empty()
        {
            let mut kept = delta.retain(&contents.rows, key_column);
            kept.extend(rows);
            self.with_sink_retry(summary, "prune", || {
                self.sink.clear_and_rewrite(&contents.header, &kept)
            })
            .await?;
            report.pruned = delta.to_prune.len();
            info!("Pruned {} aged-out rows", report.pruned);
        }

        debug!("Write report: {report:?}");
        Ok(())
    }

    /// One retry per sink call, after `options.sink_retry`'s delay.
    async fn with_sink_retry<T, F, Fut>(
        &self,
        summary: &mut RunSummary,
        action: &str,
        op: F,
    ) -> Result<T, SinkError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SinkError>>,
    {
        let mut retries = 0u64;
        let result = self
            .options
            .sink_retry
            .run_with(
                self.clock.as_ref(),
                op,
                |_| RetryDisposition::Retry,
                |retry| {
                    retries += 1;
                    self.metrics.increment_sink_retries(1);
                    warn!(
                        "Sink {action} failed: {}; retrying in {:?}",
                        retry.error, retry.delay
                    );
                },
            )
            .await
            .map_err(RetryError::into_inner);
        summary.retries += retries;
        result
    }

    fn cancelled(&self, summary: &RunSummary, stage: &str) -> RunState {
        warn!("Sync run {} cancelled {stage}; nothing written", summary.run_id);
        RunState::Cancelled
    }

    fn transition(&self, summary: &mut RunSummary, state: RunState) {
        debug!("Run {}: {} -> {}", summary.run_id, summary.state, state);
        summary.state = state;
        self.publish(state);
    }

    fn publish(&self, state: RunState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }
}

/// Renders records in the column order of `header`. Columns the record does
/// not know are left blank.
fn render_rows(records: &[SaleRecord], header: &[String], format: &str) -> Vec<SheetRow> {
    let positions: Vec<Option<usize>> = header
        .iter()
        .map(|name| {
            SALE_COLUMNS
                .iter()
                .position(|c| c.eq_ignore_ascii_case(name.trim()))
        })
        .collect();

    records
        .iter()
        .map(|record| {
            let cells = record.to_row(format);
            positions
                .iter()
                .map(|pos| pos.and_then(|i| cells.get(i).cloned()).unwrap_or_default())
                .collect()
        })
        .collect()
}
