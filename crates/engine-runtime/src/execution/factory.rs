use crate::{
    error::SyncError,
    execution::orchestrator::{SyncOptions, SyncOrchestrator},
};
use connectors::{file::csv::sheet::CsvSheet, http::client::SalesApiClient};
use engine_config::settings::SyncSettings;
use engine_core::{
    clock::Clock,
    connectors::{
        sink::{TabularSink, memory::MemorySheet},
        source::SalesSource,
    },
    metrics::Metrics,
};
use engine_processing::fetcher::PageFetcher;
use std::sync::Arc;
use tracing::info;

pub fn create_source(settings: &SyncSettings) -> Result<Arc<dyn SalesSource>, SyncError> {
    let client = SalesApiClient::new(&settings.api)?;
    info!("Source: {}", client.endpoint());
    Ok(Arc::new(client))
}

/// The CSV sheet at `sink_path`. A dry run works on an in-memory copy so
/// the file is never touched.
pub async fn create_sink(
    settings: &SyncSettings,
    dry_run: bool,
) -> Result<Arc<dyn TabularSink>, SyncError> {
    let sheet = CsvSheet::new(settings.sink_path.clone());
    if !dry_run {
        info!("Sink: {}", sheet.name());
        return Ok(Arc::new(sheet));
    }

    let contents = TabularSink::read_all(&sheet).await?;
    info!("Sink: in-memory copy of {}", sheet.name());
    Ok(Arc::new(MemorySheet::with_contents(contents)))
}

pub fn create_fetcher(
    settings: &SyncSettings,
    source: Arc<dyn SalesSource>,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
) -> PageFetcher {
    PageFetcher::new(
        source,
        clock,
        settings.retry.clone(),
        settings.records_key.clone(),
    )
    .with_metrics(metrics)
}

pub async fn create_orchestrator(
    settings: &SyncSettings,
    dry_run: bool,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
) -> Result<SyncOrchestrator, SyncError> {
    let source = create_source(settings)?;
    let sink = create_sink(settings, dry_run).await?;
    let fetcher = create_fetcher(settings, source, clock.clone(), metrics);

    Ok(SyncOrchestrator::new(
        fetcher,
        sink,
        clock,
        SyncOptions::from_settings(settings, dry_run),
    ))
}
