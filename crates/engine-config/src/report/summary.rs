use crate::error::ReportGenerationError;
use model::execution::summary::RunSummary;
use std::path::Path;

pub fn render_json(summary: &RunSummary) -> Result<String, ReportGenerationError> {
    Ok(serde_json::to_string_pretty(summary)?)
}

pub async fn write_report(
    summary: &RunSummary,
    path: impl AsRef<Path>,
) -> Result<(), ReportGenerationError> {
    let json = render_json(summary)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

/// One line per run, for logs and the history listing.
pub fn one_line(summary: &RunSummary) -> String {
    let mut line = format!(
        "{} {} state={} fetched={} accepted={} skipped[invalid_date={} filtered={} duplicate={} malformed={}] appended={} pruned={} retries={}",
        summary.started_at.format("%Y-%m-%d %H:%M:%S"),
        summary.run_id,
        summary.state,
        summary.fetched,
        summary.accepted,
        summary.skipped.invalid_date,
        summary.skipped.filtered_out,
        summary.skipped.duplicate_in_batch,
        summary.skipped.malformed,
        summary.appended,
        summary.pruned,
        summary.retries,
    );
    if summary.fetch_exhausted {
        line.push_str(" partial");
    }
    if summary.dry_run {
        line.push_str(" dry-run");
    }
    if let Some(err) = &summary.error {
        line.push_str(&format!(" error=\"{err}\""));
    }
    line
}
