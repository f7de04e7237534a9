use crate::error::CliError;
use engine_config::report::summary::{render_json, write_report};
use engine_runtime::execution::executor::SourceCheck;
use model::execution::summary::RunSummary;

pub async fn emit_summary(summary: &RunSummary, output: Option<String>) -> Result<(), CliError> {
    match output {
        Some(path) => write_report(summary, path).await?,
        None => println!("{}", render_json(summary)?),
    }
    Ok(())
}

pub fn print_history(runs: &[RunSummary], as_json: bool) -> Result<(), CliError> {
    if as_json {
        let json = serde_json::to_string_pretty(runs).map_err(CliError::JsonSerialize)?;
        println!("{json}");
        return Ok(());
    }

    if runs.is_empty() {
        println!("No runs recorded yet.");
        return Ok(());
    }

    println!(
        "{:<20} {:<10} {:>8} {:>8} {:>8} {:>8} {:>7}  {}",
        "Started", "State", "Fetched", "Accepted", "Skipped", "Appended", "Pruned", "Run ID"
    );
    for run in runs {
        let mut state = run.state.to_string();
        if run.dry_run {
            state.push('*');
        }
        println!(
            "{:<20} {:<10} {:>8} {:>8} {:>8} {:>8} {:>7}  {}",
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            state,
            run.fetched,
            run.accepted,
            run.skipped.total(),
            run.appended,
            run.pruned,
            run.run_id
        );
        if let Some(err) = &run.error {
            println!("    {err}");
        }
    }
    Ok(())
}

pub fn print_source_check(check: &SourceCheck) {
    println!("Endpoint: {}", check.endpoint);
    println!("Records:  {} ({}ms)", check.records, check.took_ms);
    println!(
        "Envelope: ok{}",
        if check.last_page { ", single page" } else { ", more pages available" }
    );
}
