use crate::{env::EnvManager, error::CliError, shutdown::ExitCode};
use clap::Parser;
use commands::Commands;
use engine_config::report::summary::one_line;
use engine_core::{clock::SystemClock, state::StateStore};
use engine_runtime::execution::{
    executor::{self, SyncExecutor},
    orchestrator::SyncOrchestrator,
    scheduler::TickScheduler,
};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod env;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "sales-sync",
    version = "0.1.0",
    about = "Sync approved sales from the EAD API into a sheet"
)]
struct Cli {
    #[arg(long, global = true, help = "Load variables from this .env file")]
    env_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    // Initialize logger
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{err}");
            ExitCode::GeneralError
        }
    };
    std::process::exit(code.as_i32());
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let mut env = EnvManager::from_process();
    if let Some(path) = &cli.env_file {
        env.load_from_file(path)?;
    }
    let settings = env.settings()?;

    let cancel = CancellationToken::new();
    shutdown::register_handlers(cancel.clone());

    match cli.command {
        Commands::Sync { dry_run, output } => {
            let executor = SyncExecutor::new(&settings, dry_run).await?;
            trace_states(executor.orchestrator());

            let summary = executor.execute(&cancel).await?;
            info!("{}", one_line(&summary));
            output::emit_summary(&summary, output).await?;
            Ok(ExitCode::for_summary(&summary))
        }
        Commands::Watch { every, dry_run } => {
            let executor = SyncExecutor::new(&settings, dry_run).await?;
            trace_states(executor.orchestrator());

            let scheduler =
                TickScheduler::new(executor, Arc::new(SystemClock), Duration::from_secs(every));
            let passes = scheduler
                .run(&cancel, |summary| info!("{}", one_line(summary)))
                .await?;
            info!("Stopped after {passes} passes");
            Ok(ExitCode::Success)
        }
        Commands::History { limit, json } => {
            let store = executor::open_state(&settings)?;
            let runs = store.recent_runs(limit).await?;
            output::print_history(&runs, json)?;
            Ok(ExitCode::Success)
        }
        Commands::CheckSource => {
            let check = executor::check_source(&settings).await?;
            output::print_source_check(&check);
            Ok(ExitCode::Success)
        }
    }
}

fn trace_states(orchestrator: &SyncOrchestrator) {
    let mut rx = orchestrator.subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let state = *rx.borrow_and_update();
            debug!("Run state: {state}");
        }
    });
}
