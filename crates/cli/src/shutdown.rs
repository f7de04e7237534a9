use model::execution::summary::{RunState, RunSummary};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Listens for SIGINT and SIGTERM and cancels the given token. A run that
/// has reached Writing finishes; anything earlier stops at the next stage
/// boundary.
pub fn register_handlers(cancel_token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install SIGINT handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), stopping after the current stage");
            }
            _ = terminate => {
                info!("Received SIGTERM, stopping after the current stage");
            }
        }

        cancel_token.cancel();
    });
}

/// Exit codes for the CLI application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    RunFailed = 2,
    ShutdownRequested = 130, // Standard exit code for SIGINT
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn for_summary(summary: &RunSummary) -> Self {
        match summary.state {
            RunState::Failed => ExitCode::RunFailed,
            RunState::Cancelled => ExitCode::ShutdownRequested,
            _ => ExitCode::Success,
        }
    }
}
