use crate::{error::ReportGenerationError, settings::ReportTarget};
use engine_core::retry::{RetryDisposition, RetryPolicy};
use model::execution::summary::RunSummary;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug)]
enum DeliveryError {
    Transport(reqwest::Error),
    Status(reqwest::StatusCode),
}

fn classify(err: &DeliveryError) -> RetryDisposition {
    match err {
        DeliveryError::Transport(_) => RetryDisposition::Retry,
        DeliveryError::Status(status) if status.is_server_error() => RetryDisposition::Retry,
        DeliveryError::Status(_) => RetryDisposition::Stop,
    }
}

/// Sends the finished run summary to the configured callback URL.
pub async fn send_report(
    summary: &RunSummary,
    target: &ReportTarget,
) -> Result<(), ReportGenerationError> {
    let client = reqwest::Client::new();
    let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_secs(5));

    let result = policy
        .run(
            || {
                let mut request = client.post(&target.url).json(summary);
                if let Some(token) = &target.token {
                    request = request.bearer_auth(token);
                }
                async move {
                    let response = request.send().await.map_err(DeliveryError::Transport)?;
                    if response.status().is_success() {
                        Ok(())
                    } else {
                        warn!("Report callback answered {}", response.status());
                        Err(DeliveryError::Status(response.status()))
                    }
                }
            },
            classify,
        )
        .await;

    match result {
        Ok(()) => {
            info!("Run report for {} delivered", summary.run_id);
            Ok(())
        }
        Err(err) => Err(ReportGenerationError::Delivery(format!(
            "{:?}",
            err.into_inner()
        ))),
    }
}
