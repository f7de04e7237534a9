use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportGenerationError {
    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to deliver report: {0}")]
    Delivery(String),
}
