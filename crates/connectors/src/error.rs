use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    /// Invalid adapter configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Missing required property error.
    #[error("Missing required property: {0}")]
    MissingProperty(String),
}
