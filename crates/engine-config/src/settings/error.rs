use thiserror::Error;

/// Errors raised while loading sync settings from the environment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    /// A required variable was not set or was blank.
    #[error("Missing required setting: {0}")]
    Missing(String),

    /// A variable was set to a value that cannot be used.
    #[error("Invalid value for {key} ({value:?}): {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

impl SettingsError {
    pub fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        SettingsError::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
