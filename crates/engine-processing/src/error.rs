use connectors::http::error::ApiError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    /// 401/403 from the source. Fatal to the run.
    #[error("Source rejected credentials (status {status})")]
    Auth { status: u16 },

    /// A successful response without a usable records list. Fatal to the run.
    #[error("Malformed response at offset {offset}: {detail}")]
    MalformedResponse { offset: usize, detail: String },

    /// The request could not be built from the configuration. Fatal to the run.
    #[error("Invalid source request: {0}")]
    InvalidRequest(String),

    /// Transient failures outlasted the retry policy.
    #[error("Fetch at offset {offset} failed after {attempts} attempts: {source}")]
    Exhausted {
        offset: usize,
        attempts: usize,
        #[source]
        source: ApiError,
    },

    /// A non-retryable, non-auth refusal (e.g. 400 or 404).
    #[error("Source refused request at offset {offset}: {source}")]
    Rejected {
        offset: usize,
        #[source]
        source: ApiError,
    },
}

impl FetchError {
    /// Only auth, contract and configuration errors abort the run; anything else keeps
    /// the pages gathered so far.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FetchError::Auth { .. }
                | FetchError::MalformedResponse { .. }
                | FetchError::InvalidRequest(_)
        )
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IndexError {
    #[error("Sheet header has no '{0}' column")]
    MissingKeyColumn(String),
}
