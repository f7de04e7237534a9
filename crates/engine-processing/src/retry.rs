use connectors::http::error::ApiError;
use engine_core::retry::RetryDisposition;

/// Transient: timeouts, connection failures, 5xx and 429. Everything else
/// is final on the first attempt.
pub fn classify_api_error(err: &ApiError) -> RetryDisposition {
    match err {
        ApiError::Timeout(_) | ApiError::Connection(_) | ApiError::Request(_) => {
            RetryDisposition::Retry
        }
        ApiError::Status { status, .. } if *status >= 500 || *status == 429 => {
            RetryDisposition::Retry
        }
        ApiError::Status { .. } => RetryDisposition::Stop,
        ApiError::Decode(_) | ApiError::InvalidRequest(_) => RetryDisposition::Stop,
    }
}
