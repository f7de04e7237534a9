use thiserror::Error;

const MAX_BODY_CHARS: usize = 512;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Source responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response body: {0}")]
    Decode(String),

    #[error("Request failed: {0}")]
    Request(String),

    /// The request could not be built, e.g. an unusable URL.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    pub fn status(status: u16, body: &str) -> Self {
        ApiError::Status {
            status,
            body: body.chars().take(MAX_BODY_CHARS).collect(),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 401 and 403 mean the credentials are wrong; retrying cannot help.
    pub fn is_auth(&self) -> bool {
        matches!(self.status_code(), Some(401) | Some(403))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            ApiError::InvalidRequest(err.to_string())
        } else if err.is_timeout() {
            ApiError::Timeout(err.to_string())
        } else if err.is_connect() {
            ApiError::Connection(err.to_string())
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ApiError::status(status.as_u16(), &err.to_string())
        } else {
            ApiError::Request(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_statuses() {
        assert!(ApiError::status(401, "").is_auth());
        assert!(ApiError::status(403, "").is_auth());
        assert!(!ApiError::status(404, "").is_auth());
        assert!(!ApiError::Timeout("slow".into()).is_auth());
    }

    #[test]
    fn unbuildable_request_is_not_a_transport_error() {
        let err = reqwest::Client::new().get("not a url").build().unwrap_err();
        assert!(matches!(ApiError::from(err), ApiError::InvalidRequest(_)));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(4096);
        match ApiError::status(500, &body) {
            ApiError::Status { body, .. } => assert_eq!(body.len(), MAX_BODY_CHARS),
            other => panic!("unexpected {other:?}"),
        }
    }
}
