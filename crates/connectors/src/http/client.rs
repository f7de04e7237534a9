use crate::{
    error::AdapterError,
    http::{error::ApiError, query::SalesQuery},
};
use reqwest::{StatusCode, Url, header::ACCEPT};
use serde_json::Value;
use std::{
    fmt,
    time::{Duration, Instant},
};
use tracing::debug;

const SALES_PATH: &str = "sales";
const AUTH_HEADER: &str = "x-auth-token";

#[derive(Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// HTTP client for the paginated sales listing.
///
/// Holds its own connection pool; build one per process and share it.
#[derive(Clone)]
pub struct SalesApiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl SalesApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, AdapterError> {
        if config.base_url.trim().is_empty() {
            return Err(AdapterError::MissingProperty("base_url".into()));
        }
        if config.api_key.trim().is_empty() {
            return Err(AdapterError::MissingProperty("api_key".into()));
        }

        let endpoint = sales_endpoint(&config.base_url);
        Url::parse(&endpoint).map_err(|e| {
            AdapterError::InvalidConfig(format!("base_url '{}': {e}", config.base_url))
        })?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AdapterError::InvalidConfig(e.to_string()))?;

        Ok(SalesApiClient {
            http,
            endpoint,
            api_key: config.api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Issues one page request and returns the decoded JSON body.
    ///
    /// Any status other than 200 is an error; the envelope itself is not
    /// inspected here.
    pub async fn get_sales(&self, query: &SalesQuery) -> Result<Value, ApiError> {
        let started = Instant::now();
        let response = self
            .http
            .get(&self.endpoint)
            .query(&query.to_params())
            .header(AUTH_HEADER, &self.api_key)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::status(status.as_u16(), &body));
        }

        let bytes = response.bytes().await?;
        debug!(
            "GET {} offset={} limit={} -> {} bytes in {}ms",
            self.endpoint,
            query.offset,
            query.limit,
            bytes.len(),
            started.elapsed().as_millis()
        );

        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

fn sales_endpoint(base_url: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    if base.ends_with(&format!("/{SALES_PATH}")) {
        base.to_string()
    } else {
        format!("{base}/{SALES_PATH}")
    }
}
