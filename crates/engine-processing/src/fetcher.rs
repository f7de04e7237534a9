use crate::{error::FetchError, retry::classify_api_error};
use connectors::http::{error::ApiError, query::SalesQuery};
use engine_core::{
    clock::Clock,
    connectors::source::SalesSource,
    metrics::Metrics,
    retry::{RetryAttempt, RetryError, RetryPolicy},
};
use model::{
    core::window::SyncWindow,
    pagination::{cursor::PageCursor, page::Page},
};
use serde_json::Value;
use std::{sync::Arc, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Hook invoked before each retry sleep.
pub type RetryHook<'a> = dyn FnMut(&RetryAttempt<'_, ApiError>) + Send + 'a;

/// Hook invoked after each page is received.
pub type PageHook<'a> = dyn FnMut(&Page) + Send + 'a;

/// Everything gathered by one pass over the window's pages.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub pages: Vec<Page>,
    /// Number of page requests issued (retries of the same page not counted).
    pub requests: usize,
    /// Set when pagination ended early on a non-fatal error.
    pub stopped_by: Option<FetchError>,
    pub cancelled: bool,
}

impl FetchOutcome {
    pub fn record_count(&self) -> usize {
        self.pages.iter().map(Page::len).sum()
    }

    pub fn records(&self) -> impl Iterator<Item = &Value> {
        self.pages.iter().flat_map(|p| p.records.iter())
    }
}

/// Pulls pages of raw sales from the source, retrying transient failures.
pub struct PageFetcher {
    source: Arc<dyn SalesSource>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    records_key: String,
    metrics: Metrics,
}

impl PageFetcher {
    pub fn new(
        source: Arc<dyn SalesSource>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
        records_key: impl Into<String>,
    ) -> Self {
        PageFetcher {
            source,
            clock,
            retry,
            records_key: records_key.into(),
            metrics: Metrics::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub async fn fetch_page(
        &self,
        window: &SyncWindow,
        cursor: PageCursor,
    ) -> Result<Page, FetchError> {
        self.fetch_page_with(window, cursor, &mut |_| {}).await
    }

    /// Fetches one page. Retry state starts fresh on every call.
    pub async fn fetch_page_with(
        &self,
        window: &SyncWindow,
        cursor: PageCursor,
        on_retry: &mut RetryHook<'_>,
    ) -> Result<Page, FetchError> {
        let query = SalesQuery {
            start: window.start_date(),
            end: window.end_date(),
            offset: cursor.offset,
            limit: cursor.limit,
        };
        let started = Instant::now();

        let mut notify = |retry: &RetryAttempt<'_, ApiError>| {
            self.metrics.increment_fetch_retries(1);
            warn!(
                "Page at offset {} failed (attempt {}/{}): {}; retrying in {:?}",
                cursor.offset,
                retry.attempt,
                self.retry.max_attempts,
                retry.error,
                retry.delay
            );
            on_retry(retry);
        };

        let body = self
            .retry
            .run_with(
                self.clock.as_ref(),
                || self.source.fetch(&query),
                classify_api_error,
                &mut notify,
            )
            .await
            .map_err(|err| Self::fetch_error(cursor.offset, err))?;

        let records = self.extract_records(body, cursor.offset)?;
        self.metrics.increment_pages(1);
        self.metrics.increment_records(records.len() as u64);

        Ok(Page {
            cursor,
            records,
            took_ms: started.elapsed().as_millis(),
        })
    }

    /// Walks the window page by page until a short page, a non-fatal stop,
    /// or cancellation. Fatal errors are returned as `Err`.
    pub async fn fetch_window(
        &self,
        window: &SyncWindow,
        page_size: usize,
        cancel: &CancellationToken,
        on_retry: &mut RetryHook<'_>,
        on_page: &mut PageHook<'_>,
    ) -> Result<FetchOutcome, FetchError> {
        let mut outcome = FetchOutcome::default();
        let mut cursor = PageCursor::first(page_size);

        loop {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }

            outcome.requests += 1;
            match self.fetch_page_with(window, cursor, on_retry).await {
                Ok(page) => {
                    info!(
                        "Offset {} -> {} records ({}ms)",
                        cursor.offset,
                        page.len(),
                        page.took_ms
                    );
                    on_page(&page);
                    let terminal = page.is_terminal();
                    outcome.pages.push(page);
                    if terminal {
                        break;
                    }
                    cursor = cursor.advance();
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!("Stopping pagination early, keeping gathered pages: {err}");
                    outcome.stopped_by = Some(err);
                    break;
                }
            }
        }

        Ok(outcome)
    }

    fn fetch_error(offset: usize, err: RetryError<ApiError>) -> FetchError {
        match err {
            RetryError::AttemptsExceeded { error, attempts } => FetchError::Exhausted {
                offset,
                attempts,
                source: error,
            },
            RetryError::Fatal(error) if error.is_auth() => FetchError::Auth {
                status: error.status_code().unwrap_or_default(),
            },
            RetryError::Fatal(ApiError::Decode(detail)) => {
                FetchError::MalformedResponse { offset, detail }
            }
            RetryError::Fatal(ApiError::InvalidRequest(detail)) => {
                FetchError::InvalidRequest(detail)
            }
            RetryError::Fatal(error) => FetchError::Rejected {
                offset,
                source: error,
            },
        }
    }

    fn extract_records(&self, body: Value, offset: usize) -> Result<Vec<Value>, FetchError> {
        let key = &self.records_key;
        match body {
            Value::Object(mut envelope) => match envelope.remove(key) {
                Some(Value::Array(records)) => Ok(records),
                Some(other) => Err(FetchError::MalformedResponse {
                    offset,
                    detail: format!("'{key}' is not a list (got {})", json_kind(&other)),
                }),
                None => Err(FetchError::MalformedResponse {
                    offset,
                    detail: format!("envelope has no '{key}' key"),
                }),
            },
            other => Err(FetchError::MalformedResponse {
                offset,
                detail: format!("envelope is {} rather than an object", json_kind(&other)),
            }),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
