use async_trait::async_trait;
use connectors::http::{client::SalesApiClient, error::ApiError, query::SalesQuery};
use serde_json::Value;

/// Where sales pages come from. The HTTP client is the production
/// implementation; tests script responses.
#[async_trait]
pub trait SalesSource: Send + Sync {
    fn name(&self) -> String;

    /// Requests one page and returns the raw response envelope.
    async fn fetch(&self, query: &SalesQuery) -> Result<Value, ApiError>;
}

#[async_trait]
impl SalesSource for SalesApiClient {
    fn name(&self) -> String {
        self.endpoint().to_string()
    }

    async fn fetch(&self, query: &SalesQuery) -> Result<Value, ApiError> {
        self.get_sales(query).await
    }
}
