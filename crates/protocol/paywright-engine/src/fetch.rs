//! Resource fetching seam.
//!
//! The engine assumes an existing fetch primitive; this trait is that
//! boundary. The default implementation is a thin reqwest wrapper that maps
//! timeouts and transport failures into the engine taxonomy.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use paywright_x402::{HEADER_PAYMENT_REQUIRED, HEADER_PAYMENT_RESPONSE};

use crate::error::{EngineError, EngineResult};

/// A fetched HTTP response, reduced to what detection and settlement need.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    /// Raw `X-PAYMENT-REQUIRED` header, when present.
    pub payment_required_header: Option<String>,
    /// Raw `X-PAYMENT-RESPONSE` header, when present.
    pub payment_response_header: Option<String>,
    pub body: String,
}

/// Fetch primitive the orchestrator drives. Seam trait so flows can be
/// exercised without a network.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET a resource with extra request headers.
    async fn fetch(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> EngineResult<FetchedResponse>;

    /// POST a JSON body, returning the raw response.
    async fn post_json(
        &self,
        url: &str,
        body: &Value,
        timeout: Duration,
    ) -> EngineResult<FetchedResponse>;
}

/// Default reqwest-backed fetcher.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> EngineResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| EngineError::NetworkError(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn map_error(e: reqwest::Error, timeout: Duration) -> EngineError {
        if e.is_timeout() {
            EngineError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }
        } else {
            EngineError::NetworkError(e.to_string())
        }
    }

    async fn into_fetched(response: reqwest::Response) -> EngineResult<FetchedResponse> {
        let status = response.status().as_u16();
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let content_type = header("content-type");
        let payment_required_header = header(HEADER_PAYMENT_REQUIRED);
        let payment_response_header = header(HEADER_PAYMENT_RESPONSE);
        let body = response
            .text()
            .await
            .map_err(|e| EngineError::NetworkError(e.to_string()))?;
        Ok(FetchedResponse {
            status,
            content_type,
            payment_required_header,
            payment_response_header,
            body,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> EngineResult<FetchedResponse> {
        let mut request = self.client.get(url).timeout(timeout);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        let response = request
            .send()
            .await
            .map_err(|e| Self::map_error(e, timeout))?;
        Self::into_fetched(response).await
    }

    async fn post_json(
        &self,
        url: &str,
        body: &Value,
        timeout: Duration,
    ) -> EngineResult<FetchedResponse> {
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| Self::map_error(e, timeout))?;
        Self::into_fetched(response).await
    }
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher").finish_non_exhaustive()
    }
}
