//! HTTP client abstraction for fetching submissions.
//!
//! This module defines the `HttpClient` trait to abstract HTTP request execution,
//! enabling testability with mock implementations.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Response from an HTTP GET.
///
/// The body is fully buffered; submissions are handed to blob storage in one piece.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Whether the status code is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for executing HTTP requests.
///
/// This abstraction allows for different implementations (production vs. testing)
/// and makes the fetch stage testable without making real HTTP calls.
///
/// # Example
/// ```ignore
/// let client = ReqwestHttpClient::new();
/// let response = client.get("https://example.com/file.zip", 5000).await?;
/// println!("Status: {}, {} bytes", response.status, response.body.len());
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Issue a single GET and buffer the whole body.
    ///
    /// # Errors
    /// Returns an error only for transport-level failures (connection refused,
    /// DNS, timeout, truncated body). A non-2xx status is *not* an error here;
    /// it is returned as a normal [`HttpResponse`].
    async fn get(&self, url: &str, timeout_ms: u64) -> Result<HttpResponse>;
}

// ============================================================================
// Production Implementation using reqwest
// ============================================================================

/// Production HTTP client using reqwest.
#[derive(Clone, Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Create a new reqwest-based HTTP client.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    #[tracing::instrument(skip(self))]
    async fn get(&self, url: &str, timeout_ms: u64) -> Result<HttpResponse> {
        tracing::debug!("Executing HTTP GET");

        let response = self
            .client
            .get(url)
            .timeout(Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(url = %url, error = %e, "HTTP request failed");
                e
            })?;

        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();

        tracing::info!(
            status = status,
            response_len = body.len(),
            "HTTP request completed"
        );

        Ok(HttpResponse { status, body })
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Mock HTTP client for testing.
///
/// Allows configuring predetermined responses for specific URLs without
/// making actual HTTP calls.
///
/// # Example
/// ```ignore
/// let mock = MockHttpClient::new();
/// mock.add_response(
///     "http://x/file.zip",
///     Ok(HttpResponse { status: 200, body: vec![0u8; 1024] }),
/// );
/// ```
#[derive(Clone, Default)]
pub struct MockHttpClient {
    responses: Arc<Mutex<HashMap<String, Vec<Result<HttpResponse>>>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

/// Record of a call made to the mock HTTP client.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub url: String,
    pub timeout_ms: u64,
}

impl MockHttpClient {
    /// Create a new mock HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predetermined response for a URL.
    ///
    /// Multiple responses can be added for the same URL - they will be
    /// returned in FIFO order.
    pub fn add_response(&self, url: &str, response: Result<HttpResponse>) {
        self.responses
            .lock()
            .entry(url.to_string())
            .or_default()
            .push(response);
    }

    /// Get all calls that have been made to this mock client.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, url: &str, timeout_ms: u64) -> Result<HttpResponse> {
        self.calls.lock().push(MockCall {
            url: url.to_string(),
            timeout_ms,
        });

        let response = {
            let mut responses = self.responses.lock();
            responses
                .get_mut(url)
                .filter(|queue| !queue.is_empty())
                .map(|queue| queue.remove(0))
        };

        response.unwrap_or_else(|| {
            Err(crate::error::IntakeError::Other(anyhow::anyhow!(
                "No mock response configured for GET {}",
                url
            )))
        })
    }
}
