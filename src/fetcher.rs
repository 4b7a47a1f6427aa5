//! Download stage.
//!
//! Issues exactly one GET and classifies what came back. There is no retry
//! here: a failed attempt is final for the run, redelivery belongs to whatever
//! produced the trigger.

use serde::{Deserialize, Serialize};

use crate::domain::outcome::Outcome;
use crate::domain::submission::FetchResult;
use crate::http::HttpClient;

/// Why a download failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum FetchFailure {
    /// The server answered with a non-2xx status.
    HttpStatus { status: u16 },

    /// Connection, DNS, TLS, timeout, or body read failure.
    NetworkError { error: String },

    /// 2xx with a zero-length body.
    EmptyBody,
}

impl FetchFailure {
    /// Returns a human-readable error message for this failure.
    pub fn to_error_message(&self) -> String {
        match self {
            FetchFailure::HttpStatus { status } => {
                format!("download failed with status {}", status)
            }
            FetchFailure::NetworkError { error } => format!("network error: {}", error),
            FetchFailure::EmptyBody => "downloaded file is empty".to_string(),
        }
    }
}

impl From<FetchFailure> for Outcome {
    fn from(failure: FetchFailure) -> Self {
        Outcome::FetchFailed {
            reason: failure.to_error_message(),
        }
    }
}

/// Download `source_url` fully into memory.
#[tracing::instrument(skip(http_client))]
pub async fn fetch<H: HttpClient>(
    http_client: &H,
    source_url: &str,
    timeout_ms: u64,
) -> Result<FetchResult, FetchFailure> {
    let response = match http_client.get(source_url, timeout_ms).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, "Download failed at transport level");
            return Err(FetchFailure::NetworkError { error: e.detail() });
        }
    };

    if !response.is_success() {
        tracing::warn!(status = response.status, "Download returned non-success status");
        return Err(FetchFailure::HttpStatus {
            status: response.status,
        });
    }

    if response.body.is_empty() {
        tracing::warn!("Download returned an empty body");
        return Err(FetchFailure::EmptyBody);
    }

    let size_bytes = response.body.len() as u64;
    tracing::info!(size_bytes, "Downloaded submission");

    Ok(FetchResult {
        content: response.body,
        size_bytes,
        source_url: source_url.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IntakeError;
    use crate::http::{HttpResponse, MockHttpClient};

    const URL: &str = "http://x/file.zip";

    #[tokio::test]
    async fn test_fetch_success() {
        let http = MockHttpClient::new();
        http.add_response(
            URL,
            Ok(HttpResponse {
                status: 200,
                body: vec![9u8; 1024],
            }),
        );

        let fetched = fetch(&http, URL, 3000).await.unwrap();
        assert_eq!(fetched.size_bytes, 1024);
        assert_eq!(fetched.content.len(), 1024);
        assert_eq!(fetched.source_url, URL);
        assert_eq!(http.get_calls()[0].timeout_ms, 3000);
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let http = MockHttpClient::new();
        http.add_response(
            URL,
            Ok(HttpResponse {
                status: 404,
                body: b"not found".to_vec(),
            }),
        );

        let failure = fetch(&http, URL, 3000).await.unwrap_err();
        assert_eq!(failure, FetchFailure::HttpStatus { status: 404 });
        assert_eq!(
            Outcome::from(failure),
            Outcome::FetchFailed {
                reason: "download failed with status 404".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_redirect_status_is_failure() {
        let http = MockHttpClient::new();
        http.add_response(
            URL,
            Ok(HttpResponse {
                status: 304,
                body: vec![],
            }),
        );

        let failure = fetch(&http, URL, 3000).await.unwrap_err();
        assert_eq!(failure.to_error_message(), "download failed with status 304");
    }

    #[tokio::test]
    async fn test_fetch_empty_body() {
        let http = MockHttpClient::new();
        http.add_response(
            URL,
            Ok(HttpResponse {
                status: 200,
                body: vec![],
            }),
        );

        let failure = fetch(&http, URL, 3000).await.unwrap_err();
        assert_eq!(failure, FetchFailure::EmptyBody);
        assert_eq!(failure.to_error_message(), "downloaded file is empty");
    }

    #[tokio::test]
    async fn test_fetch_network_error() {
        let http = MockHttpClient::new();
        http.add_response(
            URL,
            Err(IntakeError::Other(anyhow::anyhow!("connection refused"))),
        );

        let failure = fetch(&http, URL, 3000).await.unwrap_err();
        assert_eq!(
            failure.to_error_message(),
            "network error: connection refused"
        );
    }

    /// Client with no `Clone` impl; fetching only needs `&H`.
    struct FixedClient(u16, Vec<u8>);

    #[async_trait::async_trait]
    impl HttpClient for FixedClient {
        async fn get(&self, _url: &str, _timeout_ms: u64) -> crate::error::Result<HttpResponse> {
            Ok(HttpResponse {
                status: self.0,
                body: self.1.clone(),
            })
        }
    }

    #[tokio::test]
    async fn test_fetch_with_non_clone_client() {
        let http = FixedClient(200, vec![1, 2, 3]);

        let fetched = fetch(&http, URL, 3000).await.unwrap();
        assert_eq!(fetched.size_bytes, 3);
        assert_eq!(fetched.source_url, URL);
    }
}
