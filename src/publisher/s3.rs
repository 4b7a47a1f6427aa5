//! S3-protocol blob store.
//!
//! Also serves Google Cloud Storage through its S3-interoperable endpoint
//! (`STORAGE_ENDPOINT=https://storage.googleapis.com`, `STORAGE_SCHEME=gs`).
//!
//! The SDK's retry layer is disabled: one `put` is one request.

use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{Credentials, Region, http::HttpResponse, retry::RetryConfig},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    primitives::ByteStream,
};

use super::{BlobStore, object_location};
use crate::config::{StorageConfig, StorageCredentials};
use crate::error::{IntakeError, Result};

const ZIP_CONTENT_TYPE: &str = "application/zip";

#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
    scheme: String,
}

impl S3BlobStore {
    pub fn new(config: &StorageConfig, credentials: &StorageCredentials) -> Self {
        tracing::debug!(
            bucket = %config.bucket,
            endpoint = ?config.endpoint,
            region = %config.region,
            "Initializing blob store client"
        );

        let credentials = Credentials::new(
            &credentials.access_key_id,
            &credentials.secret_access_key,
            None,
            None,
            "intake",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.endpoint.is_some())
            .retry_config(RetryConfig::disabled());

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            scheme: config.scheme.clone(),
        }
    }
}

/// Short reason for an SDK failure. The raw response and body stay in the
/// logs; this text ends up in the submitter's email.
fn storage_error_reason<E: ProvideErrorMetadata>(err: &SdkError<E, HttpResponse>) -> String {
    match err {
        SdkError::ServiceError(_) => {
            let status = err.raw_response().map(|r| r.status().as_u16());
            let summary = match (err.code(), err.message()) {
                (Some(code), Some(message)) => Some(format!("{}: {}", code, message)),
                (Some(code), None) => Some(code.to_string()),
                (None, Some(message)) => Some(message.to_string()),
                (None, None) => None,
            };
            match (summary, status) {
                (Some(summary), Some(status)) => format!("{} (HTTP {})", summary, status),
                (Some(summary), None) => summary,
                (None, Some(status)) => format!("storage service returned HTTP {}", status),
                (None, None) => "storage service error".to_string(),
            }
        }
        SdkError::TimeoutError(_) => "request to storage timed out".to_string(),
        SdkError::DispatchFailure(_) => "could not connect to storage".to_string(),
        SdkError::ResponseError(_) => "unreadable response from storage".to_string(),
        SdkError::ConstructionFailure(_) => "storage request could not be built".to_string(),
        _ => "storage error".to_string(),
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    #[tracing::instrument(skip(self, content), fields(bucket = %self.bucket, size = content.len()))]
    async fn put(&self, key: &str, content: Vec<u8>) -> Result<String> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(ZIP_CONTENT_TYPE)
            .body(ByteStream::from(content))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(key = %key, error = %DisplayErrorContext(&e), "PutObject failed");
                IntakeError::Storage(storage_error_reason(&e))
            })?;

        let location = object_location(&self.scheme, &self.bucket, key);
        tracing::debug!(location = %location, "Object written");
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::KeyStrategy;

    fn config(endpoint: Option<String>) -> StorageConfig {
        StorageConfig {
            bucket: "bucket".to_string(),
            endpoint,
            region: "us-east-1".to_string(),
            scheme: "gs".to_string(),
            key_prefix: "submissions".to_string(),
            key_strategy: KeyStrategy::Filename,
            credentials_path: None,
        }
    }

    fn credentials() -> StorageCredentials {
        StorageCredentials {
            access_key_id: "AKIA".to_string(),
            secret_access_key: "secret".to_string(),
        }
    }

    #[tokio::test]
    async fn test_put_reports_storage_error() {
        // Nothing listens on port 9; the request fails at connect.
        let store = S3BlobStore::new(&config(Some("http://127.0.0.1:9".to_string())), &credentials());

        let err = store.put("submissions/file.zip", vec![1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, IntakeError::Storage(_)));
        assert_eq!(err.detail(), "could not connect to storage");
    }

    #[tokio::test]
    async fn test_put_failure_is_single_attempt_with_short_reason() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(503).set_body_string(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                 <Error><Code>SlowDown</Code><Message>Please reduce your request rate.</Message></Error>",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let store = S3BlobStore::new(&config(Some(server.uri())), &credentials());
        let err = store
            .put("submissions/file.zip", vec![7u8; 16])
            .await
            .unwrap_err();

        assert_eq!(server.received_requests().await.unwrap().len(), 1);
        assert_eq!(
            err.detail(),
            "SlowDown: Please reduce your request rate. (HTTP 503)"
        );
        assert!(!err.detail().contains("SdkBody"));
    }

    #[tokio::test]
    async fn test_put_returns_location() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/bucket/submissions/file.zip"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = S3BlobStore::new(&config(Some(server.uri())), &credentials());
        let location = store
            .put("submissions/file.zip", vec![7u8; 16])
            .await
            .unwrap();

        assert_eq!(location, "gs://bucket/submissions/file.zip");
    }
}
