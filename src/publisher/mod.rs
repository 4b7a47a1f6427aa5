//! Blob storage stage.
//!
//! Derives an object key from the submission URL, hands the downloaded bytes
//! to a [`BlobStore`], and returns the stable location the store reports.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::domain::outcome::Outcome;
use crate::domain::submission::{FetchResult, PublishResult};
use crate::error::{IntakeError, Result};

pub mod s3;

pub use s3::S3BlobStore;

/// Durable object storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `content` under `key` and return the object's stable location
    /// (`scheme://bucket/key`).
    async fn put(&self, key: &str, content: Vec<u8>) -> Result<String>;
}

/// Format a location string the way every store reports it.
pub fn object_location(scheme: &str, bucket: &str, key: &str) -> String {
    format!("{}://{}/{}", scheme, bucket, key)
}

/// How object names are built from the submission filename.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStrategy {
    /// `<prefix>/<filename>`; a later submission of the same name replaces it.
    #[default]
    Filename,
    /// `<prefix>/<unix seconds>_<filename>`; keeps every submission.
    Timestamped,
}

impl std::str::FromStr for KeyStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "filename" => Ok(KeyStrategy::Filename),
            "timestamped" => Ok(KeyStrategy::Timestamped),
            _ => Err(format!("Invalid key strategy: {}", s)),
        }
    }
}

/// Where in the bucket a submission should land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyHint {
    /// Key prefix without trailing slash, e.g. `submissions`. May be empty.
    pub prefix: String,
    pub strategy: KeyStrategy,
}

impl Default for KeyHint {
    fn default() -> Self {
        Self {
            prefix: "submissions".to_string(),
            strategy: KeyStrategy::Filename,
        }
    }
}

/// Last non-empty path segment of `source_url`, restricted to
/// `[A-Za-z0-9._-]`. `None` when nothing usable is left.
pub fn filename_from_url(source_url: &str) -> Option<String> {
    let parsed = url::Url::parse(source_url).ok()?;
    let segment = parsed.path().split('/').filter(|s| !s.is_empty()).next_back()?;

    let sanitized: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.chars().all(|c| c == '.' || c == '_') {
        return None;
    }
    Some(sanitized)
}

/// Object key for a submission.
///
/// Falls back to `submission-<uuid>.zip` when the URL has no usable filename.
pub fn object_key(source_url: &str, hint: &KeyHint, now: chrono::DateTime<chrono::Utc>) -> String {
    let filename = filename_from_url(source_url)
        .unwrap_or_else(|| format!("submission-{}.zip", uuid::Uuid::new_v4()));

    let name = match hint.strategy {
        KeyStrategy::Filename => filename,
        KeyStrategy::Timestamped => format!("{}_{}", now.timestamp(), filename),
    };

    let prefix = hint.prefix.trim_matches('/');
    if prefix.is_empty() {
        name
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// Persist a fetched submission.
///
/// Consumes the fetch result. Any store error becomes
/// [`Outcome::PublishFailed`]; there is no retry.
#[tracing::instrument(skip(store, fetched, hint), fields(source_url = %fetched.source_url, size_bytes = fetched.size_bytes))]
pub async fn publish<B: BlobStore + ?Sized>(
    store: &B,
    fetched: FetchResult,
    hint: &KeyHint,
) -> std::result::Result<PublishResult, Outcome> {
    let key = object_key(&fetched.source_url, hint, chrono::Utc::now());

    match store.put(&key, fetched.content).await {
        Ok(location) => {
            tracing::info!(location = %location, "Stored submission");
            Ok(PublishResult { location, key })
        }
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Failed to store submission");
            Err(Outcome::PublishFailed {
                reason: format!("upload failed: {}", e.detail()),
            })
        }
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

/// In-memory blob store for testing.
///
/// Stores objects in a map and can be told to fail every write.
#[derive(Clone)]
pub struct InMemoryBlobStore {
    scheme: String,
    bucket: String,
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    failure: Arc<Mutex<Option<String>>>,
    puts: Arc<AtomicUsize>,
}

impl InMemoryBlobStore {
    pub fn new(scheme: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            bucket: bucket.into(),
            objects: Arc::new(Mutex::new(HashMap::new())),
            failure: Arc::new(Mutex::new(None)),
            puts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make every subsequent `put` fail with `message`.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock() = Some(message.to_string());
    }

    /// Content stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of `put` calls, successful or not.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, key: &str, content: Vec<u8>) -> Result<String> {
        self.puts.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.failure.lock().clone() {
            return Err(IntakeError::Storage(message));
        }

        self.objects.lock().insert(key.to_string(), content);
        Ok(object_location(&self.scheme, &self.bucket, key))
    }
}
