//! Core types for a pipeline run.
//!
//! This module defines the type-safe run lifecycle using the typestate pattern.
//! Each submission progresses through distinct states, enforced at compile time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::outcome::Outcome;
use crate::recorder::AuditRecord;

/// Marker trait for valid submission states.
///
/// This trait enables the typestate pattern, ensuring that stage operations
/// are only performed on submissions in valid states.
pub trait SubmissionState: Send + Sync {}

/// One run of the pipeline for a single submission.
///
/// Uses the typestate pattern to ensure type-safe state transitions.
/// The generic parameter `S` represents the current stage of the run.
///
/// # Example
/// ```ignore
/// let started = Submission::new(request);
/// // Only `validate()` is available on a started submission
/// let validated = started.validate()?;
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Submission<S: SubmissionState> {
    /// Identifier of this run; reused as the audit record id.
    pub id: RunId,
    /// The current state of the run.
    pub state: S,
    /// The request being processed.
    pub data: SubmissionRequest,
}

/// A user's file submission, as parsed from the trigger payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    /// Where to download the file from.
    pub source_url: String,
    /// Who to tell about the outcome.
    pub notify_email: String,
}

/// Downloaded content, held in memory until the publisher consumes it.
#[derive(Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub content: Vec<u8>,
    pub size_bytes: u64,
    pub source_url: String,
}

impl std::fmt::Debug for FetchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchResult")
            .field("size_bytes", &self.size_bytes)
            .field("source_url", &self.source_url)
            .finish_non_exhaustive()
    }
}

/// Where a submission ended up in blob storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    /// Stable reference, `scheme://bucket/key`.
    pub location: String,
    /// Object key inside the bucket.
    pub key: String,
}

// ============================================================================
// Submission States
// ============================================================================

/// Run has been created from a parsed request; nothing has been checked yet.
#[derive(Debug, Clone, Serialize)]
pub struct Started {
    pub started_at: DateTime<Utc>,
}

impl SubmissionState for Started {}

/// The source URL passed validation.
#[derive(Debug, Clone, Serialize)]
pub struct Validated {
    pub started_at: DateTime<Utc>,
}

impl SubmissionState for Validated {}

/// The file has been downloaded into memory.
#[derive(Debug, Clone, Serialize)]
pub struct Fetched {
    pub started_at: DateTime<Utc>,
    #[serde(skip)]
    pub fetched: FetchResult,
}

impl SubmissionState for Fetched {}

/// The file is in blob storage. The downloaded bytes are gone at this point.
#[derive(Debug, Clone, Serialize)]
pub struct Published {
    pub started_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub published: PublishResult,
}

impl SubmissionState for Published {}

/// The run has a final outcome (success or any failure classification).
///
/// From here the only way forward is `notify()`.
#[derive(Debug, Clone, Serialize)]
pub struct Concluded {
    pub started_at: DateTime<Utc>,
    pub concluded_at: DateTime<Utc>,
    pub outcome: Outcome,
}

impl SubmissionState for Concluded {}

/// The user has been notified (or the attempt failed).
///
/// From here the only way forward is `record()`.
#[derive(Debug, Clone, Serialize)]
pub struct Notified {
    pub started_at: DateTime<Utc>,
    pub concluded_at: DateTime<Utc>,
    pub outcome: Outcome,
    pub notify_sent: bool,
}

impl SubmissionState for Notified {}

/// Unique identifier for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        RunId(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display only first 8 characters for readability in logs
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl From<Uuid> for RunId {
    fn from(uuid: Uuid) -> Self {
        RunId(uuid)
    }
}

impl std::ops::Deref for RunId {
    type Target = Uuid;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// ============================================================================
// Run Report
// ============================================================================

/// Everything the caller learns about a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    /// `None` only when the trigger payload was a bad request.
    pub outcome: Option<Outcome>,
    /// The record that was handed to the audit store.
    pub audit: AuditRecord,
    pub notify_sent: bool,
    /// Whether the audit store accepted the record.
    pub recorded: bool,
}
