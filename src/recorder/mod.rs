//! Audit trail.
//!
//! Every run appends exactly one [`AuditRecord`]. Stores only ever append;
//! nothing in this crate reads records back except the test doubles.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::outcome::{Outcome, OutcomeKind};
use crate::domain::submission::{RunId, SubmissionRequest};
use crate::error::{IntakeError, Result};

pub mod jsonl;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use jsonl::JsonlAuditStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresAuditStore;

/// Durable trace of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: RunId,
    pub notify_email: String,
    pub source_url: String,
    pub outcome_kind: OutcomeKind,
    pub detail: String,
    pub notify_sent: bool,
    pub size_bytes: Option<u64>,
    pub location: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    /// Record for a run that produced an [`Outcome`].
    pub fn from_outcome(
        id: RunId,
        request: &SubmissionRequest,
        outcome: &Outcome,
        notify_sent: bool,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let (size_bytes, location) = match outcome {
            Outcome::Success {
                size_bytes,
                location,
            } => (Some(*size_bytes), Some(location.clone())),
            _ => (None, None),
        };

        Self {
            id,
            notify_email: request.notify_email.clone(),
            source_url: request.source_url.clone(),
            outcome_kind: outcome.kind(),
            detail: outcome.detail(),
            notify_sent,
            size_bytes,
            location,
            timestamp,
        }
    }

    /// Record for a trigger that never became a submission. Carries whatever
    /// fields could be extracted; missing ones are left empty.
    pub fn bad_request(
        id: RunId,
        reason: &str,
        source_url: Option<&str>,
        notify_email: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            notify_email: notify_email.unwrap_or_default().to_string(),
            source_url: source_url.unwrap_or_default().to_string(),
            outcome_kind: OutcomeKind::BadRequest,
            detail: reason.to_string(),
            notify_sent: false,
            size_bytes: None,
            location: None,
            timestamp,
        }
    }
}

/// Append-only audit log.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, record: &AuditRecord) -> Result<()>;
}

/// Append `record`, logging a failure on the operator channel.
///
/// The error is returned for the caller to note, not to act on.
#[tracing::instrument(skip(store, record), fields(run_id = %record.id, outcome = %record.outcome_kind))]
pub async fn record<A: AuditStore + ?Sized>(store: &A, record: &AuditRecord) -> Result<()> {
    match store.append(record).await {
        Ok(()) => {
            tracing::debug!("Audit record appended");
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                source_url = %record.source_url,
                detail = %record.detail,
                "Failed to append audit record"
            );
            Err(e)
        }
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

/// Audit store holding records in memory, with optional failure injection.
#[derive(Clone, Default)]
pub struct InMemoryAuditStore {
    records: Arc<Mutex<Vec<AuditRecord>>>,
    attempts: Arc<Mutex<usize>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent append fail with `message`.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock() = Some(message.to_string());
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    /// Append attempts, including failed ones.
    pub fn append_count(&self) -> usize {
        *self.attempts.lock()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, record: &AuditRecord) -> Result<()> {
        *self.attempts.lock() += 1;

        if let Some(message) = self.failure.lock().clone() {
            return Err(IntakeError::Audit(message));
        }

        self.records.lock().push(record.clone());
        Ok(())
    }
}
