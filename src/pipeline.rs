//! Orchestrator for a single run.
//!
//! Owns the collaborators and drives a [`Submission`] through its states. A
//! run always ends with one notification attempt and one audit append (a bad
//! request skips the notification), and `run` never returns an error.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use tracing::Instrument;

use crate::domain::outcome::OutcomeKind;
use crate::domain::submission::{Concluded, RunId, RunReport, Started, Submission, SubmissionRequest};
use crate::http::HttpClient;
use crate::intake::{self, BadRequest};
use crate::notifier::{Mailer, Notifier, Sender};
use crate::publisher::{BlobStore, KeyHint};
use crate::recorder::{self, AuditRecord, AuditStore};

/// Per-run tunables.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Timeout for the single download attempt
    pub fetch_timeout_ms: u64,
    /// Where published objects land
    pub key_hint: KeyHint,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: crate::config::DEFAULT_FETCH_TIMEOUT_MS,
            key_hint: KeyHint::default(),
        }
    }
}

pub struct Pipeline<H, B, M, A>
where
    H: HttpClient,
    B: BlobStore + ?Sized,
    M: Mailer + ?Sized,
    A: AuditStore + ?Sized,
{
    http_client: Arc<H>,
    blob_store: Arc<B>,
    notifier: Notifier<M>,
    audit_store: Arc<A>,
    config: PipelineConfig,
}

impl<H, B, M, A> Pipeline<H, B, M, A>
where
    H: HttpClient,
    B: BlobStore + ?Sized,
    M: Mailer + ?Sized,
    A: AuditStore + ?Sized,
{
    pub fn new(
        http_client: Arc<H>,
        blob_store: Arc<B>,
        mailer: Arc<M>,
        sender: Sender,
        audit_store: Arc<A>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            http_client,
            blob_store,
            notifier: Notifier::new(mailer, sender),
            audit_store,
            config,
        }
    }

    /// Parse a raw trigger payload and run it.
    ///
    /// A payload that does not parse is recorded as `BadRequest` and nobody
    /// is emailed.
    pub async fn handle_trigger(&self, payload: &[u8]) -> RunReport {
        match intake::parse_trigger(payload) {
            Ok(request) => self.run(request).await,
            Err(bad) => self.record_bad_request(bad).await,
        }
    }

    /// Process one submission to completion.
    pub async fn run(&self, request: SubmissionRequest) -> RunReport {
        let started = Submission::new(request);
        let span = tracing::info_span!(
            "run",
            run_id = %started.id,
            source_url = %started.data.source_url
        );

        async move {
            tracing::info!("Starting submission run");

            let concluded = self.advance(started).await.unwrap_or_else(|early| *early);

            match concluded.state.outcome.reason() {
                None => tracing::info!(detail = %concluded.state.outcome.detail(), "Submission stored"),
                Some(reason) => tracing::warn!(
                    outcome = %concluded.state.outcome.kind(),
                    reason = %reason,
                    "Submission not stored"
                ),
            }

            let report = concluded
                .notify(&self.notifier)
                .await
                .record(&*self.audit_store)
                .await;

            tracing::info!(
                outcome = %report.audit.outcome_kind,
                notify_sent = report.notify_sent,
                recorded = report.recorded,
                "Run finished"
            );
            report
        }
        .instrument(span)
        .await
    }

    /// Validate, fetch and publish. Any failure comes back as the early
    /// `Concluded` submission.
    async fn advance(
        &self,
        started: Submission<Started>,
    ) -> Result<Submission<Concluded>, Box<Submission<Concluded>>> {
        let published = started
            .validate()?
            .fetch(&*self.http_client, self.config.fetch_timeout_ms)
            .await?
            .publish(&*self.blob_store, &self.config.key_hint)
            .await?;

        Ok(published.conclude())
    }

    async fn record_bad_request(&self, bad: BadRequest) -> RunReport {
        let run_id = RunId::new();
        tracing::warn!(run_id = %run_id, reason = %bad.reason, "Bad trigger payload");
        counter!("intake_runs_total", "outcome" => OutcomeKind::BadRequest.as_str()).increment(1);

        let audit = AuditRecord::bad_request(
            run_id,
            &bad.reason,
            bad.source_url.as_deref(),
            bad.notify_email.as_deref(),
            Utc::now(),
        );
        let recorded = recorder::record(&*self.audit_store, &audit).await.is_ok();
        if !recorded {
            counter!("intake_record_failures_total").increment(1);
        }

        RunReport {
            run_id,
            outcome: None,
            audit,
            notify_sent: false,
            recorded,
        }
    }
}
