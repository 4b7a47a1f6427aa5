//! State transitions for a pipeline run using the typestate pattern.
//!
//! Each stage is a method that consumes the submission and returns it in its
//! next state. Failures do not return an error: they short-circuit straight to
//! `Submission<Concluded>` carrying the classified [`Outcome`].
//!
//! ```text
//! Submission<Started> ──validate()──> Submission<Validated> ──fetch()──> Submission<Fetched>
//!        │                                   │                                │
//!        └──(Rejected)──┐                    └──(FetchFailed)──┐              └──publish()──> Submission<Published>
//!                       │                                      │              └──(PublishFailed)──┐     │
//!                       ▼                                      ▼                                  ▼     │ conclude()
//!                  Submission<Concluded> ◄──────────────────────────────────────────────────────────────┘
//!                       │
//!                       └──notify()──> Submission<Notified> ──record()──> RunReport
//! ```
//!
//! `notify()` and `record()` consume `self` and exist only on `Concluded` and
//! `Notified` respectively, so every run that reaches `Concluded` is notified
//! at most once and recorded at most once, and there is no way back to an
//! earlier stage.

use chrono::{DateTime, Utc};
use metrics::counter;

use crate::domain::outcome::Outcome;
use crate::fetcher;
use crate::http::HttpClient;
use crate::notifier::{Mailer, Notifier};
use crate::publisher::{self, BlobStore, KeyHint};
use crate::recorder::{self, AuditRecord, AuditStore};
use crate::validator;

use super::state::{
    Concluded, Fetched, Notified, Published, RunId, RunReport, Started, Submission,
    SubmissionRequest, Validated,
};

/// Result of a stage: the submission in its next state, or the run concluded
/// early with a failure outcome.
pub type Step<S> = std::result::Result<Submission<S>, Box<Submission<Concluded>>>;

fn concluded_early(
    id: RunId,
    data: SubmissionRequest,
    started_at: DateTime<Utc>,
    outcome: Outcome,
) -> Box<Submission<Concluded>> {
    counter!("intake_runs_total", "outcome" => outcome.kind().as_str()).increment(1);
    Box::new(Submission {
        id,
        data,
        state: Concluded {
            started_at,
            concluded_at: Utc::now(),
            outcome,
        },
    })
}

impl Submission<Started> {
    /// Begin a run for a parsed request.
    pub fn new(data: SubmissionRequest) -> Self {
        Submission {
            id: RunId::new(),
            data,
            state: Started {
                started_at: Utc::now(),
            },
        }
    }

    /// Syntactic check of the source URL. No I/O.
    pub fn validate(self) -> Step<Validated> {
        let started_at = self.state.started_at;
        match validator::validate(&self.data.source_url) {
            Ok(()) => Ok(Submission {
                id: self.id,
                data: self.data,
                state: Validated { started_at },
            }),
            Err(outcome) => Err(concluded_early(self.id, self.data, started_at, outcome)),
        }
    }
}

impl Submission<Validated> {
    /// Download the source URL into memory.
    pub async fn fetch<H: HttpClient>(self, http_client: &H, timeout_ms: u64) -> Step<Fetched> {
        let started_at = self.state.started_at;
        match fetcher::fetch(http_client, &self.data.source_url, timeout_ms).await {
            Ok(fetched) => Ok(Submission {
                id: self.id,
                data: self.data,
                state: Fetched {
                    started_at,
                    fetched,
                },
            }),
            Err(failure) => Err(concluded_early(
                self.id,
                self.data,
                started_at,
                failure.into(),
            )),
        }
    }
}

impl Submission<Fetched> {
    /// Hand the downloaded bytes to blob storage.
    ///
    /// The content is moved into the store; nothing of it survives this call.
    pub async fn publish<B: BlobStore + ?Sized>(self, store: &B, hint: &KeyHint) -> Step<Published> {
        let Submission { id, data, state } = self;
        let Fetched {
            started_at,
            fetched,
        } = state;
        let size_bytes = fetched.size_bytes;

        match publisher::publish(store, fetched, hint).await {
            Ok(published) => Ok(Submission {
                id,
                data,
                state: Published {
                    started_at,
                    size_bytes,
                    published,
                },
            }),
            Err(outcome) => Err(concluded_early(id, data, started_at, outcome)),
        }
    }
}

impl Submission<Published> {
    /// The happy path's final classification.
    pub fn conclude(self) -> Submission<Concluded> {
        let outcome = Outcome::Success {
            size_bytes: self.state.size_bytes,
            location: self.state.published.location,
        };
        counter!("intake_runs_total", "outcome" => outcome.kind().as_str()).increment(1);
        Submission {
            id: self.id,
            data: self.data,
            state: Concluded {
                started_at: self.state.started_at,
                concluded_at: Utc::now(),
                outcome,
            },
        }
    }
}

impl Submission<Concluded> {
    /// Tell the submitter how it went. Best effort: a failed send is carried
    /// forward as `notify_sent = false`.
    pub async fn notify<M: Mailer + ?Sized>(self, notifier: &Notifier<M>) -> Submission<Notified> {
        let notify_sent = notifier
            .notify(&self.data.notify_email, &self.state.outcome)
            .await;
        if !notify_sent {
            counter!("intake_notify_failures_total").increment(1);
        }

        Submission {
            id: self.id,
            data: self.data,
            state: Notified {
                started_at: self.state.started_at,
                concluded_at: self.state.concluded_at,
                outcome: self.state.outcome,
                notify_sent,
            },
        }
    }
}

impl Submission<Notified> {
    /// Append the audit record. This ends the run whatever the store says.
    pub async fn record<A: AuditStore + ?Sized>(self, store: &A) -> RunReport {
        let audit = AuditRecord::from_outcome(
            self.id,
            &self.data,
            &self.state.outcome,
            self.state.notify_sent,
            self.state.concluded_at,
        );
        let recorded = recorder::record(store, &audit).await.is_ok();
        if !recorded {
            counter!("intake_record_failures_total").increment(1);
        }

        RunReport {
            run_id: self.id,
            outcome: Some(self.state.outcome),
            audit,
            notify_sent: self.state.notify_sent,
            recorded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::outcome::{INVALID_FORMAT_REASON, OutcomeKind};
    use crate::http::{HttpResponse, MockHttpClient};
    use crate::notifier::{MockMailer, Sender};
    use crate::publisher::{InMemoryBlobStore, KeyStrategy};
    use crate::recorder::InMemoryAuditStore;
    use std::sync::Arc;

    fn request(url: &str) -> SubmissionRequest {
        SubmissionRequest {
            source_url: url.to_string(),
            notify_email: "a@b.com".to_string(),
        }
    }

    fn hint() -> KeyHint {
        KeyHint {
            prefix: "submissions".to_string(),
            strategy: KeyStrategy::Filename,
        }
    }

    fn notifier(mailer: Arc<MockMailer>) -> Notifier<MockMailer> {
        Notifier::new(mailer, Sender::new("example.com", "Submissions"))
    }

    #[test]
    fn test_validate_rejects_non_zip() {
        let concluded = *Submission::new(request("http://x/file.txt"))
            .validate()
            .unwrap_err();
        assert_eq!(
            concluded.state.outcome,
            Outcome::Rejected {
                reason: INVALID_FORMAT_REASON.to_string()
            }
        );
        assert!(concluded.state.concluded_at >= concluded.state.started_at);
    }

    #[tokio::test]
    async fn test_happy_path_reaches_success() {
        let http = MockHttpClient::new();
        http.add_response(
            "http://x/file.zip",
            Ok(HttpResponse {
                status: 200,
                body: vec![1u8; 1024],
            }),
        );
        let store = InMemoryBlobStore::new("gs", "bucket");

        let started = Submission::new(request("http://x/file.zip"));
        let run_id = started.id;

        let fetched = started
            .validate()
            .unwrap()
            .fetch(&http, 5000)
            .await
            .unwrap();
        assert_eq!(fetched.state.fetched.size_bytes, 1024);

        let concluded = fetched.publish(&store, &hint()).await.unwrap().conclude();
        assert_eq!(concluded.id, run_id);
        assert_eq!(
            concluded.state.outcome,
            Outcome::Success {
                size_bytes: 1024,
                location: "gs://bucket/submissions/file.zip".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_short_circuits() {
        let http = MockHttpClient::new();
        http.add_response(
            "http://x/file.zip",
            Ok(HttpResponse {
                status: 404,
                body: vec![],
            }),
        );

        let concluded = *Submission::new(request("http://x/file.zip"))
            .validate()
            .unwrap()
            .fetch(&http, 5000)
            .await
            .unwrap_err();

        assert_eq!(concluded.state.outcome.kind(), OutcomeKind::FetchFailed);
    }

    #[tokio::test]
    async fn test_publish_failure_short_circuits() {
        let http = MockHttpClient::new();
        http.add_response(
            "http://x/file.zip",
            Ok(HttpResponse {
                status: 200,
                body: vec![1u8; 10],
            }),
        );
        let store = InMemoryBlobStore::new("s3", "bucket");
        store.fail_with("quota exceeded");

        let concluded = *Submission::new(request("http://x/file.zip"))
            .validate()
            .unwrap()
            .fetch(&http, 5000)
            .await
            .unwrap()
            .publish(&store, &hint())
            .await
            .unwrap_err();

        assert_eq!(
            concluded.state.outcome,
            Outcome::PublishFailed {
                reason: "upload failed: quota exceeded".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_notify_then_record_produces_report() {
        let mailer = Arc::new(MockMailer::new());
        let audit = InMemoryAuditStore::new();

        let concluded = *Submission::new(request("http://x/file.txt"))
            .validate()
            .unwrap_err();
        let run_id = concluded.id;

        let report = concluded
            .notify(&notifier(mailer.clone()))
            .await
            .record(&audit)
            .await;

        assert_eq!(report.run_id, run_id);
        assert!(report.notify_sent);
        assert!(report.recorded);
        assert_eq!(report.audit.outcome_kind, OutcomeKind::Rejected);
        assert_eq!(mailer.sent().len(), 1);
        assert_eq!(audit.records(), vec![report.audit]);
    }

    #[tokio::test]
    async fn test_notify_failure_is_carried_not_raised() {
        let mailer = Arc::new(MockMailer::new());
        mailer.fail_with("smtp unavailable");
        let audit = InMemoryAuditStore::new();

        let concluded = *Submission::new(request("http://x/file.txt"))
            .validate()
            .unwrap_err();
        let report = concluded
            .notify(&notifier(mailer))
            .await
            .record(&audit)
            .await;

        assert!(!report.notify_sent);
        assert!(!report.audit.notify_sent);
        assert!(report.recorded);
    }
}
