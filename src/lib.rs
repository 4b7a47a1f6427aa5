//! Single-shot submission intake.
//!
//! Given a trigger describing a user's file submission (a download URL and an
//! email address), a run validates the URL, downloads the file, stores it in
//! blob storage, emails the submitter and appends an audit record.
//!
//! Every collaborator sits behind a trait ([`HttpClient`], [`BlobStore`],
//! [`Mailer`], [`AuditStore`]) with a production implementation and an
//! in-process test double. The run itself is a typestate machine over
//! [`Submission`], driven by [`Pipeline`].

pub mod config;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod intake;
pub mod logging;
pub mod notifier;
pub mod pipeline;
pub mod publisher;
pub mod recorder;
pub mod validator;

// Re-export commonly used types
pub use config::{IntakeConfig, StorageCredentials};
pub use domain::outcome::{Outcome, OutcomeKind};
pub use domain::submission::{RunId, RunReport, Submission, SubmissionRequest};
pub use error::{IntakeError, Result};
pub use http::{HttpClient, HttpResponse, MockHttpClient, ReqwestHttpClient};
pub use intake::{BadRequest, parse_trigger};
pub use notifier::{EmailMessage, MailgunMailer, Mailer, MockMailer, Notifier, Sender};
pub use pipeline::{Pipeline, PipelineConfig};
pub use publisher::{BlobStore, InMemoryBlobStore, KeyHint, KeyStrategy, S3BlobStore};
pub use recorder::{AuditRecord, AuditStore, InMemoryAuditStore, JsonlAuditStore};
#[cfg(feature = "postgres")]
pub use recorder::PostgresAuditStore;
