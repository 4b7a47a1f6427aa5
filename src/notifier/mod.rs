//! Outcome email.
//!
//! The body is a pure function of the [`Outcome`] and the sender's signature.
//! Sending is best effort: a failure is logged and reported as `false`, never
//! raised.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::outcome::Outcome;
use crate::error::{IntakeError, Result};

pub mod mailgun;

pub use mailgun::MailgunMailer;

/// Fixed subject for every outcome email.
pub const SUBJECT: &str = "Submission Status";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
}

/// Outbound email transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Who outcome emails come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    /// Display name, also used to sign the body.
    pub name: String,
    pub address: String,
}

impl Sender {
    /// `noreply@<domain>` with the given display name.
    pub fn new(domain: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            address: format!("noreply@{}", domain),
        }
    }

    /// `Name <address>` header form.
    pub fn mailbox(&self) -> String {
        format!("{} <{}>", self.name, self.address)
    }
}

/// Email body for an outcome.
pub fn compose_body(outcome: &Outcome, signature: &str) -> String {
    match outcome {
        Outcome::Success {
            size_bytes,
            location,
        } => format!(
            "Hey,\n\nYour submission was {} bytes and was stored successfully.\n\n\
             Location: {}\n\nThank you for your submission.\n\nBest regards,\n{}",
            size_bytes, location, signature
        ),
        Outcome::Rejected { reason }
        | Outcome::FetchFailed { reason }
        | Outcome::PublishFailed { reason } => format!(
            "Hey,\n\nWe encountered an issue while processing your submission:\n\n{}\n\n\
             Best regards,\n{}",
            reason, signature
        ),
    }
}

/// Composes outcome emails and hands them to a [`Mailer`].
pub struct Notifier<M: Mailer + ?Sized> {
    mailer: Arc<M>,
    sender: Sender,
}

impl<M: Mailer + ?Sized> Notifier<M> {
    pub fn new(mailer: Arc<M>, sender: Sender) -> Self {
        Self { mailer, sender }
    }

    pub fn compose(&self, notify_email: &str, outcome: &Outcome) -> EmailMessage {
        EmailMessage {
            from: self.sender.mailbox(),
            to: notify_email.to_string(),
            subject: SUBJECT.to_string(),
            text: compose_body(outcome, &self.sender.name),
        }
    }

    /// Send the outcome email. Returns whether the mailer accepted it.
    #[tracing::instrument(skip(self, outcome), fields(outcome = %outcome.kind()))]
    pub async fn notify(&self, notify_email: &str, outcome: &Outcome) -> bool {
        let message = self.compose(notify_email, outcome);

        match self.mailer.send(&message).await {
            Ok(()) => {
                tracing::info!("Outcome email sent");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to send outcome email");
                false
            }
        }
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

/// Mailer that keeps every accepted message in memory.
#[derive(Clone, Default)]
pub struct MockMailer {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    attempts: Arc<Mutex<usize>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail with `message`.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock() = Some(message.to_string());
    }

    /// Messages accepted so far.
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().clone()
    }

    /// Send attempts, including failed ones.
    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        *self.attempts.lock() += 1;

        if let Some(failure) = self.failure.lock().clone() {
            return Err(IntakeError::Mail(failure));
        }

        self.sent.lock().push(message.clone());
        Ok(())
    }
}
