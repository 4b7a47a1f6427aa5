//! Error types for the intake pipeline.
//!
//! Collaborators (HTTP client, blob store, mailer, audit store) report failures
//! through [`IntakeError`]. The pipeline never lets these escape a run: each
//! stage converts them into an [`Outcome`](crate::domain::outcome::Outcome)
//! variant or a side observation (`notify_sent = false`, `recorded = false`).

use thiserror::Error;

/// Result type alias using the intake error type.
pub type Result<T> = std::result::Result<T, IntakeError>;

/// Main error type for the intake pipeline.
#[derive(Error, Debug)]
pub enum IntakeError {
    /// The trigger payload could not be turned into a submission request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Blob storage rejected or failed the write
    #[error("Storage error: {0}")]
    Storage(String),

    /// Email provider rejected or failed the send
    #[error("Mail error: {0}")]
    Mail(String),

    /// Audit store rejected or failed the append
    #[error("Audit store error: {0}")]
    Audit(String),

    /// HTTP client error
    #[error("HTTP request failed: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error
    #[cfg(feature = "postgres")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// General error from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IntakeError {
    /// Message without the variant prefix, used where the text ends up in
    /// user-facing or audit detail strings.
    pub fn detail(&self) -> String {
        match self {
            IntakeError::BadRequest(msg)
            | IntakeError::Config(msg)
            | IntakeError::Storage(msg)
            | IntakeError::Mail(msg)
            | IntakeError::Audit(msg) => msg.clone(),
            IntakeError::HttpClient(e) => e.to_string(),
            IntakeError::Serialization(e) => e.to_string(),
            IntakeError::Io(e) => e.to_string(),
            #[cfg(feature = "postgres")]
            IntakeError::Database(e) => e.to_string(),
            IntakeError::Other(e) => format!("{:#}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_strips_variant_prefix() {
        let err = IntakeError::Storage("bucket not found".to_string());
        assert_eq!(err.to_string(), "Storage error: bucket not found");
        assert_eq!(err.detail(), "bucket not found");
    }

    #[test]
    fn test_detail_keeps_anyhow_context_chain() {
        let err = IntakeError::from(anyhow::anyhow!("connection reset").context("sending"));
        assert_eq!(err.detail(), "sending: connection reset");
    }
}
