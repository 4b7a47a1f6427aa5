//! The single classified result of a run.
//!
//! Both the notification email and the audit record are rendered from the same
//! [`Outcome`] value, so the user and the operator always see the same story.

use serde::{Deserialize, Serialize};

/// Reason given to the user when the URL does not point at a ZIP archive.
pub const INVALID_FORMAT_REASON: &str = "Invalid file format. Only ZIP files are supported.";

/// Terminal classification of a run.
///
/// Exactly one exists per run. `BadRequest` is not an outcome: a malformed
/// trigger never becomes a submission and is only visible through
/// [`OutcomeKind::BadRequest`] in the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum Outcome {
    /// The file was fetched and stored.
    Success { size_bytes: u64, location: String },

    /// The URL failed syntactic validation.
    Rejected { reason: String },

    /// The download failed (status, transport, or empty body).
    FetchFailed { reason: String },

    /// Blob storage refused or failed the write.
    PublishFailed { reason: String },
}

impl Outcome {
    /// The audit classification for this outcome.
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Success { .. } => OutcomeKind::Success,
            Outcome::Rejected { .. } => OutcomeKind::Rejected,
            Outcome::FetchFailed { .. } => OutcomeKind::FetchFailed,
            Outcome::PublishFailed { .. } => OutcomeKind::PublishFailed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// Human-readable failure reason, `None` for success.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Rejected { reason }
            | Outcome::FetchFailed { reason }
            | Outcome::PublishFailed { reason } => Some(reason),
        }
    }

    /// Audit detail string.
    ///
    /// For success this carries the same byte count and location that the
    /// notification email states; for failures it is the reason verbatim.
    pub fn detail(&self) -> String {
        match self {
            Outcome::Success {
                size_bytes,
                location,
            } => format!("{} bytes stored at {}", size_bytes, location),
            Outcome::Rejected { reason }
            | Outcome::FetchFailed { reason }
            | Outcome::PublishFailed { reason } => reason.clone(),
        }
    }
}

/// Outcome classification as written to the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeKind {
    Success,
    Rejected,
    FetchFailed,
    PublishFailed,
    BadRequest,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "Success",
            OutcomeKind::Rejected => "Rejected",
            OutcomeKind::FetchFailed => "FetchFailed",
            OutcomeKind::PublishFailed => "PublishFailed",
            OutcomeKind::BadRequest => "BadRequest",
        }
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OutcomeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Success" => Ok(OutcomeKind::Success),
            "Rejected" => Ok(OutcomeKind::Rejected),
            "FetchFailed" => Ok(OutcomeKind::FetchFailed),
            "PublishFailed" => Ok(OutcomeKind::PublishFailed),
            "BadRequest" => Ok(OutcomeKind::BadRequest),
            _ => Err(format!("Invalid outcome kind: {}", s)),
        }
    }
}
