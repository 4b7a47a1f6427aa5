//! Trigger payload parsing.
//!
//! Accepts either a flat JSON object or an SNS-style envelope whose first
//! record carries the flat object as a JSON string:
//!
//! ```json
//! {"sourceURL": "https://host/file.zip", "notifyEmail": "a@b.com"}
//! {"Records": [{"Sns": {"Message": "{\"submission_url\": \"...\", \"email\": \"...\"}"}}]}
//! ```

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::domain::submission::SubmissionRequest;

/// A trigger that could not be turned into a [`SubmissionRequest`].
///
/// Whatever fields could be extracted are kept so the audit record still
/// says who submitted what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadRequest {
    pub reason: String,
    pub source_url: Option<String>,
    pub notify_email: Option<String>,
}

impl BadRequest {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            source_url: None,
            notify_email: None,
        }
    }
}

impl std::fmt::Display for BadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Accepted keys for each field, highest priority first.
const SOURCE_URL_KEYS: &[&str] = &["sourceURL", "source_url", "submission_url"];
const NOTIFY_EMAIL_KEYS: &[&str] = &["notifyEmail", "notify_email", "email"];

#[derive(Debug, Deserialize)]
struct SnsEnvelope {
    #[serde(rename = "Records")]
    records: Vec<SnsRecord>,
}

#[derive(Debug, Deserialize)]
struct SnsRecord {
    #[serde(rename = "Sns")]
    sns: SnsMessage,
}

#[derive(Debug, Deserialize)]
struct SnsMessage {
    #[serde(rename = "Message")]
    message: String,
}

/// First key in `keys` holding a non-blank string, trimmed.
fn first_string(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match fields.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

/// Loose address check: one `@` with something on both sides.
fn looks_like_email(address: &str) -> bool {
    match address.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@') && !address.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Parse a raw trigger payload.
pub fn parse_trigger(payload: &[u8]) -> Result<SubmissionRequest, BadRequest> {
    let value: Value = serde_json::from_slice(payload)
        .map_err(|e| BadRequest::new(format!("invalid JSON payload: {}", e)))?;

    let value = if value.get("Records").is_some() {
        let envelope: SnsEnvelope = serde_json::from_value(value)
            .map_err(|e| BadRequest::new(format!("invalid SNS envelope: {}", e)))?;
        let record = envelope
            .records
            .into_iter()
            .next()
            .ok_or_else(|| BadRequest::new("SNS envelope has no records"))?;
        serde_json::from_str::<Value>(&record.sns.message)
            .map_err(|e| BadRequest::new(format!("invalid SNS message: {}", e)))?
    } else {
        value
    };

    let Value::Object(fields) = value else {
        return Err(BadRequest::new("payload must be a JSON object"));
    };

    let source_url = first_string(&fields, SOURCE_URL_KEYS);
    let notify_email = first_string(&fields, NOTIFY_EMAIL_KEYS);

    let reason = match (&source_url, &notify_email) {
        (None, None) => Some("missing source URL and notify email"),
        (None, Some(_)) => Some("missing source URL"),
        (Some(_), None) => Some("missing notify email"),
        (Some(_), Some(email)) if !looks_like_email(email) => Some("invalid notify email"),
        _ => None,
    };

    match (reason, source_url, notify_email) {
        (None, Some(source_url), Some(notify_email)) => Ok(SubmissionRequest {
            source_url,
            notify_email,
        }),
        (reason, source_url, notify_email) => Err(BadRequest {
            reason: reason.unwrap_or("invalid payload").to_string(),
            source_url,
            notify_email,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_camel_case() {
        let request =
            parse_trigger(br#"{"sourceURL": "http://x/file.zip", "notifyEmail": "a@b.com"}"#)
                .unwrap();
        assert_eq!(request.source_url, "http://x/file.zip");
        assert_eq!(request.notify_email, "a@b.com");
    }

    #[test]
    fn test_flat_aliases() {
        for payload in [
            br#"{"source_url": "http://x/file.zip", "notify_email": "a@b.com"}"#.as_slice(),
            br#"{"submission_url": "http://x/file.zip", "email": "a@b.com"}"#.as_slice(),
        ] {
            let request = parse_trigger(payload).unwrap();
            assert_eq!(request.source_url, "http://x/file.zip");
            assert_eq!(request.notify_email, "a@b.com");
        }
    }

    #[test]
    fn test_sns_envelope() {
        let payload = serde_json::json!({
            "Records": [{
                "Sns": {
                    "Message": r#"{"submission_url": "http://x/file.zip", "email": "a@b.com"}"#
                }
            }]
        });

        let request = parse_trigger(payload.to_string().as_bytes()).unwrap();
        assert_eq!(
            request,
            SubmissionRequest {
                source_url: "http://x/file.zip".to_string(),
                notify_email: "a@b.com".to_string(),
            }
        );
    }

    #[test]
    fn test_invalid_json() {
        let bad = parse_trigger(b"{not json").unwrap_err();
        assert!(bad.reason.starts_with("invalid JSON payload"));
        assert_eq!(bad.source_url, None);
    }

    #[test]
    fn test_empty_envelope() {
        let bad = parse_trigger(br#"{"Records": []}"#).unwrap_err();
        assert_eq!(bad.reason, "SNS envelope has no records");
    }

    #[test]
    fn test_missing_fields_keep_partial_data() {
        let bad = parse_trigger(br#"{"sourceURL": "http://x/file.zip"}"#).unwrap_err();
        assert_eq!(bad.reason, "missing notify email");
        assert_eq!(bad.source_url.as_deref(), Some("http://x/file.zip"));

        let bad = parse_trigger(br#"{"notifyEmail": "a@b.com", "sourceURL": "  "}"#).unwrap_err();
        assert_eq!(bad.reason, "missing source URL");
        assert_eq!(bad.notify_email.as_deref(), Some("a@b.com"));

        let bad = parse_trigger(br#"{}"#).unwrap_err();
        assert_eq!(bad.reason, "missing source URL and notify email");
    }

    #[test]
    fn test_duplicate_keys_resolve_by_priority() {
        let request = parse_trigger(
            br#"{
                "source_url": "http://x/second.zip",
                "sourceURL": "http://x/first.zip",
                "email": "c@d.com",
                "notifyEmail": "a@b.com"
            }"#,
        )
        .unwrap();
        assert_eq!(request.source_url, "http://x/first.zip");
        assert_eq!(request.notify_email, "a@b.com");

        // A blank higher-priority key falls through to the next one.
        let request = parse_trigger(
            br#"{"sourceURL": "", "submission_url": "http://x/file.zip", "email": "a@b.com"}"#,
        )
        .unwrap();
        assert_eq!(request.source_url, "http://x/file.zip");

        // Duplicates never cost the fields that were present.
        let bad = parse_trigger(
            br#"{"sourceURL": "http://x/file.zip", "source_url": "http://x/other.zip"}"#,
        )
        .unwrap_err();
        assert_eq!(bad.reason, "missing notify email");
        assert_eq!(bad.source_url.as_deref(), Some("http://x/file.zip"));
    }

    #[test]
    fn test_non_string_and_non_object() {
        let bad = parse_trigger(br#"{"sourceURL": 42, "notifyEmail": "a@b.com"}"#).unwrap_err();
        assert_eq!(bad.reason, "missing source URL");

        let bad = parse_trigger(br#"["http://x/file.zip"]"#).unwrap_err();
        assert_eq!(bad.reason, "payload must be a JSON object");
    }

    #[test]
    fn test_invalid_email() {
        let bad =
            parse_trigger(br#"{"sourceURL": "http://x/file.zip", "notifyEmail": "nobody"}"#)
                .unwrap_err();
        assert_eq!(bad.reason, "invalid notify email");
        assert_eq!(bad.notify_email.as_deref(), Some("nobody"));
    }

    #[test]
    fn test_non_zip_url_is_not_a_bad_request() {
        // Format checks belong to the validator; intake only checks presence.
        assert!(
            parse_trigger(br#"{"sourceURL": "http://x/file.txt", "notifyEmail": "a@b.com"}"#)
                .is_ok()
        );
    }
}
