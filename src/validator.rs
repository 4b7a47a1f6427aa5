//! Syntactic check of a submission URL.
//!
//! Only absolute `http`/`https` URLs whose path ends in `.zip` are accepted.
//! The check looks at the URL string alone; the downloaded bytes are never
//! inspected for their actual type.

use url::Url;

use crate::domain::outcome::{INVALID_FORMAT_REASON, Outcome};

/// Accepted path suffix. Case-sensitive.
pub const ACCEPTED_SUFFIX: &str = ".zip";

/// Validate a source URL.
///
/// Pure: no network access, same answer for the same input every time.
/// On failure returns [`Outcome::Rejected`].
pub fn validate(source_url: &str) -> Result<(), Outcome> {
    if is_zip_url(source_url) {
        Ok(())
    } else {
        tracing::debug!(source_url = %source_url, "Rejected submission URL");
        Err(Outcome::Rejected {
            reason: INVALID_FORMAT_REASON.to_string(),
        })
    }
}

/// Whether `source_url` parses as an HTTP(S) URL whose path ends in `.zip`.
///
/// Query string and fragment are not part of the path, so
/// `https://host/file.zip?token=abc` is accepted.
pub fn is_zip_url(source_url: &str) -> bool {
    let Ok(url) = Url::parse(source_url.trim()) else {
        return false;
    };

    matches!(url.scheme(), "http" | "https")
        && url.has_host()
        && url.path().ends_with(ACCEPTED_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_zip_paths() {
        assert!(validate("http://x/file.zip").is_ok());
        assert!(validate("https://cdn.example.com/a/b/c/archive.zip").is_ok());
        assert!(validate("https://example.com/file.zip?X-Amz-Signature=abc").is_ok());
        assert!(validate("https://example.com/file.zip#fragment").is_ok());
    }

    #[test]
    fn test_rejects_other_suffixes() {
        for url in [
            "http://x/file.txt",
            "http://x/file.zip.txt",
            "http://x/file.tar.gz",
            "http://x/",
            "http://x/zip",
            "http://x/file?name=file.zip",
        ] {
            assert_eq!(
                validate(url),
                Err(Outcome::Rejected {
                    reason: INVALID_FORMAT_REASON.to_string()
                }),
                "expected rejection for {}",
                url
            );
        }
    }

    #[test]
    fn test_suffix_is_case_sensitive() {
        assert!(validate("http://x/FILE.ZIP").is_err());
        assert!(validate("http://x/file.Zip").is_err());
    }

    #[test]
    fn test_rejects_malformed_and_non_http() {
        assert!(validate("").is_err());
        assert!(validate("not a url.zip").is_err());
        assert!(validate("/relative/file.zip").is_err());
        assert!(validate("ftp://x/file.zip").is_err());
        assert!(validate("file:///tmp/file.zip").is_err());
    }

    #[test]
    fn test_validation_is_idempotent() {
        for url in ["http://x/file.zip", "http://x/file.txt", "::::"] {
            assert_eq!(validate(url), validate(url));
        }
    }
}
