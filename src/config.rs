//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{IntakeError, Result};
use crate::publisher::{KeyHint, KeyStrategy};

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default storage region.
pub const DEFAULT_STORAGE_REGION: &str = "us-east-1";

/// Default scheme used in published locations.
pub const DEFAULT_STORAGE_SCHEME: &str = "s3";

/// Default object key prefix.
pub const DEFAULT_KEY_PREFIX: &str = "submissions";

/// Default Mailgun API base.
pub const DEFAULT_MAILGUN_BASE_URL: &str = "https://api.mailgun.net";

/// Default sender display name, also used as the email signature.
pub const DEFAULT_SENDER_NAME: &str = "Submissions";

/// Default audit table.
pub const DEFAULT_AUDIT_TABLE: &str = "submission_audit";

/// Default JSON-lines audit file, used when no database is configured.
pub const DEFAULT_AUDIT_LOG_PATH: &str = "submission-audit.jsonl";

/// Default download timeout in milliseconds.
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 60_000;

/// Default email API timeout in milliseconds.
pub const DEFAULT_MAIL_TIMEOUT_MS: u64 = 10_000;

/// Everything a run needs to build its collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeConfig {
    pub storage: StorageConfig,
    pub mail: MailConfig,
    pub audit: AuditConfig,
    pub fetch: FetchConfig,
}

/// Blob storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub bucket: String,
    /// S3-protocol endpoint override. `None` talks to AWS.
    pub endpoint: Option<String>,
    pub region: String,
    /// Scheme written into locations (`s3`, `gs`).
    pub scheme: String,
    pub key_prefix: String,
    pub key_strategy: KeyStrategy,
    pub credentials_path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn key_hint(&self) -> KeyHint {
        KeyHint {
            prefix: self.key_prefix.clone(),
            strategy: self.key_strategy,
        }
    }
}

/// Access keys for the blob store, read from a JSON file.
#[derive(Clone, Serialize, Deserialize)]
pub struct StorageCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

impl StorageCredentials {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path).map_err(|e| {
            IntakeError::Config(format!(
                "cannot read storage credentials {}: {}",
                path.display(),
                e
            ))
        })?;
        let credentials: StorageCredentials = serde_json::from_slice(&raw)?;
        if credentials.access_key_id.is_empty() || credentials.secret_access_key.is_empty() {
            return Err(IntakeError::Config(
                "storage credentials must contain access_key_id and secret_access_key".to_string(),
            ));
        }
        Ok(credentials)
    }
}

/// Email configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub api_key: String,
    pub domain: String,
    pub base_url: String,
    pub sender_name: String,
    pub timeout_ms: u64,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("api_key", &"<redacted>")
            .field("domain", &self.domain)
            .field("base_url", &self.base_url)
            .field("sender_name", &self.sender_name)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// Audit store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub table_name: String,
    pub database_url: Option<String>,
    pub log_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub timeout_ms: u64,
}

impl IntakeConfig {
    /// Load configuration from the process environment, honouring `.env`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup and validate it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let parsed = |name: &str, default: u64| -> Result<u64> {
            match var(name) {
                Some(v) => v
                    .trim()
                    .parse()
                    .map_err(|_| IntakeError::Config(format!("{} must be an integer, got {:?}", name, v))),
                None => Ok(default),
            }
        };

        let key_strategy = match var("STORAGE_KEY_STRATEGY") {
            Some(v) => v.parse().map_err(IntakeError::Config)?,
            None => KeyStrategy::default(),
        };

        let config = IntakeConfig {
            storage: StorageConfig {
                bucket: var("BUCKET_NAME").unwrap_or_default(),
                endpoint: var("STORAGE_ENDPOINT"),
                region: var("STORAGE_REGION").unwrap_or_else(|| DEFAULT_STORAGE_REGION.to_string()),
                scheme: var("STORAGE_SCHEME").unwrap_or_else(|| DEFAULT_STORAGE_SCHEME.to_string()),
                key_prefix: lookup("STORAGE_KEY_PREFIX")
                    .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
                key_strategy,
                credentials_path: var("STORAGE_CREDENTIALS_PATH").map(PathBuf::from),
            },
            mail: MailConfig {
                api_key: var("MAILGUN_API_KEY").unwrap_or_default(),
                domain: var("MAILGUN_DOMAIN").unwrap_or_default(),
                base_url: var("MAILGUN_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_MAILGUN_BASE_URL.to_string()),
                sender_name: var("MAIL_SENDER_NAME")
                    .unwrap_or_else(|| DEFAULT_SENDER_NAME.to_string()),
                timeout_ms: parsed("MAIL_TIMEOUT_MS", DEFAULT_MAIL_TIMEOUT_MS)?,
            },
            audit: AuditConfig {
                table_name: var("AUDIT_TABLE_NAME")
                    .unwrap_or_else(|| DEFAULT_AUDIT_TABLE.to_string()),
                database_url: var("DATABASE_URL"),
                log_path: var("AUDIT_LOG_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_AUDIT_LOG_PATH)),
            },
            fetch: FetchConfig {
                timeout_ms: parsed("FETCH_TIMEOUT_MS", DEFAULT_FETCH_TIMEOUT_MS)?,
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.storage.bucket.is_empty() {
            return Err(IntakeError::Config("BUCKET_NAME must be set".to_string()));
        }

        if self.mail.api_key.is_empty() {
            return Err(IntakeError::Config("MAILGUN_API_KEY must be set".to_string()));
        }

        if self.mail.domain.is_empty() {
            return Err(IntakeError::Config("MAILGUN_DOMAIN must be set".to_string()));
        }

        if self.fetch.timeout_ms == 0 || self.mail.timeout_ms == 0 {
            return Err(IntakeError::Config(
                "timeouts must be greater than 0".to_string(),
            ));
        }

        if url::Url::parse(&self.mail.base_url).is_err() {
            return Err(IntakeError::Config(format!(
                "MAILGUN_BASE_URL is not a valid URL: {}",
                self.mail.base_url
            )));
        }

        if self.storage.credentials_path.is_none() {
            tracing::warn!("STORAGE_CREDENTIALS_PATH not set - storage client cannot be built");
        }

        Ok(())
    }
}
