//! JSON-lines audit file.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use super::{AuditRecord, AuditStore};
use crate::error::Result;

/// Appends one JSON object per line. The file is opened in append mode for
/// every record and created if missing.
#[derive(Debug, Clone)]
pub struct JsonlAuditStore {
    path: PathBuf,
}

impl JsonlAuditStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl AuditStore for JsonlAuditStore {
    async fn append(&self, record: &AuditRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;

        Ok(())
    }
}
