//! Run the intake pipeline for one trigger payload.
//!
//! ```text
//! intake --payload event.json
//! echo '{"sourceURL": "...", "notifyEmail": "..."}' | intake
//! intake --payload event.json --dry-run
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncReadExt;

use intake::logging::{LogFormat, init_logging};
use intake::{
    AuditStore, IntakeConfig, JsonlAuditStore, MailgunMailer, Pipeline, PipelineConfig,
    ReqwestHttpClient, S3BlobStore, Sender, StorageCredentials, parse_trigger,
};

#[derive(Debug, Parser)]
#[command(name = "intake", version, about = "Validate, fetch, store and acknowledge one file submission")]
struct Args {
    /// Trigger payload file; `-` or absent reads stdin
    #[arg(long, short)]
    payload: Option<PathBuf>,

    /// Parse the payload and check the URL without contacting any collaborator
    #[arg(long)]
    dry_run: bool,

    /// Log output format (text or json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,
}

async fn read_payload(path: Option<&PathBuf>) -> Result<Vec<u8>> {
    match path {
        Some(path) if path.as_os_str() != "-" => tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read payload {}", path.display())),
        _ => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .context("Failed to read payload from stdin")?;
            Ok(buf)
        }
    }
}

fn dry_run(payload: &[u8]) -> Result<()> {
    let report = match parse_trigger(payload) {
        Ok(request) => {
            let validation = match intake::validator::validate(&request.source_url) {
                Ok(()) => serde_json::Value::Null,
                Err(outcome) => serde_json::to_value(outcome)?,
            };
            serde_json::json!({ "request": request, "validation": validation })
        }
        Err(bad) => serde_json::json!({
            "bad_request": bad.reason,
            "source_url": bad.source_url,
            "notify_email": bad.notify_email,
        }),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(feature = "postgres")]
async fn database_audit_store(config: &IntakeConfig) -> Result<Option<Arc<dyn AuditStore>>> {
    let Some(url) = &config.audit.database_url else {
        return Ok(None);
    };
    let store = intake::PostgresAuditStore::connect(url, config.audit.table_name.clone())
        .await
        .context("Failed to connect audit database")?;
    tracing::info!(table = %store.table(), "Recording audit trail in PostgreSQL");
    let store: Arc<dyn AuditStore> = Arc::new(store);
    Ok(Some(store))
}

#[cfg(not(feature = "postgres"))]
async fn database_audit_store(config: &IntakeConfig) -> Result<Option<Arc<dyn AuditStore>>> {
    if config.audit.database_url.is_some() {
        tracing::warn!("DATABASE_URL is set but the postgres feature is disabled; using the audit file");
    }
    Ok(None)
}

async fn audit_store(config: &IntakeConfig) -> Result<Arc<dyn AuditStore>> {
    if let Some(store) = database_audit_store(config).await? {
        return Ok(store);
    }

    tracing::info!(path = %config.audit.log_path.display(), "Recording audit trail to file");
    Ok(Arc::new(JsonlAuditStore::new(config.audit.log_path.clone())))
}

async fn run(args: Args) -> Result<()> {
    let payload = read_payload(args.payload.as_ref()).await?;

    if args.dry_run {
        return dry_run(&payload);
    }

    let config = IntakeConfig::from_env().context("Invalid configuration")?;
    let credentials_path = config
        .storage
        .credentials_path
        .as_deref()
        .context("STORAGE_CREDENTIALS_PATH must be set")?;
    let credentials = StorageCredentials::load(credentials_path)?;

    let pipeline = Pipeline::new(
        Arc::new(ReqwestHttpClient::new()),
        Arc::new(S3BlobStore::new(&config.storage, &credentials)),
        Arc::new(MailgunMailer::new(&config.mail)),
        Sender::new(&config.mail.domain, &config.mail.sender_name),
        audit_store(&config).await?,
        PipelineConfig {
            fetch_timeout_ms: config.fetch.timeout_ms,
            key_hint: config.storage.key_hint(),
        },
    );

    let report = pipeline.handle_trigger(&payload).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(args.log_format) {
        eprintln!("{}", e);
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "intake failed before the run started");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
