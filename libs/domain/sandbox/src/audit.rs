// [libs/domain/sandbox/src/audit.rs]
use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use gateway_error::GatewayError;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub command: String,
    pub args: Vec<String>,
    pub duration_ms: u64,
    pub output_bytes: usize,
    pub reason: Option<String>,
}

/// Rotating, size-capped JSONL audit log. Every
/// allow/deny decision is appended as one line; once the live file
/// crosses `max_bytes` it is gzip-archived and the live file starts
/// fresh, mirroring the ledger's date-based archive scheme but
/// triggered by size rather than a calendar boundary.
pub struct AuditLog {
    live_path: PathBuf,
    archive_dir: PathBuf,
    max_bytes: u64,
    lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(live_path: PathBuf, archive_dir: PathBuf, max_bytes: u64) -> Self {
        Self { live_path, archive_dir, max_bytes, lock: Mutex::new(()) }
    }

    pub fn record(
        &self,
        action: AuditAction,
        command: &str,
        args: &[String],
        duration: Duration,
        output_bytes: usize,
        reason: Option<String>,
    ) -> Result<(), GatewayError> {
        let record = AuditRecord {
            timestamp: Utc::now(),
            action,
            command: command.to_string(),
            args: args.to_vec(),
            duration_ms: duration.as_millis() as u64,
            output_bytes,
            reason,
        };
        let line = serde_json::to_string(&record).map_err(|err| gateway_error::GatewayError::new(gateway_error::ErrorKind::Io, err.to_string()))?;

        let _guard = self.lock.lock().expect("audit log mutex poisoned");
        if let Some(parent) = self.live_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.live_path)?;
        writeln!(file, "{line}")?;
        drop(file);

        if std::fs::metadata(&self.live_path)?.len() >= self.max_bytes {
            self.rotate()?;
        }
        Ok(())
    }

    fn rotate(&self) -> Result<(), GatewayError> {
        let mut contents = Vec::new();
        File::open(&self.live_path)?.read_to_end(&mut contents)?;
        if contents.is_empty() {
            return Ok(());
        }

        std::fs::create_dir_all(&self.archive_dir)?;
        let archive_path = self.next_free_archive_path();
        let file = File::create(&archive_path)?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(&contents)?;
        encoder.finish()?;

        std::fs::write(&self.live_path, b"")?;
        Ok(())
    }

    fn next_free_archive_path(&self) -> PathBuf {
        let now = Utc::now();
        let base = self.archive_dir.join(format!("audit.{}.jsonl.gz", now.format("%Y-%m-%dT%H-%M-%S")));
        if !base.exists() {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = self.archive_dir.join(format!("audit.{}-{n}.jsonl.gz", now.format("%Y-%m-%dT%H-%M-%S")));
            if !candidate.exists() {
                return candidate;
            }
            n += 1;
        }
    }
}
