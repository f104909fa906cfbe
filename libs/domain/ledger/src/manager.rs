// [libs/domain/ledger/src/manager.rs]
use crate::entry::LedgerEntry;
use crate::recovery::{self, RecomputeStats, RecoverStats};
use crate::rotation;
use crate::scan::EntryScan;
use crate::tenant::validate_tenant_id;
use gateway_error::{ErrorKind, GatewayError};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};

#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub base_dir: PathBuf,
    pub fsync: bool,
    pub rotation_age_days: i64,
    pub retention_days: i64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./data/ledger"),
            fsync: true,
            rotation_age_days: 1,
            retention_days: 90,
        }
    }
}

struct WriteCmd {
    line: String,
    reply: oneshot::Sender<Result<(), GatewayError>>,
}

/// Per-tenant JSONL cost ledger. Each tenant gets its own
/// lazily-spawned single-writer task so concurrent appends for different
/// tenants never contend, while appends for the same tenant stay
/// strictly ordered.
#[derive(Clone)]
pub struct Ledger {
    settings: Arc<LedgerSettings>,
    writers: Arc<AsyncMutex<HashMap<String, mpsc::Sender<WriteCmd>>>>,
}

impl Ledger {
    pub fn new(settings: LedgerSettings) -> Self {
        Self { settings: Arc::new(settings), writers: Arc::new(AsyncMutex::new(HashMap::new())) }
    }

    fn tenant_dir(&self, tenant: &str) -> PathBuf {
        self.settings.base_dir.join(tenant)
    }

    fn live_path(&self, tenant: &str) -> PathBuf {
        self.tenant_dir(tenant).join("usage.jsonl")
    }

    fn archive_dir(&self, tenant: &str) -> PathBuf {
        self.tenant_dir(tenant).join("archive")
    }

    pub async fn append(&self, tenant: &str, mut entry: LedgerEntry) -> Result<(), GatewayError> {
        validate_tenant_id(tenant)?;
        entry.tenant_id = tenant.to_string();
        entry.validate()?;
        entry.stamp_crc32();
        let line = entry.to_line()?;

        let sender = self.writer_for(tenant).await?;
        let (reply_tx, reply_rx) = oneshot::channel();
        sender
        .send(WriteCmd { line, reply: reply_tx })
        .await
        .map_err(|_| GatewayError::new(ErrorKind::ShuttingDown, "ledger writer task is gone"))?;
        reply_rx.await.map_err(|_| GatewayError::new(ErrorKind::ShuttingDown, "ledger writer task dropped reply"))?
    }

    async fn writer_for(&self, tenant: &str) -> Result<mpsc::Sender<WriteCmd>, GatewayError> {
        let mut writers = self.writers.lock().await;
        if let Some(sender) = writers.get(tenant) {
            return Ok(sender.clone());
        }
        std::fs::create_dir_all(self.tenant_dir(tenant))?;
        let path = self.live_path(tenant);
        let fsync = self.settings.fsync;
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(run_writer(path, fsync, rx));
        writers.insert(tenant.to_string(), tx.clone());
        Ok(tx)
    }

    pub fn recover(&self, tenant: &str) -> Result<RecoverStats, GatewayError> {
        validate_tenant_id(tenant)?;
        let (_entries, stats) = recovery::recover(&self.live_path(tenant))?;
        Ok(stats)
    }

    pub fn recompute(&self, tenant: &str) -> Result<RecomputeStats, GatewayError> {
        validate_tenant_id(tenant)?;
        let entries = self.load_all(tenant)?;
        recovery::recompute(&entries)
    }

    /// Rotates `tenant`'s live file into a compressed archive, but only
    /// once it is at least `rotation_age_days` old — a no-op (`Ok(None)`)
    /// otherwise.
    pub fn rotate(&self, tenant: &str) -> Result<Option<PathBuf>, GatewayError> {
        validate_tenant_id(tenant)?;
        rotation::rotate(&self.live_path(tenant), &self.archive_dir(tenant), self.settings.rotation_age_days)
    }

    pub fn clean_retention(&self, tenant: &str) -> Result<usize, GatewayError> {
        validate_tenant_id(tenant)?;
        rotation::clean_retention(&self.archive_dir(tenant), self.settings.retention_days)
    }

    /// Lists the rotated `.jsonl.gz` archive files for `tenant`, oldest
    /// first by name. Used by the archival sync worker to enumerate what
    /// needs shipping off-node; does not touch the live (unrotated) file.
    pub fn archive_files(&self, tenant: &str) -> Result<Vec<PathBuf>, GatewayError> {
        validate_tenant_id(tenant)?;
        let dir = self.archive_dir(tenant);
        let read_dir = match std::fs::read_dir(&dir) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut paths = Vec::new();
        for entry in read_dir {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                paths.push(entry.path());
            }
        }
        paths.sort();
        Ok(paths)
    }

    pub fn scan_entries(&self, tenant: &str) -> Result<EntryScan, GatewayError> {
        validate_tenant_id(tenant)?;
        EntryScan::open(&self.live_path(tenant))
    }

    pub fn count_entries(&self, tenant: &str) -> Result<usize, GatewayError> {
        let mut count = 0;
        for entry in self.scan_entries(tenant)? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    pub fn get_tenant_ids(&self) -> Result<Vec<String>, GatewayError> {
        let mut ids = Vec::new();
        let read_dir = match std::fs::read_dir(&self.settings.base_dir) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };
        for entry in read_dir {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn load_all(&self, tenant: &str) -> Result<Vec<LedgerEntry>, GatewayError> {
        let path = self.live_path(tenant);
        if !path.exists() {
            return Ok(Vec::new());
        }
        EntryScan::open(&path)?.collect()
    }
}

async fn run_writer(path: PathBuf, fsync: bool, mut rx: mpsc::Receiver<WriteCmd>) {
    while let Some(cmd) = rx.recv().await {
        let result = write_line(&path, &cmd.line, fsync);
        let _ = cmd.reply.send(result);
    }
}

fn write_line(path: &Path, line: &str, fsync: bool) -> Result<(), GatewayError> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")?;
    if fsync {
        file.sync_data()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::BillingMethod;
    use chrono::Utc;

    fn entry(tenant: &str) -> LedgerEntry {
        LedgerEntry {
            schema_version: 2,
            timestamp: Utc::now(),
            trace_id: uuid::Uuid::new_v4().to_string(),
            agent: "agent-1".into(),
            provider: "openai".into(),
            model: "gpt-x".into(),
            project_id: "proj".into(),
            phase_id: "phase".into(),
            sprint_id: "sprint".into(),
            tenant_id: tenant.into(),
            nft_id: None,
            pool_id: None,
            ensemble_id: None,
            prompt_tokens: 10,
            completion_tokens: 5,
            reasoning_tokens: 0,
            input_cost_micro: "100".into(),
            output_cost_micro: "50".into(),
            reasoning_cost_micro: "0".into(),
            total_cost_micro: "150".into(),
            price_table_version: "v1".into(),
            billing_method: BillingMethod::ProviderReported,
            crc32: String::new(),
        }
    }

    #[tokio::test]
    async fn append_then_count_then_list_tenants() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(LedgerSettings { base_dir: dir.path().to_path_buf(), ..Default::default() });

        ledger.append("tenant-a", entry("tenant-a")).await.unwrap();
        ledger.append("tenant-a", entry("tenant-a")).await.unwrap();
        ledger.append("tenant-b", entry("tenant-b")).await.unwrap();

        assert_eq!(ledger.count_entries("tenant-a").unwrap(), 2);
        assert_eq!(ledger.count_entries("tenant-b").unwrap(), 1);
        assert_eq!(ledger.get_tenant_ids().unwrap(), vec!["tenant-a", "tenant-b"]);
    }

    #[tokio::test]
    async fn append_rejects_invalid_tenant_id() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(LedgerSettings { base_dir: dir.path().to_path_buf(), ..Default::default() });
        let err = ledger.append("../escape", entry("x")).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ConfigInvalid);
    }

    #[tokio::test]
    async fn rotate_then_clean_retention_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(LedgerSettings { base_dir: dir.path().to_path_buf(), ..Default::default() });
        ledger.append("tenant-a", entry("tenant-a")).await.unwrap();

        let archived = ledger.rotate("tenant-a").unwrap();
        assert!(archived.is_some());
        assert_eq!(ledger.count_entries("tenant-a").unwrap(), 0);

        let removed = ledger.clean_retention("tenant-a").unwrap();
        assert_eq!(removed, 0);
    }
}
