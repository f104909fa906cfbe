// [libs/infra/archival/src/sync.rs]
use crate::checkpoint::{sha256_hex, ArchivalCheckpoint, SegmentRecord, CHECKPOINT_KEY};
use crate::object_store::ObjectStore;
use gateway_error::{ErrorKind, GatewayError};
use gateway_ledger::Ledger;
use gateway_wal::Wal;
use std::path::Path;
use std::sync::Arc;

fn segment_key(path: &Path) -> String {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("segment");
    format!("segments/{name}")
}

fn ledger_key(tenant: &str, path: &Path) -> String {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("archive");
    format!("ledger/{tenant}/{name}")
}

/// Ships WAL segments and per-tenant ledger archives to an object store,
/// then writes a checkpoint recording what was shipped. Upload-then-
/// checkpoint is the ordering the crash model relies on: a crash between
/// an upload and the checkpoint write just means the next pass re-uploads
/// the same bytes under the same key, which is harmless.
pub struct ArchivalSync {
    store: Arc<dyn ObjectStore>,
}

impl ArchivalSync {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Uploads every WAL segment and, for each tenant the ledger knows
    /// about, every rotated archive file, then writes the checkpoint
    /// object listing them all. Returns the checkpoint that was written.
    pub async fn sync_once(&self, wal: &Wal, ledger: &Ledger) -> Result<ArchivalCheckpoint, GatewayError> {
        let mut segments = Vec::new();

        for path in wal.list_segments() {
            let bytes = std::fs::read(&path)?;
            let key = segment_key(&path);
            let hash = sha256_hex(&bytes);
            self.store.put(&key, bytes).await?;
            segments.push(SegmentRecord { key, sha256: hash });
        }

        for tenant in ledger.get_tenant_ids()? {
            for path in ledger.archive_files(&tenant)? {
                let bytes = std::fs::read(&path)?;
                let key = ledger_key(&tenant, &path);
                let hash = sha256_hex(&bytes);
                self.store.put(&key, bytes).await?;
                segments.push(SegmentRecord { key, sha256: hash });
            }
        }

        let checkpoint = ArchivalCheckpoint::new(wal.get_status().seq, segments);
        self.store.put(CHECKPOINT_KEY, checkpoint.to_bytes()).await?;
        Ok(checkpoint)
    }

    /// Downloads the checkpoint, verifies each listed segment's hash, and
    /// writes the verified bytes under `dest_dir` using the object key's
    /// final path component as the file name. A hash mismatch aborts the
    /// restore rather than writing a segment that may be truncated or
    /// corrupted in transit.
    pub async fn restore(&self, dest_dir: &Path) -> Result<ArchivalCheckpoint, GatewayError> {
        let raw = self
        .store
        .get(CHECKPOINT_KEY)
        .await?
        .ok_or_else(|| GatewayError::new(ErrorKind::Io, "no archival checkpoint found"))?;
        let checkpoint = ArchivalCheckpoint::from_bytes(&raw).map_err(|e| GatewayError::new(ErrorKind::Io, format!("corrupt archival checkpoint: {e}")))?;

        std::fs::create_dir_all(dest_dir)?;
        for segment in &checkpoint.segments {
            let bytes = self
            .store
            .get(&segment.key)
            .await?
            .ok_or_else(|| GatewayError::new(ErrorKind::Io, format!("checkpoint names {} but object store has no such key", segment.key)))?;
            let actual_hash = sha256_hex(&bytes);
            if actual_hash != segment.sha256 {
                return Err(GatewayError::new(
                    ErrorKind::Io,
                    format!("hash mismatch restoring {}: expected {}, got {actual_hash}", segment.key, segment.sha256),
                ));
            }
            let name = segment.key.rsplit('/').next().unwrap_or(&segment.key);
            std::fs::write(dest_dir.join(name), &bytes)?;
        }
        Ok(checkpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::InMemoryObjectStore;
    use gateway_ledger::{Ledger, LedgerSettings};
    use gateway_wal::{Wal, WalSettings};

    async fn make_wal(dir: &Path) -> Wal {
        Wal::initialize(WalSettings { base_dir: dir.to_path_buf(), max_segment_size: 4096, ..Default::default() }).await.unwrap()
    }

    #[tokio::test]
    async fn sync_once_uploads_segments_and_writes_checkpoint() {
        let wal_dir = tempfile::tempdir().unwrap();
        let ledger_dir = tempfile::tempdir().unwrap();
        let wal = make_wal(wal_dir.path()).await;
        wal.append("test", "k1", Some(b"hello".to_vec())).await.unwrap();

        let ledger = Ledger::new(LedgerSettings { base_dir: ledger_dir.path().to_path_buf(), ..Default::default() });

        let store = Arc::new(InMemoryObjectStore::new());
        let sync = ArchivalSync::new(store.clone());
        let checkpoint = sync.sync_once(&wal, &ledger).await.unwrap();

        assert!(!checkpoint.segments.is_empty());
        assert!(store.get(CHECKPOINT_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn restore_rebuilds_local_files_and_verifies_hashes() {
        let wal_dir = tempfile::tempdir().unwrap();
        let ledger_dir = tempfile::tempdir().unwrap();
        let wal = make_wal(wal_dir.path()).await;
        wal.append("test", "k1", Some(b"payload".to_vec())).await.unwrap();
        let ledger = Ledger::new(LedgerSettings { base_dir: ledger_dir.path().to_path_buf(), ..Default::default() });

        let store = Arc::new(InMemoryObjectStore::new());
        let sync = ArchivalSync::new(store.clone());
        sync.sync_once(&wal, &ledger).await.unwrap();

        let restore_dir = tempfile::tempdir().unwrap();
        let checkpoint = sync.restore(restore_dir.path()).await.unwrap();
        assert!(!checkpoint.segments.is_empty());
        for segment in &checkpoint.segments {
            let name = segment.key.rsplit('/').next().unwrap();
            assert!(restore_dir.path().join(name).exists());
        }
    }

    #[tokio::test]
    async fn restore_fails_closed_on_hash_mismatch() {
        let store = Arc::new(InMemoryObjectStore::new());
        let bad_checkpoint = ArchivalCheckpoint::new(1, vec![SegmentRecord { key: "segments/0001.wal".to_string(), sha256: "deadbeef".repeat(8) }]);
        store.put(CHECKPOINT_KEY, bad_checkpoint.to_bytes()).await.unwrap();
        store.put("segments/0001.wal", b"actual bytes".to_vec()).await.unwrap();

        let sync = ArchivalSync::new(store);
        let restore_dir = tempfile::tempdir().unwrap();
        let result = sync.restore(restore_dir.path()).await;
        assert!(result.is_err());
    }
}
