// [libs/infra/archival/src/checkpoint.rs]
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const CHECKPOINT_KEY: &str = "checkpoints/latest.json";

/// One uploaded segment: its object key and the sha256 of the bytes that
/// were uploaded under it, so `restore` can detect a corrupted or
/// truncated download before trusting the local copy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SegmentRecord {
    pub key: String,
    pub sha256: String,
}

/// The small object written last in a sync pass, listing every segment
/// uploaded so far and the WAL sequence number they cover up to. Restore
/// starts here: download the checkpoint, then fetch and verify each
/// listed segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivalCheckpoint {
    pub head_seq: u64,
    pub segments: Vec<SegmentRecord>,
    pub created_at: DateTime<Utc>,
}

impl ArchivalCheckpoint {
    pub fn new(head_seq: u64, segments: Vec<SegmentRecord>) -> Self {
        Self { head_seq, segments, created_at: Utc::now() }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec_pretty(self).expect("ArchivalCheckpoint is always representable as JSON")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
