// [libs/core/wal/src/entry.rs]
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Operations in the closed set this crate names explicitly. Anything else
/// read back off disk is still delivered to replay visitors — it is
/// simply not one of these — so forward compatibility does not require
/// a schema migration to add a new tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownOperation {
    Write,
    Delete,
    Audit,
}

impl KnownOperation {
    pub const fn as_str(self) -> &'static str {
        match self {
            KnownOperation::Write => "write",
            KnownOperation::Delete => "delete",
            KnownOperation::Audit => "audit",
        }
    }

    pub fn parse(op: &str) -> Option<Self> {
        match op {
            "write" => Some(KnownOperation::Write),
            "delete" => Some(KnownOperation::Delete),
            "audit" => Some(KnownOperation::Audit),
            _ => None,
        }
    }
}

/// A single durable record. `operation` is stored as a plain string
/// rather than a closed Rust enum so that a tag this binary doesn't know
/// about round-trips untouched through `replay` — see [`KnownOperation`]
/// for the closed subset the gateway itself ever writes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalEntry {
    pub id: String,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<String>,
    #[serde(rename = "entryChecksum")]
    pub entry_checksum: String,
}

impl WalEntry {
    /// Builds a new entry with a fresh id and checksum. `data` is raw
    /// bytes; it is base64-encoded for the on-disk representation.
    pub fn new(seq: u64, operation: impl Into<String>, path: impl Into<String>, data: Option<Vec<u8>>) -> Self {
        let timestamp = Utc::now();
        let id = format!("{}-{}", timestamp.timestamp_millis(), Uuid::new_v4());
        let operation = operation.into();
        let path = path.into();
        let data = data.map(|bytes| BASE64.encode(bytes));
        let entry_checksum = checksum(&id, seq, &timestamp, &operation, &path, &data);
        Self { id, seq, timestamp, operation, path, data, entry_checksum }
    }

    /// The decoded payload, if any.
    pub fn data_bytes(&self) -> Option<Vec<u8>> {
        self.data.as_deref().and_then(|encoded| BASE64.decode(encoded).ok())
    }

    pub fn known_operation(&self) -> Option<KnownOperation> {
        KnownOperation::parse(&self.operation)
    }

    /// Recomputes the checksum and compares it against the stored value.
    pub fn verify_checksum(&self) -> bool {
        checksum(&self.id, self.seq, &self.timestamp, &self.operation, &self.path, &self.data) == self.entry_checksum
    }

    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}

fn checksum(
    id: &str,
    seq: u64,
    timestamp: &DateTime<Utc>,
    operation: &str,
    path: &str,
    data: &Option<String>,
) -> String {
    #[derive(Serialize)]
    struct ChecksumInput<'a> {
        id: &'a str,
        seq: u64,
        timestamp: String,
        operation: &'a str,
        path: &'a str,
        data: &'a Option<String>,
    }
    let input = ChecksumInput { id, seq, timestamp: timestamp.to_rfc3339(), operation, path, data };
    let bytes = serde_json::to_vec(&input).expect("checksum input is always serializable");
    format!("{:08x}", crc32fast::hash(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_round_trips() {
        let entry = WalEntry::new(1, "write", "tenant/alice", Some(b"payload".to_vec()));
        assert!(entry.verify_checksum());
        let line = entry.to_line().unwrap();
        let parsed = WalEntry::from_line(&line).unwrap();
        assert!(parsed.verify_checksum());
        assert_eq!(parsed.data_bytes().unwrap(), b"payload");
    }

    #[test]
    fn tampering_breaks_checksum() {
        let mut entry = WalEntry::new(1, "write", "tenant/alice", None);
        entry.path = "tenant/mallory".to_string();
        assert!(!entry.verify_checksum());
    }

    #[test]
    fn unknown_operation_still_parses() {
        let mut entry = WalEntry::new(1, "write", "p", None);
        entry.operation = "future_op".to_string();
        entry.entry_checksum =
        checksum(&entry.id, entry.seq, &entry.timestamp, &entry.operation, &entry.path, &entry.data);
        assert!(entry.verify_checksum());
        assert_eq!(entry.known_operation(), None);
    }
}
