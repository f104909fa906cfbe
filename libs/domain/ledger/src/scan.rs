// [libs/domain/ledger/src/scan.rs]
use crate::entry::LedgerEntry;
use gateway_error::GatewayError;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

/// Lazy line-by-line reader over a tenant's live ledger file. Built as
/// an iterator rather than a `Vec` collection so a caller scanning a
/// large ledger doesn't have to hold the whole thing in memory.
pub struct EntryScan {
    lines: Lines<BufReader<File>>,
}

impl EntryScan {
    pub fn open(path: &Path) -> Result<Self, GatewayError> {
        let file = File::open(path)?;
        Ok(Self { lines: BufReader::new(file).lines() })
    }
}

impl Iterator for EntryScan {
    type Item = Result<LedgerEntry, GatewayError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(l) => l,
                Err(e) => return Some(Err(e.into())),
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some(serde_json::from_str::<LedgerEntry>(&line).map_err(|e| {
                        gateway_error::GatewayError::new(gateway_error::ErrorKind::Io, e.to_string())
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::BillingMethod;
    use chrono::Utc;

    #[test]
    fn scans_entries_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.jsonl");
        let mut entry = LedgerEntry {
            schema_version: 2,
            timestamp: Utc::now(),
            trace_id: "t1".into(),
            agent: "a".into(),
            provider: "openai".into(),
            model: "m".into(),
            project_id: "p".into(),
            phase_id: "ph".into(),
            sprint_id: "s".into(),
            tenant_id: "tenant-a".into(),
            nft_id: None,
            pool_id: None,
            ensemble_id: None,
            prompt_tokens: 1,
            completion_tokens: 1,
            reasoning_tokens: 0,
            input_cost_micro: "1".into(),
            output_cost_micro: "0".into(),
            reasoning_cost_micro: "0".into(),
            total_cost_micro: "1".into(),
            price_table_version: "v1".into(),
            billing_method: BillingMethod::ProviderReported,
            crc32: String::new(),
        };
        entry.stamp_crc32();
        std::fs::write(&path, format!("{}\n", entry.to_line().unwrap())).unwrap();

        let scan = EntryScan::open(&path).unwrap();
        let collected: Vec<_> = scan.collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].trace_id, "t1");
    }
}
