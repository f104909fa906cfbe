// [libs/core/wal/src/compact.rs]
use crate::entry::WalEntry;
use std::collections::HashMap;

/// Retains only the latest entry written per distinct path, preserving
/// relative order: compaction for idempotent paths retains only the
/// latest write per path and any trailing delete.
///
/// Because the latest entry for a path is kept regardless of its
/// operation, a trailing delete is naturally preserved: it is simply the
/// last entry for that path.
pub fn compact(entries: &[WalEntry]) -> Vec<WalEntry> {
    let mut last_index_for_path: HashMap<&str, usize> = HashMap::new();
    for (index, entry) in entries.iter().enumerate() {
        last_index_for_path.insert(entry.path.as_str(), index);
    }
    let mut keep: Vec<usize> = last_index_for_path.into_values().collect();
    keep.sort_unstable();
    keep.into_iter().map(|i| entries[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_last_write_per_path() {
        let entries = vec![
            WalEntry::new(1, "write", "a", Some(b"1".to_vec())),
            WalEntry::new(2, "write", "b", Some(b"2".to_vec())),
            WalEntry::new(3, "write", "a", Some(b"3".to_vec())),
        ];
        let compacted = compact(&entries);
        assert_eq!(compacted.len(), 2);
        let paths: Vec<&str> = compacted.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"a"));
        assert!(paths.contains(&"b"));
        let a_entry = compacted.iter().find(|e| e.path == "a").unwrap();
        assert_eq!(a_entry.seq, 3);
    }

    #[test]
    fn trailing_delete_survives_compaction() {
        let entries = vec![
            WalEntry::new(1, "write", "a", Some(b"1".to_vec())),
            WalEntry::new(2, "delete", "a", None),
        ];
        let compacted = compact(&entries);
        assert_eq!(compacted.len(), 1);
        assert_eq!(compacted[0].operation, "delete");
    }
}
