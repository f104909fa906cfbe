// [libs/domain/ledger/src/rotation.rs]
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use gateway_error::GatewayError;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

const ARCHIVE_PREFIX: &str = "usage.";
const ARCHIVE_SUFFIX: &str = ".jsonl.gz";

/// Gzip-compresses the live ledger file at `live_path` into an archive
/// named `usage.YYYY-MM-DD.jsonl.gz` inside `archive_dir`, appending a
/// numeric suffix on same-day collisions, then truncates the live file —
/// but only once the file's last-modified time is at least
/// `rotation_age_days` old; a younger file is left alone. A rotation of
/// an already-empty file is a no-op.
pub fn rotate(live_path: &Path, archive_dir: &Path, rotation_age_days: i64) -> Result<Option<PathBuf>, GatewayError> {
    let metadata = match std::fs::metadata(live_path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let threshold = StdDuration::from_secs(rotation_age_days.max(0) as u64 * 86_400);
    let age = metadata.modified()?.elapsed().unwrap_or_default();
    if age < threshold {
        return Ok(None);
    }

    let mut contents = Vec::new();
    match File::open(live_path) {
        Ok(mut f) => {
            f.read_to_end(&mut contents)?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    if contents.is_empty() {
        return Ok(None);
    }

    std::fs::create_dir_all(archive_dir)?;
    let today = Utc::now().date_naive();
    let archive_path = next_free_archive_path(archive_dir, today);

    let file = File::create(&archive_path)?;
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(&contents)?;
    encoder.finish()?;

    // truncate in place: the writer task reopens its handle lazily, so
    // clobbering the file here is safe between writer commands.
    std::fs::write(live_path, b"")?;

    Ok(Some(archive_path))
}

fn next_free_archive_path(archive_dir: &Path, date: NaiveDate) -> PathBuf {
    let base = archive_dir.join(format!("{ARCHIVE_PREFIX}{date}{ARCHIVE_SUFFIX}"));
    if !base.exists() {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = archive_dir.join(format!("{ARCHIVE_PREFIX}{date}-{n}{ARCHIVE_SUFFIX}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Deletes archives in `archive_dir` whose embedded date is older than
/// `retention_days`. Archive names that don't match the expected
/// pattern are left alone rather than guessed at.
pub fn clean_retention(archive_dir: &Path, retention_days: i64) -> Result<usize, GatewayError> {
    let cutoff = Utc::now().date_naive() - ChronoDuration::days(retention_days);
    let mut removed = 0usize;

    let read_dir = match std::fs::read_dir(archive_dir) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    for entry in read_dir {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(date) = extract_date(name) else { continue };
        if date < cutoff {
            std::fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

fn extract_date(name: &str) -> Option<NaiveDate> {
    let rest = name.strip_prefix(ARCHIVE_PREFIX)?;
    let rest = rest.strip_suffix(ARCHIVE_SUFFIX)?;
    let date_part = rest.split('-').take(3).collect::<Vec<_>>().join("-");
    NaiveDate::parse_from_str(&date_part, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotate_compresses_and_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("usage.jsonl");
        let archive_dir = dir.path().join("archive");
        std::fs::write(&live, b"{\"a\":1}\n").unwrap();

        let archived = rotate(&live, &archive_dir, 0).unwrap().expect("should archive");
        assert!(archived.exists());
        assert_eq!(std::fs::read(&live).unwrap().len(), 0);
    }

    #[test]
    fn rotate_of_empty_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("usage.jsonl");
        std::fs::write(&live, b"").unwrap();
        let archive_dir = dir.path().join("archive");
        assert!(rotate(&live, &archive_dir, 0).unwrap().is_none());
    }

    #[test]
    fn rotate_leaves_a_file_younger_than_the_threshold_alone() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("usage.jsonl");
        let archive_dir = dir.path().join("archive");
        std::fs::write(&live, b"{\"a\":1}\n").unwrap();

        assert!(rotate(&live, &archive_dir, 1).unwrap().is_none());
        assert!(!std::fs::read(&live).unwrap().is_empty());
    }

    #[test]
    fn collision_gets_numeric_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let archive_dir = dir.path().join("archive");
        std::fs::create_dir_all(&archive_dir).unwrap();
        let today = Utc::now().date_naive();
        std::fs::write(archive_dir.join(format!("usage.{today}.jsonl.gz")), b"x").unwrap();

        let path = next_free_archive_path(&archive_dir, today);
        assert!(path.to_str().unwrap().contains(&format!("usage.{today}-2.jsonl.gz")));
    }

    #[test]
    fn clean_retention_removes_old_archives_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(&dir).unwrap();
        let old = Utc::now().date_naive() - ChronoDuration::days(100);
        let recent = Utc::now().date_naive();
        std::fs::write(dir.path().join(format!("usage.{old}.jsonl.gz")), b"x").unwrap();
        std::fs::write(dir.path().join(format!("usage.{recent}.jsonl.gz")), b"x").unwrap();

        let removed = clean_retention(dir.path(), 30).unwrap();
        assert_eq!(removed, 1);
        assert!(!dir.path().join(format!("usage.{old}.jsonl.gz")).exists());
        assert!(dir.path().join(format!("usage.{recent}.jsonl.gz")).exists());
    }
}
