// [libs/core/wal/src/segment.rs]
use crate::entry::WalEntry;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// One file holding a contiguous prefix of entries. Segments are totally
/// ordered by `index`.
pub struct Segment {
    pub index: u64,
    path: PathBuf,
    file: File,
    size: u64,
}

impl Segment {
    pub fn segment_path(dir: &Path, index: u64) -> PathBuf {
        dir.join(format!("segment-{index:020}.jsonl"))
    }

    /// Opens (creating if absent) the segment file for appending, seeking
    /// past whatever is already on disk.
    pub fn open_for_append(dir: &Path, index: u64) -> io::Result<Self> {
        let path = Self::segment_path(dir, index);
        let file = OpenOptions::new().create(true).append(true).read(true).open(&path)?;
        let size = file.metadata()?.len();
        Ok(Self { index, path, file, size })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Appends one entry as a newline-delimited JSON line and fsyncs the
    /// data so the write survives a crash — the "crash-safe" guarantee
    /// this whole component exists to provide.
    pub fn append(&mut self, entry: &WalEntry) -> io::Result<()> {
        let mut line = entry.to_line().map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.sync_data()?;
        self.size += line.len() as u64;
        Ok(())
    }

    /// Reads back every syntactically valid line, verifying each entry's
    /// checksum. Malformed or checksum-failing lines are skipped with a
    /// warning rather than aborting the read.
    pub fn read_entries(path: &Path) -> io::Result<(Vec<WalEntry>, usize)> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
            Err(e) => return Err(e),
        };
        let reader = BufReader::new(file);
        let mut entries = Vec::new();
        let mut warnings = 0usize;
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match WalEntry::from_line(&line) {
                Ok(entry) if entry.verify_checksum() => entries.push(entry),
                Ok(entry) => {
                    tracing::warn!(segment = %path.display(), line = line_no, seq = entry.seq, "WAL entry checksum mismatch, skipping");
                    warnings += 1;
                }
                Err(err) => {
                    tracing::warn!(segment = %path.display(), line = line_no, error = %err, "malformed WAL line, skipping");
                    warnings += 1;
                }
            }
        }
        Ok((entries, warnings))
    }
}
