// [libs/core/wal/src/checkpoint.rs]
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

/// Rotation phase tag, persisted alongside the checkpoint so a crash
/// mid-rotation is recoverable on the next startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationPhase {
    None,
    Rotating,
    CleanupStarted,
    CleanupDone,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub head_seq: u64,
    pub active_segment_index: u64,
    pub phase: RotationPhase,
    #[serde(default)]
    pub cleanup_segments: Vec<u64>,
    #[serde(default)]
    pub shutdown_incomplete: bool,
}

impl Checkpoint {
    pub fn initial() -> Self {
        Self {
            head_seq: 0,
            active_segment_index: 0,
            phase: RotationPhase::None,
            cleanup_segments: Vec::new(),
            shutdown_incomplete: false,
        }
    }

    pub fn load(dir: &Path) -> io::Result<Self> {
        let path = checkpoint_path(dir);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::initial()),
            Err(e) => Err(e),
        }
    }

    /// Writes the checkpoint via write-then-rename so a crash mid-write
    /// never leaves a torn checkpoint file behind.
    pub fn persist(&self, dir: &Path) -> io::Result<()> {
        let final_path = checkpoint_path(dir);
        let tmp_path = dir.join("checkpoint.json.tmp");
        let bytes = serde_json::to_vec_pretty(self)?;
        std::fs::write(&tmp_path, bytes)?;
        std::fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }
}

fn checkpoint_path(dir: &Path) -> std::path::PathBuf {
    dir.join("checkpoint.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut checkpoint = Checkpoint::initial();
        checkpoint.head_seq = 42;
        checkpoint.phase = RotationPhase::CleanupStarted;
        checkpoint.cleanup_segments = vec![0, 1];
        checkpoint.persist(dir.path()).unwrap();

        let loaded = Checkpoint::load(dir.path()).unwrap();
        assert_eq!(loaded.head_seq, 42);
        assert_eq!(loaded.phase, RotationPhase::CleanupStarted);
        assert_eq!(loaded.cleanup_segments, vec![0, 1]);
    }

    #[test]
    fn missing_file_yields_initial() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Checkpoint::load(dir.path()).unwrap();
        assert_eq!(loaded.phase, RotationPhase::None);
        assert_eq!(loaded.head_seq, 0);
    }
}
