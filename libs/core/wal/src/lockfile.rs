// [libs/core/wal/src/lockfile.rs]
use gateway_error::{ErrorKind, GatewayError};
use std::path::{Path, PathBuf};

/// Records the owning process identifier at init. Startup inspects it
/// and takes over if the recorded process is dead, otherwise fails —
///, "a lock-file recorded at init".
pub struct ProcessLock {
    path: PathBuf,
}

impl ProcessLock {
    pub fn acquire(dir: &Path) -> Result<Self, GatewayError> {
        let path = dir.join("wal.lock");
        if let Ok(contents) = std::fs::read_to_string(&path) {
            if let Ok(pid) = contents.trim().parse::<u32>() {
                if process_is_alive(pid) {
                    return Err(GatewayError::new(
                            ErrorKind::ConfigInvalid,
                            format!("WAL directory is owned by live process {pid}"),
                    ));
                }
                tracing::warn!(pid, "taking over WAL lock from dead process");
            }
        }
        std::fs::write(&path, std::process::id().to_string())?;
        Ok(Self { path })
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(target_os = "linux")]
fn process_is_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_is_alive(_pid: u32) -> bool {
    // Conservative: without a portable liveness check, assume the
    // recorded owner might still be alive rather than risk two writers.
    true
}
