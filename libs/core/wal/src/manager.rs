// [libs/core/wal/src/manager.rs]
use crate::checkpoint::{Checkpoint, RotationPhase};
use crate::entry::WalEntry;
use crate::lockfile::ProcessLock;
use crate::segment::Segment;
use gateway_error::{ErrorKind, GatewayError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};

/// Component settings. Kept independent of `gateway-config`'s `clap`
/// surface so this crate has no CLI dependency of its own — `apps/gateway`
/// adapts the parsed CLI config into this type.
#[derive(Debug, Clone)]
pub struct WalSettings {
    pub base_dir: PathBuf,
    pub max_segment_size: u64,
    pub shutdown_drain_timeout: Duration,
    pub pressure_low_bytes: u64,
    pub pressure_high_bytes: u64,
}

impl Default for WalSettings {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./data/wal"),
            max_segment_size: 64 * 1024 * 1024,
            shutdown_drain_timeout: Duration::from_secs(5),
            pressure_low_bytes: 256 * 1024 * 1024,
            pressure_high_bytes: 512 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WalStatus {
    pub seq: u64,
    pub segment_count: usize,
    pub pressure: bool,
    pub shutting_down: bool,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ReplayStats {
    pub replayed: usize,
    pub errors: usize,
}

pub struct ReplayOptions {
    pub since_seq: Option<u64>,
    pub limit: Option<usize>,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self { since_seq: None, limit: None }
    }
}

/// Visits each replayed entry. Errors returned from `visit` are recorded
/// but do not abort the replay — only stops on I/O failure
/// reading the segment itself.
pub trait WalVisitor {
    fn visit(&mut self, entry: &WalEntry);
}

impl<F: FnMut(&WalEntry)> WalVisitor for F {
    fn visit(&mut self, entry: &WalEntry) {
        self(entry)
    }
}

enum Command {
    Append {
        operation: String,
        path: String,
        data: Option<Vec<u8>>,
        reply: oneshot::Sender<Result<u64, GatewayError>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

struct Shared {
    base_dir: PathBuf,
    next_seq: AtomicU64,
    segment_count: AtomicU64,
    pressure: AtomicBool,
    shutting_down: AtomicBool,
    shutdown_incomplete: AtomicBool,
    // held only so the destructor runs when the Wal is dropped
    _lock: AsyncMutex<Option<ProcessLock>>,
}

/// Handle to the durable log. Cheap to clone; all state lives behind the
/// single background writer task.
#[derive(Clone)]
pub struct Wal {
    shared: Arc<Shared>,
    command_tx: mpsc::Sender<Command>,
}

impl Wal {
    /// Opens (or creates) the WAL at `settings.base_dir`, taking over a
    /// stale lock-file if the recorded owner is dead, recovering an
    /// in-flight rotation if the checkpoint phase is not `none`, and
    /// starting the single-writer background task.
    pub async fn initialize(settings: WalSettings) -> Result<Self, GatewayError> {
        std::fs::create_dir_all(&settings.base_dir)?;
        let lock = ProcessLock::acquire(&settings.base_dir)?;

        let mut checkpoint = Checkpoint::load(&settings.base_dir)?;
        recover_rotation(&settings.base_dir, &mut checkpoint)?;

        let active = Segment::open_for_append(&settings.base_dir, checkpoint.active_segment_index)?;
        let segment_count = count_segments(&settings.base_dir, checkpoint.active_segment_index);

        let shared = Arc::new(Shared {
                base_dir: settings.base_dir.clone(),
                next_seq: AtomicU64::new(checkpoint.head_seq),
                segment_count: AtomicU64::new(segment_count),
                pressure: AtomicBool::new(false),
                shutting_down: AtomicBool::new(false),
                shutdown_incomplete: AtomicBool::new(false),
                _lock: AsyncMutex::new(Some(lock)),
        });

        let (tx, rx) = mpsc::channel(1024);
        let writer_shared = shared.clone();
        tokio::spawn(run_writer(rx, writer_shared, settings, active, checkpoint));

        Ok(Self { shared, command_tx: tx })
    }

    /// Appends one entry and returns its assigned sequence number.
    pub async fn append(&self, operation: impl Into<String>, path: impl Into<String>, data: Option<Vec<u8>>) -> Result<u64, GatewayError> {
        if self.shared.shutting_down.load(Ordering::SeqCst) {
            return Err(GatewayError::new(ErrorKind::ShuttingDown, "WAL is shutting down"));
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
        .send(Command::Append { operation: operation.into(), path: path.into(), data, reply: reply_tx })
        .await
        .map_err(|_| GatewayError::new(ErrorKind::ShuttingDown, "WAL writer task is gone"))?;
        reply_rx.await.map_err(|_| GatewayError::new(ErrorKind::Io, "WAL writer task dropped reply"))?
    }

    /// Replays every entry across all segments in order, oldest first.
    pub fn replay<V: WalVisitor>(&self, visitor: &mut V, options: ReplayOptions) -> Result<ReplayStats, GatewayError> {
        let mut stats = ReplayStats::default();
        for index in 0..=current_max_segment_index(&self.shared.base_dir) {
            let path = Segment::segment_path(&self.shared.base_dir, index);
            let (entries, warnings) = Segment::read_entries(&path)?;
            stats.errors += warnings;
            for entry in entries {
                if let Some(since) = options.since_seq {
                    if entry.seq < since {
                        continue;
                    }
                }
                if let Some(limit) = options.limit {
                    if stats.replayed >= limit {
                        return Ok(stats);
                    }
                }
                visitor.visit(&entry);
                stats.replayed += 1;
            }
        }
        Ok(stats)
    }

    pub fn get_entries_since(&self, seq: u64, limit: Option<usize>) -> Result<Vec<WalEntry>, GatewayError> {
        let mut out = Vec::new();
        self.replay(&mut |entry: &WalEntry| out.push(entry.clone()), ReplayOptions { since_seq: Some(seq), limit })?;
        Ok(out)
    }

    pub fn get_status(&self) -> WalStatus {
        WalStatus {
            seq: self.shared.next_seq.load(Ordering::SeqCst),
            segment_count: self.shared.segment_count.load(Ordering::SeqCst) as usize,
            pressure: self.shared.pressure.load(Ordering::SeqCst),
            shutting_down: self.shared.shutting_down.load(Ordering::SeqCst),
        }
    }

    /// All segment paths in order, for `ArchivalSync` to batch-upload.
    pub fn list_segments(&self) -> Vec<PathBuf> {
        let max = current_max_segment_index(&self.shared.base_dir);
        (0..=max).map(|i| Segment::segment_path(&self.shared.base_dir, i)).collect()
    }

    pub fn base_dir(&self) -> &Path {
        &self.shared.base_dir
    }

    /// Drains the write queue within `drain_timeout`. If the deadline is
    /// exceeded the checkpoint is still written, but flagged so the next
    /// startup can attempt reconciliation.
    pub async fn shutdown(&self, drain_timeout: Duration) -> Result<(), GatewayError> {
        self.shared.shutting_down.store(true, Ordering::SeqCst);
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.command_tx.send(Command::Shutdown { reply: reply_tx }).await.is_err() {
            return Ok(());
        }
        match tokio::time::timeout(drain_timeout, reply_rx).await {
            Ok(_) => Ok(()),
            Err(_) => {
                self.shared.shutdown_incomplete.store(true, Ordering::SeqCst);
                Err(GatewayError::new(ErrorKind::ShuttingDown, "WAL drain exceeded deadline"))
            }
        }
    }
}

fn count_segments(dir: &Path, active_index: u64) -> u64 {
    let mut count = 0;
    for i in 0..=active_index {
        if Segment::segment_path(dir, i).exists() {
            count += 1;
        }
    }
    count.max(1)
}

fn current_max_segment_index(dir: &Path) -> u64 {
    let mut max = 0;
    loop {
        if Segment::segment_path(dir, max + 1).exists() {
            max += 1;
        } else {
            break;
        }
    }
    max
}

/// Recovers from a crash mid-rotation, per the three-phase rotation
/// state machine (`rotating` / `cleanup_started` / `none`).
fn recover_rotation(dir: &Path, checkpoint: &mut Checkpoint) -> Result<(), GatewayError> {
    match checkpoint.phase {
        RotationPhase::None => {}
        RotationPhase::Rotating => {
            let path = Segment::segment_path(dir, checkpoint.active_segment_index);
            Segment::read_entries(&path)?; // must be openable/readable to commit
            checkpoint.phase = RotationPhase::None;
            checkpoint.persist(dir)?;
        }
        RotationPhase::CleanupStarted | RotationPhase::CleanupDone => {
            for index in checkpoint.cleanup_segments.drain(..).collect::<Vec<_>>() {
                let path = Segment::segment_path(dir, index);
                if path.exists() {
                    std::fs::remove_file(&path)?;
                }
            }
            checkpoint.phase = RotationPhase::None;
            checkpoint.persist(dir)?;
        }
    }
    Ok(())
}

async fn run_writer(
    mut rx: mpsc::Receiver<Command>,
    shared: Arc<Shared>,
    settings: WalSettings,
    mut active: Segment,
    mut checkpoint: Checkpoint,
) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Append { operation, path, data, reply } => {
                let result = do_append(&shared, &settings, &mut active, &mut checkpoint, operation, path, data);
                let _ = reply.send(result);
            }
            Command::Shutdown { reply } => {
                checkpoint.shutdown_incomplete = shared.shutdown_incomplete.load(Ordering::SeqCst);
                let _ = checkpoint.persist(&settings.base_dir);
                let _ = reply.send(());
                break;
            }
        }
    }
}

fn do_append(
    shared: &Shared,
    settings: &WalSettings,
    active: &mut Segment,
    checkpoint: &mut Checkpoint,
    operation: String,
    path: String,
    data: Option<Vec<u8>>,
) -> Result<u64, GatewayError> {
    evaluate_disk_pressure(shared, settings)?;

    let seq = checkpoint.head_seq + 1;
    let entry = WalEntry::new(seq, operation, path, data);
    active.append(&entry)?;
    checkpoint.head_seq = seq;
    shared.next_seq.store(seq, Ordering::SeqCst);

    if active.size() >= settings.max_segment_size {
        rotate(shared, settings, active, checkpoint)?;
    }

    Ok(seq)
}

fn evaluate_disk_pressure(shared: &Shared, settings: &WalSettings) -> Result<(), GatewayError> {
    let available = fs2::available_space(&settings.base_dir).unwrap_or(u64::MAX);
    let tripped = shared.pressure.load(Ordering::SeqCst);
    if !tripped && available < settings.pressure_low_bytes {
        shared.pressure.store(true, Ordering::SeqCst);
    }
    if shared.pressure.load(Ordering::SeqCst) {
        if available > settings.pressure_high_bytes {
            shared.pressure.store(false, Ordering::SeqCst);
        } else {
            return Err(GatewayError::new(ErrorKind::DiskPressure, "free disk below low watermark"));
        }
    }
    Ok(())
}

fn rotate(shared: &Shared, settings: &WalSettings, active: &mut Segment, checkpoint: &mut Checkpoint) -> Result<(), GatewayError> {
    checkpoint.phase = RotationPhase::Rotating;
    checkpoint.persist(&settings.base_dir)?;

    let new_index = active.index + 1;
    let new_segment = Segment::open_for_append(&settings.base_dir, new_index)?;
    *active = new_segment;
    checkpoint.active_segment_index = new_index;
    shared.segment_count.fetch_add(1, Ordering::SeqCst);

    checkpoint.phase = RotationPhase::CleanupStarted;
    checkpoint.cleanup_segments = Vec::new();
    checkpoint.persist(&settings.base_dir)?;

    checkpoint.phase = RotationPhase::None;
    checkpoint.persist(&settings.base_dir)?;
    Ok(())
}
