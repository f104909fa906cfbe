// [libs/domain/ensemble/src/race.rs]
use crate::cost::{loser_cost, winner_cost, CostAttribution};
use crate::provider::{CompletionRequest, PriceTable, StreamEvent, StreamingProvider};
use gateway_error::{ErrorKind, GatewayError};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

pub struct PoolSpec {
    pub pool_id: String,
    pub provider: Arc<dyn StreamingProvider>,
    pub price: PriceTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchStatus {
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone)]
pub struct BranchOutcome {
    pub pool_id: String,
    pub status: BranchStatus,
    pub cost_micro: u64,
    pub attribution: Option<CostAttribution>,
    pub was_aborted: bool,
}

#[derive(Debug, Clone)]
pub struct EnsembleOutcome {
    pub winner_pool: String,
    pub total_cost_micro: u64,
    pub branches: Vec<BranchOutcome>,
}

/// One-time winner assignment shared by every branch task. Declaring a
/// winner is a test-and-set guarded by a
/// plain mutex held only for the assignment itself, never across an
/// await point; the `watch` channel lets `race` wait for the first
/// declaration without polling.
struct WinnerLatch {
    winner: Mutex<Option<String>>,
    declared_tx: watch::Sender<bool>,
    declared_rx: watch::Receiver<bool>,
}

impl WinnerLatch {
    fn new() -> Self {
        let (declared_tx, declared_rx) = watch::channel(false);
        Self { winner: Mutex::new(None), declared_tx, declared_rx }
    }

    fn try_declare(&self, pool_id: &str) -> bool {
        let mut guard = self.winner.lock().expect("winner latch mutex poisoned");
        if guard.is_none() {
            *guard = Some(pool_id.to_string());
            drop(guard);
            let _ = self.declared_tx.send(true);
            true
        } else {
            false
        }
    }

    async fn wait_for_declaration(&self) {
        let mut rx = self.declared_rx.clone();
        if *rx.borrow() {
            return;
        }
        let _ = rx.changed().await;
    }

    fn winner(&self) -> Option<String> {
        self.winner.lock().expect("winner latch mutex poisoned").clone()
    }
}

/// Races N streaming provider pools for a single completion. Returns the winner's attribution plus every other
/// branch's cancellation-time cost, and a channel the winner's content
/// chunks are forwarded through verbatim as they arrive.
pub struct EnsembleOrchestrator;

impl EnsembleOrchestrator {
    pub async fn race(
        request: CompletionRequest,
        pools: Vec<PoolSpec>,
        first_chunk_timeout: Duration,
    ) -> Result<(EnsembleOutcome, mpsc::Receiver<Vec<u8>>), GatewayError> {
        let latch = Arc::new(WinnerLatch::new());
        let (forward_tx, forward_rx) = mpsc::channel(256);

        let mut handles = Vec::with_capacity(pools.len());
        for pool in pools {
            let latch = latch.clone();
            let forward_tx = forward_tx.clone();
            let request = request.clone();
            handles.push(tokio::spawn(run_branch(pool, request, latch, forward_tx)));
        }
        drop(forward_tx);

        if tokio::time::timeout(first_chunk_timeout, latch.wait_for_declaration()).await.is_err() {
            for handle in &handles {
                handle.abort();
            }
            for handle in handles {
                let _ = handle.await;
            }
            return Err(GatewayError::new(ErrorKind::EnsembleTimeout, "no branch produced a first chunk before the deadline"));
        }

        let mut branches = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(outcome) => branches.push(outcome),
                Err(join_err) => {
                    tracing::warn!(error = %join_err, "ensemble branch task panicked or was aborted mid-flight");
                }
            }
        }

        let winner_pool = latch.winner().expect("a declaration was observed, so a winner exists");
        if !branches.iter().any(|b| b.status == BranchStatus::Completed) {
            return Err(GatewayError::new(ErrorKind::EnsembleAllFailed, "every branch failed or was cancelled"));
        }

        let total_cost_micro = branches.iter().map(|b| b.cost_micro).sum();
        Ok((EnsembleOutcome { winner_pool, total_cost_micro, branches }, forward_rx))
    }
}

async fn run_branch(
    pool: PoolSpec,
    request: CompletionRequest,
    latch: Arc<WinnerLatch>,
    forward_tx: mpsc::Sender<Vec<u8>>,
) -> BranchOutcome {
    let mut stream = match pool.provider.open_stream(&request).await {
        Ok(stream) => stream,
        Err(err) => {
            tracing::warn!(pool = %pool.pool_id, error = %err, "branch failed to open stream");
            return BranchOutcome { pool_id: pool.pool_id, status: BranchStatus::Failed, cost_micro: 0, attribution: None, was_aborted: false };
        }
    };

    let mut is_winner = false;
    let mut raced_and_lost = false;
    let mut observed_bytes = 0u64;
    let mut usage = None;

    // A losing branch must be cancelled the instant *any* pool wins, not
    // only when its own next chunk happens to arrive — otherwise a branch
    // still waiting on its first chunk would hang until its own stream
    // naturally ends instead of being latched as `cancelled`/`prompt_only`.
    loop {
        tokio::select! {
            biased;
            _ = latch.wait_for_declaration(), if !is_winner => {
                if latch.winner().as_deref() != Some(pool.pool_id.as_str()) {
                    raced_and_lost = true;
                }
                break;
            }
            event = stream.events.recv() => {
                match event {
                    Some(StreamEvent::Chunk(bytes)) => {
                        if !is_winner {
                            if latch.try_declare(&pool.pool_id) {
                                is_winner = true;
                            } else {
                                observed_bytes += bytes.len() as u64;
                                raced_and_lost = true;
                                break;
                            }
                        }
                        observed_bytes += bytes.len() as u64;
                        if forward_tx.send(bytes).await.is_err() {
                            break;
                        }
                    }
                    Some(StreamEvent::Usage(report)) => usage = Some(report),
                    Some(StreamEvent::Done) | None => break,
                }
            }
        }
    }

    stream.cancel.abort();

    if is_winner {
        let (cost_micro, attribution) = winner_cost(usage, observed_bytes, &pool.price);
        BranchOutcome { pool_id: pool.pool_id, status: BranchStatus::Completed, cost_micro, attribution: Some(attribution), was_aborted: false }
    } else if raced_and_lost || observed_bytes > 0 {
        let (cost_micro, attribution) = loser_cost(observed_bytes, request.prompt_tokens_estimate, &pool.price);
        BranchOutcome { pool_id: pool.pool_id, status: BranchStatus::Cancelled, cost_micro, attribution: Some(attribution), was_aborted: true }
    } else {
        BranchOutcome { pool_id: pool.pool_id, status: BranchStatus::Failed, cost_micro: 0, attribution: None, was_aborted: false }
    }
}
