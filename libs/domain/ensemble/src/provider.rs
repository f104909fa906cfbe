// [libs/domain/ensemble/src/provider.rs]
use async_trait::async_trait;
use gateway_error::GatewayError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub prompt: String,
    pub prompt_tokens_estimate: u64,
}

/// One event in a provider's stream. `Usage` is optional and, when
/// present, arrives as (or just before) the terminal event — its absence
/// is what pushes a branch's cost attribution to byte estimation.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Chunk(Vec<u8>),
    Usage(UsageReport),
    Done,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UsageReport {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// A branch's open stream plus the handle needed to cancel it. Losing
/// the winner latch calls `cancel.abort()`, which must propagate all the
/// way down to the underlying subprocess or HTTP connection — the
/// provider adapter is expected to tie `cancel` to whatever task is
/// actually doing the I/O.
pub struct BranchStream {
    pub events: mpsc::Receiver<StreamEvent>,
    pub cancel: JoinHandle<()>,
}

#[async_trait]
pub trait StreamingProvider: Send + Sync {
    async fn open_stream(&self, request: &CompletionRequest) -> Result<BranchStream, GatewayError>;
}

#[derive(Debug, Clone)]
pub struct PriceTable {
    pub micro_per_prompt_token: u64,
    pub micro_per_completion_token: u64,
    /// Fallback rate per byte of observed content, used whenever a
    /// stream never reports usage.
    pub micro_per_estimated_byte: u64,
}
