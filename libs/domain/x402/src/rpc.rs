// [libs/domain/x402/src/rpc.rs]
//! On-chain receipt access is abstracted behind [`RpcPool`] — the
//! specific JSON-RPC transport is a non-goal here; only the
//! two calls names (`getTransactionReceipt`, `getBlockNumber`)
//! and the `Transfer(indexed from, indexed to, uint256 value)` log shape
//! are in scope.

use async_trait::async_trait;
use gateway_error::GatewayError;

/// One `Transfer` log entry from a transaction's receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferLog {
    /// Address of the contract that emitted the event.
    pub emitter: String,
    pub from: String,
    pub to: String,
    /// Raw token amount, smallest unit, as a decimal string.
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub tx_hash: String,
    pub success: bool,
    pub block_number: u64,
    pub logs: Vec<TransferLog>,
}

/// Abstract RPC pool. Implementations own connection pooling, retries,
/// and failover between upstream nodes; this crate only needs the two
/// read calls names.
#[async_trait]
pub trait RpcPool: Send + Sync {
    async fn get_transaction_receipt(&self, tx_hash: &str) -> Result<Option<TransactionReceipt>, GatewayError>;
    async fn get_block_number(&self) -> Result<u64, GatewayError>;
}
