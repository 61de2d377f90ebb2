//! Chain-specific types and error definitions.

use alloy::primitives::{Address, U256};
use serde::Serialize;
use thiserror::Error;

// Re-export NetworkConfig from config module to avoid duplication
pub use crate::config::schema::NetworkConfig;

/// Errors that can occur during chain operations.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Sender cannot cover the amount plus the fee buffer.
    #[error("Insufficient balance: have {balance}, need {required}")]
    InsufficientBalance { balance: U256, required: U256 },

    /// Node refused the transaction because the sender cannot pay for it.
    #[error("Insufficient funds for transaction fees: {0}")]
    InsufficientFunds(String),

    /// Amount is not a positive decimal number.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Operation needs a wallet but none was configured.
    #[error("No signer available")]
    NoSigner,

    /// Address could not be parsed.
    #[error("Invalid address '{0}'")]
    InvalidAddress(String),

    /// Module registration payload is incomplete.
    #[error("Invalid module: {0}")]
    InvalidModule(String),

    /// No terminal status arrived before the deadline.
    #[error("Transaction {tx_hash} timed out after {timeout_secs}s")]
    TransactionTimeout { tx_hash: String, timeout_secs: u64 },

    /// Chain rejected, dropped or reverted the transaction.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Could not open or prepare the chain connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// RPC request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Invalid private key format or signing failure.
    #[error("Wallet error: {0}")]
    Wallet(String),
}

/// Result type for chain operations.
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Lifecycle of either half of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
}

/// Status update emitted by the chain for a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    /// Queued but not yet valid (e.g. nonce gap).
    Future,
    /// In the pool and ready for inclusion.
    Ready,
    /// Gossiped to peers.
    Broadcast,
    /// Included in a block.
    InBlock { block_hash: String },
    /// The including block was reorganised away.
    Retracted { block_hash: String },
    /// Included in a finalized block.
    Finalized { block_hash: String },
    /// Executed but the chain reported an error (revert, dispatch error).
    Failed {
        block_hash: Option<String>,
        reason: String,
    },
    /// Removed from the pool without inclusion.
    Dropped,
    /// Rejected as invalid.
    Invalid,
}

impl TxStatus {
    pub fn name(&self) -> &'static str {
        match self {
            TxStatus::Future => "Future",
            TxStatus::Ready => "Ready",
            TxStatus::Broadcast => "Broadcast",
            TxStatus::InBlock { .. } => "InBlock",
            TxStatus::Retracted { .. } => "Retracted",
            TxStatus::Finalized { .. } => "Finalized",
            TxStatus::Failed { .. } => "Failed",
            TxStatus::Dropped => "Dropped",
            TxStatus::Invalid => "Invalid",
        }
    }
}

/// Terminal inclusion status reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FinalStatus {
    InBlock,
    Finalized,
}

/// Result of a successfully settled transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOutcome {
    pub tx_hash: String,
    pub block_hash: String,
    pub status: FinalStatus,
}

/// Module registration payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleInfo {
    /// Registry name, conventionally `{module}/{owner}`.
    pub name: String,
    /// Content identifier of the module code/metadata.
    pub data: String,
    /// Serving URL.
    pub url: String,
    /// Commission taken by the module owner (percent).
    pub take: u16,
}

impl ModuleInfo {
    /// Reject payloads with empty mandatory fields or an out-of-range take.
    pub fn validate(&self) -> NetworkResult<()> {
        if self.name.trim().is_empty() {
            return Err(NetworkError::InvalidModule("name is empty".to_string()));
        }
        if self.data.trim().is_empty() {
            return Err(NetworkError::InvalidModule("data is empty".to_string()));
        }
        if self.url.trim().is_empty() {
            return Err(NetworkError::InvalidModule("url is empty".to_string()));
        }
        if self.take > 100 {
            return Err(NetworkError::InvalidModule(format!(
                "take {} exceeds 100",
                self.take
            )));
        }
        Ok(())
    }
}

/// A chain operation ready to be signed and sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainCall {
    /// Native token transfer in base units.
    Transfer { dest: Address, amount: U256 },
    /// Register a new module.
    RegisterModule(ModuleInfo),
    /// Replace the registration of an existing module.
    UpdateModule { module_id: u64, module: ModuleInfo },
}

impl ChainCall {
    pub fn name(&self) -> &'static str {
        match self {
            ChainCall::Transfer { .. } => "transfer",
            ChainCall::RegisterModule(_) => "register_module",
            ChainCall::UpdateModule { .. } => "update_module",
        }
    }
}
