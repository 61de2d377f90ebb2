//! Chain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Network::{transfer, register, update}
//!     → preconditions (signer, amount, address, module fields)
//!     → connection.rs (call-scoped ConnectionHandle: provider + API readiness)
//!     → balance check against the fee buffer
//!     → submission.rs (sign & send, race status feed against the deadline)
//!     → disconnect on every exit path
//! ```
//!
//! # Security Constraints
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts
//! - A pending transaction settles exactly once

pub mod connection;
pub mod evm;
pub mod network;
pub mod submission;
pub mod types;
pub mod wallet;

pub use connection::{ChainConnection, ChainConnector, ConnectionHandle, Submission, Subscription};
pub use evm::EvmConnector;
pub use network::Network;
pub use submission::{submit_tx, PendingTransaction, SubmitPolicy};
pub use types::{
    ChainCall, ConnectionState, FinalStatus, ModuleInfo, NetworkConfig, NetworkError,
    NetworkResult, TxOutcome, TxStatus,
};
pub use wallet::{RecoveryVerifier, Wallet};
