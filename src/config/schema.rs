//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Request envelope signing and replay-window policy.
    pub auth: AuthConfig,

    /// Remote module server settings.
    pub rpc: RpcConfig,

    /// Chain connection and transaction submission settings.
    pub network: NetworkConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Envelope fields that may be covered by a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureField {
    Data,
    Time,
    Cost,
    Key,
}

impl SignatureField {
    /// Name of the field in the wire envelope.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureField::Data => "data",
            SignatureField::Time => "time",
            SignatureField::Cost => "cost",
            SignatureField::Key => "key",
        }
    }
}

/// Auth envelope policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Maximum tolerated skew between signer and verifier clocks, in seconds.
    pub max_age_secs: u64,

    /// Fields covered by the signature, serialized in this order.
    pub signature_keys: Vec<SignatureField>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_age_secs: 3600,
            signature_keys: vec![
                SignatureField::Data,
                SignatureField::Time,
                SignatureField::Cost,
            ],
        }
    }
}

/// Remote module server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Base URL every call is addressed under (`{base_url}/{fn}`).
    pub base_url: String,

    /// Total request timeout in seconds (0 disables the client-side timeout).
    pub request_timeout_secs: u64,
}

impl RpcConfig {
    /// Base URL with `http://` assumed when no scheme is given (`localhost:8000`).
    pub fn resolved_base_url(&self) -> String {
        let base_url = self.base_url.trim();
        if base_url.contains("://") {
            base_url.to_string()
        } else {
            format!("http://{}", base_url)
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Chain integration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Human-readable network name for logs.
    pub name: String,

    /// JSON-RPC endpoint URL.
    pub endpoint: String,

    /// Chain ID (e.g., 1 for Ethereum mainnet, 31337 for local Anvil).
    pub chain_id: u64,

    /// Per-request RPC timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Upper bound on waiting for a terminal transaction status, in seconds.
    pub tx_timeout_secs: u64,

    /// Minimum balance (base units) kept back for fees on top of any transfer.
    pub fee_buffer: u64,

    /// Token decimals used to parse and format human amounts.
    pub decimals: u8,

    /// Resolve only on finalization instead of first inclusion.
    pub wait_for_finalization: bool,

    /// Blocks on top of the inclusion block before a transaction counts as finalized.
    pub confirmation_blocks: u32,

    /// Receipt polling interval in milliseconds.
    pub poll_interval_ms: u64,

    /// Address of the module registry contract.
    pub registry_address: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: "devnet".to_string(),
            endpoint: "http://localhost:8545".to_string(),
            chain_id: 31337,
            rpc_timeout_secs: 10,
            tx_timeout_secs: 120,
            fee_buffer: 100_000_000,
            decimals: 18,
            wait_for_finalization: false,
            confirmation_blocks: 3,
            poll_interval_ms: 2000,
            registry_address: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines instead of the human-readable format.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}
