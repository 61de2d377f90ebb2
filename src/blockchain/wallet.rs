//! Wallet management and message signing.
//!
//! # Security
//! - Keys are never logged or serialized
//! - The library never reads the environment on its own; `from_env` is for binaries

use alloy::primitives::{Address, Signature};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;

use crate::auth::{KeyHolder, SignerError};
use crate::blockchain::types::{NetworkError, NetworkResult};

/// Environment variable name for the private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "MODCHAIN_PRIVATE_KEY";

/// Local secp256k1 key used both for auth envelopes and chain transactions.
#[derive(Debug, Clone)]
pub struct Wallet {
    /// The underlying signer (private key).
    signer: PrivateKeySigner,
    /// Chain ID for EIP-155 replay protection.
    chain_id: u64,
}

impl Wallet {
    /// Create a wallet from a hex-encoded private key string.
    ///
    /// # Arguments
    /// * `private_key_hex` - Hex string (with or without 0x prefix)
    /// * `chain_id` - Chain ID for transaction signing
    pub fn from_private_key(private_key_hex: &str, chain_id: u64) -> NetworkResult<Self> {
        let key_hex = private_key_hex.trim();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| NetworkError::Wallet(format!("Invalid private key format: {}", e)))?;

        tracing::debug!(address = %signer.address(), chain_id, "Wallet initialized");

        Ok(Self { signer, chain_id })
    }

    /// Load wallet from the `MODCHAIN_PRIVATE_KEY` environment variable.
    pub fn from_env(chain_id: u64) -> NetworkResult<Self> {
        let private_key = std::env::var(PRIVATE_KEY_ENV_VAR).map_err(|_| {
            NetworkError::Wallet(format!(
                "Environment variable {} not set",
                PRIVATE_KEY_ENV_VAR
            ))
        })?;

        Self::from_private_key(&private_key, chain_id)
    }

    /// Get the wallet's address.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Get the chain ID this wallet is configured for.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// The underlying signer, for building transaction-signing providers.
    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    /// Sign arbitrary message bytes (EIP-191 personal message).
    pub fn sign_message(&self, message: &[u8]) -> NetworkResult<Signature> {
        self.signer
            .sign_message_sync(message)
            .map_err(|e| NetworkError::Wallet(format!("Message signing failed: {}", e)))
    }
}

/// Check a hex-encoded EIP-191 signature by recovering its signer.
///
/// Anything unparseable counts as a failed verification.
pub fn verify_message(message: &[u8], signature: &str, address: &str) -> bool {
    let Ok(expected) = address.trim().parse::<Address>() else {
        return false;
    };
    let sig_hex = signature.strip_prefix("0x").unwrap_or(signature);
    let Ok(bytes) = hex::decode(sig_hex) else {
        return false;
    };
    let Ok(signature) = Signature::from_raw(&bytes) else {
        return false;
    };
    matches!(signature.recover_address_from_msg(message), Ok(recovered) if recovered == expected)
}

impl KeyHolder for Wallet {
    fn address(&self) -> String {
        self.signer.address().to_string()
    }

    fn sign(&self, message: &[u8]) -> Result<String, SignerError> {
        let signature = self
            .sign_message(message)
            .map_err(|e| SignerError(e.to_string()))?;
        Ok(format!("0x{}", hex::encode(signature.as_bytes())))
    }

    fn verify(&self, message: &[u8], signature: &str, public_key: &str) -> bool {
        verify_message(message, signature, public_key)
    }
}

/// Key holder that can only check signatures.
///
/// Verification recovers the signer from the signature, so no private key is
/// needed to check tokens issued by others.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryVerifier;

impl KeyHolder for RecoveryVerifier {
    fn address(&self) -> String {
        String::new()
    }

    fn sign(&self, _message: &[u8]) -> Result<String, SignerError> {
        Err(SignerError("verification-only key holder cannot sign".to_string()))
    }

    fn verify(&self, message: &[u8], signature: &str, public_key: &str) -> bool {
        verify_message(message, signature, public_key)
    }
}
