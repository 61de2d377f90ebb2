//! Envelope types and error definitions.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Re-export the policy types from the config module to avoid duplication
pub use crate::config::schema::{AuthConfig, SignatureField};

/// Unpadded base64url on output; padded or unpadded accepted on input.
const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Errors raised while building or checking an envelope.
///
/// Protocol violations are errors; a signature that simply does not verify
/// is reported as `Ok(false)` by [`crate::auth::Auth::verify`].
#[derive(Debug, Error)]
pub enum AuthError {
    /// Envelope timestamp is outside the replay window.
    #[error("Token is stale: {skew_secs:.3}s > {max_age_secs}s")]
    StaleToken { skew_secs: f64, max_age_secs: u64 },

    /// Envelope carries no signature.
    #[error("Missing signature")]
    MissingSignature,

    /// Envelope was produced for a different payload.
    #[error("Invalid data hash: {expected} != {actual}")]
    DataHashMismatch { expected: String, actual: String },

    /// Token could not be decoded into an envelope.
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// Our own signature failed to verify right after signing.
    #[error("Signature self-verification failed for key {0}")]
    SelfVerification(String),

    /// Payload or envelope could not be serialized.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The key holder refused or failed to sign.
    #[error(transparent)]
    Signer(#[from] SignerError),
}

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Failure reported by a key holder.
#[derive(Debug, Clone, Error)]
#[error("Signing failed: {0}")]
pub struct SignerError(pub String);

/// Header-shaped wrapper carrying the encoded envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthHeaders {
    pub token: String,
}

/// The signed envelope as it appears (base64url-encoded JSON) on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthEnvelope {
    /// Hex SHA-256 of the canonical payload.
    pub data: String,
    /// Signer-local seconds since the epoch.
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<String>,
    /// Public address of the signer.
    pub key: String,
    #[serde(default)]
    pub signature: String,
}

impl AuthEnvelope {
    /// Value of a signable field, if the envelope carries it.
    pub fn field(&self, field: SignatureField) -> Option<&str> {
        match field {
            SignatureField::Data => Some(&self.data),
            SignatureField::Time => Some(&self.time),
            SignatureField::Cost => self.cost.as_deref(),
            SignatureField::Key => Some(&self.key),
        }
    }

    /// Encode as a base64url JSON token.
    pub fn encode(&self) -> AuthResult<String> {
        let json = serde_json::to_vec(self).map_err(|e| AuthError::Encoding(e.to_string()))?;
        Ok(TOKEN_ENGINE.encode(json))
    }

    /// Decode a base64url JSON token.
    pub fn decode(token: &str) -> AuthResult<Self> {
        let bytes = TOKEN_ENGINE
            .decode(token.trim())
            .map_err(|e| AuthError::MalformedToken(format!("invalid base64url: {}", e)))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| AuthError::MalformedToken(format!("invalid envelope JSON: {}", e)))
    }

    /// Envelope timestamp as fractional seconds.
    pub fn timestamp(&self) -> AuthResult<f64> {
        self.time
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|t| t.is_finite())
            .ok_or_else(|| AuthError::MalformedToken(format!("invalid time '{}'", self.time)))
    }
}
