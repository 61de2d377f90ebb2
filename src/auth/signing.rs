//! Envelope generation and verification.
//!
//! # Responsibilities
//! - Hash call payloads into a stable digest
//! - Sign the configured subset of envelope fields
//! - Enforce the replay window and payload binding on verification
//!
//! No network or storage side effects; an [`Auth`] is immutable after
//! construction and can be shared freely across tasks.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::auth::signer::KeyHolder;
use crate::auth::types::{
    AuthConfig, AuthEnvelope, AuthError, AuthHeaders, AuthResult, SignatureField,
};
use crate::observability::metrics;

/// Current wall-clock time in whole seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Hex SHA-256 over the RFC 8785 canonical JSON form of `payload`.
pub fn hash_payload<T: Serialize + ?Sized>(payload: &T) -> AuthResult<String> {
    let value = serde_json::to_value(payload).map_err(|e| AuthError::Encoding(e.to_string()))?;
    let canonical = serde_jcs::to_vec(&value).map_err(|e| AuthError::Encoding(e.to_string()))?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}

/// Ordered view of the envelope fields covered by the signature.
struct SigningSubset<'a> {
    fields: Vec<(&'static str, &'a str)>,
}

impl<'a> SigningSubset<'a> {
    fn from_envelope(keys: &[SignatureField], envelope: &'a AuthEnvelope) -> Self {
        let fields = keys
            .iter()
            .filter_map(|k| envelope.field(*k).map(|v| (k.as_str(), v)))
            .collect();
        Self { fields }
    }

    fn to_bytes(&self) -> AuthResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| AuthError::Encoding(e.to_string()))
    }
}

impl Serialize for SigningSubset<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Builds and checks signed request envelopes for one key holder.
#[derive(Clone)]
pub struct Auth {
    signer: Arc<dyn KeyHolder>,
    config: AuthConfig,
}

impl Auth {
    /// Create an authenticator around `signer` with a fixed policy.
    pub fn new(signer: Arc<dyn KeyHolder>, config: AuthConfig) -> Self {
        Self { signer, config }
    }

    /// Authenticator with the default policy (1h window, `[data, time, cost]`).
    pub fn with_defaults(signer: Arc<dyn KeyHolder>) -> Self {
        Self::new(signer, AuthConfig::default())
    }

    /// Address of the key holder behind this authenticator.
    pub fn address(&self) -> String {
        self.signer.address()
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Produce a signed token for `payload` stamped with the current time.
    pub fn generate<T: Serialize + ?Sized>(&self, payload: &T, cost: u64) -> AuthResult<AuthHeaders> {
        self.generate_at(payload, cost, unix_now())
    }

    /// Produce a signed token for `payload` stamped with `now_secs`.
    pub fn generate_at<T: Serialize + ?Sized>(
        &self,
        payload: &T,
        cost: u64,
        now_secs: u64,
    ) -> AuthResult<AuthHeaders> {
        let signs_cost = self.config.signature_keys.contains(&SignatureField::Cost);
        let mut envelope = AuthEnvelope {
            data: hash_payload(payload)?,
            time: now_secs.to_string(),
            cost: signs_cost.then(|| cost.to_string()),
            key: self.signer.address(),
            signature: String::new(),
        };

        let message = SigningSubset::from_envelope(&self.config.signature_keys, &envelope).to_bytes()?;
        envelope.signature = self.signer.sign(&message)?;

        if !self.signer.verify(&message, &envelope.signature, &envelope.key) {
            tracing::error!(key = %envelope.key, "Freshly generated signature does not verify");
            return Err(AuthError::SelfVerification(envelope.key));
        }

        tracing::debug!(key = %envelope.key, data = %envelope.data, time = %envelope.time, "Generated auth token");

        Ok(AuthHeaders {
            token: envelope.encode()?,
        })
    }

    /// Check a token against the current time and, optionally, the payload it claims to cover.
    ///
    /// Returns `Ok(false)` when the signature does not verify. Staleness, a
    /// missing signature and a payload mismatch are errors.
    pub fn verify(&self, headers: &AuthHeaders, payload: Option<&serde_json::Value>) -> AuthResult<bool> {
        self.verify_at(headers, payload, unix_now())
    }

    /// [`Auth::verify`] against an explicit clock reading.
    pub fn verify_at(
        &self,
        headers: &AuthHeaders,
        payload: Option<&serde_json::Value>,
        now_secs: u64,
    ) -> AuthResult<bool> {
        let result = self.check(headers, payload, now_secs);
        metrics::record_auth_verification(match &result {
            Ok(true) => "valid",
            Ok(false) => "invalid_signature",
            Err(AuthError::StaleToken { .. }) => "stale",
            Err(AuthError::MissingSignature) => "missing_signature",
            Err(AuthError::DataHashMismatch { .. }) => "hash_mismatch",
            Err(_) => "malformed",
        });
        result
    }

    fn check(
        &self,
        headers: &AuthHeaders,
        payload: Option<&serde_json::Value>,
        now_secs: u64,
    ) -> AuthResult<bool> {
        let envelope = AuthEnvelope::decode(&headers.token)?;

        let skew_secs = (now_secs as f64 - envelope.timestamp()?).abs();
        if skew_secs > self.config.max_age_secs as f64 {
            tracing::warn!(key = %envelope.key, skew_secs, max_age_secs = self.config.max_age_secs, "Rejecting stale token");
            return Err(AuthError::StaleToken {
                skew_secs,
                max_age_secs: self.config.max_age_secs,
            });
        }

        if envelope.signature.is_empty() {
            return Err(AuthError::MissingSignature);
        }

        let message = SigningSubset::from_envelope(&self.config.signature_keys, &envelope).to_bytes()?;
        let verified = self.signer.verify(&message, &envelope.signature, &envelope.key);

        if let Some(payload) = payload {
            let actual = hash_payload(payload)?;
            if actual != envelope.data {
                tracing::warn!(key = %envelope.key, expected = %envelope.data, actual = %actual, "Token bound to a different payload");
                return Err(AuthError::DataHashMismatch {
                    expected: envelope.data,
                    actual,
                });
            }
        }

        if !verified {
            tracing::warn!(key = %envelope.key, "Token signature does not verify");
        }
        Ok(verified)
    }
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auth")
            .field("key", &self.signer.address())
            .field("max_age_secs", &self.config.max_age_secs)
            .field("signature_keys", &self.config.signature_keys)
            .finish()
    }
}
