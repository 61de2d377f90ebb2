//! Key-holder capability consumed by [`crate::auth::Auth`].

use crate::auth::types::SignerError;

/// Something that owns a private key and can vouch for messages.
///
/// Implementations must be deterministic about `address()` and must treat
/// malformed signatures or keys in `verify` as a failed verification.
pub trait KeyHolder: Send + Sync {
    /// Public identity embedded in envelopes as `key`.
    fn address(&self) -> String;

    /// Sign `message`, returning the signature in its textual wire form.
    fn sign(&self, message: &[u8]) -> Result<String, SignerError>;

    /// Check `signature` over `message` against `public_key`.
    fn verify(&self, message: &[u8], signature: &str, public_key: &str) -> bool;
}
