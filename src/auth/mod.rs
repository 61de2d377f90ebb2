//! Request authentication subsystem.
//!
//! # Data Flow
//! ```text
//! call payload {fn, params}
//!     → signing.rs (canonical hash, signing subset, key holder signature)
//!     → AuthEnvelope {data, time, [cost], key, signature}
//!     → base64url token in the `token` header
//!
//! On the receiving side:
//!     token → decode → replay window → signature → optional payload hash
//! ```
//!
//! # Security Constraints
//! - The signing subset is always rebuilt from the decoded envelope
//! - Staleness, missing signatures and payload mismatches are errors, never `false`
//! - Payload contents are never logged, only their hashes

pub mod signer;
pub mod signing;
pub mod types;

pub use signer::KeyHolder;
pub use signing::{hash_payload, unix_now, Auth};
pub use types::{AuthConfig, AuthEnvelope, AuthError, AuthHeaders, AuthResult, SignatureField, SignerError};
