//! Remote call subsystem.
//!
//! # Data Flow
//! ```text
//! Client::call(fn, params, cost)
//!     → Auth::generate({fn, params}, cost)
//!     → POST {base_url}/{fn}  (token, content-type, accept, x-request-id)
//!     → status check → content-type dispatch
//!         text/event-stream → stream.rs (drain to completion)
//!         application/json  → value, or ApiError on `success: false`
//!         anything else     → text
//! ```

pub mod client;
pub mod stream;
pub mod types;

pub use client::{Client, REQUEST_ID_HEADER, TOKEN_HEADER};
pub use types::{CallOutput, ClientError, ClientResult, StreamSummary};
