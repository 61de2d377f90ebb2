//! Authenticated RPC client for a module marketplace.
//!
//! # Architecture Overview
//!
//! ```text
//!   caller ──▶ rpc::Client::call(fn, params)
//!                  │
//!                  ├─▶ auth::Auth::generate({fn, params})  ──▶ token header
//!                  └─▶ POST {base_url}/{fn} ──▶ JSON / stream / text / error
//!
//!   caller ──▶ blockchain::Network::{transfer, register, update}
//!                  │
//!                  ├─▶ ConnectionHandle::open  (scoped, per operation)
//!                  ├─▶ submit_tx ── status stream ⇄ timeout race
//!                  └─▶ disconnect (every exit path)
//! ```

// Request signing
pub mod auth;

// Remote calls and chain submission
pub mod blockchain;
pub mod rpc;

// Cross-cutting concerns
pub mod config;
pub mod observability;

pub use auth::{Auth, KeyHolder};
pub use blockchain::{Network, Wallet};
pub use config::schema::ClientConfig;
pub use rpc::Client;
