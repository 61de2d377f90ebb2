//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! auth / rpc / blockchain produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stderr (human or JSON lines)
//!     → whatever metrics recorder the host application installs
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every remote call span
//! - Never log private keys or payload contents; hashes and addresses are fine

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
