//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClientConfig (validated, immutable)
//!     → handed by value to Auth, Client and Network at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; components never read the environment
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{AuthConfig, ClientConfig, NetworkConfig, ObservabilityConfig, RpcConfig, SignatureField};
pub use validation::{validate_config, ValidationError};
