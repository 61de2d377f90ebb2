//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, decimals sane)
//! - Check URLs and addresses parse before any component is built
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use alloy::primitives::Address;

use crate::config::schema::ClientConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.auth.max_age_secs == 0 {
        errors.push(ValidationError::new("auth.max_age_secs", "must be greater than 0"));
    }
    if config.auth.signature_keys.is_empty() {
        errors.push(ValidationError::new(
            "auth.signature_keys",
            "at least one field must be signed",
        ));
    }
    let mut seen = HashSet::new();
    for field in &config.auth.signature_keys {
        if !seen.insert(field) {
            errors.push(ValidationError::new(
                "auth.signature_keys",
                format!("duplicate field '{}'", field.as_str()),
            ));
        }
    }

    match url::Url::parse(&config.rpc.resolved_base_url()) {
        Ok(url) if !matches!(url.scheme(), "http" | "https") => {
            errors.push(ValidationError::new(
                "rpc.base_url",
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        Ok(_) => {}
        Err(e) => {
            errors.push(ValidationError::new("rpc.base_url", format!("invalid URL: {}", e)));
        }
    }

    if let Err(e) = url::Url::parse(&config.network.endpoint) {
        errors.push(ValidationError::new(
            "network.endpoint",
            format!("invalid URL: {}", e),
        ));
    }
    if config.network.tx_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "network.tx_timeout_secs",
            "must be greater than 0",
        ));
    }
    if config.network.poll_interval_ms == 0 {
        errors.push(ValidationError::new(
            "network.poll_interval_ms",
            "must be greater than 0",
        ));
    }
    if config.network.decimals > 77 {
        errors.push(ValidationError::new(
            "network.decimals",
            "must fit a 256-bit amount (at most 77)",
        ));
    }
    if let Some(registry) = &config.network.registry_address {
        if registry.parse::<Address>().is_err() {
            errors.push(ValidationError::new(
                "network.registry_address",
                format!("invalid address '{}'", registry),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::SignatureField;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ClientConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ClientConfig::default();
        config.auth.max_age_secs = 0;
        config.auth.signature_keys = vec![SignatureField::Data, SignatureField::Data];
        config.rpc.base_url = "not a url".to_string();
        config.network.tx_timeout_secs = 0;
        config.network.registry_address = Some("0x1234".to_string());

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "auth.max_age_secs",
                "auth.signature_keys",
                "rpc.base_url",
                "network.tx_timeout_secs",
                "network.registry_address",
            ]
        );
    }

    #[test]
    fn test_rpc_base_url_scheme() {
        let mut config = ClientConfig::default();
        config.rpc.base_url = "localhost:8000".to_string();
        assert!(validate_config(&config).is_ok());

        config.rpc.base_url = "ws://localhost:8000".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "rpc.base_url");
    }
}
