//! High-level chain operations.
//!
//! Every public operation opens its own [`ConnectionHandle`], does its work
//! and disconnects on every exit path. Nothing connection-related is stored on
//! [`Network`] itself, so one instance can serve concurrent callers.

use std::sync::Arc;

use alloy::primitives::utils::{format_units, parse_units, ParseUnits};
use alloy::primitives::{Address, U256};
use url::Url;

use crate::blockchain::connection::{ChainConnector, ConnectionHandle};
use crate::blockchain::evm::EvmConnector;
use crate::blockchain::submission::{submit_tx, SubmitPolicy};
use crate::blockchain::types::{
    ChainCall, ModuleInfo, NetworkConfig, NetworkError, NetworkResult, TxOutcome,
};
use crate::blockchain::wallet::Wallet;

/// Parse a human decimal amount (e.g. `"1.5"`) into base units.
pub fn parse_amount(amount: &str, decimals: u8) -> NetworkResult<U256> {
    match parse_units(amount.trim(), decimals) {
        Ok(ParseUnits::U256(value)) if !value.is_zero() => Ok(value),
        Ok(_) => Err(NetworkError::InvalidAmount(format!(
            "'{}' is not a positive amount",
            amount
        ))),
        Err(e) => Err(NetworkError::InvalidAmount(format!("'{}': {}", amount, e))),
    }
}

/// Format base units as a human decimal amount.
pub fn format_amount(value: U256, decimals: u8) -> NetworkResult<String> {
    format_units(value, decimals).map_err(|e| NetworkError::InvalidAmount(e.to_string()))
}

pub fn parse_address(address: &str) -> NetworkResult<Address> {
    address
        .trim()
        .parse()
        .map_err(|_| NetworkError::InvalidAddress(address.to_string()))
}

/// Chain operations for one network and (optionally) one signing wallet.
#[derive(Clone)]
pub struct Network {
    connector: Arc<dyn ChainConnector>,
    config: NetworkConfig,
    endpoint: Url,
    signer: Option<Wallet>,
}

impl Network {
    /// Create a network over an arbitrary chain connector.
    pub fn new(connector: Arc<dyn ChainConnector>, config: NetworkConfig) -> NetworkResult<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            NetworkError::Connection(format!("Invalid endpoint '{}': {}", config.endpoint, e))
        })?;
        Ok(Self {
            connector,
            config,
            endpoint,
            signer: None,
        })
    }

    /// Create a network backed by an EVM JSON-RPC endpoint.
    pub fn evm(config: NetworkConfig) -> NetworkResult<Self> {
        let connector = EvmConnector::from_config(&config)?;
        Self::new(Arc::new(connector), config)
    }

    /// Attach the wallet used to sign transactions.
    pub fn with_signer(mut self, wallet: Wallet) -> Self {
        self.signer = Some(wallet);
        self
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn signer(&self) -> Option<&Wallet> {
        self.signer.as_ref()
    }

    /// Open a fresh, ready connection. The caller owns it and must disconnect it.
    pub async fn connect(&self) -> NetworkResult<ConnectionHandle> {
        ConnectionHandle::open(self.connector.as_ref(), &self.endpoint).await
    }

    /// Free balance of `address` in base units.
    pub async fn balance(&self, address: &str) -> NetworkResult<U256> {
        let address = parse_address(address)?;

        let handle = self.connect().await?;
        let result = handle.connection().free_balance(address).await;
        handle.disconnect().await;
        result
    }

    /// Free balance of `address` as a decimal string.
    pub async fn balance_formatted(&self, address: &str) -> NetworkResult<String> {
        let balance = self.balance(address).await?;
        format_amount(balance, self.config.decimals)
    }

    /// Transfer a human decimal `amount` to `dest`.
    pub async fn transfer(&self, dest: &str, amount: &str) -> NetworkResult<TxOutcome> {
        let wallet = self.require_signer()?;
        let dest = parse_address(dest)?;
        let amount = parse_amount(amount, self.config.decimals)?;

        let handle = self.connect().await?;
        let result = async {
            self.ensure_funds(&handle, wallet, amount).await?;
            let call = ChainCall::Transfer { dest, amount };
            self.submit_on(&handle, wallet, &call).await
        }
        .await;
        handle.disconnect().await;
        result
    }

    /// Register a new module under the signer's account.
    pub async fn register(&self, module: &ModuleInfo) -> NetworkResult<TxOutcome> {
        let wallet = self.require_signer()?;
        module.validate()?;

        let handle = self.connect().await?;
        let result = async {
            self.ensure_funds(&handle, wallet, U256::ZERO).await?;
            let call = ChainCall::RegisterModule(module.clone());
            self.submit_on(&handle, wallet, &call).await
        }
        .await;
        handle.disconnect().await;
        result
    }

    /// Replace the registration of module `module_id`.
    pub async fn update(&self, module_id: u64, module: &ModuleInfo) -> NetworkResult<TxOutcome> {
        let wallet = self.require_signer()?;
        module.validate()?;

        let handle = self.connect().await?;
        let result = async {
            self.ensure_funds(&handle, wallet, U256::ZERO).await?;
            let call = ChainCall::UpdateModule {
                module_id,
                module: module.clone(),
            };
            self.submit_on(&handle, wallet, &call).await
        }
        .await;
        handle.disconnect().await;
        result
    }

    /// Submit an already-built call over an open connection and wait for it to settle.
    pub async fn submit_tx(
        &self,
        handle: &ConnectionHandle,
        call: &ChainCall,
    ) -> NetworkResult<TxOutcome> {
        let wallet = self.require_signer()?;
        self.submit_on(handle, wallet, call).await
    }

    async fn submit_on(
        &self,
        handle: &ConnectionHandle,
        wallet: &Wallet,
        call: &ChainCall,
    ) -> NetworkResult<TxOutcome> {
        let policy = SubmitPolicy::from_config(&self.config);
        submit_tx(handle.connection(), call, wallet, &policy).await
    }

    fn require_signer(&self) -> NetworkResult<&Wallet> {
        self.signer.as_ref().ok_or(NetworkError::NoSigner)
    }

    /// Require `amount` plus the fee buffer to be available.
    async fn ensure_funds(
        &self,
        handle: &ConnectionHandle,
        wallet: &Wallet,
        amount: U256,
    ) -> NetworkResult<()> {
        let balance = handle.connection().free_balance(wallet.address()).await?;
        let required = amount.saturating_add(U256::from(self.config.fee_buffer));
        if balance < required {
            tracing::warn!(
                address = %wallet.address(),
                balance = %balance,
                required = %required,
                "Insufficient balance"
            );
            return Err(NetworkError::InsufficientBalance { balance, required });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("name", &self.config.name)
            .field("endpoint", &self.endpoint.as_str())
            .field("signer", &self.signer.as_ref().map(|w| w.address()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1", 12).unwrap(), U256::from(1_000_000_000_000u64));
        assert_eq!(parse_amount(" 0.5 ", 12).unwrap(), U256::from(500_000_000_000u64));
        assert!(matches!(parse_amount("0", 12), Err(NetworkError::InvalidAmount(_))));
        assert!(matches!(parse_amount("-1", 12), Err(NetworkError::InvalidAmount(_))));
        assert!(matches!(parse_amount("abc", 12), Err(NetworkError::InvalidAmount(_))));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(
            format_amount(U256::from(1_500_000_000_000u64), 12).unwrap(),
            "1.500000000000"
        );
    }

    #[test]
    fn test_parse_address() {
        assert!(parse_address("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").is_ok());
        assert!(matches!(parse_address("alice"), Err(NetworkError::InvalidAddress(_))));
    }

    #[test]
    fn test_invalid_endpoint() {
        let config = NetworkConfig {
            endpoint: "not a url".to_string(),
            ..NetworkConfig::default()
        };
        assert!(matches!(Network::evm(config), Err(NetworkError::Connection(_))));
    }
}
