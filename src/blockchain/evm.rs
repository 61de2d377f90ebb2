//! EVM JSON-RPC implementation of the chain-provider capability.
//!
//! # Responsibilities
//! - Open HTTP providers and verify the chain ID before use
//! - Build transfer and registry transactions, sign them with the caller's wallet
//! - Turn receipt polling into a status feed (`Broadcast → InBlock → Finalized`)

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, TxHash, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::sol;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};
use url::Url;

use crate::blockchain::connection::{ChainConnection, ChainConnector, Submission, Subscription};
use crate::blockchain::types::{ChainCall, NetworkConfig, NetworkError, NetworkResult, TxStatus};
use crate::blockchain::wallet::Wallet;

sol! {
    /// Module registry entry points.
    interface IModuleRegistry {
        function registerModule(string name, string data, string url, uint16 take) external;
        function updateModule(uint256 moduleId, string name, string data, string url, uint16 take) external;
    }
}

/// Connector for EVM chains reachable over HTTP JSON-RPC.
#[derive(Debug, Clone)]
pub struct EvmConnector {
    chain_id: u64,
    rpc_timeout: Duration,
    poll_interval: Duration,
    confirmation_blocks: u32,
    registry: Option<Address>,
}

impl EvmConnector {
    pub fn from_config(config: &NetworkConfig) -> NetworkResult<Self> {
        let registry = config
            .registry_address
            .as_deref()
            .map(|a| {
                a.parse::<Address>()
                    .map_err(|_| NetworkError::InvalidAddress(a.to_string()))
            })
            .transpose()?;

        Ok(Self {
            chain_id: config.chain_id,
            rpc_timeout: Duration::from_secs(config.rpc_timeout_secs),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            confirmation_blocks: config.confirmation_blocks,
            registry,
        })
    }

    /// Build the unsigned request for `call`; gas and nonce are filled at send time.
    pub fn build_request(&self, call: &ChainCall, wallet: &Wallet) -> NetworkResult<TransactionRequest> {
        let request = TransactionRequest::default()
            .with_from(wallet.address())
            .with_chain_id(wallet.chain_id());

        let request = match call {
            ChainCall::Transfer { dest, amount } => request.with_to(*dest).with_value(*amount),
            ChainCall::RegisterModule(module) => {
                let input = IModuleRegistry::registerModuleCall {
                    name: module.name.clone(),
                    data: module.data.clone(),
                    url: module.url.clone(),
                    take: module.take,
                }
                .abi_encode();
                request.with_to(self.registry()?).with_input(input)
            }
            ChainCall::UpdateModule { module_id, module } => {
                let input = IModuleRegistry::updateModuleCall {
                    moduleId: U256::from(*module_id),
                    name: module.name.clone(),
                    data: module.data.clone(),
                    url: module.url.clone(),
                    take: module.take,
                }
                .abi_encode();
                request.with_to(self.registry()?).with_input(input)
            }
        };
        Ok(request)
    }

    fn registry(&self) -> NetworkResult<Address> {
        self.registry.ok_or_else(|| {
            NetworkError::InvalidModule("no registry_address configured".to_string())
        })
    }
}

#[async_trait]
impl ChainConnector for EvmConnector {
    async fn open(&self, endpoint: &Url) -> NetworkResult<Box<dyn ChainConnection>> {
        let provider = ProviderBuilder::new().connect_http(endpoint.clone());
        Ok(Box::new(EvmConnection {
            endpoint: endpoint.clone(),
            provider: Arc::new(provider) as Arc<dyn Provider + Send + Sync>,
            settings: self.clone(),
        }))
    }
}

struct EvmConnection {
    endpoint: Url,
    provider: Arc<dyn Provider + Send + Sync>,
    settings: EvmConnector,
}

impl EvmConnection {
    /// Await an RPC call under the configured timeout.
    async fn rpc<F, T, E>(&self, method: &str, call: F) -> NetworkResult<T>
    where
        F: IntoFuture<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        match timeout(self.settings.rpc_timeout, call).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(NetworkError::Rpc(format!("{} failed: {}", method, e))),
            Err(_) => Err(NetworkError::Rpc(format!(
                "{} timed out after {}s",
                method,
                self.settings.rpc_timeout.as_secs()
            ))),
        }
    }
}

#[async_trait]
impl ChainConnection for EvmConnection {
    async fn ready(&self) -> NetworkResult<()> {
        let chain_id = self.rpc("eth_chainId", self.provider.get_chain_id()).await?;
        if chain_id != self.settings.chain_id {
            return Err(NetworkError::ChainMismatch {
                expected: self.settings.chain_id,
                actual: chain_id,
            });
        }
        Ok(())
    }

    async fn free_balance(&self, address: Address) -> NetworkResult<U256> {
        self.rpc("eth_getBalance", self.provider.get_balance(address))
            .await
    }

    async fn submit(&self, call: &ChainCall, wallet: &Wallet) -> NetworkResult<Submission> {
        let request = self.settings.build_request(call, wallet)?;

        let signing_provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(wallet.signer().clone()))
            .connect_http(self.endpoint.clone());
        let pending = self
            .rpc("eth_sendRawTransaction", signing_provider.send_transaction(request))
            .await
            .map_err(classify_send_error)?;
        let tx_hash = *pending.tx_hash();

        let (sender, receiver) = mpsc::channel(16);
        let watcher = tokio::spawn(watch_receipt(
            self.provider.clone(),
            tx_hash,
            self.settings.poll_interval,
            self.settings.confirmation_blocks,
            sender,
        ));
        let abort = watcher.abort_handle();

        let updates = futures_util::stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|status| (status, receiver))
        })
        .boxed();

        Ok(Submission {
            tx_hash: tx_hash.to_string(),
            updates,
            subscription: Subscription::new(move || abort.abort()),
        })
    }

    async fn disconnect(&self) -> NetworkResult<()> {
        // HTTP transports hold no session; dropping the provider releases the pool.
        tracing::trace!(endpoint = %self.endpoint, "Releasing HTTP provider");
        Ok(())
    }
}

/// Node-side balance rejections surface as [`NetworkError::InsufficientFunds`].
fn classify_send_error(error: NetworkError) -> NetworkError {
    match error {
        NetworkError::Rpc(message) if message.to_ascii_lowercase().contains("insufficient funds") => {
            NetworkError::InsufficientFunds(message)
        }
        other => other,
    }
}

/// Block a receipt places its transaction in. Receipts without one are still pending.
fn inclusion_block(block_hash: Option<B256>) -> Option<String> {
    block_hash.filter(|hash| !hash.is_zero()).map(|hash| hash.to_string())
}

/// Poll for the receipt of `tx_hash` and report status transitions.
///
/// Stops after a terminal status or once the receiver is gone.
async fn watch_receipt(
    provider: Arc<dyn Provider + Send + Sync>,
    tx_hash: TxHash,
    poll_interval: Duration,
    confirmation_blocks: u32,
    updates: mpsc::Sender<TxStatus>,
) {
    if updates.send(TxStatus::Broadcast).await.is_err() {
        return;
    }

    let mut ticker = interval(poll_interval);
    let mut included_in: Option<String> = None;

    loop {
        ticker.tick().await;

        let receipt = match provider.get_transaction_receipt(tx_hash).await {
            Ok(Some(receipt)) => receipt,
            Ok(None) => {
                tracing::debug!(tx_hash = %tx_hash, "Transaction pending");
                if let Some(block_hash) = included_in.take() {
                    if updates.send(TxStatus::Retracted { block_hash }).await.is_err() {
                        return;
                    }
                }
                continue;
            }
            Err(e) => {
                tracing::warn!(tx_hash = %tx_hash, error = %e, "Receipt poll failed");
                continue;
            }
        };

        let Some(block_hash) = inclusion_block(receipt.block_hash) else {
            tracing::debug!(tx_hash = %tx_hash, "Receipt has no block hash yet");
            continue;
        };

        if !receipt.status() {
            let _ = updates
                .send(TxStatus::Failed {
                    block_hash: Some(block_hash),
                    reason: "execution reverted".to_string(),
                })
                .await;
            return;
        }

        if included_in.as_deref() != Some(block_hash.as_str()) {
            included_in = Some(block_hash.clone());
            if updates
                .send(TxStatus::InBlock {
                    block_hash: block_hash.clone(),
                })
                .await
                .is_err()
            {
                return;
            }
        }

        let current_block = match provider.get_block_number().await {
            Ok(number) => number,
            Err(e) => {
                tracing::warn!(tx_hash = %tx_hash, error = %e, "Block number poll failed");
                continue;
            }
        };
        let tx_block = receipt.block_number.unwrap_or(current_block);
        let confirmations = current_block.saturating_sub(tx_block);

        if confirmations >= u64::from(confirmation_blocks) {
            let _ = updates.send(TxStatus::Finalized { block_hash }).await;
            return;
        }

        tracing::debug!(
            tx_hash = %tx_hash,
            confirmations,
            required = confirmation_blocks,
            "Waiting for confirmations"
        );
    }
}
