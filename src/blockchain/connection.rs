//! Chain-provider capability and the call-scoped connection handle.
//!
//! A [`ConnectionHandle`] is opened at the start of each public `Network`
//! operation and consumed by [`ConnectionHandle::disconnect`] at the end, so
//! two operations never observe each other's connection state. A handle
//! dropped without an explicit disconnect (cancelled or panicking caller)
//! releases its connection from a spawned task.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use url::Url;

use crate::blockchain::types::{ChainCall, ConnectionState, NetworkResult, TxStatus};
use crate::blockchain::wallet::Wallet;

/// Opens provider connections to a chain endpoint.
#[async_trait]
pub trait ChainConnector: Send + Sync {
    /// Open the transport to `endpoint`. The returned connection may still be warming up.
    async fn open(&self, endpoint: &Url) -> NetworkResult<Box<dyn ChainConnection>>;
}

/// An open provider/API pair for one logical operation.
#[async_trait]
pub trait ChainConnection: Send + Sync {
    /// Block until the API is usable (metadata loaded, chain verified).
    async fn ready(&self) -> NetworkResult<()>;

    /// Free balance of `address` in base units.
    async fn free_balance(&self, address: Address) -> NetworkResult<U256>;

    /// Sign `call` with `wallet`, send it and subscribe to its status updates.
    async fn submit(&self, call: &ChainCall, wallet: &Wallet) -> NetworkResult<Submission>;

    /// Release the transport.
    async fn disconnect(&self) -> NetworkResult<()>;
}

/// A sent transaction together with its live status feed.
pub struct Submission {
    pub tx_hash: String,
    /// Updates in the order the chain emits them.
    pub updates: BoxStream<'static, TxStatus>,
    pub subscription: Subscription,
}

/// Handle that stops a status feed.
///
/// Unsubscribing is idempotent; dropping an active subscription unsubscribes.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to release.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// A connection owned by exactly one in-flight operation.
pub struct ConnectionHandle {
    endpoint: Url,
    provider_state: ConnectionState,
    api_state: ConnectionState,
    connection: Arc<dyn ChainConnection>,
    released: bool,
}

impl ConnectionHandle {
    /// Open the provider, then wait for the API to become ready.
    pub async fn open(connector: &dyn ChainConnector, endpoint: &Url) -> NetworkResult<Self> {
        tracing::debug!(endpoint = %endpoint, "Connecting to chain");
        let connection = connector.open(endpoint).await?;

        let mut handle = Self {
            endpoint: endpoint.clone(),
            provider_state: ConnectionState::Ready,
            api_state: ConnectionState::Connecting,
            connection: Arc::from(connection),
            released: false,
        };

        if let Err(e) = handle.connection.ready().await {
            tracing::warn!(endpoint = %handle.endpoint, error = %e, "Chain API failed to become ready");
            handle.disconnect().await;
            return Err(e);
        }
        handle.api_state = ConnectionState::Ready;

        tracing::debug!(endpoint = %handle.endpoint, "Chain connection ready");
        Ok(handle)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn provider_state(&self) -> ConnectionState {
        self.provider_state
    }

    pub fn api_state(&self) -> ConnectionState {
        self.api_state
    }

    pub fn connection(&self) -> &dyn ChainConnection {
        self.connection.as_ref()
    }

    /// Tear the connection down. Failures are logged, never propagated.
    pub async fn disconnect(mut self) {
        if let Err(e) = self.connection.disconnect().await {
            tracing::warn!(endpoint = %self.endpoint, error = %e, "Error while disconnecting");
        }
        self.released = true;
        self.provider_state = ConnectionState::Disconnected;
        self.api_state = ConnectionState::Disconnected;
        tracing::debug!(endpoint = %self.endpoint, "Disconnected from chain");
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let connection = self.connection.clone();
        let endpoint = self.endpoint.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                tracing::debug!(endpoint = %endpoint, "Connection dropped before disconnect; releasing");
                runtime.spawn(async move {
                    if let Err(e) = connection.disconnect().await {
                        tracing::warn!(endpoint = %endpoint, error = %e, "Error while disconnecting");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(endpoint = %endpoint, "Connection dropped outside a runtime; not disconnected");
            }
        }
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("endpoint", &self.endpoint.as_str())
            .field("provider_state", &self.provider_state)
            .field("api_state", &self.api_state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_unsubscribe_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut sub = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(sub.is_active());
        sub.unsubscribe();
        sub.unsubscribe();
        drop(sub);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    struct CountingConnector {
        disconnects: Arc<AtomicUsize>,
    }

    struct CountingConnection {
        disconnects: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ChainConnector for CountingConnector {
        async fn open(&self, _endpoint: &Url) -> NetworkResult<Box<dyn ChainConnection>> {
            Ok(Box::new(CountingConnection {
                disconnects: self.disconnects.clone(),
            }))
        }
    }

    #[async_trait]
    impl ChainConnection for CountingConnection {
        async fn ready(&self) -> NetworkResult<()> {
            Ok(())
        }

        async fn free_balance(&self, _address: Address) -> NetworkResult<U256> {
            Ok(U256::ZERO)
        }

        async fn submit(&self, _call: &ChainCall, _wallet: &Wallet) -> NetworkResult<Submission> {
            Err(crate::blockchain::types::NetworkError::Rpc("not supported".to_string()))
        }

        async fn disconnect(&self) -> NetworkResult<()> {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn connector() -> (CountingConnector, Arc<AtomicUsize>) {
        let disconnects = Arc::new(AtomicUsize::new(0));
        (
            CountingConnector {
                disconnects: disconnects.clone(),
            },
            disconnects,
        )
    }

    #[tokio::test]
    async fn test_explicit_disconnect_runs_once() {
        let (connector, disconnects) = connector();
        let endpoint: Url = "http://localhost:8545".parse().unwrap();

        let handle = ConnectionHandle::open(&connector, &endpoint).await.unwrap();
        assert_eq!(handle.api_state(), ConnectionState::Ready);
        handle.disconnect().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropped_handle_disconnects() {
        let (connector, disconnects) = connector();
        let endpoint: Url = "http://localhost:8545".parse().unwrap();

        let handle = ConnectionHandle::open(&connector, &endpoint).await.unwrap();
        drop(handle);
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        drop(Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!Subscription::noop().is_active());
    }
}
