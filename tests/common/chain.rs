//! In-memory chain connector with scripted transaction status feeds.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use modchain_client::blockchain::{
    ChainCall, ChainConnection, ChainConnector, NetworkError, NetworkResult, Submission,
    Subscription, TxStatus, Wallet,
};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use url::Url;

/// Counters and script shared by the connector and every connection it opens.
#[derive(Default)]
pub struct ChainState {
    pub opens: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub unsubscribes: AtomicUsize,
    /// Scripted events that found the status feed already gone.
    pub undelivered: AtomicUsize,
    pub fail_ready: AtomicBool,
    pub balance: Mutex<U256>,
    /// `(offset from submission, status)` pairs, offsets non-decreasing.
    pub script: Mutex<Vec<(Duration, TxStatus)>>,
    pub submitted: Mutex<Vec<ChainCall>>,
}

impl ChainState {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn unsubscribes(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }

    pub fn undelivered(&self) -> usize {
        self.undelivered.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<ChainCall> {
        self.submitted.lock().unwrap().clone()
    }
}

#[derive(Clone, Default)]
pub struct MockChain {
    pub state: Arc<ChainState>,
}

impl MockChain {
    pub fn new(balance: U256, script: Vec<(Duration, TxStatus)>) -> Self {
        let chain = Self::default();
        *chain.state.balance.lock().unwrap() = balance;
        *chain.state.script.lock().unwrap() = script;
        chain
    }
}

#[async_trait]
impl ChainConnector for MockChain {
    async fn open(&self, _endpoint: &Url) -> NetworkResult<Box<dyn ChainConnection>> {
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            state: self.state.clone(),
        }))
    }
}

struct MockConnection {
    state: Arc<ChainState>,
}

#[async_trait]
impl ChainConnection for MockConnection {
    async fn ready(&self) -> NetworkResult<()> {
        if self.state.fail_ready.load(Ordering::SeqCst) {
            return Err(NetworkError::Connection("metadata unavailable".to_string()));
        }
        Ok(())
    }

    async fn free_balance(&self, _address: Address) -> NetworkResult<U256> {
        Ok(*self.state.balance.lock().unwrap())
    }

    async fn submit(&self, call: &ChainCall, _wallet: &Wallet) -> NetworkResult<Submission> {
        let mut submitted = self.state.submitted.lock().unwrap();
        submitted.push(call.clone());
        let tx_hash = format!("0x{:064x}", submitted.len());
        drop(submitted);

        let script = self.state.script.lock().unwrap().clone();
        let state = self.state.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        let start = Instant::now();

        tokio::spawn(async move {
            for (at, status) in script {
                sleep_until(start + at).await;
                if tx.send(status).is_err() {
                    state.undelivered.fetch_add(1, Ordering::SeqCst);
                }
            }
            tx.closed().await;
        });

        let updates = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|status| (status, rx))
        })
        .boxed();

        let state = self.state.clone();
        let subscription = Subscription::new(move || {
            state.unsubscribes.fetch_add(1, Ordering::SeqCst);
        });

        Ok(Submission {
            tx_hash,
            updates,
            subscription,
        })
    }

    async fn disconnect(&self) -> NetworkResult<()> {
        self.state.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
