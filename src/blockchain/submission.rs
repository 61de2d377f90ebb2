//! Transaction submission and settlement.
//!
//! # State Machine
//! ```text
//! Idle → Connecting → Connected → Submitted → {Included | TimedOut | Failed} → Disconnected
//! ```
//! `network.rs` owns the connection states; this module owns everything from
//! `Submitted` until the pending transaction settles.
//!
//! # Settlement
//! Two arms race to settle a [`PendingTransaction`]: the deadline timer and the
//! status feed. Settlement is a compare-and-set on a single flag, so exactly one
//! arm wins; it releases the subscription and delivers the outcome. Anything
//! arriving after that is ignored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio::sync::oneshot;
use tokio::time::{sleep_until, Instant};

use crate::blockchain::connection::{ChainConnection, Submission, Subscription};
use crate::blockchain::types::{
    ChainCall, FinalStatus, NetworkConfig, NetworkError, NetworkResult, TxOutcome, TxStatus,
};
use crate::blockchain::wallet::Wallet;
use crate::observability::metrics;

type Settlement = NetworkResult<TxOutcome>;

/// How long to wait and what counts as done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitPolicy {
    pub timeout: Duration,
    pub wait_for_finalization: bool,
}

impl SubmitPolicy {
    pub fn from_config(config: &NetworkConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.tx_timeout_secs),
            wait_for_finalization: config.wait_for_finalization,
        }
    }
}

impl Default for SubmitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            wait_for_finalization: false,
        }
    }
}

/// A submitted transaction that has not settled yet.
pub struct PendingTransaction {
    tx_hash: String,
    submitted_at: Instant,
    deadline: Instant,
    subscription: Mutex<Option<Subscription>>,
    settled: AtomicBool,
    sender: Mutex<Option<oneshot::Sender<Settlement>>>,
}

impl PendingTransaction {
    /// Start tracking `tx_hash`; the receiver yields the single settlement.
    pub fn new(
        tx_hash: String,
        subscription: Subscription,
        timeout: Duration,
    ) -> (Self, oneshot::Receiver<Settlement>) {
        let (sender, receiver) = oneshot::channel();
        let submitted_at = Instant::now();
        let pending = Self {
            tx_hash,
            submitted_at,
            deadline: submitted_at + timeout,
            subscription: Mutex::new(Some(subscription)),
            settled: AtomicBool::new(false),
            sender: Mutex::new(Some(sender)),
        };
        (pending, receiver)
    }

    pub fn tx_hash(&self) -> &str {
        &self.tx_hash
    }

    pub fn submitted_at(&self) -> Instant {
        self.submitted_at
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::Acquire)
    }

    /// Settle with `outcome` if nobody has yet. Returns whether this call won.
    pub fn settle(&self, outcome: Settlement) -> bool {
        if self
            .settled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(tx_hash = %self.tx_hash, "Ignoring late settlement");
            return false;
        }

        if let Some(mut subscription) = take(&self.subscription) {
            subscription.unsubscribe();
        }
        if let Some(sender) = take(&self.sender) {
            // Receiver gone means the caller stopped waiting; nothing to deliver to.
            let _ = sender.send(outcome);
        }
        true
    }
}

impl std::fmt::Debug for PendingTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingTransaction")
            .field("tx_hash", &self.tx_hash)
            .field("settled", &self.is_settled())
            .finish()
    }
}

fn take<T>(slot: &Mutex<Option<T>>) -> Option<T> {
    match slot.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    }
}

/// What a single status update means for the pending transaction.
#[derive(Debug, PartialEq, Eq)]
enum Progress {
    Pending,
    Included { status: FinalStatus, block_hash: String },
    Failed(String),
}

fn classify(status: &TxStatus, wait_for_finalization: bool) -> Progress {
    match status {
        TxStatus::InBlock { block_hash } if !wait_for_finalization => Progress::Included {
            status: FinalStatus::InBlock,
            block_hash: block_hash.clone(),
        },
        TxStatus::Finalized { block_hash } => Progress::Included {
            status: FinalStatus::Finalized,
            block_hash: block_hash.clone(),
        },
        TxStatus::Failed { block_hash, reason } => Progress::Failed(match block_hash {
            Some(hash) => format!("{} (block {})", reason, hash),
            None => reason.clone(),
        }),
        TxStatus::Dropped => Progress::Failed("dropped from the pool".to_string()),
        TxStatus::Invalid => Progress::Failed("rejected as invalid".to_string()),
        _ => Progress::Pending,
    }
}

/// Sign and send `call`, then wait for it to settle.
pub async fn submit_tx(
    connection: &dyn ChainConnection,
    call: &ChainCall,
    wallet: &Wallet,
    policy: &SubmitPolicy,
) -> NetworkResult<TxOutcome> {
    let Submission {
        tx_hash,
        updates,
        subscription,
    } = connection.submit(call, wallet).await?;

    tracing::info!(
        tx_hash = %tx_hash,
        call = call.name(),
        from = %wallet.address(),
        timeout_secs = policy.timeout.as_secs(),
        "Transaction submitted"
    );

    let (pending, settlement) = PendingTransaction::new(tx_hash, subscription, policy.timeout);
    drive(&pending, updates, policy).await;

    let result = settlement.await.unwrap_or_else(|_| {
        Err(NetworkError::TransactionFailed(
            "settlement was dropped".to_string(),
        ))
    });

    match &result {
        Ok(outcome) => {
            metrics::record_transaction("included");
            tracing::info!(
                tx_hash = %outcome.tx_hash,
                block_hash = %outcome.block_hash,
                status = ?outcome.status,
                elapsed_ms = pending.submitted_at().elapsed().as_millis() as u64,
                "Transaction settled"
            );
        }
        Err(e) => {
            metrics::record_transaction(match e {
                NetworkError::TransactionTimeout { .. } => "timeout",
                _ => "failed",
            });
            tracing::warn!(tx_hash = %pending.tx_hash(), error = %e, "Transaction did not settle successfully");
        }
    }

    result
}

/// Run the timer arm and the status arm until one of them settles `pending`.
async fn drive(
    pending: &PendingTransaction,
    mut updates: BoxStream<'static, TxStatus>,
    policy: &SubmitPolicy,
) {
    let timer = sleep_until(pending.deadline());
    tokio::pin!(timer);

    while !pending.is_settled() {
        tokio::select! {
            () = &mut timer => {
                pending.settle(Err(NetworkError::TransactionTimeout {
                    tx_hash: pending.tx_hash().to_string(),
                    timeout_secs: policy.timeout.as_secs(),
                }));
            }
            update = updates.next() => match update {
                Some(status) => {
                    tracing::debug!(tx_hash = %pending.tx_hash(), status = status.name(), "Status update");
                    match classify(&status, policy.wait_for_finalization) {
                        Progress::Pending => {}
                        Progress::Included { status, block_hash } => {
                            pending.settle(Ok(TxOutcome {
                                tx_hash: pending.tx_hash().to_string(),
                                block_hash,
                                status,
                            }));
                        }
                        Progress::Failed(reason) => {
                            pending.settle(Err(NetworkError::TransactionFailed(reason)));
                        }
                    }
                }
                None => {
                    pending.settle(Err(NetworkError::TransactionFailed(
                        "status subscription ended before a terminal status".to_string(),
                    )));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn counting_subscription() -> (Subscription, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let sub = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (sub, calls)
    }

    fn delayed(events: Vec<(u64, TxStatus)>) -> BoxStream<'static, TxStatus> {
        stream::iter(events)
            .then(|(secs, status)| async move {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                status
            })
            .chain(stream::pending())
            .boxed()
    }

    fn in_block(hash: &str) -> TxStatus {
        TxStatus::InBlock {
            block_hash: hash.to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_status_wins_and_cancels_timer() {
        let (sub, unsubscribed) = counting_subscription();
        let (pending, settlement) = PendingTransaction::new("0xaa".into(), sub, Duration::from_secs(120));
        let start = Instant::now();

        drive(&pending, delayed(vec![(0, TxStatus::Ready), (1, in_block("0xbb"))]), &SubmitPolicy::default()).await;

        assert_eq!(start.elapsed(), Duration::from_secs(1));
        let outcome = settlement.await.unwrap().unwrap();
        assert_eq!(outcome.block_hash, "0xbb");
        assert_eq!(outcome.status, FinalStatus::InBlock);

        // Well past the deadline: no second settlement is possible.
        tokio::time::sleep(Duration::from_secs(200)).await;
        assert!(!pending.settle(Err(NetworkError::TransactionFailed("late".into()))));
        assert_eq!(unsubscribed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_at_deadline_and_not_before() {
        let (sub, unsubscribed) = counting_subscription();
        let (pending, settlement) = PendingTransaction::new("0xaa".into(), sub, Duration::from_secs(120));
        let start = Instant::now();

        drive(&pending, delayed(vec![(5, TxStatus::Broadcast)]), &SubmitPolicy::default()).await;

        assert_eq!(start.elapsed(), Duration::from_secs(120));
        match settlement.await.unwrap() {
            Err(NetworkError::TransactionTimeout { tx_hash, timeout_secs }) => {
                assert_eq!(tx_hash, "0xaa");
                assert_eq!(timeout_secs, 120);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(unsubscribed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_finalization_when_required() {
        let (sub, _) = counting_subscription();
        let (pending, settlement) = PendingTransaction::new("0xaa".into(), sub, Duration::from_secs(120));
        let policy = SubmitPolicy {
            wait_for_finalization: true,
            ..SubmitPolicy::default()
        };
        let events = vec![
            (1, in_block("0xb1")),
            (1, TxStatus::Retracted { block_hash: "0xb1".into() }),
            (1, in_block("0xb2")),
            (6, TxStatus::Finalized { block_hash: "0xb2".into() }),
        ];

        drive(&pending, delayed(events), &policy).await;

        let outcome = settlement.await.unwrap().unwrap();
        assert_eq!(outcome.status, FinalStatus::Finalized);
        assert_eq!(outcome.block_hash, "0xb2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_status_rejects() {
        let (sub, _) = counting_subscription();
        let (pending, settlement) = PendingTransaction::new("0xaa".into(), sub, Duration::from_secs(120));
        let events = vec![(
            2,
            TxStatus::Failed {
                block_hash: Some("0xbb".into()),
                reason: "balances.InsufficientBalance".into(),
            },
        )];

        drive(&pending, delayed(events), &SubmitPolicy::default()).await;

        let err = settlement.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("balances.InsufficientBalance"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_feed_rejects() {
        let (sub, _) = counting_subscription();
        let (pending, settlement) = PendingTransaction::new("0xaa".into(), sub, Duration::from_secs(120));

        drive(&pending, stream::iter(vec![TxStatus::Ready]).boxed(), &SubmitPolicy::default()).await;

        assert!(matches!(
            settlement.await.unwrap(),
            Err(NetworkError::TransactionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_late_terminal_event_after_timeout_is_ignored() {
        let (sub, unsubscribed) = counting_subscription();
        let (pending, settlement) = PendingTransaction::new("0xaa".into(), sub, Duration::from_secs(120));

        assert!(pending.settle(Err(NetworkError::TransactionTimeout {
            tx_hash: "0xaa".into(),
            timeout_secs: 120,
        })));
        assert!(!pending.settle(Ok(TxOutcome {
            tx_hash: "0xaa".into(),
            block_hash: "0xbb".into(),
            status: FinalStatus::Finalized,
        })));

        assert!(pending.is_settled());
        assert!(matches!(
            settlement.await.unwrap(),
            Err(NetworkError::TransactionTimeout { .. })
        ));
        assert_eq!(unsubscribed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&TxStatus::Ready, false), Progress::Pending);
        assert_eq!(classify(&in_block("0x1"), true), Progress::Pending);
        assert!(matches!(classify(&in_block("0x1"), false), Progress::Included { .. }));
        assert!(matches!(classify(&TxStatus::Dropped, false), Progress::Failed(_)));
        assert!(matches!(classify(&TxStatus::Invalid, true), Progress::Failed(_)));
    }
}
