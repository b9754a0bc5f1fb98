//! Chain Source
//!
//! The node-facing seam of the pipeline: raw block, receipt and transaction
//! lookups, and handles delivering new-block numbers.

use std::fmt::Display;
use std::future::Future;
use std::ops::RangeInclusive;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::decoder::{RawBlock, RawReceipt, RawTransaction};
use crate::limiter::{RateLimiter, SubmitError};

/// Buffered notifications per subscription
pub const NOTIFICATION_BUFFER: usize = 64;

/// Most block numbers a single poll emits after falling behind
pub const MAX_POLL_CATCH_UP: u64 = 32;

/// Future returned by [`ChainSource`] lookups
pub type SourceFuture<T> = Pin<Box<dyn Future<Output = Result<T, FetchError>> + Send + 'static>>;

/// Errors that can occur while fetching chain data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("RPC call {method} failed: {message}")]
    Rpc { method: &'static str, message: String },

    #[error("Request aborted before completion")]
    Aborted,
}

impl FetchError {
    pub fn rpc(method: &'static str, err: impl Display) -> Self {
        FetchError::Rpc {
            method,
            message: err.to_string(),
        }
    }
}

impl From<SubmitError<FetchError>> for FetchError {
    fn from(err: SubmitError<FetchError>) -> Self {
        match err {
            SubmitError::Task(err) => err,
            SubmitError::Aborted => FetchError::Aborted,
        }
    }
}

/// Read access to an EVM node
///
/// Lookups return owned futures so they can be queued on a [`RateLimiter`].
#[cfg_attr(test, mockall::automock)]
pub trait ChainSource: Send + Sync {
    /// `eth_getBlockByNumber`; `None` if the node does not know the block
    fn get_block(&self, number: u64, full_transactions: bool) -> SourceFuture<Option<RawBlock>>;

    /// `eth_getBlockReceipts`
    fn get_block_receipts(&self, number: u64) -> SourceFuture<Option<Vec<RawReceipt>>>;

    /// `eth_getTransactionByHash`
    fn get_transaction(&self, hash: &str) -> SourceFuture<Option<RawTransaction>>;

    /// `eth_blockNumber`
    fn block_number(&self) -> SourceFuture<u64>;
}

/// Registered new-block handler
///
/// Yields block numbers in arrival order. Dropping the handle or calling
/// [`unsubscribe`](Self::unsubscribe) stops the producer.
#[derive(Debug)]
pub struct NewBlockSubscription {
    receiver: mpsc::Receiver<u64>,
    producer: Option<JoinHandle<()>>,
}

impl NewBlockSubscription {
    pub fn new(receiver: mpsc::Receiver<u64>, producer: JoinHandle<()>) -> Self {
        Self {
            receiver,
            producer: Some(producer),
        }
    }

    /// A subscription fed by hand through the returned sender
    pub fn channel(buffer: usize) -> (mpsc::Sender<u64>, Self) {
        let (sender, receiver) = mpsc::channel(buffer);
        (
            sender,
            Self {
                receiver,
                producer: None,
            },
        )
    }

    /// Next announced block number, `None` once the subscription ended
    pub async fn next(&mut self) -> Option<u64> {
        self.receiver.recv().await
    }

    /// Stop receiving notifications
    pub fn unsubscribe(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
        self.receiver.close();
    }
}

impl Drop for NewBlockSubscription {
    fn drop(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }
}

/// Announce new blocks by polling `eth_blockNumber`
///
/// The first poll announces only the current head. Later polls announce
/// every block since the previous head, at most [`MAX_POLL_CATCH_UP`].
/// Polls go through the limiter like any other request.
pub fn poll_new_blocks(
    source: Arc<dyn ChainSource>,
    limiter: RateLimiter,
    interval: Duration,
) -> NewBlockSubscription {
    let (sender, receiver) = mpsc::channel(NOTIFICATION_BUFFER);

    let producer = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_seen: Option<u64> = None;

        loop {
            ticker.tick().await;

            let source = Arc::clone(&source);
            let latest = match limiter.submit(move || source.block_number()).await {
                Ok(latest) => latest,
                Err(err) => {
                    warn!("Polling block number failed: {}", FetchError::from(err));
                    continue;
                }
            };

            for number in new_block_range(last_seen, latest) {
                debug!("Polled new block {}", number);
                if sender.send(number).await.is_err() {
                    return;
                }
            }
            last_seen = Some(last_seen.map_or(latest, |seen| seen.max(latest)));
        }
    });

    NewBlockSubscription::new(receiver, producer)
}

/// Block numbers to announce after seeing `latest`
pub fn new_block_range(last_seen: Option<u64>, latest: u64) -> RangeInclusive<u64> {
    match last_seen {
        None => latest..=latest,
        Some(seen) if latest <= seen => RangeInclusive::new(1, 0),
        Some(seen) => {
            let floor = latest.saturating_sub(MAX_POLL_CATCH_UP - 1);
            (seen + 1).max(floor)..=latest
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ==================== new_block_range tests ====================

    #[test]
    fn test_first_poll_announces_head_only() {
        assert_eq!(new_block_range(None, 100).collect::<Vec<_>>(), vec![100]);
    }

    #[test]
    fn test_poll_announces_gap() {
        assert_eq!(new_block_range(Some(100), 103).collect::<Vec<_>>(), vec![101, 102, 103]);
    }

    #[test]
    fn test_poll_without_progress_announces_nothing() {
        assert_eq!(new_block_range(Some(100), 100).count(), 0);
        assert_eq!(new_block_range(Some(100), 99).count(), 0);
    }

    #[test]
    fn test_poll_catch_up_is_capped() {
        let range: Vec<u64> = new_block_range(Some(0), 1000).collect();
        assert_eq!(range.len() as u64, MAX_POLL_CATCH_UP);
        assert_eq!(range.last(), Some(&1000));
    }

    // ==================== FetchError tests ====================

    #[test]
    fn test_fetch_error_from_submit_error() {
        let err = FetchError::rpc("eth_blockNumber", "connection reset");
        assert_eq!(FetchError::from(SubmitError::Task(err.clone())), err);
        assert_eq!(FetchError::from(SubmitError::Aborted), FetchError::Aborted);
    }

    #[test]
    fn test_fetch_error_display_keeps_node_message() {
        let err = FetchError::rpc("eth_getBlockByNumber", "rate limit exceeded");
        assert!(err.to_string().contains("eth_getBlockByNumber"));
        assert!(err.to_string().contains("rate limit exceeded"));
    }

    // ==================== subscription tests ====================

    #[tokio::test]
    async fn test_manual_subscription() {
        let (sender, mut subscription) = NewBlockSubscription::channel(4);
        sender.send(5).await.unwrap();
        drop(sender);

        assert_eq!(subscription.next().await, Some(5));
        assert_eq!(subscription.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_new_blocks() {
        let heads = [10u64, 10, 12, 13];
        let calls = Arc::new(AtomicUsize::new(0));

        let mut source = MockChainSource::new();
        let counter = Arc::clone(&calls);
        source.expect_block_number().returning(move || {
            let call = counter.fetch_add(1, Ordering::SeqCst);
            let head = heads[call.min(heads.len() - 1)];
            Box::pin(async move { Ok(head) })
        });

        let mut subscription = poll_new_blocks(Arc::new(source), RateLimiter::new(100), Duration::from_millis(500));

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(subscription.next().await.unwrap());
        }
        assert_eq!(seen, vec![10, 11, 12, 13]);

        subscription.unsubscribe();
        assert_eq!(subscription.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_survives_errors() {
        let calls = Arc::new(AtomicUsize::new(0));

        let mut source = MockChainSource::new();
        let counter = Arc::clone(&calls);
        source.expect_block_number().returning(move || {
            let call = counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if call == 0 {
                    Err(FetchError::rpc("eth_blockNumber", "timeout"))
                } else {
                    Ok(42)
                }
            })
        });

        let mut subscription = poll_new_blocks(Arc::new(source), RateLimiter::new(100), Duration::from_millis(100));
        assert_eq!(subscription.next().await, Some(42));
        assert!(calls.load(Ordering::SeqCst) >= 2);
    }
}
