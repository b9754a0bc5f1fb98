//! Block Ingestion Pipeline
//!
//! Turns new-block notifications into classified records. Each notification
//! runs one cycle: fetch the block (and optionally its receipts) through the
//! rate limiter, map and classify its transactions, then update the dashboard.
//! A failing cycle is logged and publishes nothing; other cycles carry on.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::classifier::{TransactionClassifier, TxType};
use crate::decoder::{decode_block, DecodeError, RawBlock, RawReceipt, RawTransaction};
use crate::limiter::RateLimiter;
use crate::source::{ChainSource, FetchError, NewBlockSubscription};
use crate::state::{DashboardState, PublishOutcome};
use crate::types::{BlockStats, TxInfo};
use crate::window::RecentWindow;

/// Default number of transactions fetched one by one when a block only lists hashes
pub const DEFAULT_HYDRATE_LIMIT: usize = 10;

/// How many claimed block numbers are remembered for deduplication
pub const CLAIMED_BLOCKS_CAP: usize = 256;

/// Errors that end a cycle early
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("Block {0} not found")]
    BlockNotFound(u64),
}

/// Pipeline behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Fetch `eth_getBlockReceipts` alongside each block
    pub fetch_receipts: bool,
    /// Maximum transactions hydrated per block
    pub hydrate_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_receipts: false,
            hydrate_limit: DEFAULT_HYDRATE_LIMIT,
        }
    }
}

/// Stage of a single block cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Notified,
    Fetching,
    Mapping,
    Publishing,
    Idle,
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleStage::Notified => "notified",
            CycleStage::Fetching => "fetching",
            CycleStage::Mapping => "mapping",
            CycleStage::Publishing => "publishing",
            CycleStage::Idle => "idle",
        };
        f.write_str(name)
    }
}

/// Outcome of a completed cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub block_number: u64,
    pub records: Vec<TxInfo>,
    pub stats: BlockStats,
    pub outcome: PublishOutcome,
}

/// Why [`BlockIngestionPipeline::run`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    Shutdown,
    SubscriptionEnded,
}

/// Drives block cycles against a [`ChainSource`]
pub struct BlockIngestionPipeline {
    source: RwLock<Arc<dyn ChainSource>>,
    limiter: RateLimiter,
    classifier: Arc<TransactionClassifier>,
    state: Arc<DashboardState>,
    config: PipelineConfig,
    claimed: Mutex<RecentWindow<u64>>,
}

impl BlockIngestionPipeline {
    pub fn new(
        source: Arc<dyn ChainSource>,
        limiter: RateLimiter,
        classifier: Arc<TransactionClassifier>,
        state: Arc<DashboardState>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            source: RwLock::new(source),
            limiter,
            classifier,
            state,
            config,
            claimed: Mutex::new(RecentWindow::new(CLAIMED_BLOCKS_CAP)),
        }
    }

    pub fn state(&self) -> &Arc<DashboardState> {
        &self.state
    }

    pub fn config(&self) -> PipelineConfig {
        self.config
    }

    /// Source used by cycles started from now on
    pub fn source(&self) -> Arc<dyn ChainSource> {
        Arc::clone(&self.source.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Swap in a new source after a reconnect, keeping claims and state
    pub fn replace_source(&self, source: Arc<dyn ChainSource>) {
        *self.source.write().unwrap_or_else(PoisonError::into_inner) = source;
    }

    /// Run one cycle for a notified block
    ///
    /// Blocks already claimed by an earlier cycle are skipped. Failures are
    /// logged and release the claim so a later notification can retry.
    ///
    /// # Returns
    /// The cycle report, or `None` if the block was skipped or the cycle failed
    pub async fn handle_new_block(&self, number: u64) -> Option<CycleReport> {
        trace_stage(number, CycleStage::Notified);

        if !self.claim(number) {
            debug!("Block {} already claimed, skipping", number);
            return None;
        }
        self.state.record_latest_block(number);

        let result = self.process_block(number).await;
        trace_stage(number, CycleStage::Idle);

        match result {
            Ok(report) => {
                info!(
                    "Block {}: {} records, {} transactions ({:?})",
                    report.block_number,
                    report.records.len(),
                    report.stats.tx_count,
                    report.outcome
                );
                Some(report)
            }
            Err(e) => {
                warn!("Cycle for block {} failed: {}", number, e);
                self.release(number);
                None
            }
        }
    }

    /// Fetch, map and publish a block without deduplication
    pub async fn process_block(&self, number: u64) -> Result<CycleReport, PipelineError> {
        trace_stage(number, CycleStage::Fetching);

        let block = {
            let source = self.source();
            self.limiter.submit(move || source.get_block(number, true))
        }
        .await
        .map_err(FetchError::from)?
        .ok_or(PipelineError::BlockNotFound(number))?;

        // Receipts are only requested once the block itself is known
        let receipts: Vec<RawReceipt> = if self.config.fetch_receipts {
            let source = self.source();
            self.limiter
                .submit(move || source.get_block_receipts(number))
                .await
                .map_err(FetchError::from)?
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        let hydrated = self.hydrate(&block).await?;

        trace_stage(number, CycleStage::Mapping);
        let context = block.context(number)?;
        let decoded = decode_block(
            context,
            block.full_transactions().chain(hydrated.iter()),
            block.tx_count(),
            &receipts,
            &self.classifier,
        );

        trace_stage(number, CycleStage::Publishing);
        let types: Vec<TxType> = decoded.records.iter().map(|r| r.tx_type).collect();
        self.state.record_block(decoded.stats.clone(), types);
        let outcome = self
            .state
            .publish_transactions(context.number, decoded.records.clone());

        Ok(CycleReport {
            block_number: context.number,
            records: decoded.records,
            stats: decoded.stats,
            outcome,
        })
    }

    /// Fetch transactions the node returned as bare hashes, up to the hydrate limit
    async fn hydrate(&self, block: &RawBlock) -> Result<Vec<RawTransaction>, PipelineError> {
        let hashes: Vec<String> = block
            .transaction_hashes()
            .take(self.config.hydrate_limit)
            .map(String::from)
            .collect();
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        debug!(
            "Hydrating {} of {} transactions",
            hashes.len(),
            block.transaction_hashes().count()
        );

        let pending: Vec<_> = hashes
            .into_iter()
            .map(|hash| {
                let source = self.source();
                self.limiter.submit(move || source.get_transaction(&hash))
            })
            .collect();

        let mut transactions = Vec::with_capacity(pending.len());
        for request in pending {
            match request.await.map_err(FetchError::from)? {
                Some(tx) => transactions.push(tx),
                None => debug!("Node returned no transaction for a listed hash"),
            }
        }
        Ok(transactions)
    }

    /// Process notifications until the subscription ends or `shutdown` resolves
    ///
    /// Each notification runs in its own task. On exit the subscription is
    /// dropped and in-flight cycles are awaited.
    pub async fn run<S>(self: Arc<Self>, mut subscription: NewBlockSubscription, shutdown: S) -> RunExit
    where
        S: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);
        let mut cycles = JoinSet::new();
        let exit;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping block ingestion");
                    exit = RunExit::Shutdown;
                    break;
                }
                next = subscription.next() => match next {
                    Some(number) => {
                        let pipeline = Arc::clone(&self);
                        cycles.spawn(async move {
                            pipeline.handle_new_block(number).await;
                        });
                    }
                    None => {
                        info!("New-block subscription ended");
                        exit = RunExit::SubscriptionEnded;
                        break;
                    }
                },
                Some(joined) = cycles.join_next(), if !cycles.is_empty() => {
                    if let Err(e) = joined {
                        warn!("Cycle task failed: {}", e);
                    }
                }
            }
        }

        subscription.unsubscribe();
        if !cycles.is_empty() {
            info!("Waiting for {} in-flight cycles", cycles.len());
        }
        while let Some(joined) = cycles.join_next().await {
            if let Err(e) = joined {
                warn!("Cycle task failed: {}", e);
            }
        }
        exit
    }

    /// Run across lost subscriptions until `shutdown` resolves
    ///
    /// Whenever the subscription ends on its own, `reconnect` is asked for a
    /// fresh source and subscription. Claims and dashboard state carry over.
    /// An error from `reconnect` ends ingestion and is returned.
    pub async fn run_with_reconnect<R, Fut, E, S>(
        self: Arc<Self>,
        mut subscription: NewBlockSubscription,
        mut reconnect: R,
        shutdown: S,
    ) -> Result<(), E>
    where
        R: FnMut() -> Fut,
        Fut: Future<Output = Result<(Arc<dyn ChainSource>, NewBlockSubscription), E>>,
        S: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);

        loop {
            if Arc::clone(&self).run(subscription, shutdown.as_mut()).await == RunExit::Shutdown {
                return Ok(());
            }

            warn!("Lost the new-block subscription, reconnecting");
            let (source, next) = tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested while reconnecting");
                    return Ok(());
                }
                reconnected = reconnect() => reconnected?,
            };
            self.replace_source(source);
            subscription = next;
            info!("Resubscribed to new blocks");
        }
    }

    fn claim(&self, number: u64) -> bool {
        let mut claimed = self.lock_claimed();
        if claimed.contains(&number) {
            return false;
        }
        claimed.push_back(number);
        true
    }

    fn release(&self, number: u64) {
        self.lock_claimed().retain(|claimed| *claimed != number);
    }

    fn lock_claimed(&self) -> MutexGuard<'_, RecentWindow<u64>> {
        self.claimed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn trace_stage(number: u64, stage: CycleStage) {
    debug!("Block {} cycle: {}", number, stage);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassifierConfig;
    use crate::config::WindowConfig;
    use crate::decoder::to_quantity;
    use crate::source::MockChainSource;
    use mockall::predicate::eq;
    use serde_json::json;
    use std::collections::HashMap;

    const ROUTER: &str = "0x7a250d5630b4cf539739df2c5dacb4c659f2488d";
    const ALICE: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
    const BOB: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";

    fn block_with(number: u64, transactions: serde_json::Value) -> RawBlock {
        serde_json::from_value(json!({
            "number": to_quantity(number),
            "timestamp": "0x6553f100",
            "transactions": transactions,
        }))
        .unwrap()
    }

    fn three_tx_block(number: u64) -> RawBlock {
        block_with(
            number,
            json!([
                {"hash": "0x01", "from": ALICE, "to": BOB, "value": "0xde0b6b3a7640000", "input": "0x", "gas": "0x5208", "gasPrice": "0x3b9aca00"},
                {"hash": "0x02", "from": ALICE, "to": ROUTER, "value": "0x0", "input": "0x38ed17390000", "gas": "0x30d40", "gasPrice": "0x3b9aca00"},
                {"hash": "0x03", "from": ALICE, "to": "0x000000000000000000000000000000000000dEaD", "value": "0x0", "input": "0xa9059cbb", "gas": "0xea60", "gasPrice": "0x3b9aca00"},
            ]),
        )
    }

    fn expect_block(source: &mut MockChainSource, number: u64, block: RawBlock) {
        source
            .expect_get_block()
            .with(eq(number), eq(true))
            .returning(move |_, _| {
                let block = block.clone();
                Box::pin(async move { Ok(Some(block)) })
            });
    }

    fn pipeline(source: MockChainSource, config: PipelineConfig) -> BlockIngestionPipeline {
        BlockIngestionPipeline::new(
            Arc::new(source),
            RateLimiter::new(1000),
            Arc::new(TransactionClassifier::new(ClassifierConfig::default())),
            Arc::new(DashboardState::new(&WindowConfig::default())),
            config,
        )
    }

    // ==================== cycle tests ====================

    #[tokio::test]
    async fn test_block_is_classified_and_aggregated() {
        let mut source = MockChainSource::new();
        expect_block(&mut source, 100, three_tx_block(100));
        source.expect_get_block_receipts().never();
        let pipeline = pipeline(source, PipelineConfig::default());

        let report = pipeline.process_block(100).await.unwrap();

        let types: Vec<TxType> = report.records.iter().map(|r| r.tx_type).collect();
        assert_eq!(types, vec![TxType::Transfer, TxType::Swap, TxType::Burn]);
        assert_eq!(report.stats.tx_count, 3);
        assert_eq!(report.outcome, PublishOutcome::Published);
        assert_eq!(pipeline.state().recent_transactions().len(), 3);
        assert_eq!(pipeline.state().recent_blocks(), vec![report.stats.clone()]);
    }

    #[tokio::test]
    async fn test_records_carry_block_time_and_number() {
        let mut source = MockChainSource::new();
        expect_block(&mut source, 100, three_tx_block(100));
        let pipeline = pipeline(source, PipelineConfig::default());

        let report = pipeline.process_block(100).await.unwrap();
        for record in &report.records {
            assert_eq!(record.block_number, 100);
            assert_eq!(record.timestamp, 0x6553f100 * 1000);
        }
        assert_eq!(report.records[0].value, "1.0");
    }

    #[tokio::test]
    async fn test_receipts_are_fetched_when_enabled() {
        let mut source = MockChainSource::new();
        expect_block(&mut source, 100, three_tx_block(100));
        source
            .expect_get_block_receipts()
            .with(eq(100))
            .times(1)
            .returning(|_| {
                Box::pin(async {
                    Ok(Some(vec![RawReceipt {
                        transaction_hash: Some("0x02".to_string()),
                        gas_used: Some("0x186a0".to_string()),
                        effective_gas_price: Some("0x3b9aca00".to_string()),
                        status: Some("0x1".to_string()),
                    }]))
                })
            });
        let pipeline = pipeline(
            source,
            PipelineConfig {
                fetch_receipts: true,
                ..Default::default()
            },
        );

        let report = pipeline.process_block(100).await.unwrap();
        let swap = &report.records[1];
        assert_eq!(swap.gas_used, Some(100_000));
        assert_eq!(swap.tx_fee.as_deref(), Some("0.0001"));
    }

    #[tokio::test]
    async fn test_hashes_are_hydrated_up_to_limit() {
        let mut source = MockChainSource::new();
        expect_block(&mut source, 7, block_with(7, json!(["0xaa", "0xbb", "0xcc"])));

        let known: HashMap<String, RawTransaction> = ["0xaa", "0xbb", "0xcc"]
            .into_iter()
            .map(|hash| {
                let tx = RawTransaction {
                    hash: Some(hash.to_string()),
                    from: Some(ALICE.to_string()),
                    to: Some(BOB.to_string()),
                    value: Some("0x1".to_string()),
                    ..Default::default()
                };
                (hash.to_string(), tx)
            })
            .collect();
        source.expect_get_transaction().times(2).returning(move |hash| {
            let tx = known.get(hash).cloned();
            Box::pin(async move { Ok(tx) })
        });

        let pipeline = pipeline(
            source,
            PipelineConfig {
                hydrate_limit: 2,
                ..Default::default()
            },
        );

        let report = pipeline.process_block(7).await.unwrap();
        let hashes: Vec<&str> = report.records.iter().map(|r| r.hash.as_str()).collect();
        assert_eq!(hashes, vec!["0xaa", "0xbb"]);
        assert_eq!(report.stats.tx_count, 3);
    }

    #[tokio::test]
    async fn test_missing_block_fails_the_cycle() {
        let mut source = MockChainSource::new();
        source
            .expect_get_block()
            .returning(|_, _| Box::pin(async { Ok(None) }));
        let pipeline = pipeline(source, PipelineConfig::default());

        assert_eq!(pipeline.process_block(9).await, Err(PipelineError::BlockNotFound(9)));
        assert!(pipeline.state().recent_blocks().is_empty());
    }

    #[tokio::test]
    async fn test_failed_block_fetch_skips_receipts() {
        let mut source = MockChainSource::new();
        source.expect_get_block().times(1).returning(|_, _| {
            Box::pin(async { Err(FetchError::rpc("eth_getBlockByNumber", "header not found")) })
        });
        source.expect_get_block_receipts().never();
        let pipeline = pipeline(
            source,
            PipelineConfig {
                fetch_receipts: true,
                ..Default::default()
            },
        );

        assert!(matches!(pipeline.process_block(9).await, Err(PipelineError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_odd_transaction_shapes_do_not_fail_the_cycle() {
        let mut source = MockChainSource::new();
        let block = block_with(
            12,
            json!([
                {"hash": "0x01", "from": ALICE, "to": ROUTER, "value": "0x0", "input": "0x38ed17390000", "data": "0x38ed17390000"},
                {"hash": "0x02", "from": ALICE, "to": BOB, "value": 7, "gas": true},
                17,
            ]),
        );
        expect_block(&mut source, 12, block);
        let pipeline = pipeline(source, PipelineConfig::default());

        let report = pipeline.process_block(12).await.unwrap();
        let types: Vec<TxType> = report.records.iter().map(|r| r.tx_type).collect();
        assert_eq!(types, vec![TxType::Swap, TxType::Transfer]);
        assert_eq!(pipeline.state().recent_blocks().len(), 1);
    }

    #[tokio::test]
    async fn test_block_without_timestamp_fails_the_cycle() {
        let mut source = MockChainSource::new();
        let block: RawBlock = serde_json::from_value(json!({"number": "0x9", "transactions": []})).unwrap();
        expect_block(&mut source, 9, block);
        let pipeline = pipeline(source, PipelineConfig::default());

        assert_eq!(
            pipeline.process_block(9).await,
            Err(PipelineError::Decode(DecodeError::MissingField("timestamp")))
        );
    }

    // ==================== claim tests ====================

    #[tokio::test]
    async fn test_block_is_processed_once() {
        let mut source = MockChainSource::new();
        let block = three_tx_block(5);
        source.expect_get_block().times(1).returning(move |_, _| {
            let block = block.clone();
            Box::pin(async move { Ok(Some(block)) })
        });
        let pipeline = pipeline(source, PipelineConfig::default());

        assert!(pipeline.handle_new_block(5).await.is_some());
        assert!(pipeline.handle_new_block(5).await.is_none());
        assert_eq!(pipeline.state().recent_blocks().len(), 1);
        assert_eq!(pipeline.state().latest_block(), Some(5));
    }

    #[tokio::test]
    async fn test_failed_cycle_releases_claim() {
        let mut source = MockChainSource::new();
        let mut calls = 0;
        let block = three_tx_block(5);
        source.expect_get_block().times(2).returning(move |_, _| {
            calls += 1;
            let result = if calls == 1 {
                Err(FetchError::rpc("eth_getBlockByNumber", "header not found"))
            } else {
                Ok(Some(block.clone()))
            };
            Box::pin(async move { result })
        });
        let pipeline = pipeline(source, PipelineConfig::default());

        assert!(pipeline.handle_new_block(5).await.is_none());
        assert!(pipeline.state().recent_blocks().is_empty());
        assert!(pipeline.handle_new_block(5).await.is_some());
    }

    // ==================== pause tests ====================

    #[tokio::test]
    async fn test_paused_cycle_still_aggregates() {
        let mut source = MockChainSource::new();
        expect_block(&mut source, 100, three_tx_block(100));
        let pipeline = pipeline(source, PipelineConfig::default());
        pipeline.state().pause();

        let report = pipeline.process_block(100).await.unwrap();

        assert_eq!(report.outcome, PublishOutcome::Paused);
        assert!(pipeline.state().recent_transactions().is_empty());
        assert_eq!(pipeline.state().recent_blocks().len(), 1);
        assert_eq!(pipeline.state().type_mix()[&TxType::Swap], 1);
    }

    // ==================== run loop tests ====================

    #[tokio::test]
    async fn test_run_until_subscription_ends() {
        let mut source = MockChainSource::new();
        source.expect_get_block().returning(|number, _| {
            let block = three_tx_block(number);
            Box::pin(async move { Ok(Some(block)) })
        });
        let pipeline = Arc::new(pipeline(source, PipelineConfig::default()));

        let (sender, subscription) = NewBlockSubscription::channel(8);
        for number in [1, 2, 2, 3] {
            sender.send(number).await.unwrap();
        }
        drop(sender);

        Arc::clone(&pipeline)
            .run(subscription, std::future::pending())
            .await;

        let numbers: Vec<u64> = pipeline.state().recent_blocks().iter().map(|b| b.block_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(pipeline.state().latest_block(), Some(3));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let source = MockChainSource::new();
        let pipeline = Arc::new(pipeline(source, PipelineConfig::default()));
        let (_sender, subscription) = NewBlockSubscription::channel(8);

        let exit = Arc::clone(&pipeline).run(subscription, async {}).await;
        assert_eq!(exit, RunExit::Shutdown);
        assert!(pipeline.state().recent_blocks().is_empty());
    }

    // ==================== reconnect tests ====================

    fn source_serving(number: u64) -> MockChainSource {
        let mut source = MockChainSource::new();
        expect_block(&mut source, number, three_tx_block(number));
        source
    }

    async fn announcing(numbers: &[u64]) -> NewBlockSubscription {
        let (sender, subscription) = NewBlockSubscription::channel(8);
        for number in numbers {
            sender.send(*number).await.unwrap();
        }
        subscription
    }

    #[tokio::test]
    async fn test_lost_subscription_is_replaced_with_fresh_source() {
        let pipeline = Arc::new(pipeline(source_serving(1), PipelineConfig::default()));
        let first = announcing(&[1]).await;

        let mut prepared = vec![(Arc::new(source_serving(2)) as Arc<dyn ChainSource>, announcing(&[1, 2]).await)];
        let mut attempts = 0;
        let result = Arc::clone(&pipeline)
            .run_with_reconnect(
                first,
                || {
                    attempts += 1;
                    let next = prepared.pop().ok_or_else(|| "node gone".to_string());
                    async move { next }
                },
                std::future::pending(),
            )
            .await;

        assert_eq!(result, Err("node gone".to_string()));
        assert_eq!(attempts, 2);
        let numbers: Vec<u64> = pipeline.state().recent_blocks().iter().map(|b| b.block_number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_shutdown_skips_reconnect() {
        let pipeline = Arc::new(pipeline(MockChainSource::new(), PipelineConfig::default()));
        let (_sender, subscription) = NewBlockSubscription::channel(8);

        let mut attempts = 0;
        let result = Arc::clone(&pipeline)
            .run_with_reconnect(
                subscription,
                || {
                    attempts += 1;
                    async { Err::<(Arc<dyn ChainSource>, NewBlockSubscription), String>("unused".to_string()) }
                },
                async {},
            )
            .await;

        assert_eq!(result, Ok(()));
        assert_eq!(attempts, 0);
    }

    #[test]
    fn test_cycle_stage_display() {
        assert_eq!(CycleStage::Notified.to_string(), "notified");
        assert_eq!(CycleStage::Idle.to_string(), "idle");
    }

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert!(!config.fetch_receipts);
        assert_eq!(config.hydrate_limit, DEFAULT_HYDRATE_LIMIT);
    }
}
