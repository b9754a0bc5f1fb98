//! Dashboard State
//!
//! In-memory view consumed by presentation layers: the recent-transactions
//! window, the recent-blocks window, a rolling type mix and the pause gate.
//! Every change is also broadcast as a [`DashboardEvent`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use alloy::primitives::U256;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::classifier::TxType;
use crate::config::WindowConfig;
use crate::decoder::{format_native, parse_u256};
use crate::types::{BlockStats, TxInfo};
use crate::window::RecentWindow;

/// Capacity of the event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Change notification for downstream consumers
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DashboardEvent {
    /// A block was aggregated
    Block(BlockStats),
    /// Records were inserted into the recent-transactions window
    #[serde(rename_all = "camelCase")]
    Transactions { block_number: u64, records: Vec<TxInfo> },
}

/// Result of publishing a block's records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    Paused,
}

/// Rolling composition of recently classified records
///
/// Keeps at most `cap` types and starts over every `cycle_blocks` blocks.
#[derive(Debug, Clone)]
pub struct TypeMix {
    recent: RecentWindow<TxType>,
    cycle_blocks: usize,
    blocks_in_cycle: usize,
}

impl TypeMix {
    pub fn new(cap: usize, cycle_blocks: usize) -> Self {
        Self {
            recent: RecentWindow::new(cap),
            cycle_blocks,
            blocks_in_cycle: 0,
        }
    }

    /// Account for one block's records
    pub fn record_block(&mut self, types: impl IntoIterator<Item = TxType>) {
        if self.blocks_in_cycle + 1 >= self.cycle_blocks {
            self.recent.clear();
            self.blocks_in_cycle = 0;
            return;
        }
        self.recent.push_front_batch(types.into_iter().collect());
        self.blocks_in_cycle += 1;
    }

    /// Count per type, every variant present
    pub fn counts(&self) -> HashMap<TxType, usize> {
        let mut counts: HashMap<TxType, usize> = TxType::ALL.iter().map(|t| (*t, 0)).collect();
        for tx_type in self.recent.iter() {
            *counts.entry(*tx_type).or_default() += 1;
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.recent.len()
    }
}

/// Statistics over the recent-blocks window
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WindowSummary {
    pub total_txs: usize,
    pub avg_txs_per_block: usize,
    pub max_txs_per_block: usize,
    pub total_fees: String,
}

/// Point-in-time copy of the dashboard
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub latest_block: Option<u64>,
    pub paused: bool,
    pub recent_txs: Vec<TxInfo>,
    pub recent_blocks: Vec<BlockStats>,
    pub type_mix: HashMap<TxType, usize>,
}

struct Inner {
    recent_txs: RecentWindow<TxInfo>,
    recent_blocks: RecentWindow<BlockStats>,
    type_mix: TypeMix,
    latest_block: Option<u64>,
}

/// Shared dashboard state
///
/// Transactions are kept newest-first, block aggregates oldest-first; both
/// windows stay ordered by block number even when blocks finish out of order.
pub struct DashboardState {
    inner: Mutex<Inner>,
    paused: AtomicBool,
    events: broadcast::Sender<DashboardEvent>,
}

impl DashboardState {
    pub fn new(config: &WindowConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(Inner {
                recent_txs: RecentWindow::new(config.recent_txs),
                recent_blocks: RecentWindow::new(config.recent_blocks),
                type_mix: TypeMix::new(config.mix_cap, config.mix_cycle_blocks),
                latest_block: None,
            }),
            paused: AtomicBool::new(false),
            events,
        }
    }

    /// Subscribe to change events
    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.events.subscribe()
    }

    pub fn pause(&self) {
        self.set_paused(true);
    }

    pub fn resume(&self) {
        self.set_paused(false);
    }

    /// Gate insertion into the recent-transactions window
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
        debug!("Dashboard paused: {}", paused);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Record a newly announced block; the latest block never moves backwards
    pub fn record_latest_block(&self, number: u64) {
        let mut inner = self.lock();
        inner.latest_block = Some(inner.latest_block.map_or(number, |latest| latest.max(number)));
    }

    pub fn latest_block(&self) -> Option<u64> {
        self.lock().latest_block
    }

    /// Add a block aggregate and its types to the mix, regardless of pause
    pub fn record_block(&self, stats: BlockStats, types: impl IntoIterator<Item = TxType>) {
        {
            let mut inner = self.lock();
            inner
                .recent_blocks
                .insert_ascending_by_key(stats.clone(), |s| s.block_number);
            inner.type_mix.record_block(types);
        }
        let _ = self.events.send(DashboardEvent::Block(stats));
    }

    /// Insert a block's records at the front of the recent-transactions window
    ///
    /// Skipped while paused.
    pub fn publish_transactions(&self, block_number: u64, records: Vec<TxInfo>) -> PublishOutcome {
        if self.is_paused() {
            debug!("Paused, not publishing {} records of block {}", records.len(), block_number);
            return PublishOutcome::Paused;
        }
        if records.is_empty() {
            return PublishOutcome::Published;
        }

        self.lock()
            .recent_txs
            .insert_batch_descending_by_key(records.clone(), |tx| tx.block_number);
        let _ = self.events.send(DashboardEvent::Transactions {
            block_number,
            records,
        });
        PublishOutcome::Published
    }

    pub fn recent_transactions(&self) -> Vec<TxInfo> {
        self.lock().recent_txs.to_vec()
    }

    pub fn recent_blocks(&self) -> Vec<BlockStats> {
        self.lock().recent_blocks.to_vec()
    }

    pub fn type_mix(&self) -> HashMap<TxType, usize> {
        self.lock().type_mix.counts()
    }

    /// Totals over the recent-blocks window
    pub fn summary(&self) -> WindowSummary {
        let inner = self.lock();
        let blocks = &inner.recent_blocks;

        let total_txs: usize = blocks.iter().map(|b| b.tx_count).sum();
        let max_txs_per_block = blocks.iter().map(|b| b.tx_count).max().unwrap_or(0);
        let avg_txs_per_block = if blocks.is_empty() {
            0
        } else {
            (total_txs as f64 / blocks.len() as f64).round() as usize
        };
        let total_fees = blocks
            .iter()
            .filter_map(|b| b.total_fees.as_deref())
            .filter_map(parse_native)
            .fold(U256::ZERO, |acc, fee| acc.saturating_add(fee));

        WindowSummary {
            total_txs,
            avg_txs_per_block,
            max_txs_per_block,
            total_fees: format_native(total_fees),
        }
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let inner = self.lock();
        DashboardSnapshot {
            latest_block: inner.latest_block,
            paused: self.is_paused(),
            recent_txs: inner.recent_txs.to_vec(),
            recent_blocks: inner.recent_blocks.to_vec(),
            type_mix: inner.type_mix.counts(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Parse a native-unit decimal string back into wei
fn parse_native(text: &str) -> Option<U256> {
    let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));
    if fraction.len() > 18 {
        return None;
    }
    let padded = format!("{}{:0<18}", whole, fraction);
    parse_u256(&padded)
}
