//! Benchmarks for the per-block hot path
//!
//! Covers classification, mapping of a full block and window insertion.

use alloy::primitives::U256;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use blockpulse_ingestor::decoder::{decode_block, BlockContext, RawTransaction};
use blockpulse_ingestor::{
    BlockStats, ClassifierConfig, ClassifyInput, RecentWindow, TransactionClassifier, TxType,
};

const ROUTER: &str = "0x7a250d5630b4cf539739df2c5dacb4c659f2488d";

fn swap_input() -> String {
    format!("0x38ed1739{}", "00".repeat(160))
}

fn sample_block(size: usize) -> Vec<RawTransaction> {
    (0..size)
        .map(|i| RawTransaction {
            hash: Some(format!("0x{:064x}", i)),
            from: Some("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266".to_string()),
            to: Some(ROUTER.to_string()),
            value: Some(if i % 3 == 0 { "0xde0b6b3a7640000" } else { "0x0" }.to_string()),
            input: Some(if i % 3 == 0 { "0x".to_string() } else { swap_input() }),
            gas: Some("0x30d40".to_string()),
            gas_price: Some("0x3b9aca00".to_string()),
            ..Default::default()
        })
        .collect()
}

/// Benchmark classification of a swap call
fn bench_classify(c: &mut Criterion) {
    let classifier = TransactionClassifier::new(ClassifierConfig::default());
    let input = swap_input();

    c.bench_function("classify_swap", |b| {
        b.iter(|| {
            black_box(classifier.classify(black_box(&ClassifyInput {
                value: U256::ZERO,
                to: Some(ROUTER),
                input: Some(&input),
                receipt_gas_used: None,
            })))
        })
    });
}

/// Benchmark mapping a 200-transaction block
fn bench_decode_block(c: &mut Criterion) {
    let classifier = TransactionClassifier::new(ClassifierConfig::default());
    let transactions = sample_block(200);
    let context = BlockContext {
        number: 19_000_000,
        timestamp_ms: 1_700_000_000_000,
    };

    c.bench_function("decode_block_200", |b| {
        b.iter(|| black_box(decode_block(context, transactions.iter(), transactions.len(), &[], &classifier)))
    });
}

/// Benchmark window insertion at capacity
fn bench_window_insert(c: &mut Criterion) {
    c.bench_function("window_push_front_batch", |b| {
        b.iter_batched(
            || {
                let mut window = RecentWindow::new(50);
                window.push_front_batch(vec![TxType::Transfer; 50]);
                window
            },
            |mut window| {
                window.push_front_batch(vec![TxType::Swap; 10]);
                black_box(window)
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("window_insert_ascending", |b| {
        b.iter_batched(
            || {
                let mut window = RecentWindow::new(10);
                for n in 0..10u64 {
                    window.push_back(BlockStats::new(n * 2, 100));
                }
                window
            },
            |mut window| {
                window.insert_ascending_by_key(BlockStats::new(11, 100), |s| s.block_number);
                black_box(window)
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_classify, bench_decode_block, bench_window_insert);

criterion_main!(benches);
