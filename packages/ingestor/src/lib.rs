//! BlockPulse Ingestor Library
//!
//! This crate provides components for following an EVM chain's new blocks,
//! fetching them through a rate-limited request queue, classifying each
//! transaction (transfer, swap, burn, mint, contract, unknown) and keeping a
//! bounded live view of the results, optionally forwarded to Redis.

pub mod classifier;
pub mod config;
pub mod decoder;
pub mod limiter;
pub mod node;
pub mod pipeline;
pub mod publisher;
pub mod selector;
pub mod source;
pub mod state;
pub mod types;
pub mod window;

// Re-export commonly used types
pub use classifier::{ClassifierConfig, ClassifyInput, TransactionClassifier, TxType};
pub use config::{ConfigError, IngestorConfig, LimiterConfig, WindowConfig};
pub use decoder::{decode_block, map_transaction, RawBlock, RawReceipt, RawTransaction};
pub use limiter::{RateLimiter, SubmitError};
pub use node::{NodeConfig, NodeConnection, NodeError, RpcChainSource};
pub use pipeline::{BlockIngestionPipeline, CycleReport, PipelineConfig, PipelineError, RunExit};
pub use publisher::{PublishError, Publisher};
pub use selector::{SelectorCategory, SelectorSets};
pub use source::{ChainSource, FetchError, NewBlockSubscription, SourceFuture};
pub use state::{DashboardEvent, DashboardState, PublishOutcome};
pub use types::{BlockStats, TxInfo};
pub use window::RecentWindow;
