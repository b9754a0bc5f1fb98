//! Redis Publisher
//!
//! Forwards dashboard events to Redis pub/sub channels. Transaction records
//! go to the transaction channel one JSON message per record; block
//! aggregates go to `<channel>:blocks`.

use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::state::DashboardEvent;
use crate::types::{BlockStats, TxInfo};

/// Default Redis channel for publishing classified transactions
pub const DEFAULT_CHANNEL: &str = "blockpulse_txs";

/// Suffix of the block aggregate channel
pub const BLOCK_CHANNEL_SUFFIX: &str = ":blocks";

/// Errors that can occur during publishing
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Redis connection error: {0}")]
    Connection(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Open a multiplexed Redis connection
pub async fn connect(url: &str) -> Result<MultiplexedConnection, PublishError> {
    let client = redis::Client::open(url)?;
    let connection = client.get_multiplexed_async_connection().await?;
    info!("Connected to Redis at {}", url);
    Ok(connection)
}

/// Channel that block aggregates are published on
pub fn block_channel(channel: &str) -> String {
    format!("{}{}", channel, BLOCK_CHANNEL_SUFFIX)
}

/// Redis publisher for dashboard events
pub struct Publisher {
    connection: MultiplexedConnection,
    channel: String,
    block_channel: String,
}

impl Publisher {
    /// Create a new publisher with a Redis connection
    ///
    /// # Arguments
    /// * `connection` - An established Redis multiplexed connection
    /// * `channel` - The pub/sub channel name for transaction records
    pub fn new(connection: MultiplexedConnection, channel: impl Into<String>) -> Self {
        let channel = channel.into();
        Self {
            connection,
            block_channel: block_channel(&channel),
            channel,
        }
    }

    /// Create a new publisher with the default channel
    pub fn with_default_channel(connection: MultiplexedConnection) -> Self {
        Self::new(connection, DEFAULT_CHANNEL)
    }

    /// Publish one transaction record
    ///
    /// # Returns
    /// The number of subscribers that received the message
    pub async fn publish_transaction(&mut self, tx: &TxInfo) -> Result<i64, PublishError> {
        let json = tx.to_json()?;
        let subscribers: i64 = self.connection.publish(&self.channel, &json).await?;
        Ok(subscribers)
    }

    /// Publish one block aggregate
    pub async fn publish_block(&mut self, stats: &BlockStats) -> Result<i64, PublishError> {
        let json = stats.to_json()?;
        let subscribers: i64 = self.connection.publish(&self.block_channel, &json).await?;
        Ok(subscribers)
    }

    /// Publish a dashboard event
    ///
    /// # Returns
    /// The number of messages published
    pub async fn publish_event(&mut self, event: &DashboardEvent) -> Result<usize, PublishError> {
        match event {
            DashboardEvent::Block(stats) => {
                self.publish_block(stats).await?;
                Ok(1)
            }
            DashboardEvent::Transactions { records, .. } => {
                for record in records {
                    self.publish_transaction(record).await?;
                }
                Ok(records.len())
            }
        }
    }

    /// Get the transaction channel name
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Get the block aggregate channel name
    pub fn block_channel(&self) -> &str {
        &self.block_channel
    }
}

/// Forward events until the sender side closes
///
/// Publish failures are logged and skipped. A lagging receiver logs how many
/// events it missed and continues.
pub async fn forward_events(mut publisher: Publisher, mut events: broadcast::Receiver<DashboardEvent>) {
    info!("Forwarding dashboard events to Redis channel {}", publisher.channel());

    loop {
        match events.recv().await {
            Ok(event) => match publisher.publish_event(&event).await {
                Ok(count) => debug!("Published {} messages", count),
                Err(e) => warn!("Failed to publish event: {}", e),
            },
            Err(RecvError::Lagged(skipped)) => {
                warn!("Publisher lagged, skipped {} events", skipped);
            }
            Err(RecvError::Closed) => {
                info!("Event stream closed, publisher stopping");
                break;
            }
        }
    }
}
