//! Node Connection Module
//!
//! Handles connection to an EVM node over HTTP, WebSocket or Unix IPC socket.
//! Serves raw JSON-RPC block data, delivers new-block notifications and
//! handles reconnection with exponential backoff.

use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::transports::BoxTransport;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::decoder::{to_quantity, RawBlock, RawHeader, RawReceipt, RawTransaction};
use crate::limiter::RateLimiter;
use crate::source::{
    poll_new_blocks, ChainSource, FetchError, NewBlockSubscription, SourceFuture, NOTIFICATION_BUFFER,
};

/// Default node endpoint
pub const DEFAULT_NODE_URL: &str = "ws://127.0.0.1:8545";

/// Maximum number of reconnection attempts before giving up
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Initial backoff delay for reconnection
pub const INITIAL_BACKOFF_MS: u64 = 100;

/// Maximum backoff delay for reconnection
pub const MAX_BACKOFF_MS: u64 = 30000;

/// Block-number polling interval for transports without subscriptions
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 4000;

/// Errors that can occur while talking to the node
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("IPC socket not found at path: {0}")]
    SocketNotFound(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),

    #[error("Max reconnection attempts ({0}) exceeded")]
    MaxReconnectAttemptsExceeded(u32),

    #[error("Invalid node URL: {0}")]
    InvalidUrl(String),
}

/// How the node is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Http,
    Ws,
    Ipc,
}

impl TransportKind {
    /// Detect the transport from a URL; anything without a scheme is an IPC path
    pub fn detect(url: &str) -> Result<Self, NodeError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(NodeError::InvalidUrl("URL cannot be empty".to_string()));
        }

        let lower = url.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Ok(TransportKind::Http)
        } else if lower.starts_with("ws://") || lower.starts_with("wss://") {
            Ok(TransportKind::Ws)
        } else if lower.contains("://") {
            Err(NodeError::InvalidUrl(format!("unsupported scheme in {}", url)))
        } else {
            Ok(TransportKind::Ipc)
        }
    }

    /// Whether `eth_subscribe` is available
    pub fn supports_pubsub(&self) -> bool {
        !matches!(self, TransportKind::Http)
    }
}

/// Configuration for the node connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// HTTP(S) or WS(S) URL, or a path to an IPC socket
    pub url: String,
    /// Maximum reconnection attempts
    pub max_reconnect_attempts: u32,
    /// Initial backoff delay in milliseconds
    pub initial_backoff_ms: u64,
    /// Maximum backoff delay in milliseconds
    pub max_backoff_ms: u64,
    /// Block-number polling interval in milliseconds (HTTP only)
    pub poll_interval_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_NODE_URL.to_string(),
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
            initial_backoff_ms: INITIAL_BACKOFF_MS,
            max_backoff_ms: MAX_BACKOFF_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl NodeConfig {
    /// Create a new config with the specified URL
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Calculate backoff delay for a given attempt number
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_backoff_ms * 2u64.pow(attempt.min(10));
        Duration::from_millis(delay_ms.min(self.max_backoff_ms))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Check if an IPC socket exists at the given path
pub fn socket_exists(path: &str) -> bool {
    let expanded = expand_path(path);
    Path::new(&expanded).exists()
}

/// Expand ~ to home directory in path
pub fn expand_path(path: &str) -> String {
    if path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return path.replacen("~", &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

/// Node connection manager with reconnection support
pub struct NodeConnection {
    config: NodeConfig,
    reconnect_attempts: u32,
}

impl NodeConnection {
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            reconnect_attempts: 0,
        }
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self::new(NodeConfig::with_url(url))
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Reset reconnection counter
    pub fn reset_reconnect_counter(&mut self) {
        self.reconnect_attempts = 0;
    }

    /// Get current reconnection attempt count
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// Calculate delay before next reconnection attempt
    pub fn next_backoff_delay(&self) -> Duration {
        self.config.backoff_delay(self.reconnect_attempts)
    }

    /// Attempt to connect to the node
    ///
    /// IPC paths are checked for existence first; `~/` is expanded.
    pub async fn connect(&mut self) -> Result<RpcChainSource, NodeError> {
        let kind = TransportKind::detect(&self.config.url)?;
        let target = match kind {
            TransportKind::Ipc => {
                let expanded = expand_path(self.config.url.trim());
                if !Path::new(&expanded).exists() {
                    return Err(NodeError::SocketNotFound(expanded));
                }
                expanded
            }
            TransportKind::Http | TransportKind::Ws => self.config.url.trim().to_string(),
        };

        info!("Connecting to {:?} node at {}", kind, target);

        let provider: RootProvider<BoxTransport> = ProviderBuilder::new()
            .on_builtin(&target)
            .await
            .map_err(|e| NodeError::ConnectionFailed(e.to_string()))?;

        self.reset_reconnect_counter();
        info!("Successfully connected to node");

        Ok(RpcChainSource {
            provider,
            kind,
            poll_interval: self.config.poll_interval(),
        })
    }

    /// Attempt to reconnect with exponential backoff
    ///
    /// Returns a source if successful, or an error if max attempts exceeded
    pub async fn reconnect(&mut self) -> Result<RpcChainSource, NodeError> {
        while self.reconnect_attempts < self.config.max_reconnect_attempts {
            let delay = self.next_backoff_delay();
            warn!(
                "Attempting to reconnect (attempt {}/{}), waiting {:?}",
                self.reconnect_attempts + 1,
                self.config.max_reconnect_attempts,
                delay
            );

            sleep(delay).await;
            self.reconnect_attempts += 1;

            match self.connect().await {
                Ok(source) => return Ok(source),
                Err(e) => {
                    error!("Reconnection attempt {} failed: {}", self.reconnect_attempts, e);
                }
            }
        }

        Err(NodeError::MaxReconnectAttemptsExceeded(self.config.max_reconnect_attempts))
    }
}

/// [`ChainSource`] backed by an alloy provider
#[derive(Clone)]
pub struct RpcChainSource {
    provider: RootProvider<BoxTransport>,
    kind: TransportKind,
    poll_interval: Duration,
}

impl RpcChainSource {
    pub fn transport(&self) -> TransportKind {
        self.kind
    }

    /// Register for new-block notifications
    ///
    /// WebSocket and IPC connections use `eth_subscribe("newHeads")`; HTTP
    /// connections poll `eth_blockNumber` through the limiter.
    pub async fn subscribe_new_blocks(
        self: &Arc<Self>,
        limiter: &RateLimiter,
    ) -> Result<NewBlockSubscription, NodeError> {
        if !self.kind.supports_pubsub() {
            info!("Polling for new blocks every {:?}", self.poll_interval);
            let source: Arc<dyn ChainSource> = Arc::clone(self) as Arc<dyn ChainSource>;
            return Ok(poll_new_blocks(source, limiter.clone(), self.poll_interval));
        }

        let mut headers = self
            .provider
            .subscribe::<_, RawHeader>(("newHeads",))
            .await
            .map_err(|e| NodeError::SubscriptionFailed(e.to_string()))?;
        info!("Subscribed to newHeads");

        let (sender, receiver) = mpsc::channel(NOTIFICATION_BUFFER);
        let producer = tokio::spawn(async move {
            loop {
                match headers.recv().await {
                    Ok(header) => match header.block_number() {
                        Some(number) => {
                            debug!("New head {}", number);
                            if sender.send(number).await.is_err() {
                                break;
                            }
                        }
                        None => warn!("Ignoring header without a block number: {:?}", header),
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("New-head subscription lagged, skipped {} headers", skipped);
                    }
                    Err(RecvError::Closed) => {
                        warn!("New-head subscription closed by the node");
                        break;
                    }
                }
            }
        });

        Ok(NewBlockSubscription::new(receiver, producer))
    }
}

impl ChainSource for RpcChainSource {
    fn get_block(&self, number: u64, full_transactions: bool) -> SourceFuture<Option<RawBlock>> {
        let provider = self.provider.clone();
        Box::pin(async move {
            provider
                .raw_request(
                    Cow::Borrowed("eth_getBlockByNumber"),
                    (to_quantity(number), full_transactions),
                )
                .await
                .map_err(|e| FetchError::rpc("eth_getBlockByNumber", e))
        })
    }

    fn get_block_receipts(&self, number: u64) -> SourceFuture<Option<Vec<RawReceipt>>> {
        let provider = self.provider.clone();
        Box::pin(async move {
            provider
                .raw_request(Cow::Borrowed("eth_getBlockReceipts"), (to_quantity(number),))
                .await
                .map_err(|e| FetchError::rpc("eth_getBlockReceipts", e))
        })
    }

    fn get_transaction(&self, hash: &str) -> SourceFuture<Option<RawTransaction>> {
        let provider = self.provider.clone();
        let hash = hash.to_string();
        Box::pin(async move {
            provider
                .raw_request(Cow::Borrowed("eth_getTransactionByHash"), (hash,))
                .await
                .map_err(|e| FetchError::rpc("eth_getTransactionByHash", e))
        })
    }

    fn block_number(&self) -> SourceFuture<u64> {
        let provider = self.provider.clone();
        Box::pin(async move {
            provider
                .get_block_number()
                .await
                .map_err(|e| FetchError::rpc("eth_blockNumber", e))
        })
    }
}
