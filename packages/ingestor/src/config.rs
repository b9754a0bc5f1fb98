//! Configuration
//!
//! Loads every tunable of the ingestor from environment variables, a dotenv
//! file, or explicit key/value pairs. Unset keys keep their defaults.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::Address;
use thiserror::Error;

use crate::classifier::ClassifierConfig;
use crate::node::NodeConfig;
use crate::pipeline::PipelineConfig;
use crate::publisher::DEFAULT_CHANNEL;
use crate::selector::{parse_selector, Selector, SelectorCategory};

/// Default request budget towards the node
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 15;

/// How long the limiter holds its queue after a rate-limit error
pub const DEFAULT_RATE_LIMIT_COOLDOWN_MS: u64 = 1000;

/// Default size of the recent-transactions window
pub const DEFAULT_RECENT_TXS: usize = 50;

/// Default size of the recent-blocks window
pub const DEFAULT_RECENT_BLOCKS: usize = 10;

/// Default number of records kept in the type mix
pub const DEFAULT_MIX_CAP: usize = 100;

/// Default number of blocks after which the type mix starts over
pub const DEFAULT_MIX_CYCLE_BLOCKS: usize = 10;

pub const ENV_NODE_URL: &str = "NODE_URL";
pub const ENV_REQUESTS_PER_SECOND: &str = "REQUESTS_PER_SECOND";
pub const ENV_RATE_LIMIT_COOLDOWN_MS: &str = "RATE_LIMIT_COOLDOWN_MS";
pub const ENV_RECENT_TXS_CAP: &str = "RECENT_TXS_CAP";
pub const ENV_RECENT_BLOCKS_CAP: &str = "RECENT_BLOCKS_CAP";
pub const ENV_MIX_CAP: &str = "MIX_CAP";
pub const ENV_MIX_CYCLE_BLOCKS: &str = "MIX_CYCLE_BLOCKS";
pub const ENV_GAS_THRESHOLD: &str = "GAS_THRESHOLD";
pub const ENV_FETCH_RECEIPTS: &str = "FETCH_RECEIPTS";
pub const ENV_HYDRATE_LIMIT: &str = "HYDRATE_LIMIT";
pub const ENV_POLL_INTERVAL_MS: &str = "POLL_INTERVAL_MS";
pub const ENV_MAX_RECONNECT_ATTEMPTS: &str = "MAX_RECONNECT_ATTEMPTS";
pub const ENV_REDIS_URL: &str = "REDIS_URL";
pub const ENV_REDIS_CHANNEL: &str = "REDIS_CHANNEL";
pub const ENV_EXTRA_BURN_ADDRESSES: &str = "EXTRA_BURN_ADDRESSES";
pub const ENV_EXTRA_SWAP_SELECTORS: &str = "EXTRA_SWAP_SELECTORS";
pub const ENV_EXTRA_MINT_SELECTORS: &str = "EXTRA_MINT_SELECTORS";
pub const ENV_EXTRA_BURN_SELECTORS: &str = "EXTRA_BURN_SELECTORS";

/// Errors that can occur while loading configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("Invalid address in {key}: {value}")]
    InvalidAddress { key: &'static str, value: String },

    #[error("Invalid selector in {key}: {value}")]
    InvalidSelector { key: &'static str, value: String },

    #[error("Failed to read env file: {0}")]
    EnvFile(String),
}

/// Request pacing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterConfig {
    pub requests_per_second: u32,
    pub rate_limit_cooldown_ms: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            rate_limit_cooldown_ms: DEFAULT_RATE_LIMIT_COOLDOWN_MS,
        }
    }
}

impl LimiterConfig {
    pub fn new(requests_per_second: u32) -> Self {
        Self {
            requests_per_second,
            ..Default::default()
        }
    }

    /// Minimum spacing between request starts (1000 / R ms)
    pub fn delay(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.requests_per_second.max(1)))
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.rate_limit_cooldown_ms)
    }
}

/// Window sizes for the dashboard state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    pub recent_txs: usize,
    pub recent_blocks: usize,
    pub mix_cap: usize,
    pub mix_cycle_blocks: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            recent_txs: DEFAULT_RECENT_TXS,
            recent_blocks: DEFAULT_RECENT_BLOCKS,
            mix_cap: DEFAULT_MIX_CAP,
            mix_cycle_blocks: DEFAULT_MIX_CYCLE_BLOCKS,
        }
    }
}

/// Complete ingestor configuration
#[derive(Debug, Clone, PartialEq)]
pub struct IngestorConfig {
    pub node: NodeConfig,
    pub limiter: LimiterConfig,
    pub windows: WindowConfig,
    pub classifier: ClassifierConfig,
    pub pipeline: PipelineConfig,
    /// Redis URL; the publisher is disabled when unset
    pub redis_url: Option<String>,
    pub redis_channel: String,
}

impl Default for IngestorConfig {
    fn default() -> Self {
        Self {
            node: NodeConfig::default(),
            limiter: LimiterConfig::default(),
            windows: WindowConfig::default(),
            classifier: ClassifierConfig::default(),
            pipeline: PipelineConfig::default(),
            redis_url: None,
            redis_channel: DEFAULT_CHANNEL.to_string(),
        }
    }
}

impl IngestorConfig {
    /// Load from the process environment
    ///
    /// Variables whose name or value is not valid UTF-8 are ignored.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(utf8_vars(std::env::vars_os()))
    }

    /// Load from a dotenv file without touching the process environment
    pub fn from_dotenv_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let vars = dotenvy::from_path_iter(path.as_ref())
            .map_err(|e| ConfigError::EnvFile(e.to_string()))?
            .collect::<Result<Vec<(String, String)>, _>>()
            .map_err(|e| ConfigError::EnvFile(e.to_string()))?;
        Self::from_vars(vars)
    }

    /// Load from key/value pairs
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = Vars(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        let mut config = Self::default();

        if let Some(url) = vars.string(ENV_NODE_URL) {
            config.node.url = url;
        }
        if let Some(attempts) = vars.parse(ENV_MAX_RECONNECT_ATTEMPTS)? {
            config.node.max_reconnect_attempts = attempts;
        }
        if let Some(interval) = vars.parse(ENV_POLL_INTERVAL_MS)? {
            config.node.poll_interval_ms = interval;
        }

        if let Some(rps) = vars.parse(ENV_REQUESTS_PER_SECOND)? {
            config.limiter.requests_per_second = rps;
        }
        if let Some(cooldown) = vars.parse(ENV_RATE_LIMIT_COOLDOWN_MS)? {
            config.limiter.rate_limit_cooldown_ms = cooldown;
        }

        if let Some(cap) = vars.parse(ENV_RECENT_TXS_CAP)? {
            config.windows.recent_txs = cap;
        }
        if let Some(cap) = vars.parse(ENV_RECENT_BLOCKS_CAP)? {
            config.windows.recent_blocks = cap;
        }
        if let Some(cap) = vars.parse(ENV_MIX_CAP)? {
            config.windows.mix_cap = cap;
        }
        if let Some(cycle) = vars.parse(ENV_MIX_CYCLE_BLOCKS)? {
            config.windows.mix_cycle_blocks = cycle;
        }

        if let Some(threshold) = vars.parse(ENV_GAS_THRESHOLD)? {
            config.classifier.gas_threshold = threshold;
        }
        for address in vars.list(ENV_EXTRA_BURN_ADDRESSES) {
            let parsed = Address::from_str(address).map_err(|_| ConfigError::InvalidAddress {
                key: ENV_EXTRA_BURN_ADDRESSES,
                value: address.to_string(),
            })?;
            config.classifier.burn_addresses.insert(format!("{:#x}", parsed));
        }
        for (key, category) in [
            (ENV_EXTRA_SWAP_SELECTORS, SelectorCategory::Swap),
            (ENV_EXTRA_MINT_SELECTORS, SelectorCategory::Mint),
            (ENV_EXTRA_BURN_SELECTORS, SelectorCategory::Burn),
        ] {
            let selectors = vars.selectors(key)?;
            config.classifier.selectors.extend(category, selectors);
        }

        if let Some(fetch) = vars.flag(ENV_FETCH_RECEIPTS)? {
            config.pipeline.fetch_receipts = fetch;
        }
        if let Some(limit) = vars.parse(ENV_HYDRATE_LIMIT)? {
            config.pipeline.hydrate_limit = limit;
        }

        config.redis_url = vars.string(ENV_REDIS_URL);
        if let Some(channel) = vars.string(ENV_REDIS_CHANNEL) {
            config.redis_channel = channel;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_zero = [
            (ENV_REQUESTS_PER_SECOND, self.limiter.requests_per_second as u64),
            (ENV_RECENT_TXS_CAP, self.windows.recent_txs as u64),
            (ENV_RECENT_BLOCKS_CAP, self.windows.recent_blocks as u64),
            (ENV_MIX_CAP, self.windows.mix_cap as u64),
            (ENV_MIX_CYCLE_BLOCKS, self.windows.mix_cycle_blocks as u64),
            (ENV_POLL_INTERVAL_MS, self.node.poll_interval_ms),
        ];
        match non_zero.into_iter().find(|(_, value)| *value == 0) {
            Some((key, _)) => Err(ConfigError::Zero(key)),
            None => Ok(()),
        }
    }
}

fn utf8_vars(
    vars: impl IntoIterator<Item = (OsString, OsString)>,
) -> impl Iterator<Item = (String, String)> {
    vars.into_iter()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
}

/// Lookup helper over collected variables
struct Vars(HashMap<String, String>);

impl Vars {
    /// Trimmed, non-empty value
    fn string(&self, key: &str) -> Option<String> {
        self.0
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(String::from)
    }

    fn parse<T: FromStr>(&self, key: &'static str) -> Result<Option<T>, ConfigError> {
        match self.string(key) {
            None => Ok(None),
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::InvalidValue { key, value }),
        }
    }

    fn flag(&self, key: &'static str) -> Result<Option<bool>, ConfigError> {
        match self.string(key) {
            None => Ok(None),
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(Some(true)),
                "0" | "false" | "no" | "off" => Ok(Some(false)),
                _ => Err(ConfigError::InvalidValue { key, value }),
            },
        }
    }

    /// Comma-separated items, blanks skipped
    fn list(&self, key: &str) -> Vec<&str> {
        self.0
            .get(key)
            .map(|v| v.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }

    fn selectors(&self, key: &'static str) -> Result<Vec<Selector>, ConfigError> {
        self.list(key)
            .into_iter()
            .map(|item| {
                parse_selector(item).ok_or_else(|| ConfigError::InvalidSelector {
                    key,
                    value: item.to_string(),
                })
            })
            .collect()
    }
}
