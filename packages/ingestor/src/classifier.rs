//! Transaction Classifier
//!
//! Heuristic, side-effect-free classification of a transaction into a
//! semantic [`TxType`] from its raw fields and, when available, the gas used
//! reported by its receipt.
//!
//! Rules are evaluated in order and the first match wins:
//!
//! 1. value > 0, empty call-data and a recipient: `transfer`
//! 2. no recipient (contract creation): `contract`
//! 3. recipient is a burn-sink address: `burn`
//! 4. selector in the swap, mint or burn sets (checked in that order)
//! 5. receipt gas used above the threshold: `contract`
//! 6. non-empty call-data: `contract`
//! 7. anything else: `unknown`

use std::collections::HashSet;
use std::fmt;

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::selector::{selector_from_call_data, SelectorCategory, SelectorSets};

/// The zero address
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// The conventional `0x…dead` burn sink
pub const DEAD_ADDRESS: &str = "0x000000000000000000000000000000000000dead";

/// Receipts reporting more gas than this are treated as contract interactions
pub const DEFAULT_GAS_THRESHOLD: u64 = 100_000;

/// Semantic transaction category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxType {
    Transfer,
    Swap,
    Burn,
    Mint,
    Contract,
    Unknown,
}

impl TxType {
    /// Every variant, in display order
    pub const ALL: [TxType; 6] = [
        TxType::Transfer,
        TxType::Swap,
        TxType::Burn,
        TxType::Mint,
        TxType::Contract,
        TxType::Unknown,
    ];

    /// Stable lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::Transfer => "transfer",
            TxType::Swap => "swap",
            TxType::Burn => "burn",
            TxType::Mint => "mint",
            TxType::Contract => "contract",
            TxType::Unknown => "unknown",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            TxType::Transfer => "Transfer",
            TxType::Swap => "Swap",
            TxType::Burn => "Burn",
            TxType::Mint => "Mint",
            TxType::Contract => "Contract",
            TxType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<SelectorCategory> for TxType {
    fn from(category: SelectorCategory) -> Self {
        match category {
            SelectorCategory::Swap => TxType::Swap,
            SelectorCategory::Mint => TxType::Mint,
            SelectorCategory::Burn => TxType::Burn,
        }
    }
}

/// Configuration for the classifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierConfig {
    /// Burn-sink addresses, lowercase with 0x prefix
    pub burn_addresses: HashSet<String>,
    /// Selector sets for rule 4
    pub selectors: SelectorSets,
    /// Receipt gas threshold for rule 5
    pub gas_threshold: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            burn_addresses: [ZERO_ADDRESS, DEAD_ADDRESS].into_iter().map(String::from).collect(),
            selectors: SelectorSets::default(),
            gas_threshold: DEFAULT_GAS_THRESHOLD,
        }
    }
}

impl ClassifierConfig {
    /// Add burn-sink addresses, normalizing them to lowercase
    pub fn with_burn_addresses<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.burn_addresses
            .extend(addresses.into_iter().map(|a| normalize_address(a.as_ref())));
        self
    }
}

/// The observable fields the classifier looks at
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifyInput<'a> {
    /// Transferred value in wei
    pub value: U256,
    /// Recipient address, `None` for contract creation
    pub to: Option<&'a str>,
    /// Hex call-data as returned by the node
    pub input: Option<&'a str>,
    /// Gas used according to the receipt, if one was fetched
    pub receipt_gas_used: Option<u64>,
}

/// Assigns a [`TxType`] to transactions
#[derive(Debug, Clone, Default)]
pub struct TransactionClassifier {
    config: ClassifierConfig,
}

impl TransactionClassifier {
    /// Create a classifier from a configuration
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Get the active configuration
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify a transaction
    ///
    /// Total and deterministic: the same input always yields the same type.
    pub fn classify(&self, tx: &ClassifyInput<'_>) -> TxType {
        let to = tx.to.map(str::trim).filter(|to| !to.is_empty());
        let empty_data = is_empty_call_data(tx.input);

        if !tx.value.is_zero() && empty_data && to.is_some() {
            return TxType::Transfer;
        }

        let Some(to) = to else {
            return TxType::Contract;
        };

        if self.is_burn_address(to) {
            return TxType::Burn;
        }

        if let Some(category) = tx
            .input
            .and_then(selector_from_call_data)
            .and_then(|selector| self.config.selectors.category(&selector))
        {
            return category.into();
        }

        if tx
            .receipt_gas_used
            .is_some_and(|gas| gas > self.config.gas_threshold)
        {
            return TxType::Contract;
        }

        if !empty_data {
            return TxType::Contract;
        }

        TxType::Unknown
    }

    /// Check whether an address is a configured burn sink (case-insensitive)
    pub fn is_burn_address(&self, address: &str) -> bool {
        self.config.burn_addresses.contains(&normalize_address(address))
    }
}

/// `true` for absent call-data and the `0x` empty sentinel
pub fn is_empty_call_data(input: Option<&str>) -> bool {
    match input.map(str::trim) {
        None => true,
        Some(data) => data.is_empty() || data.eq_ignore_ascii_case("0x"),
    }
}

/// Lowercase an address and trim surrounding whitespace
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}
