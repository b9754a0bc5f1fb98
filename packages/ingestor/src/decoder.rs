//! Block Decoder
//!
//! Lenient JSON-RPC shapes for blocks, transactions and receipts, and their
//! mapping into classified [`TxInfo`] records.
//!
//! Quantities arrive as hex strings. Fields that are missing or malformed are
//! defaulted instead of failing the whole block: an unparsable value counts as
//! zero, missing gas data means no fee.

use std::collections::HashMap;

use alloy::primitives::utils::format_units;
use alloy::primitives::U256;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::classifier::{ClassifyInput, TransactionClassifier};
use crate::selector::{format_selector, method_name, selector_from_call_data};
use crate::types::{BlockStats, TxInfo};

/// Errors that can occur while decoding a block
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid quantity for {field}: {value}")]
    InvalidQuantity { field: &'static str, value: String },
}

/// Block as returned by `eth_getBlockByNumber`
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    pub number: Option<String>,
    pub hash: Option<String>,
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient_transactions")]
    pub transactions: Vec<BlockTransaction>,
}

/// A block's transaction entry: a full object, or only its hash
#[derive(Debug, Clone, PartialEq)]
pub enum BlockTransaction {
    Full(Box<RawTransaction>),
    Hash(String),
}

impl BlockTransaction {
    /// Interpret one entry of a block's `transactions` array
    ///
    /// # Returns
    /// `None` when the entry is neither an object nor a string
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(hash) => Some(BlockTransaction::Hash(hash.clone())),
            Value::Object(fields) => Some(BlockTransaction::Full(Box::new(RawTransaction::from_fields(fields)))),
            _ => None,
        }
    }
}

/// Entries that cannot be read are dropped with a warning instead of failing the block
fn lenient_transactions<'de, D>(deserializer: D) -> Result<Vec<BlockTransaction>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = match Value::deserialize(deserializer)? {
        Value::Array(entries) => entries,
        Value::Null => return Ok(Vec::new()),
        other => {
            warn!("Ignoring non-array transactions field: {}", other);
            return Ok(Vec::new());
        }
    };

    Ok(entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let parsed = BlockTransaction::from_value(entry);
            if parsed.is_none() {
                warn!("Skipping malformed transaction entry {}: {}", index, entry);
            }
            parsed
        })
        .collect())
}

/// Transaction object as returned by the node
///
/// Call data is read from `input`, or from `data` when `input` is absent.
/// Fields of an unexpected JSON type are treated as missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTransaction {
    pub hash: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub value: Option<String>,
    pub input: Option<String>,
    pub gas: Option<String>,
    pub gas_price: Option<String>,
    pub max_fee_per_gas: Option<String>,
    pub block_number: Option<String>,
    pub transaction_index: Option<String>,
}

impl RawTransaction {
    /// Build from a JSON object, ignoring anything that does not fit
    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        let text = |key: &str| match fields.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        };

        RawTransaction {
            hash: text("hash"),
            from: text("from"),
            to: text("to"),
            value: text("value"),
            input: text("input").or_else(|| text("data")),
            gas: text("gas"),
            gas_price: text("gasPrice"),
            max_fee_per_gas: text("maxFeePerGas"),
            block_number: text("blockNumber"),
            transaction_index: text("transactionIndex"),
        }
    }
}

impl<'de> Deserialize<'de> for RawTransaction {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Object(fields) => Ok(RawTransaction::from_fields(&fields)),
            other => Err(D::Error::custom(format!("expected a transaction object, got {}", other))),
        }
    }
}

/// Receipt as returned by `eth_getBlockReceipts` / `eth_getTransactionReceipt`
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawReceipt {
    pub transaction_hash: Option<String>,
    pub gas_used: Option<String>,
    pub effective_gas_price: Option<String>,
    pub status: Option<String>,
}

/// Header pushed by a `newHeads` subscription
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawHeader {
    pub number: Option<String>,
    pub hash: Option<String>,
    pub timestamp: Option<String>,
}

impl RawHeader {
    /// Block number carried by the header, if it parses
    pub fn block_number(&self) -> Option<u64> {
        self.number.as_deref().and_then(parse_u64)
    }
}

/// Block number and time shared by every record of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockContext {
    pub number: u64,
    pub timestamp_ms: u64,
}

impl RawBlock {
    /// Resolve the block number and timestamp
    ///
    /// # Arguments
    /// * `requested` - The number the block was fetched by, used when the node omits it
    pub fn context(&self, requested: u64) -> Result<BlockContext, DecodeError> {
        let number = match self.number.as_deref() {
            Some(raw) => parse_u64(raw).ok_or_else(|| DecodeError::InvalidQuantity {
                field: "number",
                value: raw.to_string(),
            })?,
            None => requested,
        };

        let raw = self
            .timestamp
            .as_deref()
            .ok_or(DecodeError::MissingField("timestamp"))?;
        let seconds = parse_u64(raw).ok_or_else(|| DecodeError::InvalidQuantity {
            field: "timestamp",
            value: raw.to_string(),
        })?;

        Ok(BlockContext {
            number,
            timestamp_ms: seconds.saturating_mul(1000),
        })
    }

    /// Number of transactions in the block
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    /// Transactions delivered as full objects
    pub fn full_transactions(&self) -> impl Iterator<Item = &RawTransaction> {
        self.transactions.iter().filter_map(|entry| match entry {
            BlockTransaction::Full(tx) => Some(tx.as_ref()),
            BlockTransaction::Hash(_) => None,
        })
    }

    /// Transactions delivered only as hashes
    pub fn transaction_hashes(&self) -> impl Iterator<Item = &str> {
        self.transactions.iter().filter_map(|entry| match entry {
            BlockTransaction::Hash(hash) => Some(hash.as_str()),
            BlockTransaction::Full(_) => None,
        })
    }
}

/// A record together with its fee in wei, kept for block aggregation
#[derive(Debug, Clone, PartialEq)]
pub struct MappedTransaction {
    pub info: TxInfo,
    pub fee_wei: Option<U256>,
}

/// Map a raw transaction and its optional receipt into a classified record
///
/// Gas used comes from the receipt, falling back to the transaction's gas
/// limit. Gas price prefers the receipt's effective price. Only receipt gas is
/// shown to the classifier.
///
/// # Returns
/// `None` when the transaction has no hash
pub fn map_transaction(
    tx: &RawTransaction,
    block: &BlockContext,
    receipt: Option<&RawReceipt>,
    classifier: &TransactionClassifier,
) -> Option<MappedTransaction> {
    let hash = tx.hash.as_deref().map(str::trim).filter(|h| !h.is_empty())?;

    let value = tx.value.as_deref().and_then(parse_u256).unwrap_or(U256::ZERO);
    let to = tx.to.as_deref().map(str::trim).filter(|to| !to.is_empty());
    let input = tx.input.as_deref();

    let receipt_gas = receipt
        .and_then(|r| r.gas_used.as_deref())
        .and_then(parse_u64);
    let gas_used = receipt_gas.or_else(|| tx.gas.as_deref().and_then(parse_u64));
    let gas_price = receipt
        .and_then(|r| r.effective_gas_price.as_deref())
        .and_then(parse_u256)
        .or_else(|| tx.gas_price.as_deref().and_then(parse_u256));

    let fee_wei = match (gas_used, gas_price) {
        (Some(gas), Some(price)) if gas > 0 && !price.is_zero() => {
            Some(U256::from(gas).saturating_mul(price))
        }
        _ => None,
    };

    let tx_type = classifier.classify(&ClassifyInput {
        value,
        to,
        input,
        receipt_gas_used: receipt_gas,
    });
    let selector = input.and_then(selector_from_call_data);

    Some(MappedTransaction {
        info: TxInfo {
            hash: hash.to_string(),
            from: tx.from.clone().unwrap_or_default(),
            to: to.map(String::from),
            value: format_native(value),
            timestamp: block.timestamp_ms,
            block_number: block.number,
            tx_type,
            gas_used,
            gas_price: gas_price.map(format_native),
            tx_fee: fee_wei.map(format_native),
            input: input.map(String::from),
            method_id: selector.map(|s| format_selector(&s)),
            method: selector.and_then(|s| method_name(&s)).map(String::from),
        },
        fee_wei,
    })
}

/// Records and aggregate produced from one block
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBlock {
    pub context: BlockContext,
    pub records: Vec<TxInfo>,
    pub stats: BlockStats,
}

/// Map every transaction of a block and build its aggregate
///
/// Receipts are matched to transactions by hash. Transactions without a hash
/// are skipped with a warning.
///
/// # Arguments
/// * `context` - Block number and timestamp
/// * `transactions` - The block's transaction objects, in block order
/// * `tx_count` - Number of transactions the block contains
/// * `receipts` - Receipts fetched for the block, possibly empty
/// * `classifier` - Classifier assigning the record types
pub fn decode_block<'a>(
    context: BlockContext,
    transactions: impl IntoIterator<Item = &'a RawTransaction>,
    tx_count: usize,
    receipts: &[RawReceipt],
    classifier: &TransactionClassifier,
) -> DecodedBlock {
    let receipts_by_hash: HashMap<String, &RawReceipt> = receipts
        .iter()
        .filter_map(|r| Some((r.transaction_hash.as_deref()?.to_ascii_lowercase(), r)))
        .collect();

    let mut records = Vec::new();
    let mut total_fees: Option<U256> = None;

    for tx in transactions {
        let receipt = tx
            .hash
            .as_deref()
            .and_then(|hash| receipts_by_hash.get(&hash.to_ascii_lowercase()).copied());

        match map_transaction(tx, &context, receipt, classifier) {
            Some(mapped) => {
                if let Some(fee) = mapped.fee_wei {
                    total_fees = Some(total_fees.unwrap_or(U256::ZERO).saturating_add(fee));
                }
                records.push(mapped.info);
            }
            None => warn!("Skipping transaction without hash in block {}", context.number),
        }
    }

    let mut stats = BlockStats::new(context.number, tx_count);
    stats.total_fees = total_fees.map(format_native);

    DecodedBlock {
        context,
        records,
        stats,
    }
}

/// Parse a JSON-RPC quantity (hex with 0x prefix, or decimal) into a U256
pub fn parse_u256(text: &str) -> Option<U256> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some("") => Some(U256::ZERO),
        Some(digits) => U256::from_str_radix(digits, 16).ok(),
        None if text.is_empty() => None,
        None => U256::from_str_radix(text, 10).ok(),
    }
}

/// Parse a JSON-RPC quantity (hex with 0x prefix, or decimal) into a u64
pub fn parse_u64(text: &str) -> Option<u64> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some("") => Some(0),
        Some(digits) => u64::from_str_radix(digits, 16).ok(),
        None => text.parse().ok(),
    }
}

/// Format a block number as a JSON-RPC quantity
pub fn to_quantity(number: u64) -> String {
    format!("0x{:x}", number)
}

/// Format a wei amount in native units, trimming trailing zeros ("1.0", "0.25")
pub fn format_native(wei: U256) -> String {
    let formatted = format_units(wei, "ether").unwrap_or_else(|_| wei.to_string());
    trim_fraction(formatted)
}

fn trim_fraction(mut formatted: String) -> String {
    if formatted.contains('.') {
        let len = formatted.trim_end_matches('0').len();
        formatted.truncate(len);
        if formatted.ends_with('.') {
            formatted.push('0');
        }
    }
    formatted
}
