//! Record Types
//!
//! Classified transaction records and per-block aggregates, serialized as
//! camelCase JSON for downstream consumers.

use serde::{Deserialize, Serialize};

use crate::classifier::TxType;

/// A classified transaction
///
/// Created once per observed transaction while its block is processed and
/// never modified afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TxInfo {
    /// Transaction hash with 0x prefix
    pub hash: String,
    /// Sender address
    pub from: String,
    /// Recipient address, `None` for contract creation
    #[serde(default)]
    pub to: Option<String>,
    /// Transferred value in native units (e.g. "1.5")
    pub value: String,
    /// Block timestamp in milliseconds since the Unix epoch
    pub timestamp: u64,
    /// Number of the block that included the transaction
    pub block_number: u64,
    /// Classified type
    #[serde(rename = "type")]
    pub tx_type: TxType,
    /// Gas used (receipt value, or the gas limit when no receipt was fetched)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
    /// Gas price in native units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    /// gasUsed × gasPrice in native units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_fee: Option<String>,
    /// Raw call-data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Selector with 0x prefix (e.g. "0x38ed1739")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_id: Option<String>,
    /// Human-readable method name for known selectors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl TxInfo {
    /// Serialize the record to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize a record from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Check if this record is a contract creation
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }
}

/// Per-block aggregate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlockStats {
    pub block_number: u64,
    pub tx_count: usize,
    /// Sum of the block's fees in native units, absent when no record had a fee
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_fees: Option<String>,
}

impl BlockStats {
    pub fn new(block_number: u64, tx_count: usize) -> Self {
        Self {
            block_number,
            tx_count,
            total_fees: None,
        }
    }

    pub fn with_total_fees(mut self, total_fees: impl Into<String>) -> Self {
        self.total_fees = Some(total_fees.into());
        self
    }

    /// Serialize the aggregate to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> TxInfo {
        TxInfo {
            hash: "0x1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef".to_string(),
            from: "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266".to_string(),
            to: Some("0x7a250d5630b4cf539739df2c5dacb4c659f2488d".to_string()),
            value: "0.5".to_string(),
            timestamp: 1_703_000_000_000,
            block_number: 18_000_000,
            tx_type: TxType::Swap,
            gas_used: Some(120_000),
            gas_price: Some("0.00000002".to_string()),
            tx_fee: Some("0.0024".to_string()),
            input: Some("0x38ed1739".to_string()),
            method_id: Some("0x38ed1739".to_string()),
            method: Some("swapExactTokensForTokens".to_string()),
        }
    }

    // ==================== TxInfo tests ====================

    #[test]
    fn test_tx_info_json_field_names() {
        let json = sample_tx().to_json().unwrap();

        assert!(json.contains("\"blockNumber\":18000000"));
        assert!(json.contains("\"type\":\"swap\""));
        assert!(json.contains("\"gasUsed\""));
        assert!(json.contains("\"gasPrice\""));
        assert!(json.contains("\"txFee\""));
        assert!(json.contains("\"methodId\""));
    }

    #[test]
    fn test_tx_info_omits_absent_optionals() {
        let mut tx = sample_tx();
        tx.gas_used = None;
        tx.gas_price = None;
        tx.tx_fee = None;
        tx.method = None;

        let json = tx.to_json().unwrap();
        assert!(!json.contains("gasUsed"));
        assert!(!json.contains("txFee"));
        assert!(!json.contains("\"method\""));
    }

    #[test]
    fn test_tx_info_contract_creation_serializes_null_to() {
        let mut tx = sample_tx();
        tx.to = None;
        tx.tx_type = TxType::Contract;

        assert!(tx.is_contract_creation());
        assert!(tx.to_json().unwrap().contains("\"to\":null"));
    }

    #[test]
    fn test_tx_info_from_json() {
        let json = r#"{"hash":"0xab","from":"0x01","to":null,"value":"0","timestamp":1000,"blockNumber":7,"type":"contract"}"#;
        let tx = TxInfo::from_json(json).unwrap();

        assert_eq!(tx.block_number, 7);
        assert_eq!(tx.tx_type, TxType::Contract);
        assert_eq!(tx.gas_used, None);
    }

    // ==================== BlockStats tests ====================

    #[test]
    fn test_block_stats_json() {
        let stats = BlockStats::new(42, 3).with_total_fees("0.01");
        assert_eq!(stats.to_json().unwrap(), r#"{"blockNumber":42,"txCount":3,"totalFees":"0.01"}"#);
    }

    #[test]
    fn test_block_stats_without_fees() {
        let stats = BlockStats::new(42, 0);
        assert_eq!(stats.to_json().unwrap(), r#"{"blockNumber":42,"txCount":0}"#);
    }
}
