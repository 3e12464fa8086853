/// Transaction views derived from scanned operations
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::{Address, Operation};

/// A signed operation attributed to an address, as listed in its history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactionRecord {
    #[serde(rename = "TransactionHash")]
    pub hash: String,
    /// ISO-8601 block time.
    pub timestamp: String,
    pub block_number: u64,
    pub from: Address,
    /// Receiver for transfers, empty otherwise.
    pub to: Address,
}

/// Counterparty details of one transaction sent by a known address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactionDetail {
    #[serde(rename = "ReceiverAddress")]
    pub receiver: Address,
    #[serde(rename = "TransactionHash")]
    pub hash: String,
    pub block_number: u64,
    pub time: String,
}

/// Outcome of checking a claimed transfer.
///
/// `valid: false` without `error` means the chain was checked and the claim
/// did not hold; with `error` the check itself could not complete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerificationResult {
    pub fn confirmed(block_number: u64, timestamp: u64) -> Self {
        Self {
            valid: true,
            block_number: Some(block_number),
            timestamp: Some(timestamp),
            error: None,
        }
    }

    pub fn rejected() -> Self {
        Self::default()
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// An operation located by hash, with the block that holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundOperation {
    pub block_number: u64,
    pub timestamp: u64,
    pub operation: Operation,
}

/// Render epoch milliseconds the way JavaScript's `toISOString` does.
pub fn iso_timestamp(millis: u64) -> String {
    let millis = i64::try_from(millis).unwrap_or(i64::MAX);
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}
