//! Error types for the ledger explorer

use std::fmt;

use crate::ledger::codec::DecodeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The node could not be reached or the connection dropped mid-call.
    ConnectionError(String),
    /// The requested height, body or storage entry does not exist on the node.
    NotFound(String),
    /// The node answered with a JSON-RPC error object.
    RpcError { code: i64, message: String },
    DecodeError(String),
    ConfigError(String),
}

impl LedgerError {
    /// True for failures that invalidate the current connection.
    pub fn is_connection(&self) -> bool {
        matches!(self, LedgerError::ConnectionError(_))
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LedgerError::ConnectionError(msg) => write!(f, "Connection error: {}", msg),
            LedgerError::NotFound(msg) => write!(f, "Not found: {}", msg),
            LedgerError::RpcError { code, message } => {
                write!(f, "RPC error {}: {}", code, message)
            }
            LedgerError::DecodeError(msg) => write!(f, "Decode error: {}", msg),
            LedgerError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<tokio_tungstenite::tungstenite::Error> for LedgerError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        LedgerError::ConnectionError(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::DecodeError(err.to_string())
    }
}

impl From<DecodeError> for LedgerError {
    fn from(err: DecodeError) -> Self {
        LedgerError::DecodeError(err.to_string())
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(err: reqwest::Error) -> Self {
        LedgerError::ConnectionError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, LedgerError>;
