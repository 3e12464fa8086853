//! Ledger Explorer - derived views over a Substrate ledger node
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Node Access
//! - [`ledger`] - `LedgerClient` trait, JSON-RPC client and extrinsic codec
//! - [`cache`] - LRU caching of block bodies and timestamps
//!
//! ## Scanning
//! - [`cursor`] - Descending block traversal
//! - [`matcher`] - Transfer classification of operations
//! - [`indexer`] - Per-address transaction history
//! - [`finder`] - Hash lookup, transfer verification, transaction details
//! - [`reporter`] - Recent block summaries
//! - [`transaction`] - Transaction records and results
//!
//! ## Integration
//! - [`api`] - REST API server
//! - [`sidecar`] - Substrate API sidecar pass-through
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//! - `testing` - In-memory ledger for tests (`testing` feature)

#![forbid(unsafe_code)]

// ============================================================================
// Node Access
// ============================================================================
pub mod cache;
pub mod ledger;

// ============================================================================
// Scanning
// ============================================================================
pub mod cursor;
pub mod finder;
pub mod indexer;
pub mod matcher;
pub mod reporter;
pub mod transaction;

// ============================================================================
// Integration
// ============================================================================
#[cfg(feature = "api")]
pub mod api;
pub mod sidecar;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
