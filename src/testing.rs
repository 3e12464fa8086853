//! In-memory ledger for tests
//!
//! [`MemoryLedger`] implements [`LedgerClient`] over a fixed list of blocks,
//! counts every call, and can simulate a lost node or a failure at a given
//! height.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crate::error::{LedgerError, Result};
use crate::ledger::{BlockBody, BlockHash, BlockHeader, LedgerClient, Operation};

/// Timestamp of block 0; blocks are six seconds apart.
pub const GENESIS_TIMESTAMP: u64 = 1_700_000_000_000;
pub const BLOCK_TIME_MS: u64 = 6_000;

const NO_FAILURE: u64 = u64::MAX;

#[derive(Debug, Clone)]
pub struct MemoryBlock {
    pub number: u64,
    pub hash: BlockHash,
    pub timestamp: u64,
    pub header_size: u64,
    pub operations: Vec<Operation>,
}

/// Number of calls made to each [`LedgerClient`] method.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub connect: usize,
    pub head_number: usize,
    pub hash_for: usize,
    pub header_for: usize,
    pub body_for: usize,
    pub timestamp_for: usize,
}

#[derive(Debug, Default)]
struct Counters {
    connect: AtomicUsize,
    head_number: AtomicUsize,
    hash_for: AtomicUsize,
    header_for: AtomicUsize,
    body_for: AtomicUsize,
    timestamp_for: AtomicUsize,
}

#[derive(Debug)]
pub struct MemoryLedger {
    blocks: Vec<MemoryBlock>,
    offline: AtomicBool,
    failing_height: AtomicU64,
    counters: Counters,
}

impl MemoryLedger {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            offline: AtomicBool::new(false),
            failing_height: AtomicU64::new(NO_FAILURE),
            counters: Counters::default(),
        }
    }

    /// Chain of `count` blocks with no operations.
    pub fn with_empty_blocks(count: u64) -> Self {
        (0..count).fold(Self::new(), |ledger, _| ledger.block(Vec::new()))
    }

    /// Three blocks; block 2 holds a transfer from "Alice" to "Bob" with
    /// hash "0xabc", block 1 a remark signed by "Alice".
    pub fn transfer_fixture() -> Self {
        Self::new()
            .block(vec![timestamp_set("0x7500", 0)])
            .block(vec![
                timestamp_set("0x7501", 1),
                Operation::signed("0xdef", "Alice", "system", "remark", vec!["0x68690a".into()]),
            ])
            .block(vec![
                timestamp_set("0x7502", 2),
                Operation::signed(
                    "0xabc",
                    "Alice",
                    "balances",
                    "transferKeepAlive",
                    vec!["Bob".into(), "1000000000000".into()],
                ),
            ])
    }

    /// Append a block holding `operations`.
    pub fn block(mut self, operations: Vec<Operation>) -> Self {
        let number = self.blocks.len() as u64;
        self.blocks.push(MemoryBlock {
            number,
            hash: Self::hash_of(number),
            timestamp: GENESIS_TIMESTAMP + number * BLOCK_TIME_MS,
            header_size: 98,
            operations,
        });
        self
    }

    /// Hash assigned to the block at `number`.
    pub fn hash_of(number: u64) -> BlockHash {
        format!("0x{:064x}", number)
    }

    pub fn head(&self) -> Option<u64> {
        self.blocks.last().map(|b| b.number)
    }

    /// Simulate an unreachable node; every call fails with a connection error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make the hash lookup for `number` fail with a connection error.
    pub fn fail_at(&self, number: u64) {
        self.failing_height.store(number, Ordering::SeqCst);
    }

    pub fn calls(&self) -> CallCounts {
        let c = &self.counters;
        CallCounts {
            connect: c.connect.load(Ordering::SeqCst),
            head_number: c.head_number.load(Ordering::SeqCst),
            hash_for: c.hash_for.load(Ordering::SeqCst),
            header_for: c.header_for.load(Ordering::SeqCst),
            body_for: c.body_for.load(Ordering::SeqCst),
            timestamp_for: c.timestamp_for.load(Ordering::SeqCst),
        }
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LedgerError::ConnectionError("node unreachable".to_string()));
        }
        Ok(())
    }

    fn find(&self, hash: &str) -> Result<&MemoryBlock> {
        self.blocks
            .iter()
            .find(|b| b.hash == hash)
            .ok_or_else(|| LedgerError::NotFound(format!("block {}", hash)))
    }
}

/// Unsigned `timestamp.set` inherent.
pub fn timestamp_set(hash: &str, number: u64) -> Operation {
    let now = GENESIS_TIMESTAMP + number * BLOCK_TIME_MS;
    Operation::unsigned(hash, "timestamp", "set", vec![now.to_string()])
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn connect(&self) -> Result<()> {
        self.counters.connect.fetch_add(1, Ordering::SeqCst);
        self.check_online()
    }

    async fn head_number(&self) -> Result<u64> {
        self.counters.head_number.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        self.head()
            .ok_or_else(|| LedgerError::NotFound("empty chain".to_string()))
    }

    async fn hash_for(&self, number: u64) -> Result<BlockHash> {
        self.counters.hash_for.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        if self.failing_height.load(Ordering::SeqCst) == number {
            return Err(LedgerError::ConnectionError(format!(
                "connection dropped at height {}",
                number
            )));
        }
        self.blocks
            .get(number as usize)
            .map(|b| b.hash.clone())
            .ok_or_else(|| LedgerError::NotFound(format!("no block at height {}", number)))
    }

    async fn header_for(&self, hash: &str) -> Result<BlockHeader> {
        self.counters.header_for.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        let block = self.find(hash)?;
        Ok(BlockHeader {
            number: block.number,
            hash: block.hash.clone(),
            parent_hash: block
                .number
                .checked_sub(1)
                .map_or_else(|| format!("0x{}", "0".repeat(64)), Self::hash_of),
            state_root: format!("0x{:064x}", block.number + 0x1000),
            extrinsics_root: format!("0x{:064x}", block.operations.len()),
            digest_logs: Vec::new(),
            encoded_size: block.header_size,
        })
    }

    async fn body_for(&self, hash: &str) -> Result<BlockBody> {
        self.counters.body_for.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        let block = self.find(hash)?;
        Ok(BlockBody {
            number: block.number,
            header_size: block.header_size,
            operations: block.operations.clone(),
        })
    }

    async fn timestamp_for(&self, hash: &str) -> Result<u64> {
        self.counters.timestamp_for.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        self.find(hash).map(|b| b.timestamp)
    }
}
