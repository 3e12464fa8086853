//! Per-address transaction history
//!
//! Every query rescans the chain downward from its start height; there is
//! no persistent index. The scan stops as soon as `cap` records are held, so
//! a query started below the head returns the most recent matches below
//! that height, not the globally most recent ones.

use std::sync::Arc;

use crate::cursor::BlockCursor;
use crate::error::Result;
use crate::ledger::{connected_head, LedgerClient};
use crate::matcher::classify;
use crate::transaction::{iso_timestamp, TransactionRecord};

pub const DEFAULT_TRANSACTION_CAP: usize = 10;

#[derive(Clone)]
pub struct TransactionIndexer {
    client: Arc<dyn LedgerClient>,
    cap: usize,
}

impl TransactionIndexer {
    pub fn new(client: Arc<dyn LedgerClient>, cap: usize) -> Self {
        Self { client, cap }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Most recent operations signed by `address`, scanning from the head.
    pub async fn list_for_address(&self, address: &str) -> Result<Vec<TransactionRecord>> {
        let head = connected_head(self.client.as_ref()).await?;
        self.list_from(address, head, self.cap).await
    }

    /// Up to `cap` operations signed by `address` at or below `start`.
    ///
    /// Any ledger failure aborts the whole scan; records gathered before the
    /// failure are discarded.
    pub async fn list_from(
        &self,
        address: &str,
        start: u64,
        cap: usize,
    ) -> Result<Vec<TransactionRecord>> {
        let mut records = Vec::new();
        if cap == 0 {
            return Ok(records);
        }
        self.client.connect().await?;

        let mut cursor = BlockCursor::to_genesis(self.client.as_ref(), start);
        while let Some(block) = cursor.next_block().await? {
            let number = block.descriptor.number;
            let time = iso_timestamp(block.descriptor.timestamp);

            for op in block.operations.iter().filter(|op| op.is_signed_by(address)) {
                records.push(TransactionRecord {
                    hash: op.hash.clone(),
                    timestamp: time.clone(),
                    block_number: number,
                    from: address.to_string(),
                    to: classify(op).receiver().to_string(),
                });
                if records.len() >= cap {
                    tracing::debug!(address, stopped_at = number, "Transaction cap reached");
                    return Ok(records);
                }
            }
        }

        Ok(records)
    }
}
