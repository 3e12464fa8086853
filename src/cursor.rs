//! Descending block traversal
//!
//! A [`BlockCursor`] walks from a start height down to a floor, one block at
//! a time. Each step resolves the hash, then the body, then the timestamp;
//! nothing is fetched ahead of the consumer.

use futures_util::stream::{self, Stream};
use serde::Serialize;

use crate::error::{LedgerError, Result};
use crate::ledger::{BlockHash, LedgerClient, Operation};

/// Summary of one block, as served by the recent-blocks view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockDescriptor {
    #[serde(rename = "block")]
    pub number: u64,
    #[serde(skip)]
    pub hash: BlockHash,
    pub timestamp: u64,
    #[serde(rename = "header")]
    pub header_identity: String,
    #[serde(rename = "size")]
    pub encoded_size: u64,
}

/// One cursor step: the block summary and its operations in block order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedBlock {
    pub descriptor: BlockDescriptor,
    pub operations: Vec<Operation>,
}

pub struct BlockCursor<'a> {
    client: &'a dyn LedgerClient,
    next: Option<u64>,
    floor: u64,
}

impl<'a> BlockCursor<'a> {
    /// Cursor over `start, start - 1, ..., floor`. Empty when `start < floor`.
    pub fn new(client: &'a dyn LedgerClient, start: u64, floor: u64) -> Self {
        Self {
            client,
            next: (start >= floor).then_some(start),
            floor,
        }
    }

    /// Cursor from `start` down to genesis.
    pub fn to_genesis(client: &'a dyn LedgerClient, start: u64) -> Self {
        Self::new(client, start, 0)
    }

    /// Blocks still to be yielded.
    pub fn remaining(&self) -> u64 {
        self.next.map_or(0, |n| n - self.floor + 1)
    }

    /// Resolve the next block. `Ok(None)` once the floor has been passed.
    ///
    /// A failed step ends the cursor; the error is handed to the caller
    /// without retrying.
    pub async fn next_block(&mut self) -> Result<Option<ScannedBlock>> {
        let Some(number) = self.next else {
            return Ok(None);
        };

        match self.fetch(number).await {
            Ok(block) => {
                self.next = (number > self.floor).then(|| number - 1);
                Ok(Some(block))
            }
            Err(e) => {
                self.next = None;
                Err(e)
            }
        }
    }

    async fn fetch(&self, number: u64) -> Result<ScannedBlock> {
        let hash = self.client.hash_for(number).await?;
        let body = self.client.body_for(&hash).await?;
        let timestamp = self.client.timestamp_for(&hash).await?;
        tracing::debug!(block = number, operations = body.operations.len(), "Scanned block");

        Ok(ScannedBlock {
            descriptor: BlockDescriptor {
                number,
                header_identity: hash.clone(),
                hash,
                timestamp,
                encoded_size: body.header_size,
            },
            operations: body.operations,
        })
    }

    /// The remaining blocks as a fallible stream.
    pub fn into_stream(self) -> impl Stream<Item = Result<ScannedBlock>> + Send + 'a {
        stream::try_unfold(self, |mut cursor| async move {
            let block = cursor.next_block().await?;
            Ok::<_, LedgerError>(block.map(|b| (b, cursor)))
        })
    }
}
