//! Summaries of the most recent blocks

use std::sync::Arc;

use futures_util::TryStreamExt;

use crate::cursor::{BlockCursor, BlockDescriptor};
use crate::error::Result;
use crate::ledger::{connected_head, BlockHeader, LedgerClient};

pub const DEFAULT_RECENT_BLOCKS: u64 = 5;
pub const DEFAULT_HEADER_DEPTH: u64 = 100;

#[derive(Clone)]
pub struct RecentBlocksReporter {
    client: Arc<dyn LedgerClient>,
    header_depth: u64,
}

impl RecentBlocksReporter {
    pub fn new(client: Arc<dyn LedgerClient>, header_depth: u64) -> Self {
        Self {
            client,
            header_depth,
        }
    }

    pub fn header_depth(&self) -> u64 {
        self.header_depth
    }

    /// Descriptors of the last `count` blocks, newest first.
    pub async fn recent(&self, count: u64) -> Result<Vec<BlockDescriptor>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let head = connected_head(self.client.as_ref()).await?;
        let floor = (head + 1).saturating_sub(count);

        BlockCursor::new(self.client.as_ref(), head, floor)
            .into_stream()
            .map_ok(|block| block.descriptor)
            .try_collect()
            .await
    }

    /// Headers of the last `header_depth` blocks, newest first. Each block
    /// costs a hash lookup and a header fetch; bodies are never read.
    pub async fn headers(&self) -> Result<Vec<BlockHeader>> {
        if self.header_depth == 0 {
            return Ok(Vec::new());
        }
        let head = connected_head(self.client.as_ref()).await?;
        let floor = (head + 1).saturating_sub(self.header_depth);

        let mut headers = Vec::with_capacity((head - floor + 1) as usize);
        for number in (floor..=head).rev() {
            let hash = self.client.hash_for(number).await?;
            headers.push(self.client.header_for(&hash).await?);
        }
        Ok(headers)
    }
}
