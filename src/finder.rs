//! Hash lookups: first-match search, transfer verification and
//! sender-scoped transaction details
//!
//! A scan that reaches genesis without a match is a normal outcome (`None`
//! or `valid: false`), distinct from a scan that could not complete.

use std::sync::Arc;

use crate::cursor::BlockCursor;
use crate::error::Result;
use crate::ledger::{connected_head, LedgerClient, Operation};
use crate::matcher::{classify, Classification};
use crate::transaction::{iso_timestamp, FoundOperation, TransactionDetail, VerificationResult};

#[derive(Clone)]
pub struct TransactionFinder {
    client: Arc<dyn LedgerClient>,
}

impl TransactionFinder {
    pub fn new(client: Arc<dyn LedgerClient>) -> Self {
        Self { client }
    }

    /// First operation (signed or not) with the given hash, scanning from the head.
    pub async fn find(&self, hash: &str) -> Result<Option<FoundOperation>> {
        let head = connected_head(self.client.as_ref()).await?;
        self.find_from(hash, head).await
    }

    /// First operation with the given hash at or below `start`.
    pub async fn find_from(&self, hash: &str, start: u64) -> Result<Option<FoundOperation>> {
        self.client.connect().await?;
        self.scan(start, |op| op.has_hash(hash)).await
    }

    /// The transaction `hash` if it was signed by `sender`.
    pub async fn details_for(&self, sender: &str, hash: &str) -> Result<Option<TransactionDetail>> {
        let head = connected_head(self.client.as_ref()).await?;
        let found = self
            .scan(head, |op| op.has_hash(hash) && op.is_signed_by(sender))
            .await?;

        Ok(found.map(|found| TransactionDetail {
            receiver: classify(&found.operation).receiver().to_string(),
            hash: found.operation.hash.clone(),
            block_number: found.block_number,
            time: iso_timestamp(found.timestamp),
        }))
    }

    async fn scan<F>(&self, start: u64, matches: F) -> Result<Option<FoundOperation>>
    where
        F: Fn(&Operation) -> bool,
    {
        let mut cursor = BlockCursor::to_genesis(self.client.as_ref(), start);
        while let Some(block) = cursor.next_block().await? {
            if let Some(op) = block.operations.into_iter().find(|op| matches(op)) {
                return Ok(Some(FoundOperation {
                    block_number: block.descriptor.number,
                    timestamp: block.descriptor.timestamp,
                    operation: op,
                }));
            }
        }
        Ok(None)
    }
}

/// Checks a claimed transfer against the chain.
#[derive(Clone)]
pub struct TransactionVerifier {
    finder: TransactionFinder,
}

impl TransactionVerifier {
    pub fn new(finder: TransactionFinder) -> Self {
        Self { finder }
    }

    /// Valid only when `hash` is a transfer from `sender` to `receiver`.
    /// Scan failures are reported in the result, never as an `Err`.
    pub async fn verify(&self, hash: &str, sender: &str, receiver: &str) -> VerificationResult {
        let found = match self.finder.find(hash).await {
            Ok(found) => found,
            Err(e) => {
                tracing::error!(hash, error = %e, "Error verifying transaction");
                return VerificationResult::failed(e.to_string());
            }
        };

        let Some(found) = found else {
            return VerificationResult::rejected();
        };
        match classify(&found.operation) {
            Classification::Transfer {
                sender: actual_sender,
                receiver: actual_receiver,
            } if actual_sender == sender && actual_receiver == receiver => {
                VerificationResult::confirmed(found.block_number, found.timestamp)
            }
            _ => VerificationResult::rejected(),
        }
    }
}
